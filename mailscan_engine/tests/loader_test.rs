// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Message Loader Tests
//!
//! Source resolution against real files and shared-memory segments, plus
//! the control-chunk handling rules.

mod common;

use std::ffi::CString;
use std::io::Write as _;
use std::sync::Arc;

use bytes::Bytes;
use mailscan_domain::{HeaderMap, TaskFlags};
use mailscan_engine::MessageLoader;

use common::{new_task, MockProtocol};

fn loader() -> (MessageLoader, Arc<MockProtocol>) {
    let protocol = Arc::new(MockProtocol::default());
    (MessageLoader::new(Arc::clone(&protocol) as _), protocol)
}

#[test]
fn test_inline_source() {
    let (loader, _) = loader();
    let mut task = new_task();

    loader
        .load(&mut task, None, Some(Bytes::from_static(b"Subject: hi\r\n\r\nbody")))
        .unwrap();

    assert_eq!(task.msg().as_ref(), b"Subject: hi\r\n\r\nbody");
    assert!(!task.flags().contains(TaskFlags::EMPTY));
    assert!(!task.flags().contains(TaskFlags::FILE));
}

#[test]
fn test_inline_empty_sets_empty_flag() {
    let (loader, _) = loader();
    let mut task = new_task();

    loader.load(&mut task, None, Some(Bytes::new())).unwrap();
    assert!(task.flags().contains(TaskFlags::EMPTY));
}

#[test]
fn test_load_runs_at_most_once() {
    let (loader, _) = loader();
    let mut task = new_task();

    loader.load(&mut task, None, Some(Bytes::new())).unwrap();
    let err = loader.load(&mut task, None, Some(Bytes::new())).unwrap_err();
    assert_eq!(err.kind(), "internal");
}

#[test]
fn test_file_source_maps_contents() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"From: a@example.org\r\n\r\nhello").unwrap();
    file.flush().unwrap();

    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("File", file.path().to_str().unwrap())].into_iter().collect();
    loader.load(&mut task, Some(headers), None).unwrap();

    assert_eq!(task.msg().as_ref(), b"From: a@example.org\r\n\r\nhello");
    assert!(task.flags().contains(TaskFlags::FILE));
    // The mapping is tied to the arena
    assert_eq!(task.arena().destructor_count(), 1);

    drop(task);
}

#[test]
fn test_path_header_is_file_fallback() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"x").unwrap();
    file.flush().unwrap();

    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("Path", file.path().to_str().unwrap())].into_iter().collect();
    loader.load(&mut task, Some(headers), None).unwrap();
    assert_eq!(task.msg().as_ref(), b"x");
}

#[test]
fn test_missing_file_is_a_protocol_error() {
    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("file", "/nonexistent/mailscan-test.eml")].into_iter().collect();
    let err = loader.load(&mut task, Some(headers), None).unwrap_err();

    assert_eq!(err.kind(), "protocol");
    assert_eq!(task.err().unwrap().kind(), "protocol");
}

#[test]
fn test_quoted_and_encoded_file_value() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("with space.eml");
    std::fs::write(&path, b"body").unwrap();

    let encoded = path.to_str().unwrap().replace(' ', "%20");
    let quoted = format!("\"{}\"", encoded);

    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("file", quoted.as_str())].into_iter().collect();
    loader.load(&mut task, Some(headers), None).unwrap();
    assert_eq!(task.msg().as_ref(), b"body");
}

/// Creates a shared-memory segment with the given contents, returning its
/// name. The caller unlinks it.
fn create_shm_segment(name: &str, contents: &[u8]) -> CString {
    let c_name = CString::new(name).unwrap();
    unsafe {
        let fd = libc::shm_open(
            c_name.as_ptr(),
            libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
            0o600,
        );
        assert!(fd >= 0, "shm_open failed: {}", std::io::Error::last_os_error());

        let written = libc::write(fd, contents.as_ptr() as *const libc::c_void, contents.len());
        assert_eq!(written, contents.len() as isize);
        libc::close(fd);
    }
    c_name
}

fn unlink_shm(name: &CString) {
    unsafe {
        libc::shm_unlink(name.as_ptr());
    }
}

#[test]
fn test_shm_source_maps_segment() {
    let name = format!("/mailscan-test-full-{}", std::process::id());
    let c_name = create_shm_segment(&name, b"shared message body");

    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("shm", name.as_str())].into_iter().collect();
    let result = loader.load(&mut task, Some(headers), None);
    unlink_shm(&c_name);
    result.unwrap();

    assert_eq!(task.msg().as_ref(), b"shared message body");
    assert!(task.flags().contains(TaskFlags::FILE));
    assert_eq!(task.arena().destructor_count(), 1);
}

#[test]
fn test_shm_offset_and_length_window() {
    let name = format!("/mailscan-test-window-{}", std::process::id());
    let c_name = create_shm_segment(&name, b"prefix|message|suffix");

    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("shm", name.as_str()), ("shm-offset", "7"), ("shm-length", "7")]
        .into_iter()
        .collect();
    let result = loader.load(&mut task, Some(headers), None);
    unlink_shm(&c_name);
    result.unwrap();

    assert_eq!(task.msg().as_ref(), b"message");
}

#[test]
fn test_shm_offset_without_length_defaults_to_segment_size() {
    let name = format!("/mailscan-test-default-{}", std::process::id());
    let c_name = create_shm_segment(&name, b"prefix|message");

    let (loader, _) = loader();
    let mut task = new_task();

    // No shm-length: the length defaults to the full segment size,
    // independent of the offset, and the window reads to the segment end
    let headers: HeaderMap = [("shm", name.as_str()), ("shm-offset", "7")].into_iter().collect();
    let result = loader.load(&mut task, Some(headers), None);
    unlink_shm(&c_name);
    result.unwrap();

    assert_eq!(task.msg().as_ref(), b"message");
}

#[test]
fn test_shm_length_up_to_segment_size_is_accepted_with_offset() {
    let name = format!("/mailscan-test-span-{}", std::process::id());
    let c_name = create_shm_segment(&name, b"prefix|message");

    let (loader, _) = loader();
    let mut task = new_task();

    // Offset 7 and length 14 are each within the 14-byte segment, so the
    // load succeeds; the window stops at the segment end
    let headers: HeaderMap = [("shm", name.as_str()), ("shm-offset", "7"), ("shm-length", "14")]
        .into_iter()
        .collect();
    let result = loader.load(&mut task, Some(headers), None);
    unlink_shm(&c_name);
    result.unwrap();

    assert_eq!(task.msg().as_ref(), b"message");
}

#[test]
fn test_shm_offset_beyond_segment_fails() {
    let name = format!("/mailscan-test-offset-{}", std::process::id());
    let c_name = create_shm_segment(&name, b"tiny");

    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("shm", name.as_str()), ("shm-offset", "64")].into_iter().collect();
    let result = loader.load(&mut task, Some(headers), None);
    unlink_shm(&c_name);

    assert_eq!(result.unwrap_err().kind(), "protocol");
}

#[test]
fn test_shm_length_beyond_segment_fails() {
    let name = format!("/mailscan-test-length-{}", std::process::id());
    let c_name = create_shm_segment(&name, b"tiny");

    let (loader, _) = loader();
    let mut task = new_task();

    let headers: HeaderMap = [("shm", name.as_str()), ("shm-length", "4096")].into_iter().collect();
    let result = loader.load(&mut task, Some(headers), None);
    unlink_shm(&c_name);

    assert_eq!(result.unwrap_err().kind(), "protocol");
}

#[test]
fn test_missing_shm_segment_fails() {
    let (loader, _) = loader();
    let mut task = new_task();

    let name = format!("/mailscan-test-absent-{}", std::process::id());
    let headers: HeaderMap = [("shm", name.as_str())].into_iter().collect();
    let err = loader.load(&mut task, Some(headers), None).unwrap_err();

    assert_eq!(err.kind(), "protocol");
}

#[test]
fn test_control_chunk_is_extracted_and_merged() {
    let (loader, protocol) = loader();
    let mut task = new_task();

    let control = br#"{"queue_id": "abc123"}"#;
    let body = b"message body";
    let mut input = Vec::new();
    input.extend_from_slice(control);
    input.extend_from_slice(body);

    task.set_flag(TaskFlags::HAS_CONTROL);
    task.set_message_len(body.len());

    loader.load(&mut task, None, Some(Bytes::from(input))).unwrap();

    // The window advanced past the control prefix
    assert_eq!(task.msg().as_ref(), body);
    assert_eq!(protocol.controls.lock().unwrap().len(), 1);
    assert_eq!(
        task.settings().unwrap()["queue_id"],
        serde_json::Value::String("abc123".to_string())
    );
}

#[test]
fn test_control_chunk_longer_than_input_fails() {
    let (loader, protocol) = loader();
    let mut task = new_task();

    task.set_flag(TaskFlags::HAS_CONTROL);
    task.set_message_len(100);

    let err = loader
        .load(&mut task, None, Some(Bytes::from_static(b"short")))
        .unwrap_err();

    assert_eq!(err.to_string(), "Protocol error: Invalid length");
    // No mutation: the window stays empty and no control was merged
    assert!(task.msg().is_empty());
    assert!(protocol.controls.lock().unwrap().is_empty());
    assert!(task.settings().is_none());
}

#[test]
fn test_malformed_control_chunk_is_non_fatal() {
    let (loader, protocol) = loader();
    let mut task = new_task();

    let control = b"{not json!}";
    let body = b"message body";
    let mut input = Vec::new();
    input.extend_from_slice(control);
    input.extend_from_slice(body);

    task.set_flag(TaskFlags::HAS_CONTROL);
    task.set_message_len(body.len());

    loader.load(&mut task, None, Some(Bytes::from(input))).unwrap();

    assert_eq!(task.msg().as_ref(), body);
    assert!(protocol.controls.lock().unwrap().is_empty());
}

#[test]
fn test_zero_length_control_chunk_is_ignored() {
    let (loader, protocol) = loader();
    let mut task = new_task();

    let body = b"message body";
    task.set_flag(TaskFlags::HAS_CONTROL);
    task.set_message_len(body.len());

    loader.load(&mut task, None, Some(Bytes::from_static(body))).unwrap();

    assert_eq!(task.msg().as_ref(), body);
    assert!(protocol.controls.lock().unwrap().is_empty());
}
