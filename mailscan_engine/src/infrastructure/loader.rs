// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Message Loader
//!
//! Resolves the message bytes for a task from one of three physically
//! distinct sources and binds their lifetime to the task arena.
//!
//! ## Source Precedence
//!
//! Request headers are checked in this order:
//!
//! 1. **`shm`** - a POSIX shared-memory object name, honoring the
//!    `shm-offset` and `shm-length` headers (unsigned decimal; offset
//!    defaults to 0, length to the segment size, each validated against
//!    the segment size on its own; the window slice stops at the
//!    segment end)
//! 2. **`file`**, else **`path`** - a filesystem path, opened read-only
//!    and memory-mapped shared
//! 3. Otherwise the inline bytes supplied by the caller
//!
//! Mapped regions are wrapped in a refcounted window and a clone is
//! registered on the arena, so the mapping is released when the task
//! drops, never earlier. The file descriptor is closed immediately after
//! mapping in both mapped cases.
//!
//! ## Path Values
//!
//! `shm`/`file`/`path` header values are percent-decoded and, when
//! surrounded by ASCII double quotes, unquoted. The decoded value is
//! copied into a `PATH_MAX`-bounded buffer; longer values are silently
//! truncated by the copy. That truncation is documented behavior.
//!
//! ## Control Chunk
//!
//! For inline input flagged as carrying a control chunk, the prefix of
//! `msg.len - declared_message_len` bytes is parsed as a JSON document and
//! handed to the protocol layer to merge into the task; the message window
//! is then advanced past the prefix. A declared length larger than the
//! received buffer fails the load with `Protocol("Invalid length")`.
//! Parser failures are logged and non-fatal.

use std::ffi::CString;
use std::fs::File;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::FromRawFd;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use memmap2::MmapOptions;
use percent_encoding::percent_decode;
use tracing::{debug, info, warn};

use mailscan_domain::{HeaderMap, ProtocolHooks, ScanTask, TaskError, TaskFlags};

/// Resolves message bytes from inline input, a file, or a shm segment.
pub struct MessageLoader {
    protocol: Arc<dyn ProtocolHooks>,
}

impl MessageLoader {
    /// Creates a loader handing control documents to `protocol`.
    pub fn new(protocol: Arc<dyn ProtocolHooks>) -> Self {
        Self { protocol }
    }

    /// Loads the message bytes for `task`.
    ///
    /// Optional `headers` are merged into the task's request headers
    /// first; `inline` is used when no source header selects a mapped
    /// source. Must be called at most once per task. On failure the error
    /// is recorded in the task error slot and the task is not advanced
    /// further.
    pub fn load(
        &self,
        task: &mut ScanTask,
        headers: Option<HeaderMap>,
        inline: Option<Bytes>,
    ) -> Result<(), TaskError> {
        if task.is_loaded() {
            let err = TaskError::internal("Message already loaded for this task");
            task.set_err(err.clone());
            return Err(err);
        }
        task.mark_loaded();

        if let Some(headers) = headers {
            task.request_headers_mut().merge(headers);
        }

        let result = self.resolve(task, inline);
        if let Err(err) = &result {
            task.set_err(err.clone());
        }
        result
    }

    fn resolve(&self, task: &mut ScanTask, inline: Option<Bytes>) -> Result<(), TaskError> {
        if let Some(value) = task.request_headers().get("shm") {
            let name = sanitize_path_value(value);
            return self.load_shm(task, &name);
        }

        let file_value = task
            .request_headers()
            .get("file")
            .or_else(|| task.request_headers().get("path"));

        if let Some(value) = file_value {
            let path = sanitize_path_value(value);
            return self.load_file(task, &path);
        }

        self.load_inline(task, inline.unwrap_or_default())
    }

    /// Maps a POSIX shared-memory segment read-only.
    fn load_shm(&self, task: &mut ScanTask, name: &[u8]) -> Result<(), TaskError> {
        let display_name = String::from_utf8_lossy(name).into_owned();

        let c_name = CString::new(name)
            .map_err(|_| TaskError::protocol(format!("Invalid shm segment name ({})", display_name)))?;

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDONLY, 0o600) };
        if fd < 0 {
            return Err(TaskError::protocol(format!(
                "Cannot open shm segment ({}): {}",
                display_name,
                std::io::Error::last_os_error()
            )));
        }

        // Owns the descriptor from here on.
        let file = unsafe { File::from_raw_fd(fd) };

        let size = file
            .metadata()
            .map_err(|e| TaskError::protocol(format!("Cannot stat shm segment ({}): {}", display_name, e)))?
            .len() as usize;

        let map = unsafe { MmapOptions::new().map(&file) }
            .map_err(|e| TaskError::protocol(format!("Cannot mmap file ({}): {}", display_name, e)))?;

        // The mapping keeps the segment reachable on its own.
        drop(file);

        let offset = parse_decimal_header(task, "shm-offset")?.unwrap_or(0);
        if offset > size {
            return Err(TaskError::protocol(format!(
                "invalid offset {} ({} available) for shm segment {}",
                offset, size, display_name
            )));
        }

        let length = match parse_decimal_header(task, "shm-length")? {
            Some(length) if length > size => {
                return Err(TaskError::protocol(format!(
                    "invalid length {} ({} available) for shm segment {}",
                    length, size, display_name
                )));
            }
            Some(length) => length,
            None => size,
        };

        // The declared window may reach past the mapping when offset and
        // length are both near the segment size; the slice stops at the
        // segment end.
        let end = size.min(offset.saturating_add(length));

        let mapping = Bytes::from_owner(map);
        let window = mapping.slice(offset..end);

        // The whole mapping lives until the arena drops.
        task.arena_mut().register_destructor(move || drop(mapping));
        task.set_msg(window);
        task.set_flag(TaskFlags::FILE);

        info!(
            target: "mailscan",
            "loaded message from shared memory {} ({} size, {} offset)",
            display_name, length, offset
        );

        Ok(())
    }

    /// Maps a file read-only.
    fn load_file(&self, task: &mut ScanTask, path: &[u8]) -> Result<(), TaskError> {
        let path = Path::new(std::ffi::OsStr::from_bytes(path));
        let display_name = path.display().to_string();

        debug!(target: "mailscan", "want to scan file {}", display_name);

        let metadata = std::fs::metadata(path)
            .map_err(|e| TaskError::protocol(format!("Invalid file ({}): {}", display_name, e)))?;

        let file = File::open(path)
            .map_err(|e| TaskError::protocol(format!("Cannot open file ({}): {}", display_name, e)))?;

        let map = unsafe { MmapOptions::new().map(&file) }
            .map_err(|e| TaskError::protocol(format!("Cannot mmap file ({}): {}", display_name, e)))?;

        drop(file);

        debug_assert_eq!(map.len() as u64, metadata.len());

        let mapping = Bytes::from_owner(map);
        let window = mapping.clone();

        task.arena_mut().register_destructor(move || drop(mapping));
        task.set_msg(window);
        task.set_flag(TaskFlags::FILE);

        info!(target: "mailscan", "loaded message from file {}", display_name);

        Ok(())
    }

    /// Takes the inline bytes, extracting a control chunk when declared.
    fn load_inline(&self, task: &mut ScanTask, inline: Bytes) -> Result<(), TaskError> {
        debug!(target: "mailscan", "got input of length {}", inline.len());

        if task.flags().contains(TaskFlags::HAS_CONTROL) && inline.len() < task.message_len() {
            warn!(
                target: "mailscan",
                "message has invalid message length: {} and total len: {}",
                task.message_len(),
                inline.len()
            );
            return Err(TaskError::protocol("Invalid length".to_string()));
        }

        task.set_msg(inline);

        if task.msg().is_empty() {
            task.set_flag(TaskFlags::EMPTY);
        }

        if task.flags().contains(TaskFlags::HAS_CONTROL) {
            let control_len = task.msg().len() - task.message_len();

            if control_len > 0 {
                let prefix = task.msg().slice(..control_len);

                match serde_json::from_slice::<serde_json::Value>(&prefix) {
                    Ok(control) => {
                        if let Err(err) = self.protocol.handle_control(task, &control) {
                            warn!(target: "mailscan", "processing of control chunk failed: {}", err);
                        }
                    }
                    Err(err) => {
                        warn!(target: "mailscan", "processing of control chunk failed: {}", err);
                    }
                }

                let rest = task.msg().slice(control_len..);
                task.set_msg(rest);
            }
        }

        Ok(())
    }
}

/// Parses an unsigned decimal request header, when present.
fn parse_decimal_header(task: &ScanTask, name: &str) -> Result<Option<usize>, TaskError> {
    match task.request_headers().get(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| TaskError::protocol(format!("Invalid {} value: {}", name, value))),
    }
}

/// Percent-decodes and unquotes a path-carrying header value, bounding it
/// to `PATH_MAX`. Longer values are silently truncated by the copy.
fn sanitize_path_value(value: &str) -> Vec<u8> {
    const PATH_MAX: usize = libc::PATH_MAX as usize;

    let mut bytes = value.as_bytes();
    if bytes.len() >= PATH_MAX {
        bytes = &bytes[..PATH_MAX - 1];
    }

    let mut decoded: Vec<u8> = percent_decode(bytes).collect();

    if decoded.len() > 2 && decoded.first() == Some(&b'"') {
        decoded.remove(0);
        decoded.pop();
    }

    decoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_plain_value() {
        assert_eq!(sanitize_path_value("/tmp/x.eml"), b"/tmp/x.eml");
    }

    #[test]
    fn test_sanitize_percent_decoding() {
        assert_eq!(sanitize_path_value("/tmp/a%20b.eml"), b"/tmp/a b.eml");
    }

    #[test]
    fn test_sanitize_unquoting() {
        assert_eq!(sanitize_path_value("\"/tmp/x.eml\""), b"/tmp/x.eml");
        // A bare pair of quotes is below the unquoting threshold
        assert_eq!(sanitize_path_value("\"\""), b"\"\"");
    }

    #[test]
    fn test_sanitize_truncates_at_path_max() {
        let long = "a".repeat(10_000);
        let decoded = sanitize_path_value(&long);
        assert_eq!(decoded.len(), libc::PATH_MAX as usize - 1);
    }
}
