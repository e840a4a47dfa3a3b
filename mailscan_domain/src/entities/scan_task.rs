// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scan Task Entity
//!
//! One in-flight message scan and all of its per-message state.
//!
//! ## Overview
//!
//! The task is the root entity of the engine: the listener creates one per
//! inbound message, the pipeline and callbacks holding it mutate it, and
//! it is destroyed after the reply is written. It carries:
//!
//! - **Identity**: message-id and queue-id, defaulting to the `"undef"`
//!   sentinel
//! - **Pipeline state**: the flag bitset, the completed-stage bitmap, an
//!   optional forced pre-result, and a per-stage checkpoint slot
//! - **Message data**: the borrowed byte window over inline input or a
//!   mapped region, header maps, parsed parts, and addresses
//! - **Results**: per-metric score aggregations filled by the rules engine
//! - **Timing**: monotonic, CPU, and wall clocks captured at construction
//! - **Memory**: the arena owning derived allocations and cleanup closures
//!
//! ## Lifecycle and Ownership
//!
//! The configuration handle is shared and reference-counted; the task
//! retains one count. Envelope addresses are reference-counted the same
//! way. The arena is exclusive to the task and is dropped last, so the
//! message window stays valid from a successful load until the task is
//! destroyed.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use mailscan_domain::{ScanConfig, ScanTask, TaskFlags};
//!
//! let config = Arc::new(ScanConfig::default());
//! let task = ScanTask::new(Arc::clone(&config));
//! assert_eq!(task.message_id(), "undef");
//! assert!(task.flags().contains(TaskFlags::MIME | TaskFlags::JSON));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::ScanConfig;
use crate::entities::message::{MimePart, ReceivedHeader, TextPart};
use crate::error::TaskError;
use crate::memory::Arena;
use crate::services::TaskOps;
use crate::value_objects::{
    Action, EmailAddress, HeaderMap, MailboxList, MetricResult, PreResult, ProcessingStage, StageSet,
    Symbol, TaskFlags, DEFAULT_METRIC,
};

/// Identity sentinel for message-id and queue-id
pub const UNDEF: &str = "undef";

/// Arena variable caching the resolved principal recipient
const RECIPIENT_VAR: &str = "recipient";

/// Reads the process CPU clock.
fn cpu_clock() -> Duration {
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
    if rc == 0 {
        Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
    } else {
        Duration::ZERO
    }
}

/// Per-message scan state.
///
/// See the module documentation for the field groups and lifecycle. The
/// arena is declared last so the message window and every other field drop
/// before the arena runs its destructors.
pub struct ScanTask {
    message_id: String,
    queue_id: String,
    user: Option<String>,
    deliver_to: Option<String>,

    flags: TaskFlags,
    processed_stages: StageSet,
    pre_result: Option<PreResult>,
    checkpoint: Option<Box<dyn Any + Send>>,

    msg: Bytes,
    message_len: usize,

    results: HashMap<String, MetricResult>,
    raw_headers: HeaderMap,
    request_headers: HeaderMap,
    reply_headers: HeaderMap,
    parts: Vec<MimePart>,
    text_parts: Vec<TextPart>,
    received: Vec<ReceivedHeader>,

    from_envelope: Option<Arc<EmailAddress>>,
    rcpt_envelope: Vec<Arc<EmailAddress>>,
    from_mime: Option<MailboxList>,
    rcpt_mime: Option<MailboxList>,
    from_addr: Option<IpAddr>,
    client_addr: Option<IpAddr>,

    dns_requests: u32,
    learn_classifier: Option<String>,
    settings: Option<serde_json::Value>,

    time_real: Instant,
    time_virtual: Duration,
    tv: DateTime<Utc>,

    err: Option<TaskError>,
    loaded: bool,

    config: Arc<ScanConfig>,
    arena: Arena,
}

impl ScanTask {
    /// Creates a task for one inbound message.
    ///
    /// Retains one count on the configuration handle, captures the three
    /// clocks, and installs the default flags: MIME input and JSON output,
    /// plus pass-all when the configuration asks for every filter to run.
    pub fn new(config: Arc<ScanConfig>) -> Self {
        let mut flags = TaskFlags::MIME | TaskFlags::JSON;
        if config.check_all_filters {
            flags.insert(TaskFlags::PASS_ALL);
        }

        Self {
            message_id: UNDEF.to_string(),
            queue_id: UNDEF.to_string(),
            user: None,
            deliver_to: None,
            flags,
            processed_stages: StageSet::empty(),
            pre_result: None,
            checkpoint: None,
            msg: Bytes::new(),
            message_len: 0,
            results: HashMap::new(),
            raw_headers: HeaderMap::new(),
            request_headers: HeaderMap::new(),
            reply_headers: HeaderMap::new(),
            parts: Vec::new(),
            text_parts: Vec::new(),
            received: Vec::new(),
            from_envelope: None,
            rcpt_envelope: Vec::new(),
            from_mime: None,
            rcpt_mime: None,
            from_addr: None,
            client_addr: None,
            dns_requests: 0,
            learn_classifier: None,
            settings: None,
            time_real: Instant::now(),
            time_virtual: cpu_clock(),
            tv: Utc::now(),
            err: None,
            loaded: false,
            config,
            arena: Arena::new(),
        }
    }

    // ---- identity ----------------------------------------------------

    /// Message-id, `"undef"` until the parser finds one
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Sets the message-id
    pub fn set_message_id(&mut self, id: impl Into<String>) {
        self.message_id = id.into();
    }

    /// Queue-id, `"undef"` until the protocol layer supplies one
    pub fn queue_id(&self) -> &str {
        &self.queue_id
    }

    /// Sets the queue-id
    pub fn set_queue_id(&mut self, id: impl Into<String>) {
        self.queue_id = id.into();
    }

    /// Authenticated user, when known
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Sets the authenticated user
    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = Some(user.into());
    }

    /// Delivery address stated by the protocol layer
    pub fn deliver_to(&self) -> Option<&str> {
        self.deliver_to.as_deref()
    }

    /// Sets the delivery address
    pub fn set_deliver_to(&mut self, addr: impl Into<String>) {
        self.deliver_to = Some(addr.into());
    }

    // ---- pipeline state ----------------------------------------------

    /// Current flag bitset
    pub fn flags(&self) -> TaskFlags {
        self.flags
    }

    /// Sets flags
    pub fn set_flag(&mut self, flags: TaskFlags) {
        self.flags.insert(flags);
    }

    /// Clears flags
    pub fn clear_flag(&mut self, flags: TaskFlags) {
        self.flags.remove(flags);
    }

    /// Whether the task reached its terminal state
    pub fn is_processed(&self) -> bool {
        self.processed_stages.contains(ProcessingStage::Done) || self.flags.contains(TaskFlags::PROCESSED)
    }

    /// Moves the task to its terminal state.
    ///
    /// Sets the terminal stage bit and the processed flag together so the
    /// two representations cannot drift.
    pub fn mark_processed(&mut self) {
        self.processed_stages.insert(ProcessingStage::Done);
        self.flags.insert(TaskFlags::PROCESSED);
    }

    /// Whether a filter asked to skip the rest of the pipeline
    pub fn is_skipped(&self) -> bool {
        self.flags.contains(TaskFlags::SKIP)
    }

    /// Whether the message body is empty
    pub fn is_empty_message(&self) -> bool {
        self.flags.contains(TaskFlags::EMPTY)
    }

    /// Completed-stage bitmap
    pub fn processed_stages(&self) -> StageSet {
        self.processed_stages
    }

    /// Mutable completed-stage bitmap, for the engine
    pub fn processed_stages_mut(&mut self) -> &mut StageSet {
        &mut self.processed_stages
    }

    /// Forced pre-filter verdict, when one was set
    pub fn pre_result(&self) -> Option<&PreResult> {
        self.pre_result.as_ref()
    }

    /// Forces a verdict before the pipeline decides.
    ///
    /// The verdict is also recorded as the action of the default metric so
    /// verdict-derived log variables render for short-circuited tasks.
    pub fn set_pre_result(&mut self, action: Action, message: Option<String>) {
        self.pre_result = Some(PreResult::new(action, message));
        self.result_mut(DEFAULT_METRIC).set_action(action);
    }

    /// Per-stage checkpoint stashed by a suspended stage handler
    pub fn checkpoint(&self) -> Option<&(dyn Any + Send)> {
        self.checkpoint.as_deref()
    }

    /// Stashes a checkpoint for re-entry into the current stage
    pub fn set_checkpoint(&mut self, checkpoint: Box<dyn Any + Send>) {
        self.checkpoint = Some(checkpoint);
    }

    /// Clears the checkpoint; the engine does this on forward progress
    pub fn clear_checkpoint(&mut self) {
        self.checkpoint = None;
    }

    // ---- message data ------------------------------------------------

    /// Message byte window
    pub fn msg(&self) -> &Bytes {
        &self.msg
    }

    /// Replaces the message byte window
    pub fn set_msg(&mut self, msg: Bytes) {
        self.msg = msg;
    }

    /// Declared message length from the protocol layer
    pub fn message_len(&self) -> usize {
        self.message_len
    }

    /// Sets the declared message length
    pub fn set_message_len(&mut self, len: usize) {
        self.message_len = len;
    }

    /// Whether the message loader already ran for this task
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Marks the task as loaded; the loader runs at most once
    pub fn mark_loaded(&mut self) {
        self.loaded = true;
    }

    /// Raw message headers filled by the parser
    pub fn raw_headers(&self) -> &HeaderMap {
        &self.raw_headers
    }

    /// Mutable raw headers, for the parser
    pub fn raw_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.raw_headers
    }

    /// Request headers from the protocol layer
    pub fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    /// Mutable request headers
    pub fn request_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.request_headers
    }

    /// Reply headers accumulated for the response
    pub fn reply_headers(&self) -> &HeaderMap {
        &self.reply_headers
    }

    /// Mutable reply headers
    pub fn reply_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.reply_headers
    }

    /// Parsed MIME parts, in parse order
    pub fn parts(&self) -> &[MimePart] {
        &self.parts
    }

    /// Appends a parsed MIME part
    pub fn add_part(&mut self, part: MimePart) {
        self.parts.push(part);
    }

    /// Extracted text parts, in parse order
    pub fn text_parts(&self) -> &[TextPart] {
        &self.text_parts
    }

    /// Appends an extracted text part
    pub fn add_text_part(&mut self, part: TextPart) {
        self.text_parts.push(part);
    }

    /// Parsed `Received` trace, top-most first
    pub fn received(&self) -> &[ReceivedHeader] {
        &self.received
    }

    /// Appends a trace entry
    pub fn add_received(&mut self, header: ReceivedHeader) {
        self.received.push(header);
    }

    // ---- addresses ---------------------------------------------------

    /// Envelope sender
    pub fn sender(&self) -> Option<&Arc<EmailAddress>> {
        self.from_envelope.as_ref()
    }

    /// Sets the envelope sender; the task retains one count
    pub fn set_from_envelope(&mut self, addr: Arc<EmailAddress>) {
        self.from_envelope = Some(addr);
    }

    /// Envelope recipients, in protocol order
    pub fn rcpt_envelope(&self) -> &[Arc<EmailAddress>] {
        &self.rcpt_envelope
    }

    /// Appends an envelope recipient; the task retains one count
    pub fn add_rcpt_envelope(&mut self, addr: Arc<EmailAddress>) {
        self.rcpt_envelope.push(addr);
    }

    /// Parsed MIME `From` mailboxes
    pub fn from_mime(&self) -> Option<&MailboxList> {
        self.from_mime.as_ref()
    }

    /// Sets the MIME `From` list, from the parser
    pub fn set_from_mime(&mut self, list: MailboxList) {
        self.from_mime = Some(list);
    }

    /// Parsed MIME recipient mailboxes
    pub fn rcpt_mime(&self) -> Option<&MailboxList> {
        self.rcpt_mime.as_ref()
    }

    /// Sets the MIME recipient list, from the parser
    pub fn set_rcpt_mime(&mut self, list: MailboxList) {
        self.rcpt_mime = Some(list);
    }

    /// Address of the sending host
    pub fn from_addr(&self) -> Option<IpAddr> {
        self.from_addr
    }

    /// Sets the sending host address
    pub fn set_from_addr(&mut self, addr: IpAddr) {
        self.from_addr = Some(addr);
    }

    /// Address of the connected client
    pub fn client_addr(&self) -> Option<IpAddr> {
        self.client_addr
    }

    /// Sets the connected client address
    pub fn set_client_addr(&mut self, addr: IpAddr) {
        self.client_addr = Some(addr);
    }

    /// Selects the single principal recipient.
    ///
    /// Precedence: the cached arena value, then `deliver_to`, then the
    /// first envelope recipient, then the first MIME recipient mailbox.
    /// The winner is lowercased, cached on the arena, and returned;
    /// repeated calls return the same allocation.
    pub fn principal_recipient(&mut self) -> Option<Arc<String>> {
        if let Some(cached) = self.arena.get_variable::<String>(RECIPIENT_VAR) {
            return Some(cached);
        }

        let addr = if let Some(deliver_to) = self.deliver_to.as_deref() {
            deliver_to
        } else if let Some(first) = self.rcpt_envelope.first() {
            first.addr()
        } else if let Some(mailbox) = self.rcpt_mime.as_ref().and_then(|list| list.first()) {
            mailbox.addr()
        } else {
            return None;
        };

        let cached = Arc::new(addr.to_lowercase());
        self.arena.set_variable(RECIPIENT_VAR, Arc::clone(&cached));
        Some(cached)
    }

    // ---- results and learning ----------------------------------------

    /// Metric results, keyed by metric name
    pub fn results(&self) -> &HashMap<String, MetricResult> {
        &self.results
    }

    /// Result for a metric, created empty on first use
    pub fn result_mut(&mut self, metric: &str) -> &mut MetricResult {
        self.results.entry(metric.to_string()).or_default()
    }

    /// Result of the verdict-driving default metric
    pub fn default_result(&self) -> Option<&MetricResult> {
        self.results.get(DEFAULT_METRIC)
    }

    /// Requests learning for this task.
    ///
    /// Sets the spam or ham learn flag and remembers which classifier to
    /// train, if a specific one was named.
    pub fn learn(&mut self, spam: bool, classifier: Option<&str>) {
        if spam {
            self.flags.insert(TaskFlags::LEARN_SPAM);
        } else {
            self.flags.insert(TaskFlags::LEARN_HAM);
        }
        self.learn_classifier = classifier.map(str::to_string);
    }

    /// Classifier named for learning, when one was
    pub fn learn_classifier(&self) -> Option<&str> {
        self.learn_classifier.as_deref()
    }

    /// Settings document merged from the control chunk
    pub fn settings(&self) -> Option<&serde_json::Value> {
        self.settings.as_ref()
    }

    /// Replaces the settings document
    pub fn set_settings(&mut self, settings: serde_json::Value) {
        self.settings = Some(settings);
    }

    // ---- timing and counters -----------------------------------------

    /// Wall-clock timestamp captured at construction
    pub fn tv(&self) -> DateTime<Utc> {
        self.tv
    }

    /// Elapsed real time since construction
    pub fn elapsed_real(&self) -> Duration {
        self.time_real.elapsed()
    }

    /// Elapsed process CPU time since construction
    pub fn elapsed_virtual(&self) -> Duration {
        cpu_clock().saturating_sub(self.time_virtual)
    }

    /// DNS requests issued on behalf of this task
    pub fn dns_requests(&self) -> u32 {
        self.dns_requests
    }

    /// Counts one DNS request
    pub fn inc_dns_requests(&mut self) {
        self.dns_requests += 1;
    }

    // ---- errors, config, arena ---------------------------------------

    /// Error recorded for this task, when any
    pub fn err(&self) -> Option<&TaskError> {
        self.err.as_ref()
    }

    /// Records an error; an earlier error is kept
    pub fn set_err(&mut self, err: TaskError) {
        if self.err.is_none() {
            self.err = Some(err);
        }
    }

    /// Shared configuration handle
    pub fn config(&self) -> &Arc<ScanConfig> {
        &self.config
    }

    /// Task arena
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Mutable task arena
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }
}

impl TaskOps for ScanTask {
    fn request_header(&self, name: &str) -> Option<&str> {
        self.request_headers.get(name)
    }

    fn set_reply_header(&mut self, name: &str, value: &str) {
        self.reply_headers.insert(name, value);
    }

    fn add_symbol(&mut self, metric: &str, symbol: Symbol) {
        self.result_mut(metric).insert_symbol(symbol);
    }

    fn force_pre_result(&mut self, action: Action, message: Option<String>) {
        self.set_pre_result(action, message);
    }

    fn skip(&mut self) {
        self.flags.insert(TaskFlags::SKIP);
    }
}

impl std::fmt::Debug for ScanTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanTask")
            .field("message_id", &self.message_id)
            .field("queue_id", &self.queue_id)
            .field("flags", &self.flags)
            .field("processed_stages", &self.processed_stages)
            .field("msg_len", &self.msg.len())
            .field("err", &self.err)
            .finish()
    }
}
