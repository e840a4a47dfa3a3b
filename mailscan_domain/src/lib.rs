// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mailscan Domain
//!
//! The mailscan domain represents the core state model of a per-message
//! scanning engine: one task per inbound message, driven through a fixed
//! multi-stage pipeline by the engine crate. This layer is completely
//! independent of external concerns like sockets, memory-mapped files, or
//! log output.
//!
//! ## Module Structure
//!
//! - **`entities`**: The scan task (identity, flags, stage bitmap,
//!   results, addresses, timing, error slot) and parsed-message containers
//! - **`value_objects`**: Flag and stage bitsets, verdict actions, symbols
//!   and metric results, addresses, header maps, the log-format model
//! - **`services`**: Contracts for the external collaborators the engine
//!   drives, plus the capability surface handed to scripted callbacks
//! - **`memory`**: The task arena with bump allocation, LIFO destructors,
//!   and named variables
//! - **`error`**: The task error kinds and propagation helpers
//! - **`config`**: The shared, refcounted scan configuration handle
//!
//! ## Key Invariants
//!
//! - The completed-stage bitmap is monotonically non-decreasing, and a
//!   stage is never entered after its bit is set
//! - Once the terminal flag is set, advancing the task is a no-op
//! - A forced pre-result short-circuits the pipeline: only the terminal
//!   bit is set and no later stage executes
//! - The message window stays valid from a successful load until the task
//!   arena drops
//! - Arena destructors run exactly once, in reverse registration order

pub mod config;
pub mod entities;
pub mod error;
pub mod memory;
pub mod services;
pub mod value_objects;

// Re-export commonly used types for convenient access
// These exports provide a clean API surface for consumers of the domain layer
pub use config::ScanConfig;
pub use entities::{MimePart, ReceivedHeader, ScanTask, TextPart, UNDEF};
pub use error::TaskError;
pub use memory::Arena;
pub use services::{
    Classifier, CompositeEngine, EventSession, FilterEngine, Learner, MessageParser, ProtocolHooks,
    ScriptHost, TaskOps,
};
pub use value_objects::{
    Action, EmailAddress, HeaderMap, LogFlags, LogFormat, LogFormatItem, LogItemKind, LogVariable,
    Mailbox, MailboxList, MetricResult, PreResult, ProcessingStage, ScriptCallbackId, StageSet, Symbol,
    TaskFlags, DEFAULT_METRIC,
};
