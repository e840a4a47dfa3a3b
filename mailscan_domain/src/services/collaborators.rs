// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # External Collaborator Contracts
//!
//! The engine drives a set of external subsystems: the message parser, the
//! symbol/rules engine, the statistical classifier, the composite-symbol
//! evaluator, the scripted callback host, the learner, the event session,
//! and the wire-protocol layer. This module fixes only the contracts the
//! core consumes from them; the implementations live outside the core and
//! are injected at construction.
//!
//! ## Contract Notes
//!
//! - All traits are object-safe and `Send + Sync`; the engine holds them
//!   as `Arc<dyn …>` shared across tasks
//! - A handler invoked on a task whose terminal flag is already set must
//!   return without further mutation; cancellation is cooperative
//! - Handlers whose stage can suspend must be idempotent with respect to
//!   partial effects, or stash a checkpoint on the task and consult it on
//!   re-entry

use crate::entities::ScanTask;
use crate::error::TaskError;
use crate::services::TaskOps;
use crate::value_objects::{ProcessingStage, ScriptCallbackId};

/// MIME parser invoked at the read-message stage.
///
/// Parses the task's message window into parts, text parts, raw headers,
/// MIME address lists, and the message-id. A parse failure terminates the
/// pipeline.
pub trait MessageParser: Send + Sync {
    /// Parses the message bytes of `task` into its structure fields
    fn parse(&self, task: &mut ScanTask) -> Result<(), TaskError>;
}

/// Symbol and rule engine invoked at the filters stage.
///
/// Evaluates the rule set against the parsed message, attaching symbols to
/// metric results. Rules that need asynchronous lookups register events
/// with the session and are re-entered when the stage resumes.
pub trait FilterEngine: Send + Sync {
    /// Runs the rule set over `task`
    fn process_symbols(&self, task: &mut ScanTask) -> Result<(), TaskError>;
}

/// Statistical classifier invoked at the three classifier sub-stages.
///
/// The sub-stage being executed is passed through so the classifier can
/// distinguish its pre, main, and post entry points.
pub trait Classifier: Send + Sync {
    /// Classifies `task` for the given sub-stage
    fn classify(&self, task: &mut ScanTask, stage: ProcessingStage) -> Result<(), TaskError>;

    /// Decides whether this task should be learned automatically,
    /// setting the learn flags on the task when it should
    fn check_autolearn(&self, task: &mut ScanTask);
}

/// Composite-symbol evaluator invoked after classification.
pub trait CompositeEngine: Send + Sync {
    /// Folds composite symbol definitions over the attached symbols
    fn compose(&self, task: &mut ScanTask);
}

/// Host for scripted pre/post-filter callbacks and log callbacks.
///
/// Filter callbacks receive the task through its capability surface; their
/// errors are logged by the engine and never fail the task. Log callbacks
/// return a fragment appended to the task log line.
pub trait ScriptHost: Send + Sync {
    /// Runs every registered pre-filter callback
    fn call_pre_filters(&self, task: &mut dyn TaskOps) -> Result<(), TaskError>;

    /// Runs every registered post-filter callback
    fn call_post_filters(&self, task: &mut dyn TaskOps) -> Result<(), TaskError>;

    /// Invokes a registered log callback with the finalized task
    fn call_log_callback(&self, id: ScriptCallbackId, task: &ScanTask) -> Result<String, TaskError>;
}

/// Learning subsystem invoked at the three learn sub-stages.
pub trait Learner: Send + Sync {
    /// Trains the named (or default) classifier on `task`
    fn learn(
        &self,
        task: &mut ScanTask,
        spam: bool,
        classifier: Option<&str>,
        stage: ProcessingStage,
    ) -> Result<(), TaskError>;
}

/// Cooperative event session owning the task's asynchronous operations.
///
/// The engine consults the session between stages; a non-zero pending
/// count suspends the pipeline until the session calls back into the
/// finalizer.
pub trait EventSession: Send + Sync {
    /// Number of asynchronous events still outstanding for `task`
    fn events_pending(&self, task: &ScanTask) -> usize;
}

/// Wire-protocol layer hooks.
pub trait ProtocolHooks: Send + Sync {
    /// Merges a parsed control document into the task
    fn handle_control(&self, task: &mut ScanTask, control: &serde_json::Value) -> Result<(), TaskError>;

    /// Writes the reply for a finalized task; emits an error reply when
    /// the task error slot is set
    fn write_reply(&self, task: &mut ScanTask);
}
