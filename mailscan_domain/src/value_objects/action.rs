// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Verdict Actions
//!
//! The action is the decision a metric result carries for a message, from
//! "accept as-is" up to "reject". Actions are ordered by severity; the
//! per-action score thresholds of a metric use the same ordering.
//!
//! A pre-filter may force an action before the pipeline runs; the forced
//! verdict is carried as a [`PreResult`] and short-circuits all remaining
//! stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TaskError;

/// Decision taken for a scanned message, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Action {
    /// Deliver unchanged
    NoAction,
    /// Ask the sender to retry later
    Greylist,
    /// Deliver with a spam header added
    AddHeader,
    /// Deliver with the subject rewritten
    RewriteSubject,
    /// Reject with a temporary error
    SoftReject,
    /// Reject the message
    Reject,
}

impl Action {
    /// Stable name used in replies and log records
    pub fn as_str(self) -> &'static str {
        match self {
            Action::NoAction => "no action",
            Action::Greylist => "greylist",
            Action::AddHeader => "add header",
            Action::RewriteSubject => "rewrite subject",
            Action::SoftReject => "soft reject",
            Action::Reject => "reject",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "no action" | "no_action" | "accept" => Ok(Action::NoAction),
            "greylist" => Ok(Action::Greylist),
            "add header" | "add_header" => Ok(Action::AddHeader),
            "rewrite subject" | "rewrite_subject" => Ok(Action::RewriteSubject),
            "soft reject" | "soft_reject" => Ok(Action::SoftReject),
            "reject" => Ok(Action::Reject),
            other => Err(TaskError::protocol(format!("Unknown action: {}", other))),
        }
    }
}

/// Verdict forced by a pre-filter.
///
/// When present on a task, the pipeline terminates without executing any
/// further stage. Absence of a pre-result means the pipeline decides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreResult {
    action: Action,
    message: Option<String>,
}

impl PreResult {
    /// Creates a forced verdict
    pub fn new(action: Action, message: Option<String>) -> Self {
        Self { action, message }
    }

    /// The forced action
    pub fn action(&self) -> Action {
        self.action
    }

    /// Optional explanation attached by the pre-filter
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
