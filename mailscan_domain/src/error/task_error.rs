// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Error System
//!
//! This module provides the error system for the per-message scanning
//! domain. It categorizes failures by the subsystem that produced them and
//! carries a human-readable message that ends up in the error reply and in
//! the task log line.
//!
//! ## Overview
//!
//! The error system is designed around a small set of stable kinds:
//!
//! - **Protocol**: Malformed input from the client side, an unreachable or
//!   invalid message source, or an invalid control-chunk length
//! - **Parse**: The message parser rejected the message body
//! - **Classify**: The statistical subsystem failed
//! - **Learn**: The learning subsystem failed
//! - **Internal**: Catch-all for unexpected conditions inside the core
//!
//! ## Propagation Policy
//!
//! Not every failure becomes a `TaskError` on the task:
//!
//! - Load failures set the task error slot and stop the task before the
//!   pipeline runs
//! - A parse failure terminates the pipeline and is returned to the caller
//! - Scripted pre/post-filter errors are logged and swallowed
//! - Classifier errors are logged and the pipeline continues
//! - Learner errors set the error slot only when learning was requested
//!   explicitly rather than by the autolearn heuristic
//!
//! ## Usage
//!
//! ```
//! use mailscan_domain::TaskError;
//!
//! let err = TaskError::protocol("Invalid length");
//! assert_eq!(err.kind(), "protocol");
//! assert_eq!(err.to_string(), "Protocol error: Invalid length");
//! ```

use thiserror::Error;

/// Domain-specific errors for the scanning task engine.
///
/// Each variant maps to one of the stable error kinds reported in error
/// replies. The wrapped string is the operator-facing message; it is
/// allocated only when an error actually occurs.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Classify error: {0}")]
    Classify(String),

    #[error("Learn error: {0}")]
    Learn(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TaskError {
    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates a new message parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates a new classifier error
    pub fn classify(msg: impl Into<String>) -> Self {
        Self::Classify(msg.into())
    }

    /// Creates a new learner error
    pub fn learn(msg: impl Into<String>) -> Self {
        Self::Learn(msg.into())
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Gets the stable error kind
    ///
    /// The kind is the string reported alongside the message in error
    /// replies and log records.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskError::Protocol(_) => "protocol",
            TaskError::Parse(_) => "parse",
            TaskError::Classify(_) => "classify",
            TaskError::Learn(_) => "learn",
            TaskError::Internal(_) => "internal",
        }
    }

    /// Gets the message without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            TaskError::Protocol(msg)
            | TaskError::Parse(msg)
            | TaskError::Classify(msg)
            | TaskError::Learn(msg)
            | TaskError::Internal(msg) => msg,
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for TaskError {
    fn from(err: std::io::Error) -> Self {
        TaskError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(TaskError::protocol("x").kind(), "protocol");
        assert_eq!(TaskError::parse("x").kind(), "parse");
        assert_eq!(TaskError::classify("x").kind(), "classify");
        assert_eq!(TaskError::learn("x").kind(), "learn");
        assert_eq!(TaskError::internal("x").kind(), "internal");
    }

    #[test]
    fn test_error_display() {
        let err = TaskError::protocol("Cannot open shm segment (scan): No such file");
        assert_eq!(
            err.to_string(),
            "Protocol error: Cannot open shm segment (scan): No such file"
        );
        assert_eq!(err.message(), "Cannot open shm segment (scan): No such file");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TaskError = io_err.into();
        assert_eq!(err.kind(), "internal");
    }
}
