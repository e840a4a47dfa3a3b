// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scan Configuration
//!
//! The shared configuration handle injected into every task at
//! construction. The handle is reference-counted (`Arc<ScanConfig>`) and
//! read-only from the task side; one count is retained per task and
//! released when the task drops. This is the only process-wide state the
//! core touches, and it is always injected, never accessed through a
//! singleton.

use crate::value_objects::LogFormat;

/// Process-wide scanning configuration, shared across tasks.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Run every filter even after a verdict is reached
    pub check_all_filters: bool,
    /// Decimal places for elapsed-time log variables
    pub clock_resolution: u32,
    /// Log line layout; `None` disables the per-task log record
    pub log_format: Option<LogFormat>,
}

impl ScanConfig {
    /// Creates a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            check_all_filters: false,
            clock_resolution: 3,
            log_format: None,
        }
    }
}
