// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Session Integration
//!
//! The engine does not own an event loop. It integrates with an external
//! cooperative session through two points: the pending-events query
//! consulted between stages, and the finalizer (`PipelineEngine::fin`)
//! the session invokes until it returns `true` and the reply is written.
//!
//! This module provides the trivial session used by embedders that have
//! no asynchronous work at all. Timeout handling stays with the session:
//! on expiry it marks the task terminal and invokes the finalizer, which
//! drains and replies; in-flight callbacks find the terminal flag set and
//! return without mutation.

use mailscan_domain::{EventSession, ScanTask};

/// Session with no asynchronous events.
///
/// Every stage completes in one `advance` pass, so the pipeline runs to
/// the terminal state synchronously.
#[derive(Debug, Default)]
pub struct IdleSession;

impl IdleSession {
    /// Creates the no-events session
    pub fn new() -> Self {
        Self
    }
}

impl EventSession for IdleSession {
    fn events_pending(&self, _task: &ScanTask) -> usize {
        0
    }
}
