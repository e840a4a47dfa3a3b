// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Mailscan Engine
//!
//! The per-message scanning task engine: a cooperative, partially
//! re-entrant stage pipeline over the task model of `mailscan-domain`.
//!
//! ## Overview
//!
//! For each inbound message the external listener constructs a task, hands
//! the raw bytes (or a source-selecting header set) to the
//! [`MessageLoader`], and then drives [`PipelineEngine::fin`] from the
//! session finalizer until it reports termination, at which point the
//! reply has been written and the task can be dropped.
//!
//! The engine suspends between stages whenever the session reports
//! outstanding asynchronous events and resumes the same stage on the next
//! call, so completed stages execute at most once. Near termination the
//! log formatter renders one audit record from the configured log format.
//!
//! ## Layers
//!
//! - **`engine`**: The pipeline state machine and session glue
//! - **`infrastructure`**: Message loading (inline, mapped file, POSIX
//!   shared memory) and audit logging
//!
//! [`PipelineEngine::fin`]: engine::PipelineEngine::fin

pub mod engine;
pub mod infrastructure;

pub use engine::{EngineServices, FinalizeCallback, IdleSession, PipelineEngine};
pub use infrastructure::loader::MessageLoader;
pub use infrastructure::logging::{CapturingLogSink, LogFormatter, LogSink, TracingLogSink, MAX_LOG_ELTS};
