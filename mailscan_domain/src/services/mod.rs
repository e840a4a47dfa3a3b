// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Service Contracts
//!
//! Interfaces between the task core and everything around it. The core
//! does not parse message bodies, compute symbols, evaluate rules, or
//! persist learning data; it drives subsystems that do, through the traits
//! defined here, and hands scripted callbacks a narrow capability view of
//! the task.

pub mod collaborators;
pub mod task_ops;

pub use collaborators::{
    Classifier, CompositeEngine, EventSession, FilterEngine, Learner, MessageParser, ProtocolHooks,
    ScriptHost,
};
pub use task_ops::TaskOps;
