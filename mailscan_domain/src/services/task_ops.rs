// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Capability Surface
//!
//! Scripted filter callbacks receive a task handle. Rather than exposing
//! the whole entity through dynamic dispatch, callbacks get this narrow
//! capability interface; the task's internal fields stay private to the
//! core.

use crate::value_objects::{Action, Symbol};

/// Operations a scripted callback may perform on the task it was handed.
pub trait TaskOps {
    /// Looks up a request header, case-insensitively
    fn request_header(&self, name: &str) -> Option<&str>;

    /// Sets a reply header for the response
    fn set_reply_header(&mut self, name: &str, value: &str);

    /// Attaches a symbol to a metric result
    fn add_symbol(&mut self, metric: &str, symbol: Symbol);

    /// Forces a verdict, short-circuiting the remaining stages
    fn force_pre_result(&mut self, action: Action, message: Option<String>);

    /// Asks the engine to skip the rest of the pipeline
    fn skip(&mut self);
}
