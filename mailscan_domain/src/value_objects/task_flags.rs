// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Flags Value Object
//!
//! Bitset of boolean task properties, kept as a single word so snapshots
//! are cheap and flag combinations can be tested in one operation.
//!
//! ## Flags
//!
//! - `PROCESSING` - an `advance` call is on the stack (nested-call guard)
//! - `PROCESSED` - the task reached the terminal state
//! - `SKIP` - a filter asked to skip the rest of the pipeline
//! - `EMPTY` - the message body has zero length
//! - `HAS_CONTROL` - a control chunk precedes the message bytes
//! - `FILE` - the message is backed by a mapped file or shm segment
//! - `MIME` - the input is a MIME message
//! - `JSON` - the reply should be JSON
//! - `NO_LOG` - suppress the per-task log record
//! - `PASS_ALL` - run every filter even after a verdict is reached
//! - `LEARN_SPAM` / `LEARN_HAM` - learning was requested for this task
//! - `LEARN_AUTO` - learning was triggered by the autolearn heuristic

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitset of task state flags.
///
/// Value object: two flag sets with the same bits are equal. Individual
/// flags are associated constants combined with `|`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskFlags(u32);

impl TaskFlags {
    /// Processing is in progress on the current call stack
    pub const PROCESSING: TaskFlags = TaskFlags(1 << 0);
    /// The task reached its terminal state
    pub const PROCESSED: TaskFlags = TaskFlags(1 << 1);
    /// Remaining pipeline stages should be skipped
    pub const SKIP: TaskFlags = TaskFlags(1 << 2);
    /// The message body is empty
    pub const EMPTY: TaskFlags = TaskFlags(1 << 3);
    /// A control chunk precedes the message bytes
    pub const HAS_CONTROL: TaskFlags = TaskFlags(1 << 4);
    /// The message is backed by a mapped file or shm segment
    pub const FILE: TaskFlags = TaskFlags(1 << 5);
    /// The input is a MIME message
    pub const MIME: TaskFlags = TaskFlags(1 << 6);
    /// The reply should be JSON
    pub const JSON: TaskFlags = TaskFlags(1 << 7);
    /// Suppress the per-task log record
    pub const NO_LOG: TaskFlags = TaskFlags(1 << 8);
    /// Run every filter even after a verdict is reached
    pub const PASS_ALL: TaskFlags = TaskFlags(1 << 9);
    /// Learn this message as spam
    pub const LEARN_SPAM: TaskFlags = TaskFlags(1 << 10);
    /// Learn this message as ham
    pub const LEARN_HAM: TaskFlags = TaskFlags(1 << 11);
    /// Learning was triggered by the autolearn heuristic
    pub const LEARN_AUTO: TaskFlags = TaskFlags(1 << 12);

    /// Creates an empty flag set
    pub const fn empty() -> Self {
        TaskFlags(0)
    }

    /// Checks whether every flag in `other` is set
    pub const fn contains(self, other: TaskFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Checks whether any flag in `other` is set
    pub const fn intersects(self, other: TaskFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// Sets every flag in `other`
    pub fn insert(&mut self, other: TaskFlags) {
        self.0 |= other.0;
    }

    /// Clears every flag in `other`
    pub fn remove(&mut self, other: TaskFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for TaskFlags {
    type Output = TaskFlags;

    fn bitor(self, rhs: TaskFlags) -> TaskFlags {
        TaskFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for TaskFlags {
    fn bitor_assign(&mut self, rhs: TaskFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for TaskFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}
