// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Task Arena
//!
//! Scoped allocation region owned by exactly one scanning task and released
//! as a unit when the task ends.
//!
//! ## Overview
//!
//! The arena bundles three per-task memory concerns:
//!
//! - **Bump allocation**: Small derived allocations (lowercased copies,
//!   rendered fragments) come out of a [`bumpalo::Bump`] and are freed in
//!   bulk when the arena drops
//! - **Cleanup closures**: Heterogeneous resources (mapped regions, guards)
//!   register a destructor that runs when the arena drops
//! - **Variables**: Named, typed values cached on the task for the lifetime
//!   of the arena, such as the resolved principal recipient
//!
//! ## Drop Order
//!
//! Destructors run in LIFO order, then bulk memory is released. The reverse
//! order is part of the contract: later resources may reference earlier
//! ones. Every registered destructor runs exactly once.
//!
//! ## Threading
//!
//! The arena is not thread-shared. A task is processed on one logical
//! executor at a time, so the arena is `Send` but deliberately not `Sync`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use bumpalo::Bump;

/// Per-task allocation region with an ordered destructor list.
///
/// Owned by the task; dropped when the task is destroyed, after the reply
/// has been written. No operation on the arena is defined after drop.
pub struct Arena {
    bump: Bump,
    destructors: Vec<Box<dyn FnOnce() + Send>>,
    variables: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Arena {
    /// Creates an empty arena
    pub fn new() -> Self {
        Self {
            bump: Bump::new(),
            destructors: Vec::new(),
            variables: HashMap::new(),
        }
    }

    /// Allocates `len` zeroed bytes in the arena
    ///
    /// The returned slice lives as long as the arena borrow.
    pub fn alloc_zeroed(&self, len: usize) -> &mut [u8] {
        self.bump.alloc_slice_fill_copy(len, 0u8)
    }

    /// Copies `data` into the arena
    pub fn alloc_bytes(&self, data: &[u8]) -> &[u8] {
        self.bump.alloc_slice_copy(data)
    }

    /// Copies `s` into the arena
    pub fn alloc_str(&self, s: &str) -> &str {
        self.bump.alloc_str(s)
    }

    /// Registers a cleanup closure.
    ///
    /// Closures run in reverse registration order when the arena drops.
    pub fn register_destructor(&mut self, destructor: impl FnOnce() + Send + 'static) {
        self.destructors.push(Box::new(destructor));
    }

    /// Number of destructors currently registered
    pub fn destructor_count(&self) -> usize {
        self.destructors.len()
    }

    /// Stores a named value for the lifetime of the arena.
    ///
    /// An existing value under the same key is replaced (and its reference
    /// count released immediately, not at arena drop).
    pub fn set_variable<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: Arc<T>) {
        self.variables.insert(key.into(), value);
    }

    /// Looks up a named value, downcasting to the requested type.
    ///
    /// Returns `None` when the key is absent or holds a different type.
    pub fn get_variable<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.variables
            .get(key)
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    /// Total bytes handed out by the bump region
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        // LIFO: later registrations may reference earlier resources.
        for destructor in std::mem::take(&mut self.destructors).into_iter().rev() {
            destructor();
        }
    }
}

impl std::fmt::Debug for Arena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arena")
            .field("allocated_bytes", &self.allocated_bytes())
            .field("destructors", &self.destructors.len())
            .field("variables", &self.variables.len())
            .finish()
    }
}
