// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Email Addresses
//!
//! Address value objects used by the task data model.
//!
//! Envelope addresses ([`EmailAddress`]) come from the protocol layer and
//! are shared between the task and the session by reference counting; the
//! task holds one count per address, released when it drops. Parsed-MIME
//! address lists ([`MailboxList`]) come from the message parser and are
//! owned by the task.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope address as received from the protocol layer.
///
/// Tasks hold these as `Arc<EmailAddress>`; the raw form is kept alongside
/// the normalized `addr` for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    addr: String,
    name: Option<String>,
    raw: String,
}

impl EmailAddress {
    /// Creates an address from its normalized form
    pub fn new(addr: impl Into<String>) -> Self {
        let addr = addr.into();
        let raw = format!("<{}>", addr);
        Self { addr, name: None, raw }
    }

    /// Creates an address with a display name and the raw input form
    pub fn with_parts(addr: impl Into<String>, name: Option<String>, raw: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            name,
            raw: raw.into(),
        }
    }

    /// Normalized address, `local@domain`
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Display name, when one was supplied
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Raw form as received on the wire
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

/// One mailbox of a parsed MIME address header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mailbox {
    addr: String,
    name: Option<String>,
}

impl Mailbox {
    /// Creates a mailbox
    pub fn new(addr: impl Into<String>, name: Option<String>) -> Self {
        Self { addr: addr.into(), name }
    }

    /// Mailbox address
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Display name, when present
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Ordered list of mailboxes from a single MIME header.
pub type MailboxList = Vec<Mailbox>;
