// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Parsed Message Structure
//!
//! Containers filled by the external message parser: MIME parts, extracted
//! text parts, and the `Received` trace. The core never inspects message
//! bodies itself; it only carries what the parser produced, in parse order.

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::value_objects::HeaderMap;

/// One MIME part of the parsed message.
#[derive(Debug, Clone, Default)]
pub struct MimePart {
    content: Bytes,
    headers: HeaderMap,
    content_type: Option<String>,
}

impl MimePart {
    /// Creates a part from its decoded content
    pub fn new(content: Bytes, headers: HeaderMap, content_type: Option<String>) -> Self {
        Self {
            content,
            headers,
            content_type,
        }
    }

    /// Decoded part content
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Part headers
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Declared content type, when present
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// Text extracted from a MIME part for classification.
#[derive(Debug, Clone, Default)]
pub struct TextPart {
    content: Bytes,
    language: Option<String>,
}

impl TextPart {
    /// Creates a text part
    pub fn new(content: Bytes, language: Option<String>) -> Self {
        Self { content, language }
    }

    /// Raw text content
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Detected language, when known
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// One parsed `Received` trace header.
#[derive(Debug, Clone, Default)]
pub struct ReceivedHeader {
    from_host: Option<String>,
    by_host: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

impl ReceivedHeader {
    /// Creates a trace entry
    pub fn new(from_host: Option<String>, by_host: Option<String>, timestamp: Option<DateTime<Utc>>) -> Self {
        Self {
            from_host,
            by_host,
            timestamp,
        }
    }

    /// Relaying host, when stated
    pub fn from_host(&self) -> Option<&str> {
        self.from_host.as_deref()
    }

    /// Receiving host, when stated
    pub fn by_host(&self) -> Option<&str> {
        self.by_host.as_deref()
    }

    /// Relay timestamp, when parseable
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}
