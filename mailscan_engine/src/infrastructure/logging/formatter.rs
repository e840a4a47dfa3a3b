// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Log Formatter
//!
//! Evaluates the configured log-format item sequence against a finalized
//! task and emits exactly one record through a [`LogSink`].
//!
//! ## Evaluation Rules
//!
//! - **Literals** are appended verbatim
//! - **Script items** invoke the registered scripted callback with the
//!   task and append its string return; callback failures are logged and
//!   the item is skipped
//! - **Variable items** optionally pass a presence condition, are resolved
//!   to a string, and are emitted either bare or through the item's `$`
//!   content template
//!
//! ## Rendering Details
//!
//! - Address lists show at most [`MAX_LOG_ELTS`] comma-separated entries
//!   and mark truncation with `...`
//! - The symbol list is ordered by absolute score descending with symbol
//!   name as the tiebreak, so the rendering is stable regardless of
//!   insertion order
//! - Elapsed-time variables use the configured clock resolution
//!
//! Emission is suppressed entirely when the task carries the no-log flag
//! or no format is configured.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::time::Duration;

use tracing::warn;

use mailscan_domain::{
    Action, EmailAddress, LogFlags, LogItemKind, LogVariable, Mailbox, MetricResult, ScanTask,
    ScriptHost, Symbol, TaskFlags, UNDEF,
};

use crate::infrastructure::logging::LogSink;

/// Upper bound on list elements rendered into one log record
pub const MAX_LOG_ELTS: usize = 7;

/// Evaluator for the configured log format.
pub struct LogFormatter;

impl LogFormatter {
    /// Renders and emits the log record for a finalized task.
    ///
    /// No record is emitted when the no-log flag is set or the
    /// configuration carries no log format.
    pub fn write_log(task: &ScanTask, scripts: &dyn ScriptHost, sink: &dyn LogSink) {
        if task.flags().contains(TaskFlags::NO_LOG) {
            return;
        }

        let Some(format) = task.config().log_format.as_ref() else {
            return;
        };

        let mut buf = String::with_capacity(256);

        for item in format.items() {
            match item.kind() {
                LogItemKind::Literal(text) => buf.push_str(text),

                LogItemKind::Script(id) => match scripts.call_log_callback(*id, task) {
                    Ok(fragment) => buf.push_str(&fragment),
                    Err(err) => {
                        warn!(target: "mailscan", "call to log function failed: {}", err);
                    }
                },

                LogItemKind::Var(variable) => {
                    if item.flags().contains(LogFlags::CONDITION) && !check_condition(task, *variable) {
                        continue;
                    }

                    if let Some(value) = resolve_variable(task, *variable, item.flags()) {
                        if !value.is_empty() {
                            append_templated(&mut buf, &value, item.template());
                        }
                    }
                }
            }
        }

        sink.log(&buf);
    }
}

/// Presence predicate gating condition-flagged items.
fn check_condition(task: &ScanTask, variable: LogVariable) -> bool {
    match variable {
        LogVariable::MessageId => task.message_id() != UNDEF,
        LogVariable::QueueId => task.queue_id() != UNDEF,
        LogVariable::User => task.user().is_some(),
        LogVariable::Ip => task.from_addr().is_some_and(|addr| !addr.is_unspecified()),
        LogVariable::SmtpFrom => task.sender().is_some(),
        LogVariable::MimeFrom => task.from_mime().is_some_and(|list| !list.is_empty()),
        LogVariable::SmtpRcpt | LogVariable::SmtpRcpts => !task.rcpt_envelope().is_empty(),
        LogVariable::MimeRcpt | LogVariable::MimeRcpts => {
            task.rcpt_mime().is_some_and(|list| !list.is_empty())
        }
        _ => true,
    }
}

/// Resolves a variable to its rendered value.
///
/// `None` means the source is absent and the item emits nothing.
fn resolve_variable(task: &ScanTask, variable: LogVariable, flags: LogFlags) -> Option<String> {
    let resolution = task.config().clock_resolution;

    match variable {
        LogVariable::MessageId => Some(task.message_id().to_string()),
        LogVariable::QueueId => Some(task.queue_id().to_string()),
        LogVariable::User => Some(task.user().unwrap_or(UNDEF).to_string()),
        LogVariable::Ip => Some(match task.from_addr() {
            Some(addr) if !addr.is_unspecified() => addr.to_string(),
            _ => UNDEF.to_string(),
        }),
        LogVariable::Len => Some(task.msg().len().to_string()),
        LogVariable::DnsReq => Some(task.dns_requests().to_string()),
        LogVariable::TimeReal => Some(format_elapsed(task.elapsed_real(), resolution)),
        LogVariable::TimeVirtual => Some(format_elapsed(task.elapsed_virtual(), resolution)),
        LogVariable::SmtpFrom => task.sender().map(|addr| addr.addr().to_string()),
        LogVariable::MimeFrom => task.from_mime().map(|list| render_mailboxes(list, Some(1))),
        LogVariable::SmtpRcpt => non_empty(render_addresses(task.rcpt_envelope(), Some(1))),
        LogVariable::SmtpRcpts => non_empty(render_addresses(task.rcpt_envelope(), None)),
        LogVariable::MimeRcpt => task.rcpt_mime().map(|list| render_mailboxes(list, Some(1))),
        LogVariable::MimeRcpts => task.rcpt_mime().map(|list| render_mailboxes(list, None)),
        LogVariable::IsSpam => task.default_result().map(|result| {
            if task.is_skipped() {
                "S".to_string()
            } else if result.action() == Some(Action::Reject) {
                "T".to_string()
            } else {
                "F".to_string()
            }
        }),
        LogVariable::Action => task
            .default_result()
            .and_then(MetricResult::action)
            .map(|action| action.as_str().to_string()),
        LogVariable::Scores => task.default_result().map(|result| {
            format!(
                "{:.2}/{:.2}",
                result.score(),
                result.threshold(Action::Reject).unwrap_or(0.0)
            )
        }),
        LogVariable::Symbols => task.default_result().map(|result| render_symbols(result, flags)),
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Renders the symbol list of a metric result.
///
/// Symbols are ordered by absolute score descending, ties broken by name
/// ascending. Flag bits add the `(score)` and `{option;…}` blocks.
fn render_symbols(result: &MetricResult, flags: LogFlags) -> String {
    let mut symbols: Vec<&Symbol> = result.symbols().values().collect();
    symbols.sort_by(|a, b| {
        b.score()
            .abs()
            .partial_cmp(&a.score().abs())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name().cmp(b.name()))
    });

    let mut out = String::new();

    for (index, symbol) in symbols.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(symbol.name());

        if flags.contains(LogFlags::SYMBOLS_SCORES) {
            let _ = write!(out, "({:.2})", symbol.score());
        }

        if flags.contains(LogFlags::SYMBOLS_PARAMS) {
            out.push('{');
            for (opt_index, option) in symbol.options().iter().enumerate() {
                if opt_index >= MAX_LOG_ELTS {
                    out.push_str("...;");
                    break;
                }
                out.push_str(option);
                out.push(';');
            }
            out.push('}');
        }
    }

    out
}

/// Renders an envelope address list with an optional element limit.
fn render_addresses(addrs: &[std::sync::Arc<EmailAddress>], limit: Option<usize>) -> String {
    render_list(addrs.iter().map(|addr| addr.addr()), limit)
}

/// Renders a MIME mailbox list with an optional element limit.
fn render_mailboxes(mailboxes: &[Mailbox], limit: Option<usize>) -> String {
    render_list(mailboxes.iter().map(Mailbox::addr), limit)
}

fn render_list<'a>(items: impl ExactSizeIterator<Item = &'a str>, limit: Option<usize>) -> String {
    let total = items.len();
    let wanted = limit.unwrap_or(total).min(total);
    let shown = wanted.min(MAX_LOG_ELTS);

    let mut out = String::new();
    for (index, item) in items.take(shown).enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push_str(item);
    }

    if wanted > shown {
        out.push_str(",...");
    }

    out
}

/// Replaces every `$` of the template with the value; without a template
/// the value is emitted bare.
fn append_templated(buf: &mut String, value: &str, template: Option<&str>) {
    match template {
        None => buf.push_str(value),
        Some(template) => {
            for ch in template.chars() {
                if ch == '$' {
                    buf.push_str(value);
                } else {
                    buf.push(ch);
                }
            }
        }
    }
}

/// Formats elapsed time in seconds at the configured resolution.
fn format_elapsed(elapsed: Duration, resolution: u32) -> String {
    format!("{:.*}", resolution as usize, elapsed.as_secs_f64())
}
