// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Symbols and Metric Results
//!
//! This module provides the result side of the task data model.
//!
//! ## Overview
//!
//! The rules engine attaches **symbols** to a task: named tags with a
//! numeric score and optional string parameters. Symbols aggregate into
//! **metric results**, one per metric name, each carrying the summed score,
//! per-action thresholds, and the action currently implied by the score.
//! The metric named [`DEFAULT_METRIC`] drives the verdict and the log
//! record.
//!
//! Insertion order of symbols is irrelevant; renderings that need a stable
//! order sort explicitly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::value_objects::Action;

/// Name of the metric that drives the verdict
pub const DEFAULT_METRIC: &str = "default";

/// Named tag attached to a metric result by the rules engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    name: String,
    score: f64,
    options: Vec<String>,
}

impl Symbol {
    /// Creates a symbol with no options
    pub fn new(name: impl Into<String>, score: f64) -> Self {
        Self {
            name: name.into(),
            score,
            options: Vec::new(),
        }
    }

    /// Creates a symbol with options
    pub fn with_options(name: impl Into<String>, score: f64, options: Vec<String>) -> Self {
        Self {
            name: name.into(),
            score,
            options,
        }
    }

    /// Symbol name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbol score contribution
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Ordered option strings
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Appends an option string
    pub fn add_option(&mut self, option: impl Into<String>) {
        self.options.push(option.into());
    }
}

/// Aggregated score and symbols for one metric.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricResult {
    score: f64,
    action: Option<Action>,
    thresholds: BTreeMap<Action, f64>,
    symbols: HashMap<String, Symbol>,
}

impl MetricResult {
    /// Creates an empty result with no symbols and no decision
    pub fn new() -> Self {
        Self::default()
    }

    /// Current aggregated score
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Replaces the aggregated score
    pub fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    /// Action currently implied by the score, if decided
    pub fn action(&self) -> Option<Action> {
        self.action
    }

    /// Records the decided action
    pub fn set_action(&mut self, action: Action) {
        self.action = Some(action);
    }

    /// Threshold configured for an action
    pub fn threshold(&self, action: Action) -> Option<f64> {
        self.thresholds.get(&action).copied()
    }

    /// Sets the threshold for an action
    pub fn set_threshold(&mut self, action: Action, score: f64) {
        self.thresholds.insert(action, score);
    }

    /// Symbols attached to this metric, keyed by name
    pub fn symbols(&self) -> &HashMap<String, Symbol> {
        &self.symbols
    }

    /// Attaches a symbol, adding its score to the aggregate.
    ///
    /// Re-inserting an existing symbol replaces it and adjusts the
    /// aggregate by the score difference.
    pub fn insert_symbol(&mut self, symbol: Symbol) {
        if let Some(previous) = self.symbols.insert(symbol.name().to_string(), symbol.clone()) {
            self.score += symbol.score() - previous.score();
        } else {
            self.score += symbol.score();
        }
    }
}
