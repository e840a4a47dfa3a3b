// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Stages - Stage Ordering and Selection
//!
//! This module provides the ordered stage set of the scanning pipeline and
//! the selection rule that drives it.
//!
//! ## Overview
//!
//! The pipeline is a fixed, totally ordered sequence of stages, each
//! identified by a distinct bit:
//!
//! `ReadMessage < PreFilters < Filters < ClassifiersPre < Classifiers <
//! ClassifiersPost < Composites < PostFilters < LearnPre < Learn <
//! LearnPost < Done`
//!
//! A task records completed stages in a [`StageSet`] bitmap. Keeping the
//! state as a bitmap makes two properties trivial to express:
//!
//! - **Monotonicity**: Completed-stage bits only turn on
//! - **Vacuous completion**: Stages the caller did not request are marked
//!   done without executing
//!
//! ## Stage Selection
//!
//! [`StageSet::select_next`] picks the next stage to execute given the
//! completed bitmap and a caller-requested mask:
//!
//! 1. Find the lowest stage strictly above the highest completed stage
//!    (or the first stage when nothing is completed)
//! 2. If that stage is requested, return it
//! 3. Otherwise mark it vacuously completed and repeat
//! 4. Past the last real stage, return `Done`
//!
//! Selection never revisits a completed stage, so a stage executes at most
//! once per task.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step of the scanning pipeline.
///
/// Stages form a total order; the discriminant is the stage's bit index in
/// the [`StageSet`] bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ProcessingStage {
    /// Parse the raw message bytes
    ReadMessage = 0,
    /// Scripted pre-filters, may force a verdict
    PreFilters = 1,
    /// Symbol and rule engine
    Filters = 2,
    /// Statistical classification, early sub-stage
    ClassifiersPre = 3,
    /// Statistical classification, main sub-stage
    Classifiers = 4,
    /// Statistical classification, late sub-stage
    ClassifiersPost = 5,
    /// Composite symbol evaluation
    Composites = 6,
    /// Scripted post-filters and autolearn check
    PostFilters = 7,
    /// Learning, early sub-stage
    LearnPre = 8,
    /// Learning, main sub-stage
    Learn = 9,
    /// Learning, late sub-stage
    LearnPost = 10,
    /// Terminal marker
    Done = 11,
}

impl ProcessingStage {
    /// All stages in execution order
    pub const ORDERED: [ProcessingStage; 12] = [
        ProcessingStage::ReadMessage,
        ProcessingStage::PreFilters,
        ProcessingStage::Filters,
        ProcessingStage::ClassifiersPre,
        ProcessingStage::Classifiers,
        ProcessingStage::ClassifiersPost,
        ProcessingStage::Composites,
        ProcessingStage::PostFilters,
        ProcessingStage::LearnPre,
        ProcessingStage::Learn,
        ProcessingStage::LearnPost,
        ProcessingStage::Done,
    ];

    /// Bit index of this stage
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Bit value of this stage
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Stage for a bit index, if it names one
    pub fn from_index(index: u32) -> Option<ProcessingStage> {
        ProcessingStage::ORDERED.get(index as usize).copied()
    }

    /// Whether this is one of the classifier sub-stages
    pub fn is_classify(self) -> bool {
        matches!(
            self,
            ProcessingStage::ClassifiersPre | ProcessingStage::Classifiers | ProcessingStage::ClassifiersPost
        )
    }

    /// Whether this is one of the learning sub-stages
    pub fn is_learn(self) -> bool {
        matches!(
            self,
            ProcessingStage::LearnPre | ProcessingStage::Learn | ProcessingStage::LearnPost
        )
    }

    /// Stable lowercase name used in log records
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStage::ReadMessage => "read_message",
            ProcessingStage::PreFilters => "pre_filters",
            ProcessingStage::Filters => "filters",
            ProcessingStage::ClassifiersPre => "classifiers_pre",
            ProcessingStage::Classifiers => "classifiers",
            ProcessingStage::ClassifiersPost => "classifiers_post",
            ProcessingStage::Composites => "composites",
            ProcessingStage::PostFilters => "post_filters",
            ProcessingStage::LearnPre => "learn_pre",
            ProcessingStage::Learn => "learn",
            ProcessingStage::LearnPost => "learn_post",
            ProcessingStage::Done => "done",
        }
    }
}

impl fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmap over the pipeline stages.
///
/// Used both for the completed-stage state of a task and for the
/// caller-requested mask handed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageSet(u32);

impl StageSet {
    /// Every stage, including `Done`
    pub const ALL: StageSet = StageSet((1 << 12) - 1);

    /// Creates an empty set
    pub const fn empty() -> Self {
        StageSet(0)
    }

    /// Creates a set holding one stage
    pub const fn only(stage: ProcessingStage) -> Self {
        StageSet(stage.bit())
    }

    /// Checks for a stage
    pub const fn contains(self, stage: ProcessingStage) -> bool {
        self.0 & stage.bit() != 0
    }

    /// Adds a stage
    pub fn insert(&mut self, stage: ProcessingStage) {
        self.0 |= stage.bit();
    }

    /// Adds every stage of `other`
    pub fn union_with(&mut self, other: StageSet) {
        self.0 |= other.0;
    }

    /// Builds a set from stages
    pub fn from_stages(stages: &[ProcessingStage]) -> Self {
        let mut set = StageSet::empty();
        for stage in stages {
            set.insert(*stage);
        }
        set
    }

    /// Whether no stage is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether `other` only adds bits to `self`
    pub const fn is_superset_of(self, other: StageSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Selects the next stage to execute.
    ///
    /// Starting from the lowest stage strictly above the highest completed
    /// one, returns the first stage present in `requested`. Stages below
    /// `Done` that are not requested are treated as vacuously completed and
    /// their bits are set in `self`. When nothing below `Done` remains,
    /// returns [`ProcessingStage::Done`].
    pub fn select_next(&mut self, requested: StageSet) -> ProcessingStage {
        let mut index = if self.0 == 0 { 0 } else { 32 - self.0.leading_zeros() };

        loop {
            let stage = match ProcessingStage::from_index(index) {
                Some(stage) => stage,
                None => return ProcessingStage::Done,
            };

            if requested.contains(stage) {
                return stage;
            }

            if stage == ProcessingStage::Done {
                return ProcessingStage::Done;
            }

            // Not requested: assume the stage is done and move on.
            self.insert(stage);
            index += 1;
        }
    }
}

impl fmt::Display for StageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_selection_is_read_message() {
        let mut done = StageSet::empty();
        assert_eq!(done.select_next(StageSet::ALL), ProcessingStage::ReadMessage);
        // Selection alone does not complete the stage
        assert!(done.is_empty());
    }

    #[test]
    fn test_selection_skips_unrequested_stages() {
        let mut done = StageSet::from_stages(&[ProcessingStage::ReadMessage, ProcessingStage::Filters]);
        let requested = StageSet::from_stages(&[ProcessingStage::Composites, ProcessingStage::Done]);

        assert_eq!(done.select_next(requested), ProcessingStage::Composites);

        // The classifier sub-stages in between were vacuously completed
        assert!(done.contains(ProcessingStage::ClassifiersPre));
        assert!(done.contains(ProcessingStage::Classifiers));
        assert!(done.contains(ProcessingStage::ClassifiersPost));
        assert!(!done.contains(ProcessingStage::Composites));

        done.insert(ProcessingStage::Composites);
        assert_eq!(done.select_next(requested), ProcessingStage::Done);
    }

    #[test]
    fn test_selection_past_last_stage_is_done() {
        let mut done = StageSet::empty();
        done.insert(ProcessingStage::Done);
        assert_eq!(done.select_next(StageSet::ALL), ProcessingStage::Done);
    }

    #[test]
    fn test_selection_with_nothing_requested() {
        let mut done = StageSet::empty();
        assert_eq!(done.select_next(StageSet::empty()), ProcessingStage::Done);
        // Everything below Done became vacuously complete
        for stage in &ProcessingStage::ORDERED[..11] {
            assert!(done.contains(*stage));
        }
    }

    proptest! {
        /// The returned stage is either a requested stage above every
        /// completed one, or `Done`; skipped stages in between are marked
        /// done; already-set bits never clear.
        #[test]
        fn prop_selection_contract(done_bits in 0u32..(1 << 12), req_bits in 0u32..(1 << 12)) {
            let before = StageSet(done_bits);
            let requested = StageSet(req_bits);
            let mut after = before;
            let selected = after.select_next(requested);

            prop_assert!(after.is_superset_of(before));
            prop_assert!(selected == ProcessingStage::Done || !before.contains(selected));

            if selected != ProcessingStage::Done {
                prop_assert!(requested.contains(selected));
                prop_assert!(!after.contains(selected));
            }

            // Every stage between the first candidate and the selection that
            // was not requested is now marked done.
            let first = if done_bits == 0 { 0 } else { 32 - done_bits.leading_zeros() };
            for index in first..selected.index() {
                if let Some(stage) = ProcessingStage::from_index(index) {
                    prop_assert!(after.contains(stage));
                }
            }
        }
    }
}
