// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Engine
//!
//! Drives a scan task through the fixed stage pipeline.
//!
//! ## Overview
//!
//! The engine is a cooperative state machine. [`PipelineEngine::advance`]
//! selects the next stage from the task's completed-stage bitmap and a
//! caller-requested mask, dispatches it to the injected collaborator, and
//! then consults the event session:
//!
//! - With no pending events the stage bit is set, the per-stage checkpoint
//!   is cleared, and the engine proceeds to the next stage within the same
//!   call
//! - With pending events the engine returns without marking the stage, so
//!   the same stage is re-selected when the session calls back
//!
//! Suspension happens only between stages; a handler always runs to local
//! completion.
//!
//! ## Guards and Short-Circuits
//!
//! - A nested `advance` (a handler calling back into the engine) observes
//!   immediate success and makes no stage progress
//! - Once the task is terminal, `advance` is a no-op
//! - A pre-filter verdict set before or during processing terminates the
//!   pipeline without executing any later stage
//!
//! ## Failure Policy
//!
//! Parse and rule-engine failures terminate the task and surface as
//! errors. Scripted filter errors are logged and swallowed. Classifier
//! errors are logged without forcing termination. Learner errors always
//! log and terminate, but only reach the task error slot when learning was
//! requested explicitly rather than by autolearn.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use mailscan_domain::{
    Classifier, CompositeEngine, EventSession, FilterEngine, Learner, MessageParser, ProcessingStage,
    ProtocolHooks, ScanTask, ScriptHost, StageSet, TaskError, TaskFlags,
};

use crate::infrastructure::logging::{LogFormatter, LogSink};

/// Caller-supplied finalize callback, used instead of the protocol writer
/// when present.
pub type FinalizeCallback = Box<dyn Fn(&mut ScanTask) + Send + Sync>;

/// The collaborator set dispatched to by the stage table.
pub struct EngineServices {
    /// MIME parser for the read-message stage
    pub parser: Arc<dyn MessageParser>,
    /// Symbol and rule engine for the filters stage
    pub filters: Arc<dyn FilterEngine>,
    /// Statistical classifier for the classifier sub-stages
    pub classifier: Arc<dyn Classifier>,
    /// Composite-symbol evaluator
    pub composites: Arc<dyn CompositeEngine>,
    /// Scripted pre/post-filter and log-callback host
    pub scripts: Arc<dyn ScriptHost>,
    /// Learning subsystem for the learn sub-stages
    pub learner: Arc<dyn Learner>,
}

/// Cooperative engine driving one task at a time through the pipeline.
///
/// Shared across tasks; all per-message state lives on the task itself.
pub struct PipelineEngine {
    services: EngineServices,
    session: Arc<dyn EventSession>,
    protocol: Arc<dyn ProtocolHooks>,
    sink: Arc<dyn LogSink>,
    fin_callback: Option<FinalizeCallback>,
}

impl PipelineEngine {
    /// Creates an engine over the injected collaborators.
    pub fn new(
        services: EngineServices,
        session: Arc<dyn EventSession>,
        protocol: Arc<dyn ProtocolHooks>,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            services,
            session,
            protocol,
            sink,
            fin_callback: None,
        }
    }

    /// Replaces the protocol reply writer with a caller-supplied callback.
    pub fn with_finalize_callback(mut self, callback: FinalizeCallback) -> Self {
        self.fin_callback = Some(callback);
        self
    }

    /// Advances the task through the requested stages.
    ///
    /// Returns `Ok(true)` when the task still has work pending (the
    /// session will call back), `Ok(false)` when the task is terminal, and
    /// an error when a fatal stage failure terminated it. The error is
    /// also recorded in the task's error slot for the reply.
    pub fn advance(&self, task: &mut ScanTask, requested: StageSet) -> Result<bool, TaskError> {
        // A handler re-entering the engine sees success and no progress.
        if task.flags().contains(TaskFlags::PROCESSING) {
            return Ok(true);
        }

        loop {
            if task.is_processed() {
                return Ok(false);
            }

            if let Some(pre) = task.pre_result() {
                info!(
                    target: "mailscan",
                    "skip filters, as pre-filter returned {} action",
                    pre.action()
                );
                task.mark_processed();
                return Ok(false);
            }

            task.set_flag(TaskFlags::PROCESSING);
            let stage = task.processed_stages_mut().select_next(requested);
            let dispatched = self.dispatch(task, stage);

            if task.is_skipped() {
                task.mark_processed();
            }

            task.clear_flag(TaskFlags::PROCESSING);

            if let Err(err) = dispatched {
                task.mark_processed();
                task.set_err(err.clone());
                debug!(target: "mailscan", "task is processed");
                return Err(err);
            }

            if task.is_processed() {
                debug!(target: "mailscan", "task is processed");
                return Ok(false);
            }

            if self.session.events_pending(task) != 0 {
                // Stage stays unmarked so it is re-selected on resume.
                debug!(target: "mailscan", stage = %stage, "need more work");
                return Ok(true);
            }

            debug!(target: "mailscan", stage = %stage, "completed stage");
            task.processed_stages_mut().insert(stage);
            task.clear_checkpoint();
        }
    }

    /// Finalizer entry point called by the session.
    ///
    /// Returns `true` when the reply was written and the session should
    /// terminate the task, `false` to yield and be called again.
    pub fn fin(&self, task: &mut ScanTask) -> bool {
        if task.is_processed() {
            self.reply(task);
            return true;
        }

        if self.advance(task, StageSet::ALL).is_err() {
            self.reply(task);
            return true;
        }

        if task.is_processed() {
            self.reply(task);
            return true;
        }

        // One more iteration once pending events complete.
        false
    }

    /// Writes the task log record and the reply.
    fn reply(&self, task: &mut ScanTask) {
        LogFormatter::write_log(task, self.services.scripts.as_ref(), self.sink.as_ref());

        if let Some(callback) = &self.fin_callback {
            callback(task);
        } else {
            self.protocol.write_reply(task);
        }
    }

    /// Runs one stage handler with its failure policy.
    fn dispatch(&self, task: &mut ScanTask, stage: ProcessingStage) -> Result<(), TaskError> {
        match stage {
            ProcessingStage::ReadMessage => self.services.parser.parse(task),

            ProcessingStage::PreFilters => {
                if let Err(err) = self.services.scripts.call_pre_filters(task) {
                    warn!(target: "mailscan", "pre-filter failed: {}", err);
                }
                Ok(())
            }

            ProcessingStage::Filters => self.services.filters.process_symbols(task),

            ProcessingStage::ClassifiersPre
            | ProcessingStage::Classifiers
            | ProcessingStage::ClassifiersPost => {
                if !task.is_empty_message() {
                    if let Err(err) = self.services.classifier.classify(task, stage) {
                        error!(target: "mailscan", "classify error: {}", err);
                    }
                }
                Ok(())
            }

            ProcessingStage::Composites => {
                self.services.composites.compose(task);
                Ok(())
            }

            ProcessingStage::PostFilters => {
                if let Err(err) = self.services.scripts.call_post_filters(task) {
                    warn!(target: "mailscan", "post-filter failed: {}", err);
                }
                if task.flags().contains(TaskFlags::LEARN_AUTO) && !task.is_empty_message() {
                    self.services.classifier.check_autolearn(task);
                }
                Ok(())
            }

            ProcessingStage::LearnPre | ProcessingStage::Learn | ProcessingStage::LearnPost => {
                let wants_learning = task
                    .flags()
                    .intersects(TaskFlags::LEARN_SPAM | TaskFlags::LEARN_HAM);

                if wants_learning && task.err().is_none() {
                    let spam = task.flags().contains(TaskFlags::LEARN_SPAM);
                    let classifier = task.learn_classifier().map(str::to_string);

                    if let Err(err) = self
                        .services
                        .learner
                        .learn(task, spam, classifier.as_deref(), stage)
                    {
                        error!(target: "mailscan", "learn error: {}", err);
                        if !task.flags().contains(TaskFlags::LEARN_AUTO) {
                            task.set_err(err);
                        }
                        task.mark_processed();
                    }
                }
                Ok(())
            }

            ProcessingStage::Done => {
                task.mark_processed();
                Ok(())
            }
        }
    }
}
