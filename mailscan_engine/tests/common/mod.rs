// /////////////////////////////////////////////////////////////////////////////
// Mailscan RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Recording mock collaborators shared by the integration tests.

// Each test binary uses its own slice of this module.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use mailscan_domain::{
    Classifier, CompositeEngine, EventSession, FilterEngine, Learner, MessageParser, ProcessingStage,
    ProtocolHooks, ScanConfig, ScanTask, ScriptCallbackId, ScriptHost, Symbol, TaskError, TaskOps,
    DEFAULT_METRIC,
};

use mailscan_engine::{CapturingLogSink, EngineServices, PipelineEngine};

/// Ordered record of every stage-handler invocation.
#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Session whose pending-event count is driven by the test.
#[derive(Default)]
pub struct MockSession {
    pending: Mutex<usize>,
}

impl MockSession {
    pub fn set_pending(&self, pending: usize) {
        *self.pending.lock().unwrap() = pending;
    }
}

impl EventSession for MockSession {
    fn events_pending(&self, _task: &ScanTask) -> usize {
        *self.pending.lock().unwrap()
    }
}

pub struct MockParser {
    pub recorder: Arc<Recorder>,
    pub fail: bool,
}

impl MessageParser for MockParser {
    fn parse(&self, task: &mut ScanTask) -> Result<(), TaskError> {
        self.recorder.record("parse");
        if self.fail {
            return Err(TaskError::parse("broken message"));
        }
        task.set_message_id("test@localhost");
        Ok(())
    }
}

/// Filter engine that attaches the configured symbols and can ask the
/// session for one asynchronous round trip before completing.
pub struct MockFilters {
    pub recorder: Arc<Recorder>,
    pub session: Arc<MockSession>,
    pub suspend_once: bool,
    pub symbols: Vec<Symbol>,
}

impl FilterEngine for MockFilters {
    fn process_symbols(&self, task: &mut ScanTask) -> Result<(), TaskError> {
        self.recorder.record("filters");

        if self.suspend_once && task.checkpoint().is_none() {
            // First entry: park an event with the session and leave a
            // checkpoint so the re-entry resumes instead of restarting.
            task.set_checkpoint(Box::new(()));
            self.session.set_pending(1);
            return Ok(());
        }

        let result = task.result_mut(DEFAULT_METRIC);
        for symbol in &self.symbols {
            result.insert_symbol(symbol.clone());
        }
        Ok(())
    }
}

pub struct MockClassifier {
    pub recorder: Arc<Recorder>,
}

impl Classifier for MockClassifier {
    fn classify(&self, _task: &mut ScanTask, stage: ProcessingStage) -> Result<(), TaskError> {
        self.recorder.record(format!("classify:{}", stage));
        Ok(())
    }

    fn check_autolearn(&self, _task: &mut ScanTask) {
        self.recorder.record("autolearn");
    }
}

pub struct MockComposites {
    pub recorder: Arc<Recorder>,
}

impl CompositeEngine for MockComposites {
    fn compose(&self, _task: &mut ScanTask) {
        self.recorder.record("composites");
    }
}

pub struct MockScripts {
    pub recorder: Arc<Recorder>,
}

impl ScriptHost for MockScripts {
    fn call_pre_filters(&self, _task: &mut dyn TaskOps) -> Result<(), TaskError> {
        self.recorder.record("pre_filters");
        Ok(())
    }

    fn call_post_filters(&self, _task: &mut dyn TaskOps) -> Result<(), TaskError> {
        self.recorder.record("post_filters");
        Ok(())
    }

    fn call_log_callback(&self, _id: ScriptCallbackId, _task: &ScanTask) -> Result<String, TaskError> {
        Ok(String::new())
    }
}

pub struct MockLearner {
    pub recorder: Arc<Recorder>,
    pub fail: bool,
}

impl Learner for MockLearner {
    fn learn(
        &self,
        _task: &mut ScanTask,
        spam: bool,
        _classifier: Option<&str>,
        stage: ProcessingStage,
    ) -> Result<(), TaskError> {
        self.recorder.record(format!("learn:{}:{}", stage, spam));
        if self.fail {
            return Err(TaskError::learn("backend unavailable"));
        }
        Ok(())
    }
}

/// Protocol layer recording replies and merging control documents into
/// the task settings.
#[derive(Default)]
pub struct MockProtocol {
    pub replies: Mutex<Vec<Option<String>>>,
    pub controls: Mutex<Vec<serde_json::Value>>,
}

impl ProtocolHooks for MockProtocol {
    fn handle_control(&self, task: &mut ScanTask, control: &serde_json::Value) -> Result<(), TaskError> {
        self.controls.lock().unwrap().push(control.clone());
        task.set_settings(control.clone());
        Ok(())
    }

    fn write_reply(&self, task: &mut ScanTask) {
        self.replies
            .lock()
            .unwrap()
            .push(task.err().map(|err| err.to_string()));
    }
}

/// One fully wired engine plus handles onto every mock.
pub struct Harness {
    pub engine: PipelineEngine,
    pub recorder: Arc<Recorder>,
    pub session: Arc<MockSession>,
    pub protocol: Arc<MockProtocol>,
    pub sink: Arc<CapturingLogSink>,
}

/// Behavior switches for [`harness`].
#[derive(Default)]
pub struct HarnessOptions {
    pub parser_fails: bool,
    pub learner_fails: bool,
    pub filters_suspend_once: bool,
    pub filter_symbols: Vec<Symbol>,
}

pub fn harness(options: HarnessOptions) -> Harness {
    let recorder = Arc::new(Recorder::default());
    let session = Arc::new(MockSession::default());
    let protocol = Arc::new(MockProtocol::default());
    let sink = Arc::new(CapturingLogSink::new());

    let services = EngineServices {
        parser: Arc::new(MockParser {
            recorder: Arc::clone(&recorder),
            fail: options.parser_fails,
        }),
        filters: Arc::new(MockFilters {
            recorder: Arc::clone(&recorder),
            session: Arc::clone(&session),
            suspend_once: options.filters_suspend_once,
            symbols: options.filter_symbols,
        }),
        classifier: Arc::new(MockClassifier {
            recorder: Arc::clone(&recorder),
        }),
        composites: Arc::new(MockComposites {
            recorder: Arc::clone(&recorder),
        }),
        scripts: Arc::new(MockScripts {
            recorder: Arc::clone(&recorder),
        }),
        learner: Arc::new(MockLearner {
            recorder: Arc::clone(&recorder),
            fail: options.learner_fails,
        }),
    };

    let engine = PipelineEngine::new(
        services,
        Arc::clone(&session) as Arc<dyn EventSession>,
        Arc::clone(&protocol) as Arc<dyn ProtocolHooks>,
        Arc::clone(&sink) as Arc<dyn mailscan_engine::LogSink>,
    );

    Harness {
        engine,
        recorder,
        session,
        protocol,
        sink,
    }
}

pub fn new_task() -> ScanTask {
    ScanTask::new(Arc::new(ScanConfig::default()))
}

pub fn new_task_with_config(config: ScanConfig) -> ScanTask {
    ScanTask::new(Arc::new(config))
}
