//! Test fixtures for integration tests.
//!
//! Provides:
//! - A scripted mock tool invoker that records every call
//! - An orchestrator harness wired to the mock and a progress channel
//! - Predefined task sets (diamond, chain, cycle)

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use intel_orchestrator::core::{Priority, Task, TaskContext, TaskId};
use intel_orchestrator::orchestration::invoker::{
    INSIGHT_TOOL, PROFILE_RESEARCH_TOOL, RESEARCH_TOOL,
};
use intel_orchestrator::{
    Config, Error, ExecutionHistory, Orchestrator, ProgressEvent, Result, ToolCall, ToolInvoker,
    ToolResult,
};

/// What the mock returns for one call.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// A JSON payload as the first text block.
    Json(Value),
    /// A raw text block.
    Text(String),
    /// A result flagged `is_error`.
    ErrorResult(String),
    /// An invocation error.
    Fail(String),
    /// Sleep, then answer with the default payload.
    Delay(Duration),
}

/// Scripted invoker.
///
/// Each provider has a queue of responses; once a queue is empty, calls get
/// the default payload for their tool.
#[derive(Default)]
pub struct MockInvoker {
    scripts: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    calls: Mutex<Vec<ToolCall>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for a provider.
    pub fn script(self, provider: &str, responses: Vec<MockResponse>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(provider.to_string())
            .or_default()
            .extend(responses);
        self
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn providers_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.provider).collect()
    }

    pub fn tools_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.tool_name).collect()
    }

    fn next_scripted(&self, provider: &str) -> Option<MockResponse> {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(provider)
            .and_then(VecDeque::pop_front)
    }
}

/// Default payload: research yields two prospects, synthesis echoes them.
pub fn default_payload(call: &ToolCall) -> Value {
    match call.tool_name.as_str() {
        RESEARCH_TOOL | PROFILE_RESEARCH_TOOL => json!({
            "prospects": [
                {"name": "Ada Lovelace", "source": call.provider},
                {"name": "Grace Hopper", "source": call.provider}
            ]
        }),
        INSIGHT_TOOL => json!({
            "prospects": call.arguments["prospects"],
            "insights": ["champion identified"]
        }),
        _ => json!({"success": true, "data": {}}),
    }
}

#[async_trait]
impl ToolInvoker for MockInvoker {
    async fn call_tool(&self, call: ToolCall) -> Result<ToolResult> {
        self.calls.lock().unwrap().push(call.clone());
        match self.next_scripted(&call.provider) {
            None => Ok(ToolResult::json(&default_payload(&call))),
            Some(MockResponse::Json(value)) => Ok(ToolResult::json(&value)),
            Some(MockResponse::Text(text)) => Ok(ToolResult::text(text)),
            Some(MockResponse::ErrorResult(text)) => Ok(ToolResult::error(text)),
            Some(MockResponse::Fail(message)) => Err(Error::provider(&call.provider, message)),
            Some(MockResponse::Delay(d)) => {
                tokio::time::sleep(d).await;
                Ok(ToolResult::json(&default_payload(&call)))
            }
        }
    }
}

/// Orchestrator wired to a [`MockInvoker`] and a progress channel.
pub struct OrchestratorHarness {
    pub orchestrator: Orchestrator,
    pub invoker: Arc<MockInvoker>,
    pub progress_tx: mpsc::UnboundedSender<ProgressEvent>,
    pub progress_rx: mpsc::UnboundedReceiver<ProgressEvent>,
}

impl OrchestratorHarness {
    pub fn new(invoker: MockInvoker) -> Self {
        Self::with_config(invoker, Config::default())
    }

    pub fn with_config(invoker: MockInvoker, config: Config) -> Self {
        let invoker = Arc::new(invoker);
        let orchestrator = Orchestrator::with_defaults(&config, invoker.clone())
            .expect("default policy builds");
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        Self {
            orchestrator,
            invoker,
            progress_tx,
            progress_rx,
        }
    }

    pub fn history(&self) -> &ExecutionHistory {
        self.orchestrator.history()
    }

    /// Every progress event emitted so far.
    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.progress_rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// An analysis task on the realtime provider, for graph-shape tests.
pub fn graph_task(id: &str, deps: &[&str], duration_ms: u64) -> Task {
    Task::new(
        TaskId::from(id),
        Priority::Medium,
        deps.iter().map(|d| TaskId::from(*d)).collect(),
        duration_ms,
        0,
        TaskContext::Analysis {
            agent: "websearch-intelligence".to_string(),
            query: format!("query {}", id),
            search_type: "company_intelligence".to_string(),
        },
    )
}

/// A(1000) -> {B(2000), C(500)} -> D(1000).
pub fn diamond_tasks() -> Vec<Task> {
    vec![
        graph_task("A", &[], 1000),
        graph_task("B", &["A"], 2000),
        graph_task("C", &["A"], 500),
        graph_task("D", &["B", "C"], 1000),
    ]
}

/// A -> B -> C.
pub fn chain_tasks() -> Vec<Task> {
    vec![
        graph_task("A", &[], 100),
        graph_task("B", &["A"], 100),
        graph_task("C", &["B"], 100),
    ]
}

/// A -> B -> C -> A.
pub fn cyclic_tasks() -> Vec<Task> {
    vec![
        graph_task("A", &["C"], 100),
        graph_task("B", &["A"], 100),
        graph_task("C", &["B"], 100),
    ]
}
