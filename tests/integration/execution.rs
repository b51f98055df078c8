//! Execution integration tests.
//!
//! These tests run full plans against the mock invoker and check dispatch
//! order, prospect propagation, progress events and cancellation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use intel_orchestrator::core::{OrchestrationPlan, TaskKind, TaskStatus};
use intel_orchestrator::orchestration::PlanExecutor;
use intel_orchestrator::{
    CapabilityRegistry, Config, Error, ExecutionHistory, ExecutorConfig, IntelligenceRequest,
    ProgressEvent, TaskId,
};

use crate::fixtures::{diamond_tasks, MockInvoker, MockResponse, OrchestratorHarness};

/// Test: End-to-end run
/// Given a plain search request
/// When the plan executes against healthy providers
/// Then every task succeeds and the synthesis output becomes the summary
#[tokio::test]
async fn test_full_run_produces_summary() {
    let mut harness = OrchestratorHarness::new(MockInvoker::new());
    let request = IntelligenceRequest::search(json!({"title": "CFO"})).with_max_results(5);
    let mut plan = harness.orchestrator.plan_execution(&request).unwrap();

    let outcome = harness
        .orchestrator
        .execute(&mut plan, Some(&harness.progress_tx))
        .await
        .unwrap();

    assert_eq!(outcome.plan_id, plan.id);
    assert!(!outcome.cancelled);
    assert_eq!(outcome.results.len(), 3);
    assert!(plan.tasks.iter().all(|t| t.status == TaskStatus::Succeeded));

    let summary = outcome.intelligence.expect("synthesis output parses");
    assert_eq!(summary.prospects().len(), 2);
    assert_eq!(summary.insights().len(), 1);

    assert_eq!(
        harness.invoker.tools_called(),
        vec![
            "research_linkedin_prospect",
            "company_intelligence_search",
            "generate_strategic_insights"
        ]
    );
    let research_call = &harness.invoker.calls()[0];
    assert_eq!(research_call.arguments["maxResults"], 5);
    assert_eq!(research_call.arguments["searchCriteria"]["title"], "CFO");

    let events = harness.drain_events();
    let started = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Started { .. }))
        .count();
    let completed = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Completed { .. }))
        .count();
    assert_eq!(started, 3);
    assert_eq!(completed, 3);
}

#[tokio::test]
async fn test_synthesis_receives_research_prospects() {
    let invoker = MockInvoker::new().script(
        "apify-extractor",
        vec![MockResponse::Json(json!({
            "success": true,
            "data": {"prospects": [{"name": "A"}, {"name": "B"}, {"name": "C"}]}
        }))],
    );
    let harness = OrchestratorHarness::new(invoker);
    let mut plan = harness
        .orchestrator
        .plan_execution(&IntelligenceRequest::search(json!({})))
        .unwrap();

    harness.orchestrator.execute(&mut plan, None).await.unwrap();

    let synthesis_call = harness
        .invoker
        .calls()
        .into_iter()
        .find(|c| c.tool_name == "generate_strategic_insights")
        .unwrap();
    assert_eq!(synthesis_call.arguments["methodology"], "meddic");
    assert_eq!(synthesis_call.arguments["prospects"].as_array().unwrap().len(), 3);
    assert_eq!(
        plan.task_of_kind(TaskKind::Synthesis)
            .unwrap()
            .context
            .prospects()
            .len(),
        3
    );
}

/// Test: Malformed provider output is tolerated
/// Given research returns {"foo":"bar"}
/// When the plan executes
/// Then synthesis runs with zero prospects and the run still succeeds
#[tokio::test]
async fn test_parse_tolerance() {
    let invoker = MockInvoker::new().script(
        "apify-extractor",
        vec![MockResponse::Json(json!({"foo": "bar"}))],
    );
    let harness = OrchestratorHarness::new(invoker);
    let outcome = harness
        .orchestrator
        .run(&IntelligenceRequest::search(json!({})))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 3);
    let summary = outcome.intelligence.unwrap();
    assert!(summary.prospects().is_empty());
}

#[tokio::test]
async fn test_unparsable_synthesis_yields_no_summary() {
    let invoker = MockInvoker::new().script(
        "bright-data-researcher",
        vec![MockResponse::Text("Insights: call them on Tuesday".to_string())],
    );
    let harness = OrchestratorHarness::new(invoker);
    let outcome = harness
        .orchestrator
        .run(&IntelligenceRequest::search(json!({})))
        .await
        .unwrap();

    assert!(outcome.intelligence.is_none());
    assert_eq!(outcome.metrics.success_rate, 1.0);
}

#[tokio::test]
async fn test_validation_uses_local_stub_by_default() {
    let harness = OrchestratorHarness::new(MockInvoker::new());
    let request = IntelligenceRequest::search(json!({})).with_context("GDPR-regulated accounts");
    let outcome = harness.orchestrator.run(&request).await.unwrap();

    assert_eq!(outcome.results.len(), 4);
    let validation = outcome
        .results
        .iter()
        .find(|(id, _)| id.as_str().starts_with("validation"))
        .map(|(_, r)| r)
        .unwrap();
    assert!(validation.first_text().unwrap().contains("APPROVED"));
    assert!(!harness
        .invoker
        .providers_called()
        .contains(&"constitutional-validator".to_string()));
}

#[tokio::test]
async fn test_cancellation_before_dispatch() {
    let token = CancellationToken::new();
    let mut harness = OrchestratorHarness::new(MockInvoker::new());
    harness.orchestrator = harness.orchestrator.clone().with_cancellation(token.clone());

    token.cancel();
    let outcome = harness
        .orchestrator
        .run(&IntelligenceRequest::search(json!({})))
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert!(outcome.results.is_empty());
    assert!(outcome.records.is_empty());
    assert!(harness.invoker.calls().is_empty());
}

/// Test: Parallel group dispatch
/// Given three independent roots feeding one join task
/// When parallel dispatch is on
/// Then the roots all finish before the join starts
#[tokio::test]
async fn test_parallel_roots_finish_before_dependents() {
    let mut tasks = diamond_tasks();
    // Turn the diamond into three roots plus a join.
    tasks[1].dependencies.clear();
    tasks[2].dependencies.clear();
    tasks[3].dependencies.push(TaskId::from("A"));
    let registry = Arc::new(CapabilityRegistry::builtin());
    let mut plan = OrchestrationPlan::assemble(tasks, &registry, BTreeMap::new()).unwrap();
    assert_eq!(plan.parallel_groups.len(), 1);
    assert_eq!(plan.parallel_groups[0].len(), 3);

    let invoker = Arc::new(MockInvoker::new().script(
        "websearch-intelligence",
        vec![MockResponse::Delay(std::time::Duration::from_millis(20))],
    ));
    let executor = PlanExecutor::new(
        invoker.clone(),
        registry,
        ExecutionHistory::new(),
        ExecutorConfig {
            parallel_dispatch: true,
            ..ExecutorConfig::default()
        },
    );
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let outcome = executor.execute(&mut plan, Some(&tx)).await.unwrap();
    assert_eq!(outcome.results.len(), 4);

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let join_started = events
        .iter()
        .position(|e| matches!(e, ProgressEvent::Started { task_id, .. } if task_id.as_str() == "D"))
        .unwrap();
    let roots_completed = events[..join_started]
        .iter()
        .filter(|e| matches!(e, ProgressEvent::Completed { .. }))
        .count();
    assert_eq!(roots_completed, 3);
}

#[tokio::test]
async fn test_sequential_dispatch_is_default() {
    let config = Config::default();
    assert!(!config.executor.parallel_dispatch);

    let harness = OrchestratorHarness::with_config(MockInvoker::new(), config);
    let mut plan = harness
        .orchestrator
        .plan_execution(&IntelligenceRequest::search(json!({})))
        .unwrap();
    let order: Vec<String> = plan
        .execution_order
        .iter()
        .map(|id| id.to_string())
        .collect();

    let outcome = harness.orchestrator.execute(&mut plan, None).await.unwrap();
    let recorded: Vec<String> = outcome
        .records
        .iter()
        .map(|r| r.task_id.to_string())
        .collect();
    assert_eq!(recorded, order);
}

fn planning_message(err: Error) -> String {
    match err {
        Error::Planning(message) => message,
        other => panic!("expected planning error, got {}", other),
    }
}

/// Test: Execution order is checked up front
/// Given a plan whose synthesis task was moved ahead of analysis
/// When the plan executes
/// Then it fails as a planning error before research is ever invoked
#[tokio::test]
async fn test_misordered_plan_invokes_nothing() {
    let harness = OrchestratorHarness::new(MockInvoker::new());
    let mut plan = harness
        .orchestrator
        .plan_execution(&IntelligenceRequest::search(json!({})))
        .unwrap();
    plan.execution_order = vec![
        TaskId::from("research-1"),
        TaskId::from("synthesis-3"),
        TaskId::from("intelligence-2"),
    ];

    let err = harness.orchestrator.execute(&mut plan, None).await.unwrap_err();

    assert_eq!(
        planning_message(err),
        "Task synthesis-3 scheduled before its dependency intelligence-2"
    );
    assert!(harness.invoker.calls().is_empty());
    assert!(harness.history().is_empty().await);
}

/// Test: Every task must be scheduled
/// Given a plan whose execution order drops the synthesis task
/// When the plan executes
/// Then it fails as a planning error instead of silently skipping synthesis
#[tokio::test]
async fn test_incomplete_order_is_rejected() {
    let harness = OrchestratorHarness::new(MockInvoker::new());
    let mut plan = harness
        .orchestrator
        .plan_execution(&IntelligenceRequest::search(json!({})))
        .unwrap();
    plan.execution_order.truncate(2);

    let err = harness.orchestrator.execute(&mut plan, None).await.unwrap_err();

    assert_eq!(
        planning_message(err),
        "Task synthesis-3 missing from execution order"
    );
    assert!(harness.invoker.calls().is_empty());
}

#[tokio::test]
async fn test_plans_run_once() {
    let harness = OrchestratorHarness::new(MockInvoker::new());
    let mut plan = harness
        .orchestrator
        .plan_execution(&IntelligenceRequest::search(json!({})))
        .unwrap();
    harness.orchestrator.execute(&mut plan, None).await.unwrap();
    let calls = harness.invoker.calls().len();

    let err = harness.orchestrator.execute(&mut plan, None).await.unwrap_err();
    assert!(planning_message(err).contains("already finished"));
    assert_eq!(harness.invoker.calls().len(), calls);
}
