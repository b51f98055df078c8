//! Analytics integration tests.
//!
//! Runs several plans against one orchestrator and checks the per-provider
//! and system statistics derived from the shared history.

use std::sync::Arc;

use serde_json::json;

use intel_orchestrator::{
    AnalyticsReport, CapabilityRegistry, Config, IntelligenceRequest, Orchestrator,
};

use crate::fixtures::{MockInvoker, MockResponse, OrchestratorHarness};

#[tokio::test]
async fn test_empty_history_reports_zeros() {
    let harness = OrchestratorHarness::new(MockInvoker::new());
    let report = harness.orchestrator.agent_analytics().await;
    assert_eq!(report, AnalyticsReport::default());
}

/// Test: Analytics across successful and failed runs
/// Given one clean run and one run whose research provider fails for good
/// When analytics are requested
/// Then failures count against the provider and add no cost
#[tokio::test]
async fn test_analytics_across_runs() {
    let harness = OrchestratorHarness::new(MockInvoker::new());
    let request = IntelligenceRequest::search(json!({}));

    harness.orchestrator.run(&request).await.unwrap();

    // Research fails on apify, then twice on the realtime fallback.
    let failing = MockInvoker::new()
        .script("apify-extractor", vec![MockResponse::Fail("a".into())])
        .script(
            "websearch-intelligence",
            vec![MockResponse::Fail("b".into()), MockResponse::Fail("c".into())],
        );
    // Same history, different providers.
    let second = Orchestrator::new(
        &Config::default(),
        Arc::new(CapabilityRegistry::builtin()),
        Arc::new(failing),
        harness.history().clone(),
    )
    .unwrap();
    assert!(second.run(&request).await.is_err());

    let report = harness.orchestrator.agent_analytics().await;
    assert_eq!(report, second.agent_analytics().await);

    // First run: apify, websearch, bright-data succeed. Second run: one
    // terminal research failure recorded against websearch.
    assert_eq!(report.system.total_executions, 4);
    assert!((report.system.avg_success_rate - 0.75).abs() < 1e-9);
    assert!((report.system.total_cost - 0.70).abs() < 1e-9);

    let web = &report.per_provider["websearch-intelligence"];
    assert_eq!(web.total_executions, 2);
    assert_eq!(web.success_rate, 0.5);
    assert!((web.avg_cost - 0.025).abs() < 1e-9);

    let apify = &report.per_provider["apify-extractor"];
    assert_eq!(apify.total_executions, 1);
    assert_eq!(apify.success_rate, 1.0);
}

#[tokio::test]
async fn test_records_carry_agent_and_cost() {
    let harness = OrchestratorHarness::new(MockInvoker::new());
    let outcome = harness
        .orchestrator
        .run(&IntelligenceRequest::search(json!({})).with_context("enterprise rollout"))
        .await
        .unwrap();

    // "enterprise" routes research to the comprehensive provider.
    let research = &outcome.records[0];
    assert_eq!(research.agent, "bright-data-researcher");
    assert!((research.cost - 0.50).abs() < 1e-9);
    assert!(research.success);
    assert!(research.error.is_none());

    assert_eq!(harness.history().len().await, outcome.records.len());
    assert!((outcome.metrics.total_cost - (0.50 + 0.05 + 0.50)).abs() < 1e-9);
}
