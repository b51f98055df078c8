//! Caller-facing facade.
//!
//! Ties the planner, executor and shared history behind one handle so a
//! request can be planned, run and analysed without wiring the parts by hand.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::core::plan::OrchestrationPlan;
use crate::core::request::IntelligenceRequest;
use crate::error::Result;
use crate::history::{AnalyticsReport, ExecutionHistory};
use crate::olog;
use crate::orchestration::executor::{ExecutionOutcome, PlanExecutor, ProgressEvent};
use crate::orchestration::invoker::ToolInvoker;
use crate::orchestration::planner::PlanBuilder;
use crate::registry::CapabilityRegistry;

/// Caller-facing entry point: plan, execute, report.
///
/// Owns nothing global. The registry, invoker and history are injected, so
/// several orchestrators can share one history or keep separate ones.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<CapabilityRegistry>,
    planner: PlanBuilder,
    executor: PlanExecutor,
    history: ExecutionHistory,
}

impl Orchestrator {
    pub fn new(
        config: &Config,
        registry: Arc<CapabilityRegistry>,
        invoker: Arc<dyn ToolInvoker>,
        history: ExecutionHistory,
    ) -> Result<Self> {
        let planner = PlanBuilder::new(registry.clone(), config.policy.clone())?;
        let executor = PlanExecutor::new(
            invoker,
            registry.clone(),
            history.clone(),
            config.executor.clone(),
        );
        olog!(
            "Orchestrator ready: {} providers, parallel_dispatch={}",
            registry.len(),
            config.executor.parallel_dispatch
        );
        Ok(Self {
            registry,
            planner,
            executor,
            history,
        })
    }

    /// Built-in registry, fresh history, given invoker.
    pub fn with_defaults(config: &Config, invoker: Arc<dyn ToolInvoker>) -> Result<Self> {
        Self::new(
            config,
            Arc::new(CapabilityRegistry::builtin()),
            invoker,
            ExecutionHistory::new(),
        )
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.executor = self.executor.with_cancellation(cancel);
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.executor.cancellation_token()
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub fn plan_execution(&self, request: &IntelligenceRequest) -> Result<OrchestrationPlan> {
        self.planner.plan_execution(request)
    }

    pub async fn execute(
        &self,
        plan: &mut OrchestrationPlan,
        progress: Option<&mpsc::UnboundedSender<ProgressEvent>>,
    ) -> Result<ExecutionOutcome> {
        self.executor.execute(plan, progress).await
    }

    /// Plan and run in one step.
    pub async fn run(&self, request: &IntelligenceRequest) -> Result<ExecutionOutcome> {
        let mut plan = self.plan_execution(request)?;
        self.execute(&mut plan, None).await
    }

    pub async fn agent_analytics(&self) -> AnalyticsReport {
        self.history.analytics().await
    }
}
