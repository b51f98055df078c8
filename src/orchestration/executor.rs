//! Plan executor.
//!
//! Walks a plan's execution order, invokes each task's provider through the
//! [`ToolInvoker`], retries failed attempts with fallback substitution, and
//! aborts the whole run as soon as one task exhausts its retries.
//!
//! Research output is folded into the synthesis task's prospect list before
//! synthesis runs, and the synthesis result is parsed into the final
//! [`IntelligenceSummary`].

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::core::dag::TaskDAG;
use crate::core::plan::OrchestrationPlan;
use crate::core::task::{Task, TaskContext, TaskId, TaskKind};
use crate::error::{Error, Result};
use crate::history::{ExecutionHistory, ExecutionRecord};
use crate::orchestration::invoker::{
    extract_prospects, local_validation_result, parse_intelligence, IntelligenceSummary,
    ToolCall, ToolInvoker, ToolResult, INSIGHT_TOOL, INTELLIGENCE_SEARCH_TOOL,
    PROFILE_RESEARCH_TOOL, RESEARCH_TOOL, VALIDATION_TOOL,
};
use crate::registry::{CapabilityRegistry, COMPREHENSIVE_PROVIDER};
use crate::{olog, olog_debug, olog_error, olog_warn};

/// Task lifecycle notifications emitted while a plan runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started {
        task_id: TaskId,
        agent: String,
        attempt: u32,
    },
    /// An attempt failed and the task will run again on `agent`.
    Retrying {
        task_id: TaskId,
        agent: String,
        error: String,
    },
    Completed {
        task_id: TaskId,
        agent: String,
    },
    Failed {
        task_id: TaskId,
        agent: String,
        error: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub total_duration_ms: u64,
    /// Cost of succeeded attempts only.
    pub total_cost: f64,
    /// Succeeded attempts over all recorded attempts of this run.
    pub success_rate: f64,
    pub retries_used: u32,
}

/// Whatever a run produced before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialExecution {
    pub results: BTreeMap<TaskId, ToolResult>,
    pub records: Vec<ExecutionRecord>,
    pub metrics: ExecutionMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub plan_id: Uuid,
    pub results: BTreeMap<TaskId, ToolResult>,
    pub intelligence: Option<IntelligenceSummary>,
    pub metrics: ExecutionMetrics,
    /// Records appended to the history by this run.
    pub records: Vec<ExecutionRecord>,
    /// The run stopped early because its cancellation token fired.
    pub cancelled: bool,
}

/// Per-task retry counts for one run.
#[derive(Debug, Clone, Default)]
pub struct RetryTracker {
    retries: HashMap<TaskId, u32>,
}

impl RetryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_retries(&self, task_id: &TaskId) -> u32 {
        self.retries.get(task_id).copied().unwrap_or(0)
    }

    /// Add `count` retries for a task and return its new total.
    pub fn record(&mut self, task_id: &TaskId, count: u32) -> u32 {
        let total = self.retries.entry(task_id.clone()).or_insert(0);
        *total += count;
        *total
    }

    pub fn total(&self) -> u32 {
        self.retries.values().sum()
    }
}

/// Final verdict for one task after its retry loop.
struct TaskRun {
    task_id: TaskId,
    kind: TaskKind,
    agent: String,
    retries: u32,
    records: Vec<ExecutionRecord>,
    outcome: std::result::Result<ToolResult, String>,
}

type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

fn emit(progress: Option<&ProgressSender>, event: ProgressEvent) {
    if let Some(tx) = progress {
        let _ = tx.send(event);
    }
}

/// Executes orchestration plans against a tool invoker.
#[derive(Clone)]
pub struct PlanExecutor {
    invoker: Arc<dyn ToolInvoker>,
    registry: Arc<CapabilityRegistry>,
    history: ExecutionHistory,
    config: ExecutorConfig,
    cancel: CancellationToken,
}

impl PlanExecutor {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        registry: Arc<CapabilityRegistry>,
        history: ExecutionHistory,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            invoker,
            registry,
            history,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a caller-owned token; once cancelled, runs stop dispatching.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn history(&self) -> &ExecutionHistory {
        &self.history
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a plan to completion, cancellation, or the first terminal failure.
    ///
    /// The execution order is checked against the task graph first; a bad
    /// order is a planning error and no provider is called. On failure the
    /// returned [`Error::Orchestration`] carries the results and records
    /// produced before the abort.
    pub async fn execute(
        &self,
        plan: &mut OrchestrationPlan,
        progress: Option<&ProgressSender>,
    ) -> Result<ExecutionOutcome> {
        let dag = validate_plan(plan)?;
        let started = Instant::now();
        olog!(
            "Executing plan {} ({} tasks)",
            plan.id,
            plan.execution_order.len()
        );

        let mut results: BTreeMap<TaskId, ToolResult> = BTreeMap::new();
        let mut records: Vec<ExecutionRecord> = Vec::new();
        let mut retries = RetryTracker::new();
        let mut completed: HashSet<TaskId> = HashSet::new();
        let mut dispatched: HashSet<TaskId> = HashSet::new();
        let mut cancelled = false;

        let order = plan.execution_order.clone();
        for task_id in &order {
            if dispatched.contains(task_id) {
                continue;
            }
            if self.cancel.is_cancelled() {
                olog_warn!("Plan {} cancelled before task {}", plan.id, task_id);
                cancelled = true;
                break;
            }

            let batch = self.next_batch(&dag, plan, task_id, &completed, &dispatched);
            dispatched.extend(batch.iter().cloned());

            let runs = self.run_batch(plan, &batch, progress).await?;

            let mut failure: Option<TaskRun> = None;
            for run in runs {
                retries.record(&run.task_id, run.retries);
                records.extend(run.records.iter().cloned());
                if run.outcome.is_err() {
                    if failure.is_none() {
                        failure = Some(run);
                    }
                    continue;
                }
                if let Ok(result) = run.outcome {
                    if run.kind == TaskKind::Research {
                        propagate_research(plan, &result);
                    }
                    completed.insert(run.task_id.clone());
                    results.insert(run.task_id, result);
                }
            }

            if let Some(run) = failure {
                let message = run.outcome.err().unwrap_or_default();
                olog_error!(
                    "Plan {} aborted: task {} via {} after {} retries: {}",
                    plan.id,
                    run.task_id,
                    run.agent,
                    retries.get_retries(&run.task_id),
                    message
                );
                let metrics = metrics(started, &records, retries.total());
                return Err(Error::Orchestration {
                    task_id: run.task_id.to_string(),
                    agent: run.agent,
                    message,
                    partial: Box::new(PartialExecution {
                        results,
                        records,
                        metrics,
                    }),
                });
            }
        }

        let intelligence = if cancelled {
            None
        } else {
            plan.task_of_kind(TaskKind::Synthesis)
                .and_then(|t| results.get(&t.id))
                .and_then(|result| match parse_intelligence(result) {
                    Ok(summary) => Some(summary),
                    Err(e) => {
                        olog_debug!("Synthesis output not usable: {}", e);
                        None
                    }
                })
        };

        let metrics = metrics(started, &records, retries.total());
        olog!(
            "Plan {} finished: cost={:.2} success_rate={:.2} retries={}{}",
            plan.id,
            metrics.total_cost,
            metrics.success_rate,
            metrics.retries_used,
            if cancelled { " (cancelled)" } else { "" }
        );

        Ok(ExecutionOutcome {
            plan_id: plan.id,
            results,
            intelligence,
            metrics,
            records,
            cancelled,
        })
    }

    /// Tasks to dispatch together with `task_id`.
    ///
    /// With parallel dispatch on, every member of the task's parallel group
    /// that the graph reports ready and that has not been dispatched yet
    /// joins the batch.
    fn next_batch(
        &self,
        dag: &TaskDAG,
        plan: &OrchestrationPlan,
        task_id: &TaskId,
        completed: &HashSet<TaskId>,
        dispatched: &HashSet<TaskId>,
    ) -> Vec<TaskId> {
        if !self.config.parallel_dispatch {
            return vec![task_id.clone()];
        }
        let Some(group) = plan.group_of(task_id) else {
            return vec![task_id.clone()];
        };
        let ready: HashSet<TaskId> = dag.ready_tasks(completed).into_iter().collect();
        let batch: Vec<TaskId> = group
            .iter()
            .filter(|id| ready.contains(*id) && !dispatched.contains(*id))
            .cloned()
            .collect();
        if batch.contains(task_id) {
            batch
        } else {
            vec![task_id.clone()]
        }
    }

    async fn run_batch(
        &self,
        plan: &mut OrchestrationPlan,
        batch: &[TaskId],
        progress: Option<&ProgressSender>,
    ) -> Result<Vec<TaskRun>> {
        if let [only] = batch {
            let fallback = plan.fallback_for(only).map(str::to_string);
            let task = plan
                .task_mut(only)
                .ok_or_else(|| Error::Planning(format!("Task {} not found in plan", only)))?;
            return Ok(vec![self.run_task(task, fallback, progress).await]);
        }

        olog_debug!("Dispatching {} tasks concurrently", batch.len());
        let mut tasks = batch
            .iter()
            .map(|id| {
                plan.task(id)
                    .cloned()
                    .ok_or_else(|| Error::Planning(format!("Task {} not found in plan", id)))
            })
            .collect::<Result<Vec<Task>>>()?;

        let runs = {
            let plan_ref: &OrchestrationPlan = plan;
            join_all(tasks.iter_mut().map(|task| {
                let fallback = plan_ref.fallback_for(&task.id).map(str::to_string);
                self.run_task(task, fallback, progress)
            }))
            .await
        };

        for task in tasks {
            if let Some(slot) = plan.task_mut(&task.id) {
                *slot = task;
            }
        }

        Ok(runs)
    }

    /// Run one task through its retry loop.
    ///
    /// Never fails on its own: lifecycle errors end up in the run's outcome
    /// so sibling runs in the same batch are kept.
    async fn run_task(
        &self,
        task: &mut Task,
        fallback: Option<String>,
        progress: Option<&ProgressSender>,
    ) -> TaskRun {
        let mut run = TaskRun {
            task_id: task.id.clone(),
            kind: task.kind(),
            agent: task.agent().to_string(),
            retries: 0,
            records: Vec::new(),
            outcome: Err(String::new()),
        };
        let outcome = self
            .drive(task, fallback.as_deref(), progress, &mut run)
            .await;
        run.outcome = outcome.map_err(|e| e.to_string());
        run
    }

    async fn drive(
        &self,
        task: &mut Task,
        fallback: Option<&str>,
        progress: Option<&ProgressSender>,
        run: &mut TaskRun,
    ) -> Result<ToolResult> {
        loop {
            let attempt = task.start()?;
            let agent = task.agent().to_string();
            run.agent = agent.clone();
            olog_debug!("Task {} attempt {} via {}", task.id, attempt, agent);
            emit(
                progress,
                ProgressEvent::Started {
                    task_id: task.id.clone(),
                    agent: agent.clone(),
                    attempt,
                },
            );

            let attempt_started = Instant::now();
            match self.attempt(task).await {
                Ok(result) => {
                    let cost = self
                        .registry
                        .get(&agent)
                        .map(|p| p.cost_per_operation)
                        .unwrap_or(0.0);
                    let record = ExecutionRecord::success(
                        task.id.clone(),
                        &agent,
                        attempt_started.elapsed().as_millis() as u64,
                        cost,
                    );
                    self.history.append(record.clone()).await;
                    run.records.push(record);
                    task.succeed()?;
                    emit(
                        progress,
                        ProgressEvent::Completed {
                            task_id: task.id.clone(),
                            agent,
                        },
                    );
                    return Ok(result);
                }
                Err(err) => {
                    run.retries += 1;
                    let message = err.to_string();

                    if run.retries <= task.max_retries {
                        if let Some(substitute) = fallback {
                            task.context.set_agent(substitute);
                        }
                        task.retry(&message)?;
                        olog_warn!(
                            "Task {} failed on {} ({}); retrying on {}",
                            task.id,
                            agent,
                            message,
                            task.agent()
                        );
                        emit(
                            progress,
                            ProgressEvent::Retrying {
                                task_id: task.id.clone(),
                                agent: task.agent().to_string(),
                                error: message,
                            },
                        );
                        continue;
                    }

                    let record = ExecutionRecord::failure(task.id.clone(), &agent, &message);
                    self.history.append(record.clone()).await;
                    run.records.push(record);
                    task.fail(&message)?;
                    emit(
                        progress,
                        ProgressEvent::Failed {
                            task_id: task.id.clone(),
                            agent,
                            error: message,
                        },
                    );
                    return Err(err);
                }
            }
        }
    }

    /// One invocation of the task's current provider.
    async fn attempt(&self, task: &Task) -> Result<ToolResult> {
        let agent = task.agent().to_string();
        let call = match &task.context {
            TaskContext::Research { request, .. } => ToolCall {
                tool_name: if agent == COMPREHENSIVE_PROVIDER {
                    RESEARCH_TOOL
                } else {
                    PROFILE_RESEARCH_TOOL
                }
                .to_string(),
                arguments: request.tool_arguments(),
                provider: agent.clone(),
            },
            TaskContext::Analysis {
                query, search_type, ..
            } => ToolCall {
                tool_name: INTELLIGENCE_SEARCH_TOOL.to_string(),
                arguments: json!({
                    "query": query,
                    "searchType": search_type,
                    "maxResults": 10,
                }),
                provider: agent.clone(),
            },
            TaskContext::Validation {
                validation_type, ..
            } => {
                if self.config.local_validation {
                    return Ok(local_validation_result());
                }
                ToolCall {
                    tool_name: VALIDATION_TOOL.to_string(),
                    arguments: json!({ "validationType": validation_type }),
                    provider: agent.clone(),
                }
            }
            TaskContext::Synthesis {
                methodology,
                prospects,
                ..
            } => ToolCall {
                tool_name: INSIGHT_TOOL.to_string(),
                arguments: json!({
                    "methodology": methodology,
                    "prospects": prospects,
                    "conversationContext": "Intelligence synthesis",
                }),
                provider: agent.clone(),
            },
        };

        let invocation = self.invoker.call_tool(call);
        let outcome = match self.config.invocation_timeout() {
            Some(limit) => tokio::time::timeout(limit, invocation)
                .await
                .map_err(|_| Error::Timeout(limit))?,
            None => invocation.await,
        };

        let result = outcome.map_err(|e| match e {
            Error::ProviderInvocation { .. } => e,
            other => Error::provider(&agent, other.to_string()),
        })?;

        if result.is_error {
            let message = result
                .first_text()
                .unwrap_or("provider reported an error")
                .to_string();
            return Err(Error::provider(&agent, message));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for PlanExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanExecutor")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Check a plan before anything is dispatched.
///
/// The execution order must list every task exactly once with each
/// dependency ahead of its dependents, and no task may already be finished.
fn validate_plan(plan: &OrchestrationPlan) -> Result<TaskDAG> {
    let dag = TaskDAG::build(&plan.tasks)?;

    if let Some(task) = plan.tasks.iter().find(|t| t.is_finished()) {
        return Err(Error::Planning(format!(
            "Task {} already finished; plans run once",
            task.id
        )));
    }

    let mut seen: HashSet<&TaskId> = HashSet::with_capacity(plan.execution_order.len());
    for id in &plan.execution_order {
        let task = plan
            .task(id)
            .filter(|_| dag.contains_task(id))
            .ok_or_else(|| Error::Planning(format!("Task {} not found in plan", id)))?;
        if let Some(dep) = task.dependencies.iter().find(|d| !seen.contains(d)) {
            return Err(Error::Planning(format!(
                "Task {} scheduled before its dependency {}",
                id, dep
            )));
        }
        if !seen.insert(id) {
            return Err(Error::Planning(format!(
                "Task {} appears twice in execution order",
                id
            )));
        }
    }

    if let Some(missing) = plan.tasks.iter().find(|t| !seen.contains(&t.id)) {
        return Err(Error::Planning(format!(
            "Task {} missing from execution order",
            missing.id
        )));
    }
    Ok(dag)
}

/// Append a research result's prospects to the synthesis accumulator.
fn propagate_research(plan: &mut OrchestrationPlan, result: &ToolResult) {
    let items = extract_prospects(result);
    if items.is_empty() {
        return;
    }
    if let Some(prospects) = plan
        .task_of_kind_mut(TaskKind::Synthesis)
        .and_then(|t| t.context.prospects_mut())
    {
        olog_debug!("Forwarding {} prospects to synthesis", items.len());
        prospects.extend(items);
    }
}

fn metrics(started: Instant, records: &[ExecutionRecord], retries_used: u32) -> ExecutionMetrics {
    let successes = records.iter().filter(|r| r.success).count();
    ExecutionMetrics {
        total_duration_ms: started.elapsed().as_millis() as u64,
        total_cost: records.iter().filter(|r| r.success).map(|r| r.cost).sum(),
        success_rate: if records.is_empty() {
            0.0
        } else {
            successes as f64 / records.len() as f64
        },
        retries_used,
    }
}
