//! Orchestration plans: an ordered, cost-estimated task set.

use crate::core::dag::{GraphAnalysis, TaskDAG};
use crate::core::task::{Task, TaskId, TaskKind};
use crate::error::Result;
use crate::registry::CapabilityRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationPlan {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub tasks: Vec<Task>,
    /// Task ids with every dependency ahead of its dependents.
    pub execution_order: Vec<TaskId>,
    /// Groups of tasks that may be dispatched concurrently.
    pub parallel_groups: Vec<Vec<TaskId>>,
    pub total_estimated_cost: f64,
    /// Critical-path length in milliseconds.
    pub total_estimated_duration_ms: u64,
    /// Substitute provider per task, used only after a failed attempt.
    pub fallback_strategies: BTreeMap<TaskId, String>,
}

impl OrchestrationPlan {
    /// Analyse `tasks` and assemble a plan.
    ///
    /// Fails with a planning error on unknown dependencies or cycles, before
    /// any provider is contacted.
    pub fn assemble(
        tasks: Vec<Task>,
        registry: &CapabilityRegistry,
        fallback_strategies: BTreeMap<TaskId, String>,
    ) -> Result<Self> {
        let GraphAnalysis {
            execution_order,
            parallel_groups,
            total_estimated_cost,
            total_estimated_duration_ms,
        } = TaskDAG::build(&tasks)?.analyze(registry)?;

        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            tasks,
            execution_order,
            parallel_groups,
            total_estimated_cost,
            total_estimated_duration_ms,
            fallback_strategies,
        })
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// The first task of the given kind.
    pub fn task_of_kind(&self, kind: TaskKind) -> Option<&Task> {
        self.tasks.iter().find(|t| t.kind() == kind)
    }

    pub fn task_of_kind_mut(&mut self, kind: TaskKind) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.kind() == kind)
    }

    pub fn fallback_for(&self, id: &TaskId) -> Option<&str> {
        self.fallback_strategies.get(id).map(String::as_str)
    }

    /// The parallel group containing `id`, if any.
    pub fn group_of(&self, id: &TaskId) -> Option<&[TaskId]> {
        self.parallel_groups
            .iter()
            .find(|group| group.contains(id))
            .map(Vec::as_slice)
    }
}
