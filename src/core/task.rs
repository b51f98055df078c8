//! Task data model for orchestration plans.
//!
//! Tasks are the atomic units of work assigned to providers. Each task
//! carries a kind-specific context, its dependencies, and an execution
//! state machine driven by the plan executor.

use crate::core::request::IntelligenceRequest;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a task within one plan, e.g. `research-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Build a sequential id such as `synthesis-4`.
    pub fn sequential(prefix: &str, n: u32) -> Self {
        Self(format!("{}-{}", prefix, n))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Research,
    Analysis,
    Validation,
    Synthesis,
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskKind::Research => write!(f, "research"),
            TaskKind::Analysis => write!(f, "analysis"),
            TaskKind::Validation => write!(f, "validation"),
            TaskKind::Synthesis => write!(f, "synthesis"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Kind-specific payload of a task.
///
/// Every variant names the provider currently assigned to the task. The
/// executor may swap that provider for a fallback after a failed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TaskContext {
    Research {
        agent: String,
        request: IntelligenceRequest,
    },
    Analysis {
        agent: String,
        query: String,
        search_type: String,
    },
    Validation {
        agent: String,
        validation_type: String,
    },
    Synthesis {
        agent: String,
        methodology: String,
        /// Accumulated research output, appended to by the executor.
        #[serde(default)]
        prospects: Vec<Value>,
    },
}

impl TaskContext {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskContext::Research { .. } => TaskKind::Research,
            TaskContext::Analysis { .. } => TaskKind::Analysis,
            TaskContext::Validation { .. } => TaskKind::Validation,
            TaskContext::Synthesis { .. } => TaskKind::Synthesis,
        }
    }

    pub fn agent(&self) -> &str {
        match self {
            TaskContext::Research { agent, .. }
            | TaskContext::Analysis { agent, .. }
            | TaskContext::Validation { agent, .. }
            | TaskContext::Synthesis { agent, .. } => agent,
        }
    }

    pub fn set_agent(&mut self, provider: &str) {
        match self {
            TaskContext::Research { agent, .. }
            | TaskContext::Analysis { agent, .. }
            | TaskContext::Validation { agent, .. }
            | TaskContext::Synthesis { agent, .. } => *agent = provider.to_string(),
        }
    }

    /// The synthesis accumulator; `None` for every other kind.
    pub fn prospects_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            TaskContext::Synthesis { prospects, .. } => Some(prospects),
            _ => None,
        }
    }

    pub fn prospects(&self) -> &[Value] {
        match self {
            TaskContext::Synthesis { prospects, .. } => prospects,
            _ => &[],
        }
    }
}

/// Execution state of a task.
///
/// `Pending -> Started -> (Succeeded | Retrying -> Started | Failed)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskStatus {
    Pending,
    Started {
        /// 1-based attempt number.
        attempt: u32,
    },
    Retrying {
        /// Attempt that just failed.
        attempt: u32,
        error: String,
    },
    Succeeded,
    Failed {
        error: String,
    },
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    fn name(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Started { .. } => "started",
            TaskStatus::Retrying { .. } => "retrying",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Started { attempt } => write!(f, "started (attempt {})", attempt),
            TaskStatus::Retrying { attempt, error } => {
                write!(f, "retrying after attempt {}: {}", attempt, error)
            }
            TaskStatus::Failed { error } => write!(f, "failed: {}", error),
            other => f.write_str(other.name()),
        }
    }
}

/// One unit of orchestrated work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub priority: Priority,
    /// Tasks that must succeed before this one starts, in declaration order.
    pub dependencies: Vec<TaskId>,
    pub estimated_duration_ms: u64,
    pub max_retries: u32,
    pub context: TaskContext,
    #[serde(default)]
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        priority: Priority,
        dependencies: Vec<TaskId>,
        estimated_duration_ms: u64,
        max_retries: u32,
        context: TaskContext,
    ) -> Self {
        Self {
            id,
            priority,
            dependencies,
            estimated_duration_ms,
            max_retries,
            context,
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.context.kind()
    }

    /// Provider currently assigned to the task.
    pub fn agent(&self) -> &str {
        self.context.agent()
    }

    fn invalid(&self, to: &str) -> Error {
        Error::InvalidTransition {
            from: format!("{} ({})", self.id, self.status.name()),
            to: to.to_string(),
        }
    }

    /// Begin an attempt. Allowed from `Pending` and `Retrying`.
    pub fn start(&mut self) -> Result<u32> {
        let attempt = match &self.status {
            TaskStatus::Pending => 1,
            TaskStatus::Retrying { attempt, .. } => attempt + 1,
            _ => return Err(self.invalid("started")),
        };
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.status = TaskStatus::Started { attempt };
        Ok(attempt)
    }

    pub fn succeed(&mut self) -> Result<()> {
        if !matches!(self.status, TaskStatus::Started { .. }) {
            return Err(self.invalid("succeeded"));
        }
        self.status = TaskStatus::Succeeded;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Record a failed attempt that will be retried.
    pub fn retry(&mut self, error: &str) -> Result<()> {
        let attempt = match self.status {
            TaskStatus::Started { attempt } => attempt,
            _ => return Err(self.invalid("retrying")),
        };
        self.status = TaskStatus::Retrying {
            attempt,
            error: error.to_string(),
        };
        Ok(())
    }

    /// Record a terminal failure.
    pub fn fail(&mut self, error: &str) -> Result<()> {
        if !matches!(self.status, TaskStatus::Started { .. }) {
            return Err(self.invalid("failed"));
        }
        self.status = TaskStatus::Failed {
            error: error.to_string(),
        };
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, TaskStatus::Succeeded | TaskStatus::Failed { .. })
    }
}
