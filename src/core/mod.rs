//! Core domain models for orchestration.
//!
//! Requests, tasks, the dependency graph that orders them, and the plans
//! assembled from both.

pub mod dag;
pub mod plan;
pub mod request;
pub mod task;

pub use dag::{GraphAnalysis, TaskDAG};
pub use plan::OrchestrationPlan;
pub use request::{IntelligenceRequest, RequestPayload};
pub use task::{Priority, Task, TaskContext, TaskId, TaskKind, TaskStatus};
