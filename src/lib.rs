pub mod config;
pub mod core;
pub mod error;
pub mod history;
pub mod log;
pub mod orchestration;
pub mod registry;

pub use config::{Config, ExecutorConfig, PolicyConfig};
pub use crate::core::{IntelligenceRequest, OrchestrationPlan, Task, TaskId, TaskKind, TaskStatus};
pub use error::{Error, Result};
pub use history::{AnalyticsReport, ExecutionHistory, ExecutionRecord};
pub use orchestration::{
    ExecutionOutcome, IntelligenceSummary, Orchestrator, ProgressEvent, ToolCall, ToolInvoker,
    ToolResult,
};
pub use registry::{CapabilityProfile, CapabilityRegistry};
