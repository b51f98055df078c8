//! Orchestration layer.
//!
//! The plan builder decomposes a request into tasks, the executor drives
//! them through the tool invoker, and the orchestrator ties both to a
//! shared execution history.

pub mod executor;
pub mod invoker;
mod orchestrator;
pub mod planner;

pub use executor::{
    ExecutionMetrics, ExecutionOutcome, PartialExecution, PlanExecutor, ProgressEvent,
    RetryTracker,
};
pub use invoker::{
    extract_prospects, parse_intelligence, IntelligenceSummary, ToolCall, ToolContent,
    ToolInvoker, ToolResult,
};
pub use orchestrator::Orchestrator;
pub use planner::{fallback_provider, PlanBuilder};
