//! Execution history and provider analytics.
//!
//! Every task attempt that reaches a verdict is appended here. The log is
//! shared between the executor and whoever asks for analytics, and it is
//! only ever appended to.

use crate::core::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Outcome of one task attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub task_id: TaskId,
    pub agent: String,
    pub duration_ms: u64,
    pub cost: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionRecord {
    pub fn success(task_id: TaskId, agent: &str, duration_ms: u64, cost: f64) -> Self {
        Self {
            task_id,
            agent: agent.to_string(),
            duration_ms,
            cost,
            success: true,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    /// A terminal failure. Failed attempts carry no duration or cost.
    pub fn failure(task_id: TaskId, agent: &str, error: &str) -> Self {
        Self {
            task_id,
            agent: agent.to_string(),
            duration_ms: 0,
            cost: 0.0,
            success: false,
            error: Some(error.to_string()),
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub success_rate: f64,
    pub avg_duration_ms: f64,
    pub avg_cost: f64,
    pub total_executions: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_executions: usize,
    pub total_cost: f64,
    pub avg_success_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub per_provider: BTreeMap<String, ProviderStats>,
    pub system: SystemStats,
}

#[derive(Default)]
struct Totals {
    successes: usize,
    failures: usize,
    duration_ms: u64,
    cost: f64,
}

impl AnalyticsReport {
    /// Aggregate a slice of records.
    pub fn from_records(records: &[ExecutionRecord]) -> Self {
        let mut totals: BTreeMap<&str, Totals> = BTreeMap::new();
        for record in records {
            let entry = totals.entry(record.agent.as_str()).or_default();
            if record.success {
                entry.successes += 1;
            } else {
                entry.failures += 1;
            }
            entry.duration_ms += record.duration_ms;
            entry.cost += record.cost;
        }

        let per_provider = totals
            .into_iter()
            .map(|(agent, t)| {
                let n = t.successes + t.failures;
                let stats = ProviderStats {
                    success_rate: ratio(t.successes as f64, n),
                    avg_duration_ms: ratio(t.duration_ms as f64, n),
                    avg_cost: ratio(t.cost, n),
                    total_executions: n,
                };
                (agent.to_string(), stats)
            })
            .collect();

        let successes = records.iter().filter(|r| r.success).count();
        let system = SystemStats {
            total_executions: records.len(),
            total_cost: records.iter().map(|r| r.cost).sum(),
            avg_success_rate: ratio(successes as f64, records.len()),
        };

        Self {
            per_provider,
            system,
        }
    }
}

fn ratio(value: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        value / n as f64
    }
}

/// Append-only, process-lifetime execution log.
///
/// Cloning shares the same log. Appends are serialized through the lock so
/// concurrent task completions never lose records.
#[derive(Debug, Clone, Default)]
pub struct ExecutionHistory {
    records: Arc<RwLock<Vec<ExecutionRecord>>>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn append(&self, record: ExecutionRecord) {
        self.records.write().await.push(record);
    }

    /// Snapshot of every record so far.
    pub async fn records(&self) -> Vec<ExecutionRecord> {
        self.records.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn analytics(&self) -> AnalyticsReport {
        AnalyticsReport::from_records(&self.records.read().await)
    }
}
