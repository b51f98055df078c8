//! Plan builder.
//!
//! Decomposes an intelligence request into research, analysis, optional
//! validation and synthesis tasks, picks a provider for each, and hands the
//! set to the graph analyzer to produce an [`OrchestrationPlan`].

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::PolicyConfig;
use crate::core::plan::OrchestrationPlan;
use crate::core::request::IntelligenceRequest;
use crate::core::task::{Priority, Task, TaskContext, TaskId};
use crate::error::{Error, Result};
use crate::registry::{
    CapabilityRegistry, COMPREHENSIVE_PROVIDER, COST_EFFECTIVE_PROVIDER, REALTIME_PROVIDER,
    VALIDATOR_PROVIDER,
};
use crate::{olog, olog_debug};

const ANALYSIS_DURATION_MS: u64 = 5_000;
const VALIDATION_DURATION_MS: u64 = 3_000;
const SYNTHESIS_DURATION_MS: u64 = 7_000;

const RESEARCH_RETRIES: u32 = 2;
const ANALYSIS_RETRIES: u32 = 1;
const VALIDATION_RETRIES: u32 = 3;
const SYNTHESIS_RETRIES: u32 = 1;

/// Substitute provider used after a failed attempt on `primary`.
pub fn fallback_provider(primary: &str) -> Option<&'static str> {
    match primary {
        COMPREHENSIVE_PROVIDER => Some(COST_EFFECTIVE_PROVIDER),
        COST_EFFECTIVE_PROVIDER => Some(REALTIME_PROVIDER),
        _ => None,
    }
}

/// Fallback map for a task set, keyed by task id.
pub fn fallback_strategies(tasks: &[Task]) -> BTreeMap<TaskId, String> {
    tasks
        .iter()
        .filter_map(|task| {
            fallback_provider(task.agent()).map(|p| (task.id.clone(), p.to_string()))
        })
        .collect()
}

/// Builds orchestration plans from intelligence requests.
#[derive(Debug, Clone)]
pub struct PlanBuilder {
    registry: Arc<CapabilityRegistry>,
    policy: PolicyConfig,
    sensitive: Option<Regex>,
}

impl PlanBuilder {
    pub fn new(registry: Arc<CapabilityRegistry>, policy: PolicyConfig) -> Result<Self> {
        let sensitive = if policy.sensitive_keywords.is_empty() {
            None
        } else {
            let alternation = policy
                .sensitive_keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!("(?i){}", alternation))
                .map_err(|e| Error::Planning(format!("invalid sensitive keyword list: {}", e)))?;
            Some(re)
        };

        Ok(Self {
            registry,
            policy,
            sensitive,
        })
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Requested volume; absent or zero falls back to the policy default.
    pub fn estimate_volume(&self, request: &IntelligenceRequest) -> u32 {
        request
            .max_results()
            .filter(|&n| n > 0)
            .unwrap_or(self.policy.default_volume)
    }

    /// Budget inferred from keywords in the conversation context.
    pub fn estimate_budget(&self, request: &IntelligenceRequest) -> f64 {
        let context = request.context_lower();
        if context.contains("enterprise") || context.contains("comprehensive") {
            self.policy.enterprise_budget
        } else if context.contains("budget") || context.contains("cost-effective") {
            self.policy.constrained_budget
        } else {
            self.policy.default_budget
        }
    }

    /// Decision policy for the research provider.
    ///
    /// Small volume on a tight budget goes to the cost-effective provider;
    /// large volume or an enterprise context goes to the comprehensive
    /// provider; everything else defaults to the cost-effective provider.
    pub fn select_research_provider(&self, request: &IntelligenceRequest) -> &'static str {
        let volume = self.estimate_volume(request);
        let budget = self.estimate_budget(request);

        if volume <= self.policy.volume_threshold && budget < self.policy.low_budget_limit {
            return COST_EFFECTIVE_PROVIDER;
        }
        if volume > self.policy.volume_threshold || request.context_lower().contains("enterprise")
        {
            return COMPREHENSIVE_PROVIDER;
        }
        COST_EFFECTIVE_PROVIDER
    }

    /// Provider average duration scaled by volume in tens.
    pub fn estimate_research_duration(&self, request: &IntelligenceRequest, provider: &str) -> u64 {
        let volume = self.estimate_volume(request) as f64;
        let base = self.registry.duration_of(provider) as f64;
        (base * (volume / 10.0).max(1.0)).round() as u64
    }

    pub fn requires_compliance(&self, request: &IntelligenceRequest) -> bool {
        match (&self.sensitive, request.conversation_context.as_deref()) {
            (Some(re), Some(context)) => re.is_match(context),
            _ => false,
        }
    }

    /// Decompose a request into a full plan.
    pub fn plan_execution(&self, request: &IntelligenceRequest) -> Result<OrchestrationPlan> {
        request.validate()?;

        let mut tasks = Vec::with_capacity(4);
        let mut seq = 1u32;
        let mut next_id = |prefix: &str| {
            let id = TaskId::sequential(prefix, seq);
            seq += 1;
            id
        };

        let research_agent = self.select_research_provider(request);
        olog_debug!(
            "research provider={} volume={} budget={}",
            research_agent,
            self.estimate_volume(request),
            self.estimate_budget(request)
        );
        let research_id = next_id("research");
        tasks.push(Task::new(
            research_id.clone(),
            Priority::High,
            Vec::new(),
            self.estimate_research_duration(request, research_agent),
            RESEARCH_RETRIES,
            TaskContext::Research {
                agent: research_agent.to_string(),
                request: request.clone(),
            },
        ));

        tasks.push(Task::new(
            next_id("intelligence"),
            Priority::Medium,
            vec![research_id.clone()],
            ANALYSIS_DURATION_MS,
            ANALYSIS_RETRIES,
            TaskContext::Analysis {
                agent: REALTIME_PROVIDER.to_string(),
                query: "market intelligence".to_string(),
                search_type: "company_intelligence".to_string(),
            },
        ));

        if self.requires_compliance(request) {
            tasks.push(Task::new(
                next_id("validation"),
                Priority::Critical,
                vec![research_id],
                VALIDATION_DURATION_MS,
                VALIDATION_RETRIES,
                TaskContext::Validation {
                    agent: VALIDATOR_PROVIDER.to_string(),
                    validation_type: "data_privacy_compliance".to_string(),
                },
            ));
        }

        let all_previous: Vec<TaskId> = tasks.iter().map(|t| t.id.clone()).collect();
        tasks.push(Task::new(
            next_id("synthesis"),
            Priority::High,
            all_previous,
            SYNTHESIS_DURATION_MS,
            SYNTHESIS_RETRIES,
            TaskContext::Synthesis {
                agent: COMPREHENSIVE_PROVIDER.to_string(),
                methodology: "meddic".to_string(),
                prospects: Vec::new(),
            },
        ));

        let fallbacks = fallback_strategies(&tasks);
        let plan = OrchestrationPlan::assemble(tasks, &self.registry, fallbacks)?;
        olog!(
            "Planned {} tasks: cost={:.2} duration={}ms",
            plan.tasks.len(),
            plan.total_estimated_cost,
            plan.total_estimated_duration_ms
        );
        Ok(plan)
    }
}
