//! Capability registry.
//!
//! A static table of the providers the orchestrator may assign work to.
//! The core never talks to a provider directly; it only reads the declared
//! profile here to estimate cost and duration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Comprehensive, premium research provider.
pub const COMPREHENSIVE_PROVIDER: &str = "bright-data-researcher";
/// Cost-effective extraction provider; the default research choice.
pub const COST_EFFECTIVE_PROVIDER: &str = "apify-extractor";
/// Low-cost real-time intelligence provider.
pub const REALTIME_PROVIDER: &str = "websearch-intelligence";
/// Compliance validator.
pub const VALIDATOR_PROVIDER: &str = "constitutional-validator";

/// Cost assumed for a provider missing from the registry.
pub const DEFAULT_COST_PER_OPERATION: f64 = 0.10;
/// Duration assumed for a provider missing from the registry.
pub const DEFAULT_AVERAGE_DURATION_MS: u64 = 10_000;

/// Declared cost/duration/reliability profile of one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityProfile {
    pub name: String,
    pub description: String,
    pub cost_per_operation: f64,
    pub average_duration_ms: u64,
    /// Probability of success, 0 to 1.
    pub reliability: f64,
    pub best_for: Vec<String>,
    pub constraints: Vec<String>,
}

impl CapabilityProfile {
    /// Profile substituted for unknown provider names.
    pub fn fallback_default() -> Self {
        Self {
            name: "unknown".to_string(),
            description: "Unregistered provider".to_string(),
            cost_per_operation: DEFAULT_COST_PER_OPERATION,
            average_duration_ms: DEFAULT_AVERAGE_DURATION_MS,
            reliability: 0.0,
            best_for: Vec::new(),
            constraints: Vec::new(),
        }
    }
}

fn tags(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Read-only lookup table of capability profiles keyed by provider name.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    profiles: BTreeMap<String, CapabilityProfile>,
    default_profile: CapabilityProfile,
}

impl CapabilityRegistry {
    /// Build a registry from an explicit list of `(key, profile)` pairs.
    pub fn from_profiles<I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = (String, CapabilityProfile)>,
    {
        Self {
            profiles: profiles.into_iter().collect(),
            default_profile: CapabilityProfile::fallback_default(),
        }
    }

    /// The four built-in providers.
    pub fn builtin() -> Self {
        Self::from_profiles([
            (
                COMPREHENSIVE_PROVIDER.to_string(),
                CapabilityProfile {
                    name: "Bright Data Research Agent".to_string(),
                    description:
                        "Enterprise-grade prospect research with comprehensive data collection"
                            .to_string(),
                    cost_per_operation: 0.50,
                    average_duration_ms: 15_000,
                    reliability: 0.95,
                    best_for: tags(&[
                        "large_volume_research",
                        "comprehensive_analysis",
                        "enterprise_contacts",
                    ]),
                    constraints: tags(&["minimum_10_prospects", "requires_linkedin_urls"]),
                },
            ),
            (
                COST_EFFECTIVE_PROVIDER.to_string(),
                CapabilityProfile {
                    name: "Apify Extraction Agent".to_string(),
                    description: "Cost-effective profile extraction for small to medium volumes"
                        .to_string(),
                    cost_per_operation: 0.15,
                    average_duration_ms: 8_000,
                    reliability: 0.88,
                    best_for: tags(&[
                        "small_volume_extraction",
                        "quick_turnaround",
                        "budget_conscious",
                    ]),
                    constraints: tags(&["max_350_prospects", "linkedin_search_urls_only"]),
                },
            ),
            (
                REALTIME_PROVIDER.to_string(),
                CapabilityProfile {
                    name: "WebSearch Intelligence Agent".to_string(),
                    description: "Real-time prospect and company intelligence gathering"
                        .to_string(),
                    cost_per_operation: 0.05,
                    average_duration_ms: 3_000,
                    reliability: 0.92,
                    best_for: tags(&["real_time_data", "company_news", "market_intelligence"]),
                    constraints: tags(&["rate_limited", "requires_structured_queries"]),
                },
            ),
            (
                VALIDATOR_PROVIDER.to_string(),
                CapabilityProfile {
                    name: "Constitutional AI Validator".to_string(),
                    description: "Compliance and quality validation".to_string(),
                    cost_per_operation: 0.08,
                    average_duration_ms: 2_000,
                    reliability: 0.98,
                    best_for: tags(&[
                        "compliance_validation",
                        "quality_assurance",
                        "safety_checks",
                    ]),
                    constraints: tags(&["safety_critical_only", "requires_context"]),
                },
            ),
        ])
    }

    pub fn get(&self, name: &str) -> Option<&CapabilityProfile> {
        self.profiles.get(name)
    }

    /// Look up a provider, falling back to the documented default profile.
    pub fn profile_or_default(&self, name: &str) -> &CapabilityProfile {
        self.profiles.get(name).unwrap_or(&self.default_profile)
    }

    pub fn cost_of(&self, name: &str) -> f64 {
        self.profile_or_default(name).cost_per_operation
    }

    pub fn duration_of(&self, name: &str) -> u64 {
        self.profile_or_default(name).average_duration_ms
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
