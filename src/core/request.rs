//! Intelligence requests accepted by the plan builder.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What the caller wants researched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RequestPayload {
    /// Research a known list of profile URLs.
    ProfileUrls {
        urls: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_results: Option<u32>,
    },
    /// Search for prospects matching free-form criteria.
    SearchCriteria {
        criteria: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_results: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntelligenceRequest {
    pub payload: RequestPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,
}

impl IntelligenceRequest {
    pub fn search(criteria: Value) -> Self {
        Self {
            payload: RequestPayload::SearchCriteria {
                criteria,
                max_results: None,
            },
            conversation_context: None,
        }
    }

    pub fn profiles(urls: Vec<String>) -> Self {
        Self {
            payload: RequestPayload::ProfileUrls {
                urls,
                max_results: None,
            },
            conversation_context: None,
        }
    }

    pub fn with_max_results(mut self, n: u32) -> Self {
        match &mut self.payload {
            RequestPayload::ProfileUrls { max_results, .. }
            | RequestPayload::SearchCriteria { max_results, .. } => *max_results = Some(n),
        }
        self
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.conversation_context = Some(context.to_string());
        self
    }

    pub fn max_results(&self) -> Option<u32> {
        match &self.payload {
            RequestPayload::ProfileUrls { max_results, .. }
            | RequestPayload::SearchCriteria { max_results, .. } => *max_results,
        }
    }

    /// Lowercased conversation context, empty when absent.
    pub fn context_lower(&self) -> String {
        self.conversation_context
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// Reject requests no provider could act on.
    pub fn validate(&self) -> Result<()> {
        match &self.payload {
            RequestPayload::ProfileUrls { urls, .. } if urls.is_empty() => Err(Error::Planning(
                "profile request carries no URLs".to_string(),
            )),
            RequestPayload::ProfileUrls { urls, .. } if urls.iter().any(|u| u.trim().is_empty()) => {
                Err(Error::Planning("profile request carries a blank URL".to_string()))
            }
            _ => Ok(()),
        }
    }

    /// Arguments forwarded to the research tool.
    pub fn tool_arguments(&self) -> Value {
        match &self.payload {
            RequestPayload::ProfileUrls { urls, max_results } => json!({
                "profileUrls": urls,
                "maxResults": max_results,
            }),
            RequestPayload::SearchCriteria {
                criteria,
                max_results,
            } => json!({
                "searchCriteria": criteria,
                "maxResults": max_results,
            }),
        }
    }
}
