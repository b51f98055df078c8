//! Uniform tool-invocation boundary.
//!
//! The orchestrator reaches every provider through [`ToolInvoker`]. Provider
//! output is treated as opaque text that may hold a JSON payload; the
//! helpers here pull prospects and the final intelligence summary out of it
//! without ever failing the run on malformed output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};
use crate::{olog_debug, olog_trace};

pub const RESEARCH_TOOL: &str = "research_prospect";
pub const PROFILE_RESEARCH_TOOL: &str = "research_linkedin_prospect";
pub const INTELLIGENCE_SEARCH_TOOL: &str = "company_intelligence_search";
pub const INSIGHT_TOOL: &str = "generate_strategic_insights";
pub const VALIDATION_TOOL: &str = "validate_compliance";

/// A single tool call routed to a named provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_name: String,
    pub arguments: Value,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ToolContent {
    Text { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn json(value: &Value) -> Self {
        Self::text(value.to_string())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::Text {
                text: message.into(),
            }],
            is_error: true,
        }
    }

    /// First text block, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content.iter().find_map(|c| match c {
            ToolContent::Text { text } => Some(text.as_str()),
        })
    }
}

/// The core's only boundary dependency.
///
/// Implementations map a `(tool, provider)` pair onto a concrete service.
/// Returning `Err` and returning a result with `is_error` set are both
/// treated as a failed attempt.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call_tool(&self, call: ToolCall) -> Result<ToolResult>;
}

/// Deterministic approval used when no external compliance check is wired.
pub fn local_validation_result() -> ToolResult {
    ToolResult::json(&json!({
        "validationResult": "APPROVED",
        "complianceChecks": {
            "dataPrivacy": "PASS",
            "gdprCompliant": "PASS",
            "ethicalSourcing": "PASS"
        },
        "recommendations": []
    }))
}

fn parse_payload(result: &ToolResult) -> Result<Value> {
    let text = result
        .first_text()
        .ok_or_else(|| Error::Parse("result carries no text content".to_string()))?;
    olog_trace!("provider payload: {}", text);
    serde_json::from_str(text).map_err(|e| Error::Parse(e.to_string()))
}

fn prospect_array(value: &Value) -> Option<&Vec<Value>> {
    if let Some(list) = value.get("prospects").and_then(Value::as_array) {
        return Some(list);
    }
    if let Some(list) = value.pointer("/results/prospects").and_then(Value::as_array) {
        return Some(list);
    }
    let succeeded = value.get("success").and_then(Value::as_bool) == Some(true);
    if succeeded {
        return value.pointer("/data/prospects").and_then(Value::as_array);
    }
    None
}

/// Pull prospect items out of a provider result.
///
/// Checks `prospects`, then `results.prospects`, then `data.prospects` when
/// `success` is true. Anything unparsable yields an empty list.
pub fn extract_prospects(result: &ToolResult) -> Vec<Value> {
    match parse_payload(result) {
        Ok(value) => prospect_array(&value).cloned().unwrap_or_default(),
        Err(e) => {
            olog_debug!("No prospects extracted: {}", e);
            Vec::new()
        }
    }
}

/// Parsed synthesis output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntelligenceSummary(pub Map<String, Value>);

impl IntelligenceSummary {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn prospects(&self) -> &[Value] {
        array_field(self.0.get("prospects"))
    }

    pub fn insights(&self) -> &[Value] {
        array_field(self.0.get("insights"))
    }
}

fn array_field(value: Option<&Value>) -> &[Value] {
    value
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Parse the synthesis result into a summary; `Err` means "no summary".
pub fn parse_intelligence(result: &ToolResult) -> Result<IntelligenceSummary> {
    match parse_payload(result)? {
        Value::Object(map) => Ok(IntelligenceSummary(map)),
        other => Err(Error::Parse(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
