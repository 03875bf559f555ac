use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timing {
    Immediate,
    Urgent,
    Moderate,
    Low,
}

/// A next step extracted from the model's final answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub action: String,
    pub priority: Priority,
    pub timing: Timing,
}

/// Standardized response format from all engine operations. Produced once per
/// request and never mutated after return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub reasoning: Option<String>,
    /// Normalized to 0.0..=1.0 when a confidence cue was found in the answer
    pub confidence: Option<f32>,
    pub sources: Vec<String>,
    pub recommended_actions: Vec<RecommendedAction>,
    /// Parsed risk/opportunity lists, the tool-execution trace, and the
    /// demo-mode and error flags all travel here.
    pub metadata: Map<String, Value>,
    pub response_time_ms: u64,
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

impl Response {
    pub fn with_content<S: Into<String>>(content: S) -> Self {
        Response {
            content: content.into(),
            reasoning: None,
            confidence: None,
            sources: Vec::new(),
            recommended_actions: Vec::new(),
            metadata: Map::new(),
            response_time_ms: 0,
            input_tokens: None,
            output_tokens: None,
            model: None,
            provider: None,
        }
    }

    /// True when this response was produced by the demo/fallback path
    pub fn is_demo_mode(&self) -> bool {
        self.metadata
            .get("demo_mode")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// True when this response carries a surfaced backend failure
    pub fn is_error(&self) -> bool {
        self.metadata
            .get("error")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}
