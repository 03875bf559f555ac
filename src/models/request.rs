use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum_macros::EnumIter;

use crate::registry::Category;

/// The closed set of task types the engine accepts. Each maps to a persona
/// and a complexity tier; unrecognized work goes through `ChatQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ChatQuery,
    LeadAnalysis,
    ReportSynthesis,
    ScriptGeneration,
    InterventionStrategy,
    BehavioralInsight,
    ExecutiveBriefing,
    RevenueProjection,
    ResearchQuery,
}

/// Model-call options carried by a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestOptions {
    pub model: String,
    pub max_tokens: i32,
    pub temperature: f32,
    /// Content arrives progressively when set; the structural contract of the
    /// final Response is unchanged either way.
    pub streaming: bool,
    pub use_tools: bool,
    /// When set, only tools from these categories are offered to the model
    pub allowed_categories: Option<Vec<Category>>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4000,
            temperature: 0.7,
            streaming: false,
            use_tools: false,
            allowed_categories: None,
        }
    }
}

/// Standardized request format for all engine operations. Immutable once
/// submitted; the engine takes it by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub task_type: TaskType,
    pub context: Map<String, Value>,
    pub prompt: String,
    #[serde(default)]
    pub options: RequestOptions,
}

impl Request {
    pub fn new<S: Into<String>>(task_type: TaskType, prompt: S) -> Self {
        Request {
            task_type,
            context: Map::new(),
            prompt: prompt.into(),
            options: RequestOptions::default(),
        }
    }

    pub fn with_context_value<K: Into<String>>(mut self, key: K, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_type_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(TaskType::LeadAnalysis).unwrap(),
            json!("lead_analysis")
        );
        assert_eq!(
            serde_json::from_value::<TaskType>(json!("executive_briefing")).unwrap(),
            TaskType::ExecutiveBriefing
        );
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(TaskType::ChatQuery, "Which leads need a touch today?")
            .with_context_value("lead_id", json!("lead_812"));

        assert_eq!(request.context["lead_id"], json!("lead_812"));
        assert!(!request.options.use_tools);
    }
}
