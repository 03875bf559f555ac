use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::persona::Complexity;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// Per-call model parameters, resolved from the request options
#[derive(Debug, Clone)]
pub struct ModelParams {
    pub model: String,
    pub max_tokens: i32,
    pub temperature: Option<f32>,
    /// Steers backend-side routing only; the turn loop does not branch on it
    pub complexity: Complexity,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication rejected by model backend: {0}")]
    Authentication(String),

    #[error("Model backend error: {0}")]
    Api(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

// Markers observed in credential failures surfaced as generic API errors by
// gateways that do not preserve the upstream status code.
const AUTH_MARKERS: &[&str] = &["401", "authentication_error", "invalid x-api-key"];

impl ProviderError {
    /// Whether this failure indicates a credential problem, either typed or
    /// recognizable from the message text
    pub fn is_authentication(&self) -> bool {
        match self {
            ProviderError::Authentication(_) => true,
            other => {
                let message = other.to_string();
                AUTH_MARKERS.iter().any(|marker| message.contains(marker))
            }
        }
    }
}

/// Base trait for model backends (Anthropic, mocks, gateways)
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Identifying string recorded on each Response
    fn name(&self) -> &str;

    /// Generate the next assistant message for the accumulated exchange.
    /// The reply may carry zero or more tool-request blocks.
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        params: &ModelParams,
    ) -> Result<(Message, Usage), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_serialization() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage).unwrap();
        let deserialized: Usage = serde_json::from_str(&serialized).unwrap();

        assert_eq!(usage.input_tokens, deserialized.input_tokens);
        assert_eq!(usage.output_tokens, deserialized.output_tokens);
        assert_eq!(usage.total_tokens, deserialized.total_tokens);
    }

    #[test]
    fn test_auth_detection_from_typed_variant() {
        let err = ProviderError::Authentication("invalid key".to_string());
        assert!(err.is_authentication());
    }

    #[test]
    fn test_auth_detection_from_message_markers() {
        assert!(ProviderError::Api("upstream said 401".to_string()).is_authentication());
        assert!(
            ProviderError::Api("type: authentication_error".to_string()).is_authentication()
        );
        assert!(!ProviderError::Api("rate limited".to_string()).is_authentication());
    }
}
