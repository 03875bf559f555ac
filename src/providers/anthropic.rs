use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::base::{ModelParams, ModelProvider, ProviderError, Usage};
use super::configs::AnthropicConfig;
use super::utils::{get_usage, messages_to_wire, response_to_message, tools_to_wire};
use crate::models::message::Message;
use crate::models::tool::Tool;

const ANTHROPIC_API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    async fn post(&self, payload: Value) -> Result<Value, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_API_VERSION)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let error_text = response.text().await.unwrap_or_default();
                Err(ProviderError::Authentication(error_text))
            }
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(ProviderError::Api(format!("Server error: {}", status)))
            }
            status => {
                let error_text = response.text().await.unwrap_or_default();
                Err(ProviderError::Api(format!(
                    "Request failed: {} - {}",
                    status, error_text
                )))
            }
        }
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        params: &ModelParams,
    ) -> Result<(Message, Usage), ProviderError> {
        let mut payload = json!({
            "model": params.model,
            "messages": messages_to_wire(messages),
            "max_tokens": params.max_tokens,
        });

        let body = payload.as_object_mut().expect("payload is an object");
        if !system.is_empty() {
            body.insert("system".to_string(), json!(system));
        }
        if let Some(temperature) = params.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if !tools.is_empty() {
            body.insert("tools".to_string(), json!(tools_to_wire(tools)?));
        }

        let response = self.post(payload).await?;

        let message = response_to_message(&response)?;
        let usage = get_usage(&response);

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::MessageContent;
    use crate::persona::Complexity;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params() -> ModelParams {
        ModelParams {
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 1000,
            temperature: Some(0.7),
            complexity: Complexity::Routine,
        }
    }

    async fn setup_mock_server(response: ResponseTemplate) -> (MockServer, AnthropicProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test_api_key"))
            .and(header("anthropic-version", ANTHROPIC_API_VERSION))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        let provider =
            AnthropicProvider::new(AnthropicConfig::new(mock_server.uri(), "test_api_key"))
                .unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() {
        let response_body = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "Your pipeline looks healthy this week."
            }],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 15}
        });

        let (_server, provider) =
            setup_mock_server(ResponseTemplate::new(200).set_body_json(response_body)).await;

        let messages = vec![Message::user().with_text("How is the pipeline?")];
        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[], &params())
            .await
            .unwrap();

        if let MessageContent::Text(text) = &message.content[0] {
            assert_eq!(text.text, "Your pipeline looks healthy this week.");
        } else {
            panic!("Expected Text content");
        }
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));
    }

    #[tokio::test]
    async fn test_complete_tool_use() {
        let response_body = json!({
            "id": "msg_456",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "tool_use",
                "id": "toolu_1",
                "name": "analyze_lead",
                "input": {"lead_id": "lead_812"}
            }],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 40, "output_tokens": 22}
        });

        let (_server, provider) =
            setup_mock_server(ResponseTemplate::new(200).set_body_json(response_body)).await;

        let tool = Tool::new(
            "analyze_lead",
            "Produce a qualification summary for a lead",
            json!({
                "type": "object",
                "properties": {"lead_id": {"type": "string"}},
                "required": ["lead_id"]
            }),
        );

        let messages = vec![Message::user().with_text("Analyze lead_812")];
        let (message, _) = provider
            .complete("", &messages, &[tool], &params())
            .await
            .unwrap();

        let requests = message.tool_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tool_call.name, "analyze_lead");
        assert_eq!(requests[0].tool_call.arguments["lead_id"], "lead_812");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_error() {
        let (_server, provider) = setup_mock_server(
            ResponseTemplate::new(401)
                .set_body_string(r#"{"type":"error","error":{"type":"authentication_error"}}"#),
        )
        .await;

        let messages = vec![Message::user().with_text("hello")];
        let err = provider
            .complete("", &messages, &[], &params())
            .await
            .unwrap_err();

        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn test_server_error_is_not_authentication() {
        let (_server, provider) = setup_mock_server(ResponseTemplate::new(503)).await;

        let messages = vec![Message::user().with_text("hello")];
        let err = provider
            .complete("", &messages, &[], &params())
            .await
            .unwrap_err();

        assert!(!err.is_authentication());
        assert!(err.to_string().contains("Server error"));
    }
}
