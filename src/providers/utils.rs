use serde_json::{json, Value};

use super::base::{ProviderError, Usage};
use crate::models::content::MessageContent;
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};

/// Convert internal messages to the Anthropic messages-API content-block spec
pub fn messages_to_wire(messages: &[Message]) -> Vec<Value> {
    let mut wire = Vec::new();

    for message in messages {
        let mut blocks = Vec::new();
        for content in &message.content {
            match content {
                MessageContent::Text(text) => {
                    if !text.text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text.text}));
                    }
                }
                MessageContent::ToolRequest(request) => {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": request.id,
                        "name": request.tool_call.name,
                        "input": request.tool_call.arguments,
                    }));
                }
                MessageContent::ToolResponse(response) => {
                    blocks.push(json!({
                        "type": "tool_result",
                        "tool_use_id": response.id,
                        "content": response.content,
                    }));
                }
            }
        }

        wire.push(json!({
            "role": message.role,
            "content": blocks,
        }));
    }

    wire
}

/// Convert tool definitions to the wire tool spec, rejecting duplicate names
pub fn tools_to_wire(tools: &[Tool]) -> Result<Vec<Value>, ProviderError> {
    let mut seen = std::collections::HashSet::new();
    let mut wire = Vec::new();

    for tool in tools {
        if !seen.insert(&tool.name) {
            return Err(ProviderError::Api(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }
        wire.push(json!({
            "name": tool.name,
            "description": tool.description,
            "input_schema": tool.input_schema,
        }));
    }

    Ok(wire)
}

/// Convert an Anthropic messages-API response body to an internal assistant
/// message, preserving text and tool-use blocks in order
pub fn response_to_message(response: &Value) -> Result<Message, ProviderError> {
    let blocks = response
        .get("content")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            ProviderError::Api("Invalid response format from model backend".to_string())
        })?;

    let mut message = Message::assistant();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    message = message.with_text(text);
                }
            }
            Some("tool_use") => {
                let id = block
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let name = block
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                message = message.with_tool_request(id, ToolCall::new(name, input));
            }
            _ => {}
        }
    }

    Ok(message)
}

pub fn get_usage(response: &Value) -> Usage {
    let usage = response.get("usage");

    let input_tokens = usage
        .and_then(|u| u.get("input_tokens"))
        .and_then(Value::as_i64)
        .map(|v| v as i32);

    let output_tokens = usage
        .and_then(|u| u.get("output_tokens"))
        .and_then(Value::as_i64)
        .map(|v| v as i32);

    let total_tokens = match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    };

    Usage::new(input_tokens, output_tokens, total_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_to_wire_text() {
        let message = Message::user().with_text("Hello");
        let wire = messages_to_wire(&[message]);

        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0]["role"], "user");
        assert_eq!(wire[0]["content"][0]["type"], "text");
        assert_eq!(wire[0]["content"][0]["text"], "Hello");
    }

    #[test]
    fn test_messages_to_wire_tool_round() {
        let messages = vec![
            Message::assistant()
                .with_text("Checking.")
                .with_tool_request("tc_1", ToolCall::new("score_lead", json!({"lead_id": "l1"}))),
            Message::user().with_tool_response("tc_1", "score: 6/7"),
        ];

        let wire = messages_to_wire(&messages);
        assert_eq!(wire[0]["content"][1]["type"], "tool_use");
        assert_eq!(wire[0]["content"][1]["name"], "score_lead");
        assert_eq!(wire[1]["content"][0]["type"], "tool_result");
        assert_eq!(wire[1]["content"][0]["tool_use_id"], "tc_1");
    }

    #[test]
    fn test_tools_to_wire_rejects_duplicates() {
        let schema = json!({"type": "object", "properties": {}});
        let tools = vec![
            Tool::new("analyze_lead", "Analyze a lead", schema.clone()),
            Tool::new("analyze_lead", "Analyze a lead", schema),
        ];

        let result = tools_to_wire(&tools);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_response_to_message_mixed_blocks() {
        let response = json!({
            "content": [
                {"type": "text", "text": "Let me pull the trends."},
                {"type": "tool_use", "id": "tc_9", "name": "get_market_trends", "input": {"zip": "78704"}}
            ]
        });

        let message = response_to_message(&response).unwrap();
        assert_eq!(message.content.len(), 2);
        let requests = message.tool_requests();
        assert_eq!(requests[0].id, "tc_9");
        assert_eq!(requests[0].tool_call.name, "get_market_trends");
    }

    #[test]
    fn test_get_usage_totals() {
        let response = json!({"usage": {"input_tokens": 12, "output_tokens": 30}});
        let usage = get_usage(&response);
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(30));
        assert_eq!(usage.total_tokens, Some(42));
    }
}
