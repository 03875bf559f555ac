use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::errors::{SkillError, SkillResult};
use crate::models::tool::{Tool, ToolCall};
use crate::registry::{Category, SkillRegistry};
use crate::skills::SkillServer;

/// Routes each tool call to the skill server the registry names for it. This
/// is the sole point of contact with skill servers; failures are flattened to
/// error strings at this boundary so the turn loop never aborts on a tool.
pub struct ToolExecutor {
    registry: Arc<SkillRegistry>,
    servers: HashMap<String, Arc<dyn SkillServer>>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<SkillRegistry>, servers: Vec<Arc<dyn SkillServer>>) -> Self {
        let servers = servers
            .into_iter()
            .map(|server| (server.name().to_string(), server))
            .collect();
        Self { registry, servers }
    }

    /// Execute a single tool call. The returned string is either the tool's
    /// result or a descriptive error the model can react to on the next turn.
    pub async fn execute(&self, tool_call: &ToolCall) -> String {
        match self.try_execute(tool_call).await {
            Ok(result) => result,
            Err(SkillError::ToolNotFound(name)) | Err(SkillError::UnknownServer(name)) => {
                format!("Error: tool {} not found or no server mapped", name)
            }
            Err(err) => format!("Error executing tool {}: {}", tool_call.name, err),
        }
    }

    async fn try_execute(&self, tool_call: &ToolCall) -> SkillResult<String> {
        let server_name = self
            .registry
            .server_for_tool(&tool_call.name)
            .ok_or_else(|| SkillError::ToolNotFound(tool_call.name.clone()))?;

        let server = self
            .servers
            .get(server_name)
            .ok_or_else(|| SkillError::UnknownServer(tool_call.name.clone()))?;

        server.call(tool_call.clone()).await
    }

    /// Gather tool definitions for the requested categories (all when
    /// unrestricted), resolving each definition from its owning server.
    /// Tools whose definition cannot be resolved are skipped with a warning.
    pub async fn definitions_for(&self, categories: Option<&[Category]>) -> Vec<Tool> {
        let names: Vec<&str> = match categories {
            Some(categories) => categories
                .iter()
                .flat_map(|category| self.registry.tools_for_category(*category))
                .collect(),
            None => self.registry.all_tools(),
        };

        let mut tools = Vec::new();
        for name in names {
            let Some(server_name) = self.registry.server_for_tool(name) else {
                continue;
            };
            let Some(server) = self.servers.get(server_name) else {
                warn!(tool = name, server = server_name, "skill server not attached");
                continue;
            };
            match server.describe(name).await {
                Ok(tool) => tools.push(tool),
                Err(err) => {
                    warn!(tool = name, server = server_name, error = %err, "failed to load tool definition");
                }
            }
        }

        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    struct EchoServer {
        name: String,
    }

    #[async_trait]
    impl SkillServer for EchoServer {
        fn name(&self) -> &str {
            &self.name
        }

        async fn describe(&self, tool: &str) -> SkillResult<Tool> {
            Ok(Tool::new(
                tool,
                "Echoes back the input",
                json!({"type": "object", "properties": {"message": {"type": "string"}}}),
            ))
        }

        async fn call(&self, tool_call: ToolCall) -> SkillResult<String> {
            match tool_call.name.as_str() {
                "echo" => Ok(tool_call.arguments["message"]
                    .as_str()
                    .unwrap_or("")
                    .to_string()),
                other => Err(SkillError::Execution(format!("{other} is broken"))),
            }
        }
    }

    fn executor() -> ToolExecutor {
        let registry = Arc::new(SkillRegistry::from_entries([
            ("echo", Category::Analysis, "echo-server"),
            ("broken", Category::Action, "echo-server"),
            ("orphaned", Category::Action, "missing-server"),
        ]));
        let servers: Vec<Arc<dyn SkillServer>> = vec![Arc::new(EchoServer {
            name: "echo-server".to_string(),
        })];
        ToolExecutor::new(registry, servers)
    }

    #[tokio::test]
    async fn test_execute_routes_to_owning_server() {
        let result = executor()
            .execute(&ToolCall::new("echo", json!({"message": "hi"})))
            .await;
        assert_eq!(result, "hi");
    }

    #[tokio::test]
    async fn test_unregistered_tool_returns_error_string() {
        let result = executor()
            .execute(&ToolCall::new("send_fax", json!({})))
            .await;
        assert!(result.starts_with("Error: tool send_fax not found"));
    }

    #[tokio::test]
    async fn test_unattached_server_returns_error_string() {
        let result = executor()
            .execute(&ToolCall::new("orphaned", json!({})))
            .await;
        assert!(result.starts_with("Error: tool orphaned not found"));
    }

    #[tokio::test]
    async fn test_server_failure_becomes_error_string() {
        let result = executor()
            .execute(&ToolCall::new("broken", json!({})))
            .await;
        assert!(result.starts_with("Error executing tool broken:"));
    }

    #[tokio::test]
    async fn test_definitions_filtered_by_category() {
        let executor = executor();
        let all = executor.definitions_for(None).await;
        // orphaned has no attached server, so only the echo-server tools resolve
        assert_eq!(all.len(), 2);

        let analysis_only = executor
            .definitions_for(Some(&[Category::Analysis]))
            .await;
        assert_eq!(analysis_only.len(), 1);
        assert_eq!(analysis_only[0].name, "echo");
    }
}
