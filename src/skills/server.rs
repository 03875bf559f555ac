use async_trait::async_trait;

use crate::errors::SkillResult;
use crate::models::tool::{Tool, ToolCall};

/// A backend service that owns a disjoint set of tools, per the skill
/// registry. One server exists per capability area; the executor is the only
/// caller.
#[async_trait]
pub trait SkillServer: Send + Sync {
    /// The name the registry routes by
    fn name(&self) -> &str;

    /// Resolve the full definition (description and parameter schema) of one
    /// of this server's tools
    async fn describe(&self, tool: &str) -> SkillResult<Tool>;

    /// Execute a tool with the given arguments and return its string result
    async fn call(&self, tool_call: ToolCall) -> SkillResult<String>;
}
