use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{ContextEnhancer, MemoryStore};
use crate::executor::ToolExecutor;
use crate::metrics::{EngineMetrics, MetricsSnapshot};
use crate::models::content::ToolRequest;
use crate::models::message::Message;
use crate::models::request::{Request, TaskType};
use crate::models::response::Response;
use crate::parser;
use crate::persona;
use crate::providers::base::{ModelParams, ModelProvider, ProviderError, Usage};
use crate::registry::{Category, SkillRegistry};
use crate::skills::SkillServer;
use crate::sync::{CrmClient, SideEffectSync};

/// Hard bound on model calls per request. The loop exits earlier whenever a
/// reply carries no tool invocations.
pub const MAX_TURNS: usize = 5;

/// The engine. Holds the skill registry, context enhancer, model provider,
/// and CRM synchronizer; constructed explicitly so callers can run isolated
/// configurations side by side.
pub struct Orchestrator {
    provider: Arc<dyn ModelProvider>,
    registry: Arc<SkillRegistry>,
    executor: ToolExecutor,
    enhancer: ContextEnhancer,
    synchronizer: Arc<SideEffectSync>,
    metrics: Arc<EngineMetrics>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        registry: Arc<SkillRegistry>,
        servers: Vec<Arc<dyn SkillServer>>,
        memory: Arc<dyn MemoryStore>,
        crm: Arc<dyn CrmClient>,
    ) -> Self {
        let executor = ToolExecutor::new(Arc::clone(&registry), servers);
        Self {
            provider,
            registry,
            executor,
            enhancer: ContextEnhancer::new(memory),
            synchronizer: Arc::new(SideEffectSync::new(crm)),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The single caller-facing entry point. Never returns an error: every
    /// failure path terminates in a normally-shaped Response, flagged in its
    /// metadata when degraded.
    pub async fn process_request(&self, request: Request) -> Response {
        let request_id = Uuid::new_v4();
        let started = Instant::now();
        debug!(%request_id, task = ?request.task_type, "processing request");

        match self.run(&request).await {
            Ok(mut response) => {
                let elapsed = started.elapsed().as_millis() as u64;
                response.response_time_ms = elapsed;
                self.metrics.record_success(elapsed);
                response
            }
            Err(err) => {
                self.metrics.record_failure();

                if err.is_authentication() {
                    info!(%request_id, task = ?request.task_type, "model credential rejected, serving demo fallback");
                    return demo_fallback_response(request.task_type);
                }

                warn!(%request_id, task = ?request.task_type, error = %err, "request failed");
                let mut response =
                    Response::with_content(format!("Error processing request: {err}"));
                response.metadata.insert("error".to_string(), json!(true));
                response
                    .metadata
                    .insert("error_type".to_string(), json!(error_kind(&err)));
                response.response_time_ms = started.elapsed().as_millis() as u64;
                response
            }
        }
    }

    async fn run(&self, request: &Request) -> Result<Response, ProviderError> {
        let base_system = persona::system_prompt_for(request.task_type);
        let params = ModelParams {
            model: request.options.model.clone(),
            max_tokens: request.options.max_tokens,
            temperature: Some(request.options.temperature),
            complexity: persona::complexity_for(request.task_type),
        };

        let enhanced = self.enhancer.enhance(&request.context).await;
        let full_prompt = build_prompt(&request.prompt, &enhanced);

        let tools = if request.options.use_tools {
            self.executor
                .definitions_for(request.options.allowed_categories.as_deref())
                .await
        } else {
            Vec::new()
        };

        // Sync is keyed by the id the caller submitted, not the enhanced copy
        let subject_id = ContextEnhancer::subject_id(&request.context).map(str::to_string);

        let mut messages = vec![Message::user().with_text(full_prompt)];
        let mut trace: Vec<Value> = Vec::new();
        let mut handoff: Option<Category> = None;
        let mut turns = 0;

        let (reply, usage): (Message, Usage) = loop {
            let system = match handoff.take() {
                Some(category) => format!("{base_system}{}", persona::handoff_suffix(category)),
                None => base_system.to_string(),
            };

            let (reply, usage) = self
                .provider
                .complete(&system, &messages, &tools, &params)
                .await?;
            turns += 1;

            let requests: Vec<ToolRequest> =
                reply.tool_requests().into_iter().cloned().collect();
            messages.push(reply.clone());

            if requests.is_empty() {
                // No more tools to call, this is the final answer
                break (reply, usage);
            }

            debug!(turn = turns, tool_calls = requests.len(), "executing tool round");
            trace.push(serde_json::to_value(&reply).unwrap_or(Value::Null));

            let outputs = join_all(
                requests
                    .iter()
                    .map(|tool_request| self.executor.execute(&tool_request.tool_call)),
            )
            .await;

            let mut results = Message::user();
            for (tool_request, output) in requests.iter().zip(outputs) {
                let category = self.registry.category_for_tool(&tool_request.tool_call.name);
                if category == Some(Category::Action) {
                    self.synchronizer.spawn(
                        tool_request.tool_call.name.clone(),
                        tool_request.tool_call.arguments.clone(),
                        output.clone(),
                        subject_id.clone(),
                    );
                }
                results = results.with_tool_response(tool_request.id.clone(), output);
            }

            trace.push(serde_json::to_value(&results).unwrap_or(Value::Null));
            messages.push(results);

            // the next turn's persona follows the last tool used this turn
            handoff = requests
                .last()
                .and_then(|tool_request| {
                    self.registry.category_for_tool(&tool_request.tool_call.name)
                });

            if turns == MAX_TURNS {
                warn!(task = ?request.task_type, "turn bound reached with tool calls still pending");
                break (reply, usage);
            }
        };

        let content = reply.text();
        let mut response = parser::parse_response(&content, request.task_type);
        response.input_tokens = usage.input_tokens;
        response.output_tokens = usage.output_tokens;
        response.model = Some(params.model.clone());
        response.provider = Some(self.provider.name().to_string());
        if !trace.is_empty() {
            response
                .metadata
                .insert("tool_executions".to_string(), Value::Array(trace));
        }

        Ok(response)
    }
}

fn error_kind(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::Authentication(_) => "authentication",
        ProviderError::Api(_) => "api",
        ProviderError::Http(_) => "http",
    }
}

fn build_prompt(base_prompt: &str, context: &Map<String, Value>) -> String {
    let context_json = serde_json::to_string_pretty(&Value::Object(context.clone()))
        .unwrap_or_else(|_| "{}".to_string());
    format!(
        "{base_prompt}\n\nContext:\n{context_json}\n\nCurrent Time: {}\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S")
    )
}

/// Canned responses served when the model backend rejects credentials, so the
/// caller still gets an answerable message instead of a hard error
fn demo_fallback_response(task_type: TaskType) -> Response {
    let content = match task_type {
        TaskType::ChatQuery => {
            "Simulated intelligence mode is active because no valid model credential was \
             detected. Based on your pipeline, focus on the listing cluster where engagement \
             is peaking."
        }
        TaskType::LeadAnalysis => {
            "Strategic analysis (simulated): this lead shows high data-driven intent. \
             Prioritize neighborhood statistics and commute metrics in the next outreach."
        }
        TaskType::ReportSynthesis => {
            "Executive summary (simulated): the pipeline is performing above target and \
             conversion velocity is trending up."
        }
        TaskType::ScriptGeneration => {
            "Simulated SMS: 'Hi! I noticed you were browsing recent listings. I put together \
             a custom market update for that area. Want me to send it over?'"
        }
        _ => "Simulated intelligence active. The engine is running in offline demo mode.",
    };

    let mut response = Response::with_content(content);
    response.metadata.insert("demo_mode".to_string(), json!(true));
    response
        .metadata
        .insert("reason".to_string(), json!("auth_failure"));
    response.input_tokens = Some(0);
    response.output_tokens = Some(0);
    response.model = Some("simulated-model".to_string());
    response.provider = Some("simulated".to_string());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SkillResult;
    use crate::models::request::RequestOptions;
    use crate::models::tool::{Tool, ToolCall};
    use crate::providers::mock::MockProvider;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct StubServer {
        name: &'static str,
    }

    #[async_trait]
    impl SkillServer for StubServer {
        fn name(&self) -> &str {
            self.name
        }

        async fn describe(&self, tool: &str) -> SkillResult<Tool> {
            Ok(Tool::new(tool, "stub tool", json!({"type": "object", "properties": {}})))
        }

        async fn call(&self, tool_call: ToolCall) -> SkillResult<String> {
            Ok(format!("{} completed", tool_call.name))
        }
    }

    #[derive(Default)]
    struct RecordingCrm {
        writes: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl CrmClient for RecordingCrm {
        async fn update_custom_field(
            &self,
            contact_id: &str,
            field_id: &str,
            value: &str,
        ) -> anyhow::Result<()> {
            self.writes.lock().unwrap().push((
                contact_id.to_string(),
                field_id.to_string(),
                value.to_string(),
            ));
            Ok(())
        }
    }

    struct EmptyMemory;

    #[async_trait]
    impl MemoryStore for EmptyMemory {
        async fn get_context(&self, _subject_id: &str) -> anyhow::Result<Value> {
            Ok(json!({}))
        }
    }

    fn test_registry() -> Arc<SkillRegistry> {
        Arc::new(SkillRegistry::from_entries([
            ("generate_lead_outreach_script", Category::Action, "engagement"),
            ("analyze_lead", Category::Analysis, "lead-intelligence"),
        ]))
    }

    fn engine_with(
        provider: Arc<MockProvider>,
        crm: Arc<RecordingCrm>,
    ) -> Orchestrator {
        let servers: Vec<Arc<dyn SkillServer>> = vec![
            Arc::new(StubServer { name: "engagement" }),
            Arc::new(StubServer {
                name: "lead-intelligence",
            }),
        ];
        Orchestrator::new(provider, test_registry(), servers, Arc::new(EmptyMemory), crm)
    }

    fn tool_request_reply(id: &str, tool: &str) -> Message {
        Message::assistant().with_tool_request(id, ToolCall::new(tool, json!({"channel": "sms"})))
    }

    fn tooled_request() -> Request {
        Request::new(TaskType::ChatQuery, "Reach out to this lead")
            .with_context_value("lead_id", json!("lead_77"))
            .with_options(RequestOptions {
                use_tools: true,
                ..Default::default()
            })
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn test_simple_response_without_tools() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("The pipeline looks healthy."),
        ]));
        let engine = engine_with(provider.clone(), Arc::new(RecordingCrm::default()));

        let response = engine
            .process_request(Request::new(TaskType::ChatQuery, "How is the pipeline?"))
            .await;

        assert_eq!(response.content, "The pipeline looks healthy.");
        assert_eq!(response.provider.as_deref(), Some("mock"));
        assert!(!response.metadata.contains_key("tool_executions"));
        assert!(!response.is_error());
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_action_tool_schedules_one_sync_and_traces_two_messages() {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request_reply("tc_1", "generate_lead_outreach_script"),
            Message::assistant().with_text("Here is your script."),
        ]));
        let crm = Arc::new(RecordingCrm::default());
        let engine = engine_with(provider, crm.clone());

        let response = engine.process_request(tooled_request()).await;

        assert_eq!(response.content, "Here is your script.");
        let trace = response.metadata["tool_executions"].as_array().unwrap();
        assert_eq!(trace.len(), 2);

        wait_for(|| crm.writes.lock().unwrap().len() == 1).await;
        let writes = crm.writes.lock().unwrap();
        assert_eq!(writes[0].0, "lead_77");
        assert_eq!(writes[0].1, "ai_outreach_script");
        assert_eq!(writes[0].2, "generate_lead_outreach_script completed");
    }

    #[tokio::test]
    async fn test_non_action_tool_does_not_sync() {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request_reply("tc_1", "analyze_lead"),
            Message::assistant().with_text("Done."),
        ]));
        let crm = Arc::new(RecordingCrm::default());
        let engine = engine_with(provider, crm.clone());

        engine.process_request(tooled_request()).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(crm.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_loop_terminates_at_turn_bound() {
        // the model asks for a tool on every turn; the engine must stop at 5 calls
        let replies = (0..10)
            .map(|i| tool_request_reply(&format!("tc_{i}"), "analyze_lead"))
            .collect();
        let provider = Arc::new(MockProvider::new(replies));
        let engine = engine_with(provider.clone(), Arc::new(RecordingCrm::default()));

        let response = engine.process_request(tooled_request()).await;

        assert_eq!(provider.remaining(), 10 - MAX_TURNS);
        // every turn requested tools, so the trace holds five rounds of two messages
        let trace = response.metadata["tool_executions"].as_array().unwrap();
        assert_eq!(trace.len(), MAX_TURNS * 2);
    }

    #[tokio::test]
    async fn test_handoff_suffix_applies_to_following_turn_only() {
        let provider = Arc::new(MockProvider::new(vec![
            tool_request_reply("tc_1", "analyze_lead"),
            tool_request_reply("tc_2", "generate_lead_outreach_script"),
            Message::assistant().with_text("All set."),
        ]));
        let engine = engine_with(provider.clone(), Arc::new(RecordingCrm::default()));

        engine.process_request(tooled_request()).await;

        let systems = provider.seen_systems();
        assert_eq!(systems.len(), 3);
        assert!(!systems[0].contains("[SPECIALIST HANDOFF]"));
        assert!(systems[1].contains("Deep Intelligence Analyst"));
        assert!(systems[2].contains("Sales Execution Specialist"));
        assert!(!systems[2].contains("Deep Intelligence Analyst"));
    }

    #[tokio::test]
    async fn test_tool_failure_feeds_error_string_back() {
        struct FailingServer;

        #[async_trait]
        impl SkillServer for FailingServer {
            fn name(&self) -> &str {
                "lead-intelligence"
            }
            async fn describe(&self, tool: &str) -> SkillResult<Tool> {
                Ok(Tool::new(tool, "stub", json!({})))
            }
            async fn call(&self, _tool_call: ToolCall) -> SkillResult<String> {
                Err(crate::errors::SkillError::Execution("backend down".to_string()))
            }
        }

        let provider = Arc::new(MockProvider::new(vec![
            tool_request_reply("tc_1", "analyze_lead"),
            Message::assistant().with_text("Understood, moving on."),
        ]));
        let servers: Vec<Arc<dyn SkillServer>> = vec![Arc::new(FailingServer)];
        let engine = Orchestrator::new(
            provider,
            test_registry(),
            servers,
            Arc::new(EmptyMemory),
            Arc::new(RecordingCrm::default()),
        );

        let response = engine.process_request(tooled_request()).await;

        // the loop did not abort; the error went back to the model as a result
        assert_eq!(response.content, "Understood, moving on.");
        let trace = response.metadata["tool_executions"].as_array().unwrap();
        let result_text = trace[1]["content"][0]["content"].as_str().unwrap();
        assert!(result_text.contains("Error executing tool analyze_lead"));
        assert!(!response.is_error());
    }

    #[tokio::test]
    async fn test_auth_failure_serves_demo_fallback() {
        let provider = Arc::new(MockProvider::with_replies(vec![Err(
            ProviderError::Authentication("invalid x-api-key".to_string()),
        )]));
        let engine = engine_with(provider, Arc::new(RecordingCrm::default()));

        let response = engine
            .process_request(Request::new(TaskType::ChatQuery, "hello"))
            .await;

        assert!(response.is_demo_mode());
        assert!(!response.content.is_empty());
        assert_eq!(response.provider.as_deref(), Some("simulated"));
        assert_eq!(engine.metrics().errors, 1);
    }

    #[tokio::test]
    async fn test_generic_failure_surfaces_as_error_response() {
        let provider = Arc::new(MockProvider::with_replies(vec![Err(ProviderError::Api(
            "upstream exploded".to_string(),
        ))]));
        let engine = engine_with(provider, Arc::new(RecordingCrm::default()));

        let response = engine
            .process_request(Request::new(TaskType::ChatQuery, "hello"))
            .await;

        assert!(response.is_error());
        assert!(response.content.contains("upstream exploded"));
        assert!(!response.is_demo_mode());
        assert_eq!(engine.metrics().errors, 1);
    }

    #[tokio::test]
    async fn test_metrics_track_successes() {
        let provider = Arc::new(MockProvider::new(vec![
            Message::assistant().with_text("ok"),
            Message::assistant().with_text("ok"),
        ]));
        let engine = engine_with(provider, Arc::new(RecordingCrm::default()));

        engine
            .process_request(Request::new(TaskType::ChatQuery, "one"))
            .await;
        engine
            .process_request(Request::new(TaskType::ChatQuery, "two"))
            .await;

        let snapshot = engine.metrics();
        assert_eq!(snapshot.requests_processed, 2);
        assert_eq!(snapshot.errors, 0);
    }

    #[test]
    fn test_build_prompt_embeds_context_and_timestamp() {
        let mut context = Map::new();
        context.insert("lead_id".to_string(), json!("lead_1"));

        let prompt = build_prompt("Analyze this lead", &context);
        assert!(prompt.starts_with("Analyze this lead"));
        assert!(prompt.contains("\"lead_id\": \"lead_1\""));
        assert!(prompt.contains("Current Time:"));
    }

    #[test]
    fn test_demo_fallback_varies_by_task() {
        let chat = demo_fallback_response(TaskType::ChatQuery);
        let research = demo_fallback_response(TaskType::ResearchQuery);
        assert_ne!(chat.content, research.content);
        assert!(chat.is_demo_mode());
        assert_eq!(chat.input_tokens, Some(0));
    }
}
