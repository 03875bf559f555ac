use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::base::{ModelParams, ModelProvider, ProviderError, Usage};
use crate::models::message::Message;
use crate::models::tool::Tool;

/// A mock provider that returns pre-configured replies for testing. Records
/// the system prompt of every call so tests can assert on persona handoff.
pub struct MockProvider {
    replies: Mutex<VecDeque<Result<Message, ProviderError>>>,
    seen_systems: Mutex<Vec<String>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            replies: Mutex::new(responses.into_iter().map(Ok).collect()),
            seen_systems: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock provider with explicit success/failure outcomes per call
    pub fn with_replies(replies: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen_systems: Mutex::new(Vec::new()),
        }
    }

    /// Replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    /// System prompts observed so far, one per completed call
    pub fn seen_systems(&self) -> Vec<String> {
        self.seen_systems.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(
        &self,
        system: &str,
        _messages: &[Message],
        _tools: &[Tool],
        _params: &ModelParams,
    ) -> Result<(Message, Usage), ProviderError> {
        self.seen_systems.lock().unwrap().push(system.to_string());

        let mut replies = self.replies.lock().unwrap();
        match replies.pop_front() {
            Some(Ok(message)) => Ok((message, Usage::default())),
            Some(Err(err)) => Err(err),
            // Return empty response if no more pre-configured replies
            None => Ok((Message::assistant().with_text(""), Usage::default())),
        }
    }
}
