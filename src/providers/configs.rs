use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub host: String,
    pub api_key: String,
}

impl AnthropicConfig {
    pub fn new<H: Into<String>, K: Into<String>>(host: H, api_key: K) -> Self {
        Self {
            host: host.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key =
            std::env::var("ANTHROPIC_API_KEY").context("ANTHROPIC_API_KEY is not set")?;
        let host = std::env::var("ANTHROPIC_HOST")
            .unwrap_or_else(|_| "https://api.anthropic.com".to_string());
        Ok(Self { host, api_key })
    }
}
