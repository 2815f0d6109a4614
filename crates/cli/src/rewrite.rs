use crate::config::ApiConfig;
use crate::prompt::RefactorPrompt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// Produces rewritten SQL for a prompt
#[async_trait]
pub trait RewriteService: Send + Sync {
    async fn rewrite(&self, prompt: &RefactorPrompt) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct RewriteResponse {
    refactored_sql: Option<String>,
}

/// JSON-over-HTTP rewrite service with bearer authentication
pub struct HttpRewriteClient {
    client: Client,
    endpoint: String,
    key: String,
}

impl HttpRewriteClient {
    pub fn new(api: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(api.timeout())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: api.endpoint.clone(),
            key: api.key.clone(),
        })
    }
}

#[async_trait]
impl RewriteService for HttpRewriteClient {
    async fn rewrite(&self, prompt: &RefactorPrompt) -> Result<String> {
        let endpoint = &self.endpoint;
        let response: RewriteResponse = self
            .client
            .post(endpoint)
            .bearer_auth(&self.key)
            .json(prompt)
            .send()
            .await
            .with_context(|| format!("Rewrite request failed: POST {endpoint}"))?
            .error_for_status()
            .with_context(|| format!("Rewrite request failed: POST {endpoint}"))?
            .json()
            .await
            .with_context(|| format!("Invalid rewrite response from {endpoint}"))?;

        let sql = response.refactored_sql.unwrap_or_else(|| {
            log::warn!("{endpoint} returned no refactored_sql, keeping the original");
            prompt.sql.clone()
        });
        Ok(sql.trim().to_string())
    }
}
