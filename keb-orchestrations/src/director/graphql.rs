use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{console_url_from_runtime, Client, DirectorRuntime, Error, OAuthClient};
use crate::retry::{retry_with_backoff, RetryPolicy};

const RUNTIME_QUERY: &str = r#"
query ($id: ID!) {
  result: runtime(id: $id) { id status { condition } labels }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Payload>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    result: Option<DirectorRuntime>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// GraphQL director client authenticated with OAuth client credentials.
pub struct GraphQlClient {
    http: reqwest::Client,
    url: String,
    oauth: Arc<OAuthClient>,
    retry: RetryPolicy,
}

impl GraphQlClient {
    pub fn new(http: reqwest::Client, url: impl Into<String>, oauth: Arc<OAuthClient>) -> Self {
        Self {
            http,
            url: url.into(),
            oauth,
            retry: RetryPolicy {
                max_attempts: 3,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_runtime(&self, account_id: &str, runtime_id: &str) -> Result<Option<DirectorRuntime>, Error> {
        let token = self.oauth.token().await?;
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(token)
            .header("Tenant", account_id)
            .json(&json!({ "query": RUNTIME_QUERY, "variables": { "id": runtime_id } }))
            .send()
            .await
            .map_err(|e| Error::Temporary(format!("Failed to call director: {}", e)))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.oauth.invalidate().await;
            return Err(Error::Temporary("director rejected the access token".to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::Temporary(format!(
                "director returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let decoded: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| Error::Temporary(format!("Failed to decode director response: {}", e)))?;
        if !decoded.errors.is_empty() {
            let messages: Vec<_> = decoded.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(Error::Temporary(format!(
                "director query failed: {}",
                messages.join("; ")
            )));
        }
        Ok(decoded.data.and_then(|d| d.result))
    }
}

#[async_trait]
impl Client for GraphQlClient {
    async fn get_console_url(&self, account_id: &str, runtime_id: &str) -> Result<String, Error> {
        debug!(account = %account_id, runtime = %runtime_id, "Resolving console URL");
        let runtime = retry_with_backoff(&self.retry, "director_get_runtime", || {
            self.fetch_runtime(account_id, runtime_id)
        })
        .await?;

        console_url_from_runtime(runtime_id, runtime.as_ref())
    }
}
