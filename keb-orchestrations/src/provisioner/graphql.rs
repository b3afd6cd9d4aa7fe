use async_trait::async_trait;
use keb_models::{OperationStatus, ProvisionRuntimeInput, RuntimeStatus};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{Client, Error, ProvisionedRuntime};
use crate::retry::{retry_with_backoff, RetryPolicy};

const PROVISION_RUNTIME: &str = r#"
mutation ($config: ProvisionRuntimeInput!) {
  result: provisionRuntime(config: $config) { id runtimeId: runtimeID }
}"#;

const DEPROVISION_RUNTIME: &str = r#"
mutation ($id: String!) {
  result: deprovisionRuntime(id: $id)
}"#;

const UPGRADE_RUNTIME: &str = r#"
mutation ($id: String!, $config: UpgradeRuntimeInput!) {
  result: upgradeRuntime(id: $id, config: $config) { id }
}"#;

const RUNTIME_OPERATION_STATUS: &str = r#"
query ($id: String!) {
  result: runtimeOperationStatus(id: $id) { id state message runtimeId: runtimeID }
}"#;

const RUNTIME_STATUS: &str = r#"
query ($id: String!) {
  result: runtimeStatus(id: $id) {
    runtimeConnectionStatus { status }
    runtimeConfiguration { clusterConfig kubeconfig }
  }
}"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<Payload<T>>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct Payload<T> {
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    extensions: Option<Value>,
}

impl GraphQlError {
    fn is_conflict(&self) -> bool {
        match self.extensions.as_ref().and_then(|e| e.get("code")) {
            Some(Value::Number(code)) => code.as_u64() == Some(409),
            Some(Value::String(code)) => code.eq_ignore_ascii_case("conflict"),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProvisionResult {
    id: Option<String>,
    runtime_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpgradeResult {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeStatusResult {
    runtime_connection_status: Option<ConnectionStatus>,
    runtime_configuration: Option<RuntimeConfiguration>,
}

#[derive(Debug, Deserialize)]
struct ConnectionStatus {
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeConfiguration {
    cluster_config: Option<Value>,
    kubeconfig: Option<String>,
}

/// Turn a decoded GraphQL response into the call's result.
fn into_result<T>(response: GraphQlResponse<T>) -> Result<T, Error> {
    if let Some(conflict) = response.errors.iter().find(|e| e.is_conflict()) {
        return Err(Error::Conflict(conflict.message.clone()));
    }
    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(Error::Application(messages.join("; ")));
    }
    response
        .data
        .and_then(|d| d.result)
        .ok_or_else(|| Error::Decode("response has no data".to_string()))
}

/// GraphQL-over-HTTP provisioner client. Every call carries the tenant in the `Tenant` header.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
    dump_requests: bool,
}

impl GraphQlClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            retry: RetryPolicy::default(),
            dump_requests: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Log every request body at debug level.
    pub fn with_request_dump(mut self, enabled: bool) -> Self {
        self.dump_requests = enabled;
        self
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: &str,
        tenant: &str,
        query: &str,
        variables: Value,
    ) -> Result<T, Error> {
        let body = json!({ "query": query, "variables": variables });
        if self.dump_requests {
            debug!(operation = %operation, tenant = %tenant, body = %body, "Provisioner request");
        }

        retry_with_backoff(&self.retry, operation, || self.send(tenant, &body)).await
    }

    async fn send<T: DeserializeOwned>(&self, tenant: &str, body: &Value) -> Result<T, Error> {
        let response = self
            .http
            .post(&self.url)
            .header("Tenant", tenant)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Server {
                status: status.as_u16(),
                message,
            });
        }
        if status == StatusCode::CONFLICT {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Conflict(message));
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Application(format!("HTTP {}: {}", status.as_u16(), message)));
        }

        let decoded: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| Error::Decode(e.to_string()))?;
        into_result(decoded)
    }
}

#[async_trait]
impl Client for GraphQlClient {
    async fn provision_runtime(
        &self,
        tenant: &str,
        input: &ProvisionRuntimeInput,
    ) -> Result<ProvisionedRuntime, Error> {
        let result: ProvisionResult = self
            .execute("provision_runtime", tenant, PROVISION_RUNTIME, json!({ "config": input }))
            .await?;

        match (result.id, result.runtime_id) {
            (Some(operation_id), Some(runtime_id)) => Ok(ProvisionedRuntime {
                operation_id,
                runtime_id,
            }),
            _ => Err(Error::Decode(
                "provisionRuntime returned no operation or runtime ID".to_string(),
            )),
        }
    }

    async fn deprovision_runtime(&self, tenant: &str, runtime_id: &str) -> Result<String, Error> {
        self.execute("deprovision_runtime", tenant, DEPROVISION_RUNTIME, json!({ "id": runtime_id }))
            .await
    }

    async fn upgrade_runtime(
        &self,
        tenant: &str,
        runtime_id: &str,
        input: &ProvisionRuntimeInput,
    ) -> Result<String, Error> {
        let result: UpgradeResult = self
            .execute(
                "upgrade_runtime",
                tenant,
                UPGRADE_RUNTIME,
                json!({ "id": runtime_id, "config": { "kymaConfig": input.kyma_config } }),
            )
            .await?;

        result
            .id
            .ok_or_else(|| Error::Decode("upgradeRuntime returned no operation ID".to_string()))
    }

    async fn runtime_operation_status(
        &self,
        tenant: &str,
        operation_id: &str,
    ) -> Result<OperationStatus, Error> {
        self.execute(
            "runtime_operation_status",
            tenant,
            RUNTIME_OPERATION_STATUS,
            json!({ "id": operation_id }),
        )
        .await
    }

    async fn runtime_status(&self, tenant: &str, runtime_id: &str) -> Result<RuntimeStatus, Error> {
        let result: RuntimeStatusResult = self
            .execute("runtime_status", tenant, RUNTIME_STATUS, json!({ "id": runtime_id }))
            .await?;

        let configuration = result.runtime_configuration;
        Ok(RuntimeStatus {
            cluster_config: configuration.as_ref().and_then(|c| c.cluster_config.clone()),
            kubeconfig: configuration.and_then(|c| c.kubeconfig),
            connection_status: result.runtime_connection_status.and_then(|s| s.status),
        })
    }
}
