use serde::{Deserialize, Serialize};

/// Operation state as reported by the provisioner
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteOperationState {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    /// Any state this broker does not know yet; treated as no transition
    #[serde(other)]
    Unknown,
}

/// Result of polling a provisioner operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OperationStatus {
    #[serde(default)]
    pub id: Option<String>,
    pub state: RemoteOperationState,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub runtime_id: Option<String>,
}

/// Snapshot of a runtime as known to the provisioner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeStatus {
    /// Cluster configuration as reported back by Gardener
    #[serde(default)]
    pub cluster_config: Option<serde_json::Value>,
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub connection_status: Option<String>,
}
