use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broker-visible state of an operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum OperationState {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "succeeded")]
    Succeeded,
    #[serde(rename = "failed")]
    Failed,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Pending => "pending",
            OperationState::InProgress => "in progress",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        }
    }

    /// Succeeded and Failed are final; nothing moves an operation out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Succeeded | OperationState::Failed)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationState {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OperationState::Pending),
            "in progress" => Ok(OperationState::InProgress),
            "succeeded" => Ok(OperationState::Succeeded),
            "failed" => Ok(OperationState::Failed),
            other => Err(ParseEnumError::new("operation state", other)),
        }
    }
}

/// Lifecycle direction of an operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Provision,
    Deprovision,
    Upgrade,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Provision => "provision",
            OperationType::Deprovision => "deprovision",
            OperationType::Upgrade => "upgrade",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "provision" => Ok(OperationType::Provision),
            "deprovision" => Ok(OperationType::Deprovision),
            "upgrade" => Ok(OperationType::Upgrade),
            other => Err(ParseEnumError::new("operation type", other)),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// One tenant-owned runtime lifecycle record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub global_account_id: String,
    pub sub_account_id: String,
    /// Assigned by the provisioner once the runtime has been requested
    pub runtime_id: Option<String>,
    /// Empty until the console URL has been resolved
    pub dashboard_url: String,
    /// JSON snapshot of the accepted [`crate::ProvisioningParameters`]
    pub provisioning_parameters: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency token, bumped by every successful update
    pub version: i32,
}

/// One asynchronous unit of provisioning, deprovisioning or upgrade work
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Operation {
    pub id: String,
    pub instance_id: String,
    pub kind: OperationType,
    pub state: OperationState,
    /// Last known human-readable message
    pub description: String,
    /// Operation ID returned by the provisioner
    pub provisioner_operation_id: Option<String>,
    pub runtime_id: Option<String>,
    /// JSON snapshot of the accepted [`crate::ProvisioningParameters`]
    pub provisioning_parameters: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: i32,
}

impl Operation {
    /// Build a fresh operation stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        instance_id: impl Into<String>,
        kind: OperationType,
        state: OperationState,
        description: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            instance_id: instance_id.into(),
            kind,
            state,
            description: description.into(),
            provisioner_operation_id: None,
            runtime_id: None,
            provisioning_parameters: String::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}
