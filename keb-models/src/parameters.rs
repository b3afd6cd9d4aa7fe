use serde::{Deserialize, Serialize};

/// Immutable snapshot of an accepted provisioning request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningParameters {
    pub plan_id: String,
    pub service_id: String,
    pub ers_context: ErsContext,
    pub parameters: ProvisioningParametersDto,
}

/// Tenant-supplied parameters; every optional field left unset keeps the plan default
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningParametersDto {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size_gb: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zones: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaler_min: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_scaler_max: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_surge: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_unavailable: Option<i32>,
    /// Optional components the tenant wants to keep installed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kyma_version: Option<String>,
}

/// Context forwarded by the account service on every broker call
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErsContext {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub subaccount_id: String,
    #[serde(default)]
    pub globalaccount_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sm_platform_credentials: Option<SmPlatformCredentials>,
}

/// Service manager override supplied by the platform
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmPlatformCredentials {
    pub url: String,
    pub credentials: SmCredentials,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmCredentials {
    pub basic: SmBasicCredentials,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmBasicCredentials {
    pub username: String,
    pub password: String,
}
