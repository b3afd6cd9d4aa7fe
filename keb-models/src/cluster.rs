use serde::{Deserialize, Serialize};

use crate::HyperscalerType;

/// Full request body sent to the provisioner for a new runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRuntimeInput {
    pub runtime_input: RuntimeInput,
    pub cluster_config: ClusterConfig,
    pub kyma_config: KymaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeInput {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Provider-specific Gardener cluster specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub kubernetes_version: String,
    pub node_count: i32,
    pub volume_size_gb: i32,
    pub machine_type: String,
    pub region: String,
    pub disk_type: String,
    pub worker_cidr: String,
    pub auto_scaler_min: i32,
    pub auto_scaler_max: i32,
    pub max_surge: i32,
    pub max_unavailable: i32,
    /// Name of the hyperscaler credential assigned to the tenant
    pub target_secret: String,
    pub provider_specific_config: ProviderSpecificConfig,
}

impl ClusterConfig {
    pub fn provider(&self) -> HyperscalerType {
        self.provider_specific_config.provider()
    }
}

/// Exactly one provider sub-config, matching the plan's provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderSpecificConfig {
    #[serde(rename = "azureConfig")]
    Azure(AzureProviderConfig),
    #[serde(rename = "gcpConfig")]
    Gcp(GcpProviderConfig),
    #[serde(rename = "awsConfig")]
    Aws(AwsProviderConfig),
}

impl ProviderSpecificConfig {
    pub fn provider(&self) -> HyperscalerType {
        match self {
            ProviderSpecificConfig::Azure(_) => HyperscalerType::Azure,
            ProviderSpecificConfig::Gcp(_) => HyperscalerType::Gcp,
            ProviderSpecificConfig::Aws(_) => HyperscalerType::Aws,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AzureProviderConfig {
    pub vnet_cidr: String,
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GcpProviderConfig {
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AwsProviderConfig {
    pub zone: String,
    pub vpc_cidr: String,
    pub public_cidr: String,
    pub internal_cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KymaConfig {
    pub version: String,
    pub components: Vec<KymaComponent>,
}

/// One Kyma component installed into the runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KymaComponent {
    pub component: String,
    pub namespace: String,
}

impl KymaComponent {
    pub fn new(component: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            namespace: namespace.into(),
        }
    }
}
