use std::collections::BTreeMap;
use std::path::Path;

use keb_models::{
    AwsProviderConfig, AzureProviderConfig, GcpProviderConfig, HyperscalerType,
    ProviderSpecificConfig,
};
use serde::{Deserialize, Serialize};

use super::Error;

pub const AZURE_PLAN_ID: &str = "4deee563-e5ec-4731-b9b1-53b42d855f0c";
pub const AZURE_PLAN_NAME: &str = "azure";
pub const GCP_PLAN_ID: &str = "ca6e5357-707f-4565-bbbd-b3ab732597c6";
pub const GCP_PLAN_NAME: &str = "gcp";
pub const AWS_PLAN_ID: &str = "361c511f-f939-4621-b228-d0fb79a1fe15";
pub const AWS_PLAN_NAME: &str = "aws";

const DEFAULT_KUBERNETES_VERSION: &str = "1.15.4";

/// One service plan together with the cluster defaults it provisions with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub provider: HyperscalerType,
    pub defaults: ClusterDefaults,
    /// Regions a tenant may pick; empty means any
    #[serde(default)]
    pub regions: Vec<String>,
    /// Machine types a tenant may pick; empty means any
    #[serde(default)]
    pub machine_types: Vec<String>,
}

/// Operator-chosen cluster defaults, never exposed to tenants
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDefaults {
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
    pub provider_config: ProviderSpecificConfig,
}

impl ClusterDefaults {
    fn shared(
        machine_type: &str,
        region: &str,
        disk_type: &str,
        volume_size_gb: i32,
        provider_config: ProviderSpecificConfig,
    ) -> Self {
        Self {
            kubernetes_version: DEFAULT_KUBERNETES_VERSION.to_string(),
            node_count: 3,
            volume_size_gb,
            machine_type: machine_type.to_string(),
            region: region.to_string(),
            disk_type: disk_type.to_string(),
            worker_cidr: "10.250.0.0/19".to_string(),
            auto_scaler_min: 2,
            auto_scaler_max: 4,
            max_surge: 4,
            max_unavailable: 1,
            provider_config,
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Immutable set of plans the broker serves, keyed by plan ID
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: BTreeMap<String, Plan>,
}

impl PlanCatalog {
    pub fn new(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: plans.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Azure, GCP and AWS plans with the standard production defaults.
    pub fn builtin() -> Self {
        Self::new([azure_plan(), gcp_plan(), aws_plan()])
    }

    /// Parse a YAML list of plans.
    pub fn from_yaml(yaml: &str) -> Result<Self, Error> {
        let plans: Vec<Plan> = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse plan catalog: {}", e)))?;
        Ok(Self::new(plans))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    /// Keep only the plans whose name is listed, e.g. `["azure", "gcp"]`.
    pub fn retain_enabled(mut self, names: &[String]) -> Self {
        self.plans.retain(|_, plan| names.iter().any(|n| n == &plan.name));
        self
    }

    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.plans.get(plan_id)
    }

    pub fn plans(&self) -> impl Iterator<Item = &Plan> {
        self.plans.values()
    }
}

fn azure_plan() -> Plan {
    Plan {
        id: AZURE_PLAN_ID.to_string(),
        name: AZURE_PLAN_NAME.to_string(),
        provider: HyperscalerType::Azure,
        defaults: ClusterDefaults::shared(
            "Standard_D8_v3",
            "westeurope",
            "Standard_LRS",
            50,
            ProviderSpecificConfig::Azure(AzureProviderConfig {
                vnet_cidr: "10.250.0.0/19".to_string(),
                zones: strings(&["1", "2", "3"]),
            }),
        ),
        regions: strings(&["eastus", "centralus", "westus2", "uksouth", "northeurope", "westeurope", "japaneast", "southeastasia"]),
        machine_types: strings(&["Standard_D8_v3", "Standard_D4_v3", "Standard_D16_v3"]),
    }
}

fn gcp_plan() -> Plan {
    Plan {
        id: GCP_PLAN_ID.to_string(),
        name: GCP_PLAN_NAME.to_string(),
        provider: HyperscalerType::Gcp,
        defaults: ClusterDefaults::shared(
            "n1-standard-4",
            "europe-west4",
            "pd-standard",
            30,
            ProviderSpecificConfig::Gcp(GcpProviderConfig {
                zones: strings(&["europe-west4-a", "europe-west4-b", "europe-west4-c"]),
            }),
        ),
        regions: strings(&["asia-south1", "asia-northeast1", "europe-west3", "europe-west4", "us-central1", "us-east4"]),
        machine_types: strings(&["n1-standard-2", "n1-standard-4", "n1-standard-8", "n1-standard-16"]),
    }
}

fn aws_plan() -> Plan {
    Plan {
        id: AWS_PLAN_ID.to_string(),
        name: AWS_PLAN_NAME.to_string(),
        provider: HyperscalerType::Aws,
        defaults: ClusterDefaults::shared(
            "m5.2xlarge",
            "eu-central-1",
            "gp2",
            50,
            ProviderSpecificConfig::Aws(AwsProviderConfig {
                zone: "eu-central-1a".to_string(),
                vpc_cidr: "10.250.0.0/16".to_string(),
                public_cidr: "10.250.32.0/20".to_string(),
                internal_cidr: "10.250.48.0/20".to_string(),
            }),
        ),
        regions: strings(&["eu-central-1", "eu-west-1", "us-east-1", "us-west-2", "ap-northeast-1"]),
        machine_types: strings(&["m5.xlarge", "m5.2xlarge", "m5.4xlarge"]),
    }
}
