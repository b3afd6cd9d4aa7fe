use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// Cloud infrastructure provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HyperscalerType {
    Gcp,
    Azure,
    Aws,
}

impl HyperscalerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HyperscalerType::Gcp => "gcp",
            HyperscalerType::Azure => "azure",
            HyperscalerType::Aws => "aws",
        }
    }
}

impl fmt::Display for HyperscalerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HyperscalerType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcp" => Ok(HyperscalerType::Gcp),
            "azure" => Ok(HyperscalerType::Azure),
            "aws" => Ok(HyperscalerType::Aws),
            _ => Err(ParseEnumError::new("hyperscaler type", s)),
        }
    }
}

/// Named reference to cloud access material held in the credential pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    /// Name of the secret the provisioner uses as target secret
    pub name: String,
    pub hyperscaler_type: HyperscalerType,
    /// Tenant the credential is bound to; `None` while still in the pool
    #[serde(default)]
    pub tenant_name: Option<String>,
}

impl Credential {
    pub fn unassigned(name: impl Into<String>, hyperscaler_type: HyperscalerType) -> Self {
        Self {
            name: name.into(),
            hyperscaler_type,
            tenant_name: None,
        }
    }
}
