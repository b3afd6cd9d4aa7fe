//! Cluster input composition: plan defaults, tenant overrides, the assigned
//! credential and the Kyma component list combined into the request sent to
//! the provisioner.

use keb_models::HyperscalerType;
use thiserror::Error;

mod components;
mod composer;
mod plans;
mod provider;

pub use components::*;
pub use composer::{compose, validate_parameters, Composer, KymaRelease};
pub use plans::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("plan '{0}' is not enabled")]
    UnknownPlan(String),
    #[error("optional component '{0}' is not registered")]
    UnknownComponent(String),
    #[error("no component list for Kyma version {0}")]
    UnsupportedKymaVersion(String),
    #[error("credential '{credential}' is for {actual}, plan requires {expected}")]
    CredentialMismatch {
        credential: String,
        expected: HyperscalerType,
        actual: HyperscalerType,
    },
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("{0}")]
    Config(String),
}
