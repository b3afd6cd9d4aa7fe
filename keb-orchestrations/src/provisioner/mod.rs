//! Client for the remote runtime provisioner.
//!
//! The provisioner owns the actual Gardener actuation and allows a single
//! in-flight operation per runtime; overlapping requests come back as
//! [`Error::Conflict`].

use async_trait::async_trait;
use keb_models::{OperationStatus, ProvisionRuntimeInput, RuntimeStatus};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::retry::Transient;

mod graphql;

pub use graphql::GraphQlClient;

#[cfg(test)]
pub(crate) mod fake;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("provisioner unreachable: {0}")]
    Transport(String),
    #[error("provisioner returned HTTP {status}: {message}")]
    Server { status: u16, message: String },
    #[error("runtime operation conflict: {0}")]
    Conflict(String),
    #[error("provisioner rejected the request: {0}")]
    Application(String),
    #[error("unexpected provisioner response: {0}")]
    Decode(String),
}

impl Error {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

impl Transient for Error {
    fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Server { .. })
    }
}

/// IDs handed back by the provisioner for a new runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedRuntime {
    pub operation_id: String,
    pub runtime_id: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Client: Send + Sync {
    async fn provision_runtime(
        &self,
        tenant: &str,
        input: &ProvisionRuntimeInput,
    ) -> Result<ProvisionedRuntime, Error>;

    /// Returns the provisioner operation ID.
    async fn deprovision_runtime(&self, tenant: &str, runtime_id: &str) -> Result<String, Error>;

    /// Returns the provisioner operation ID.
    async fn upgrade_runtime(
        &self,
        tenant: &str,
        runtime_id: &str,
        input: &ProvisionRuntimeInput,
    ) -> Result<String, Error>;

    async fn runtime_operation_status(
        &self,
        tenant: &str,
        operation_id: &str,
    ) -> Result<OperationStatus, Error>;

    async fn runtime_status(&self, tenant: &str, runtime_id: &str) -> Result<RuntimeStatus, Error>;
}
