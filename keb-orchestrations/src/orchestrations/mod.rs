//! Provisioning orchestration and the worker pool that runs it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::hyperscaler::{self, CredentialPool};
use crate::input::{self, Composer};
use crate::provisioner;
use crate::retry::Transient;
use crate::storage::{self, BrokerStorage};
use crate::types::ProvisionOperationInput;

mod provision_runtime;
pub mod queue;

pub use provision_runtime::{provision_runtime_orchestration, DispatchOutcome};
pub use queue::{Executor, Queue, WorkQueue};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Credentials(#[from] hyperscaler::Error),
    #[error(transparent)]
    Input(#[from] input::Error),
    #[error(transparent)]
    Provisioner(#[from] provisioner::Error),
    #[error(transparent)]
    Storage(#[from] storage::Error),
    /// The runtime exists remotely but the ledger could not be updated
    #[error("failed to record dispatched runtime: {0}")]
    Record(storage::Error),
    /// Another dispatcher changed the operation while the runtime was being created
    #[error("operation {operation_id} changed while runtime {runtime_id} was being created")]
    LostClaim {
        operation_id: String,
        runtime_id: String,
    },
    /// The claim could not be dropped after a temporary failure
    #[error("failed to release operation after a temporary failure: {0}")]
    Release(storage::Error),
    #[error("{0}")]
    InvalidOperation(String),
}

impl Transient for Error {
    fn is_transient(&self) -> bool {
        match self {
            Error::Provisioner(e) => e.is_transient(),
            Error::Storage(e) => !e.is_not_found(),
            Error::Credentials(hyperscaler::Error::Storage(e)) => !e.is_not_found(),
            _ => false,
        }
    }
}

/// Everything the provisioning activities reach out to.
#[derive(Clone)]
pub struct ProvisioningServices {
    pub storage: BrokerStorage,
    pub credentials: CredentialPool,
    pub composer: Arc<Composer>,
    pub provisioner: Arc<dyn provisioner::Client>,
}

/// Runs [`provision_runtime_orchestration`] for operations taken off the work queue.
pub struct ProvisionExecutor {
    services: ProvisioningServices,
    retry_delay: Duration,
}

impl ProvisionExecutor {
    pub fn new(services: ProvisioningServices, retry_delay: Duration) -> Self {
        Self {
            services,
            retry_delay,
        }
    }
}

#[async_trait]
impl Executor for ProvisionExecutor {
    async fn execute(&self, operation_id: &str) -> Option<Duration> {
        let input = ProvisionOperationInput {
            operation_id: operation_id.to_string(),
        };
        match provision_runtime_orchestration(&self.services, input).await {
            Ok(DispatchOutcome::Requeue(reason)) => {
                info!(operation_id = %operation_id, reason = %reason, "Dispatch will be retried");
                Some(self.retry_delay)
            }
            Ok(_) => None,
            Err(e) if e.is_transient() => {
                info!(operation_id = %operation_id, error = %e, "Dispatch will be retried");
                Some(self.retry_delay)
            }
            Err(e) => {
                error!(operation_id = %operation_id, error = %e, "Dispatch failed");
                None
            }
        }
    }
}
