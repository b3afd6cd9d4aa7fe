//! Hyperscaler credential pool.
//!
//! Each tenant receives one credential per provider, exclusively. Inside a
//! process assignments for the same provider are serialized by a mutex; across
//! processes the store's compare-and-set `bind` picks the single winner.

use std::collections::HashMap;
use std::sync::Arc;

use keb_models::{Credential, HyperscalerType};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::storage::{self, Credentials};

/// How many times a lost bind race is retried before giving up.
const MAX_BIND_ATTEMPTS: u32 = 5;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown hyperscaler type '{0}'")]
    UnknownProvider(String),
    #[error("no unassigned {hyperscaler_type} credential left for tenant '{tenant}'")]
    PoolExhausted {
        hyperscaler_type: HyperscalerType,
        tenant: String,
    },
    #[error("credential store: {0}")]
    Storage(#[from] storage::Error),
}

#[derive(Clone)]
pub struct CredentialPool {
    store: Arc<dyn Credentials>,
    locks: Arc<HashMap<HyperscalerType, Mutex<()>>>,
}

impl CredentialPool {
    pub fn new(store: Arc<dyn Credentials>) -> Self {
        let locks = [HyperscalerType::Gcp, HyperscalerType::Azure, HyperscalerType::Aws]
            .into_iter()
            .map(|t| (t, Mutex::new(())))
            .collect();
        Self {
            store,
            locks: Arc::new(locks),
        }
    }

    /// Add credentials to the pool; already known names keep their binding.
    pub async fn register(&self, credentials: impl IntoIterator<Item = Credential>) -> Result<(), Error> {
        for credential in credentials {
            debug!(name = %credential.name, hyperscaler = %credential.hyperscaler_type, "Registering credential");
            self.store.register(credential).await?;
        }
        Ok(())
    }

    /// Same as [`CredentialPool::assign`] for a provider given as text.
    pub async fn assign_by_name(&self, provider: &str, tenant_name: &str) -> Result<Credential, Error> {
        let hyperscaler_type = provider
            .parse::<HyperscalerType>()
            .map_err(|_| Error::UnknownProvider(provider.to_string()))?;
        self.assign(hyperscaler_type, tenant_name).await
    }

    /// Return the tenant's credential for the provider, binding a free one on first use.
    pub async fn assign(
        &self,
        hyperscaler_type: HyperscalerType,
        tenant_name: &str,
    ) -> Result<Credential, Error> {
        let lock = self
            .locks
            .get(&hyperscaler_type)
            .ok_or_else(|| Error::UnknownProvider(hyperscaler_type.to_string()))?;
        let _guard = lock.lock().await;

        for _ in 0..MAX_BIND_ATTEMPTS {
            if let Some(credential) = self.store.find_assigned(hyperscaler_type, tenant_name).await? {
                return Ok(credential);
            }

            let Some(candidate) = self.store.find_unassigned(hyperscaler_type).await? else {
                return Err(Error::PoolExhausted {
                    hyperscaler_type,
                    tenant: tenant_name.to_string(),
                });
            };

            match self.store.bind(&candidate.name, tenant_name).await {
                Ok(credential) => {
                    info!(
                        credential = %credential.name,
                        hyperscaler = %hyperscaler_type,
                        tenant = %tenant_name,
                        "Assigned hyperscaler credential"
                    );
                    return Ok(credential);
                }
                // another process took it (or bound this tenant) first
                Err(e) if e.is_conflict() => {
                    debug!(credential = %candidate.name, error = %e, "Lost credential bind race");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::Storage(storage::Error::Conflict(format!(
            "could not bind a {} credential for tenant '{}' after {} attempts",
            hyperscaler_type, tenant_name, MAX_BIND_ATTEMPTS
        ))))
    }
}
