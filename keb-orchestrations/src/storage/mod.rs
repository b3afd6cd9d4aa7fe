//! Durable store for instances, operations and the hyperscaler credential pool.
//!
//! Every update is a compare-and-set on the record's `version`: a caller
//! holding a stale copy gets [`Error::Conflict`] instead of overwriting a
//! concurrent change.

use std::sync::Arc;

use async_trait::async_trait;
use keb_models::{Credential, HyperscalerType, Instance, Operation, OperationState, OperationType};
#[cfg(test)]
use mockall::automock;
use sqlx::PgPool;
use thiserror::Error;

mod memory;
mod postgres;

pub use memory::{MemoryCredentials, MemoryInstances, MemoryOperations};
pub use postgres::{initialize_schema, PostgresStorage};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("{0}")]
    Conflict(String),
    #[error("storage failure: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Instances: Send + Sync {
    /// Fails with [`Error::Conflict`] if the instance ID is taken.
    async fn insert(&self, instance: Instance) -> Result<()>;
    async fn get_by_id(&self, instance_id: &str) -> Result<Instance>;
    /// Persist `instance` if its version is current; returns the stored copy with the bumped version.
    async fn update(&self, instance: Instance) -> Result<Instance>;
}

#[async_trait]
pub trait Operations: Send + Sync {
    async fn insert_operation(&self, operation: Operation) -> Result<()>;
    async fn get_operation_by_id(&self, operation_id: &str) -> Result<Operation>;
    /// Most recently created operation of the instance, of any type.
    async fn get_operation_by_instance_id(&self, instance_id: &str) -> Result<Operation>;
    /// Most recently created operation of the given type for the instance.
    async fn get_operation_by_type_and_instance_id(
        &self,
        instance_id: &str,
        kind: OperationType,
    ) -> Result<Operation>;
    async fn get_operations_in_state(
        &self,
        kind: OperationType,
        state: OperationState,
    ) -> Result<Vec<Operation>>;
    async fn update_operation(&self, operation: Operation) -> Result<Operation>;
}

#[async_trait]
pub trait Credentials: Send + Sync {
    /// Add a credential to the pool; registering an existing name is a no-op.
    async fn register(&self, credential: Credential) -> Result<()>;
    async fn find_assigned(
        &self,
        hyperscaler_type: HyperscalerType,
        tenant_name: &str,
    ) -> Result<Option<Credential>>;
    /// First unbound credential of the type, in name order.
    async fn find_unassigned(&self, hyperscaler_type: HyperscalerType) -> Result<Option<Credential>>;
    /// Bind the credential to `tenant_name` only if it is still unbound.
    async fn bind(&self, credential_name: &str, tenant_name: &str) -> Result<Credential>;
}

/// How often a read-modify-write is retried after losing a version race.
const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// Re-read the instance and apply `change` until the write wins or attempts run out.
///
/// `change` returns `false` to leave the stored record untouched.
pub async fn modify_instance<F>(
    instances: &dyn Instances,
    instance_id: &str,
    mut change: F,
) -> Result<Instance>
where
    F: FnMut(&mut Instance) -> bool + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut instance = instances.get_by_id(instance_id).await?;
        if !change(&mut instance) {
            return Ok(instance);
        }
        match instances.update(instance).await {
            Err(e) if e.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => continue,
            result => return result,
        }
    }
}

/// Operation counterpart of [`modify_instance`].
pub async fn modify_operation<F>(
    operations: &dyn Operations,
    operation_id: &str,
    mut change: F,
) -> Result<Operation>
where
    F: FnMut(&mut Operation) -> bool + Send,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut operation = operations.get_operation_by_id(operation_id).await?;
        if !change(&mut operation) {
            return Ok(operation);
        }
        match operations.update_operation(operation).await {
            Err(e) if e.is_conflict() && attempt < MAX_UPDATE_ATTEMPTS => continue,
            result => return result,
        }
    }
}

/// Bundle of the stores the broker works with.
#[derive(Clone)]
pub struct BrokerStorage {
    instances: Arc<dyn Instances>,
    operations: Arc<dyn Operations>,
    credentials: Arc<dyn Credentials>,
}

impl BrokerStorage {
    pub fn new(
        instances: Arc<dyn Instances>,
        operations: Arc<dyn Operations>,
        credentials: Arc<dyn Credentials>,
    ) -> Self {
        Self {
            instances,
            operations,
            credentials,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryInstances::default()),
            Arc::new(MemoryOperations::default()),
            Arc::new(MemoryCredentials::default()),
        )
    }

    pub fn postgres(pool: PgPool) -> Self {
        let storage = Arc::new(PostgresStorage::new(pool));
        Self::new(storage.clone(), storage.clone(), storage)
    }

    pub fn instances(&self) -> &dyn Instances {
        self.instances.as_ref()
    }

    pub fn operations(&self) -> &dyn Operations {
        self.operations.as_ref()
    }

    pub fn credentials(&self) -> Arc<dyn Credentials> {
        self.credentials.clone()
    }
}
