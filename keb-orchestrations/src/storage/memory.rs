use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use keb_models::{Credential, HyperscalerType, Instance, Operation, OperationState, OperationType};

use super::{Credentials, Error, Instances, Operations, Result};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| Error::Internal(format!("in-memory store poisoned: {}", e)))
}

#[derive(Default)]
pub struct MemoryInstances {
    instances: Mutex<HashMap<String, Instance>>,
}

#[async_trait]
impl Instances for MemoryInstances {
    async fn insert(&self, instance: Instance) -> Result<()> {
        let mut instances = lock(&self.instances)?;
        if instances.contains_key(&instance.instance_id) {
            return Err(Error::Conflict(format!(
                "instance '{}' already exists",
                instance.instance_id
            )));
        }
        instances.insert(instance.instance_id.clone(), instance);
        Ok(())
    }

    async fn get_by_id(&self, instance_id: &str) -> Result<Instance> {
        lock(&self.instances)?
            .get(instance_id)
            .cloned()
            .ok_or_else(|| Error::not_found("instance", instance_id))
    }

    async fn update(&self, mut instance: Instance) -> Result<Instance> {
        let mut instances = lock(&self.instances)?;
        let stored = instances
            .get_mut(&instance.instance_id)
            .ok_or_else(|| Error::not_found("instance", instance.instance_id.clone()))?;
        if stored.version != instance.version {
            return Err(Error::Conflict(format!(
                "instance '{}' update conflict: version {} is stale",
                instance.instance_id, instance.version
            )));
        }
        instance.version += 1;
        instance.updated_at = Utc::now();
        *stored = instance.clone();
        Ok(instance)
    }
}

/// Operations kept in insertion order so "latest" is the last match.
#[derive(Default)]
pub struct MemoryOperations {
    operations: Mutex<Vec<Operation>>,
}

#[async_trait]
impl Operations for MemoryOperations {
    async fn insert_operation(&self, operation: Operation) -> Result<()> {
        let mut operations = lock(&self.operations)?;
        if operations.iter().any(|op| op.id == operation.id) {
            return Err(Error::Conflict(format!(
                "operation '{}' already exists",
                operation.id
            )));
        }
        operations.push(operation);
        Ok(())
    }

    async fn get_operation_by_id(&self, operation_id: &str) -> Result<Operation> {
        lock(&self.operations)?
            .iter()
            .find(|op| op.id == operation_id)
            .cloned()
            .ok_or_else(|| Error::not_found("operation", operation_id))
    }

    async fn get_operation_by_instance_id(&self, instance_id: &str) -> Result<Operation> {
        lock(&self.operations)?
            .iter()
            .rev()
            .find(|op| op.instance_id == instance_id)
            .cloned()
            .ok_or_else(|| Error::not_found("operation for instance", instance_id))
    }

    async fn get_operation_by_type_and_instance_id(
        &self,
        instance_id: &str,
        kind: OperationType,
    ) -> Result<Operation> {
        lock(&self.operations)?
            .iter()
            .rev()
            .find(|op| op.instance_id == instance_id && op.kind == kind)
            .cloned()
            .ok_or_else(|| {
                Error::not_found("operation for instance", format!("{} ({})", instance_id, kind))
            })
    }

    async fn get_operations_in_state(
        &self,
        kind: OperationType,
        state: OperationState,
    ) -> Result<Vec<Operation>> {
        Ok(lock(&self.operations)?
            .iter()
            .filter(|op| op.kind == kind && op.state == state)
            .cloned()
            .collect())
    }

    async fn update_operation(&self, mut operation: Operation) -> Result<Operation> {
        let mut operations = lock(&self.operations)?;
        let stored = operations
            .iter_mut()
            .find(|op| op.id == operation.id)
            .ok_or_else(|| Error::not_found("operation", operation.id.clone()))?;
        if stored.version != operation.version {
            return Err(Error::Conflict(format!(
                "operation '{}' update conflict",
                operation.id
            )));
        }
        operation.version += 1;
        operation.updated_at = Utc::now();
        *stored = operation.clone();
        Ok(operation)
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    credentials: Mutex<BTreeMap<String, Credential>>,
}

#[async_trait]
impl Credentials for MemoryCredentials {
    async fn register(&self, credential: Credential) -> Result<()> {
        lock(&self.credentials)?
            .entry(credential.name.clone())
            .or_insert(credential);
        Ok(())
    }

    async fn find_assigned(
        &self,
        hyperscaler_type: HyperscalerType,
        tenant_name: &str,
    ) -> Result<Option<Credential>> {
        Ok(lock(&self.credentials)?
            .values()
            .find(|c| {
                c.hyperscaler_type == hyperscaler_type && c.tenant_name.as_deref() == Some(tenant_name)
            })
            .cloned())
    }

    async fn find_unassigned(&self, hyperscaler_type: HyperscalerType) -> Result<Option<Credential>> {
        Ok(lock(&self.credentials)?
            .values()
            .find(|c| c.hyperscaler_type == hyperscaler_type && c.tenant_name.is_none())
            .cloned())
    }

    async fn bind(&self, credential_name: &str, tenant_name: &str) -> Result<Credential> {
        let mut credentials = lock(&self.credentials)?;
        let credential = credentials
            .get_mut(credential_name)
            .ok_or_else(|| Error::not_found("credential", credential_name))?;
        if credential.tenant_name.is_some() {
            return Err(Error::Conflict(format!(
                "credential '{}' is already assigned",
                credential_name
            )));
        }
        credential.tenant_name = Some(tenant_name.to_string());
        Ok(credential.clone())
    }
}
