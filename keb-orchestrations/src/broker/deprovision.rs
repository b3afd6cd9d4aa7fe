use keb_models::{Operation, OperationState, OperationType};
use tracing::{info, warn};
use uuid::Uuid;

use super::{instance_lookup, DeprovisionResponse, Error, KymaEnvironmentBroker};

impl KymaEnvironmentBroker {
    /// Ask the provisioner to remove the instance's runtime.
    pub async fn deprovision(&self, instance_id: &str) -> Result<DeprovisionResponse, Error> {
        let instance = self
            .storage
            .instances()
            .get_by_id(instance_id)
            .await
            .map_err(|e| instance_lookup(instance_id, e))?;

        match self.storage.operations().get_operation_by_instance_id(instance_id).await {
            Ok(latest) if !latest.state.is_terminal() => {
                if latest.kind == OperationType::Deprovision {
                    info!(
                        instance_id = %instance_id,
                        operation_id = %latest.id,
                        "Deprovisioning already in progress"
                    );
                    return Ok(DeprovisionResponse {
                        is_async: true,
                        operation_data: latest.id,
                    });
                }
                return Err(Error::Conflict(format!(
                    "{} operation '{}' of instance '{}' is still {}",
                    latest.kind, latest.id, instance_id, latest.state
                )));
            }
            Ok(_) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        let operation_id = Uuid::new_v4().to_string();
        let operation = match &instance.runtime_id {
            None => {
                warn!(instance_id = %instance_id, "Instance has no runtime, nothing to deprovision");
                Operation::new(
                    operation_id,
                    instance_id,
                    OperationType::Deprovision,
                    OperationState::Succeeded,
                    "Runtime was never provisioned",
                )
            }
            Some(runtime_id) => {
                let remote_id = self
                    .provisioner
                    .deprovision_runtime(&instance.global_account_id, runtime_id)
                    .await
                    .map_err(|source| Error::Provisioner {
                        instance_id: instance_id.to_string(),
                        source,
                    })?;
                let mut operation = Operation::new(
                    operation_id,
                    instance_id,
                    OperationType::Deprovision,
                    OperationState::InProgress,
                    "Operation created",
                );
                operation.provisioner_operation_id = Some(remote_id);
                operation.runtime_id = Some(runtime_id.clone());
                operation
            }
        };

        let operation_id = operation.id.clone();
        self.storage.operations().insert_operation(operation).await?;
        info!(instance_id = %instance_id, operation_id = %operation_id, "Deprovisioning started");

        Ok(DeprovisionResponse {
            is_async: true,
            operation_data: operation_id,
        })
    }
}
