use chrono::Utc;
use keb_models::{
    ErsContext, Instance, Operation, OperationState, OperationType, ProvisioningParameters,
    ProvisioningParametersDto, KYMA_SERVICE_ID,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{Error, KymaEnvironmentBroker, ProvisionDetails, ProvisionResponse};

impl KymaEnvironmentBroker {
    /// Accept a provisioning request and queue it for dispatch.
    pub async fn provision(
        &self,
        instance_id: &str,
        details: ProvisionDetails,
    ) -> Result<ProvisionResponse, Error> {
        debug!(instance_id = %instance_id, ?details, "Provision request");

        if details.service_id != KYMA_SERVICE_ID {
            return Err(Error::UnrecognizedService(details.service_id));
        }
        let plan = self
            .composer
            .catalog()
            .get(&details.plan_id)
            .ok_or_else(|| Error::UnrecognizedPlan(details.plan_id.clone()))?;

        let malformed = |what: &str, e: serde_json::Error| Error::MalformedRequest {
            instance_id: instance_id.to_string(),
            message: format!("cannot decode {}: {}", what, e),
        };
        let ers_context: ErsContext =
            serde_json::from_str(&details.raw_context).map_err(|e| malformed("context", e))?;
        if ers_context.globalaccount_id.trim().is_empty() {
            return Err(Error::MissingGlobalAccount(instance_id.to_string()));
        }
        let mut parameters: ProvisioningParametersDto = if details.raw_parameters.trim().is_empty() {
            ProvisioningParametersDto::default()
        } else {
            serde_json::from_str(&details.raw_parameters).map_err(|e| malformed("parameters", e))?
        };
        if !self.composer.on_demand_versions() {
            parameters.kyma_version = None;
        }
        self.composer
            .validate(plan, &parameters)
            .map_err(|source| Error::InvalidParameters {
                instance_id: instance_id.to_string(),
                source,
            })?;

        let parameters = ProvisioningParameters {
            plan_id: details.plan_id,
            service_id: details.service_id,
            ers_context,
            parameters,
        };

        if let Some(existing) = self.existing_provisioning(instance_id, &parameters).await? {
            info!(
                instance_id = %instance_id,
                operation_id = %existing.id,
                "Provisioning operation already exists"
            );
            return Ok(ProvisionResponse {
                is_async: true,
                operation_data: existing.id,
                already_exists: true,
            });
        }

        let raw = serde_json::to_string(&parameters).map_err(|e| Error::MalformedRequest {
            instance_id: instance_id.to_string(),
            message: format!("cannot encode parameters: {}", e),
        })?;
        let now = Utc::now();
        self.storage
            .instances()
            .insert(Instance {
                instance_id: instance_id.to_string(),
                service_id: parameters.service_id.clone(),
                plan_id: parameters.plan_id.clone(),
                global_account_id: parameters.ers_context.globalaccount_id.clone(),
                sub_account_id: parameters.ers_context.subaccount_id.clone(),
                runtime_id: None,
                dashboard_url: String::new(),
                provisioning_parameters: raw.clone(),
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    Error::Conflict(format!("instance '{}' already exists", instance_id))
                } else {
                    Error::Storage(e)
                }
            })?;

        let mut operation = Operation::new(
            Uuid::new_v4().to_string(),
            instance_id,
            OperationType::Provision,
            OperationState::Pending,
            "Operation accepted",
        );
        operation.provisioning_parameters = raw;
        let operation_id = operation.id.clone();
        self.storage.operations().insert_operation(operation).await?;
        self.queue.add(&operation_id);

        info!(
            instance_id = %instance_id,
            operation_id = %operation_id,
            plan = %plan.name,
            "Provisioning operation accepted"
        );
        Ok(ProvisionResponse {
            is_async: true,
            operation_data: operation_id,
            already_exists: false,
        })
    }

    /// Earlier provisioning operation of the instance, if its parameters match.
    async fn existing_provisioning(
        &self,
        instance_id: &str,
        parameters: &ProvisioningParameters,
    ) -> Result<Option<Operation>, Error> {
        let existing = match self
            .storage
            .operations()
            .get_operation_by_type_and_instance_id(instance_id, OperationType::Provision)
            .await
        {
            Ok(operation) => operation,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let same = serde_json::from_str::<ProvisioningParameters>(&existing.provisioning_parameters)
            .map(|stored| &stored == parameters)
            .unwrap_or(false);
        if same {
            Ok(Some(existing))
        } else {
            Err(Error::Conflict(format!(
                "provisioning operation already exist for instance '{}' with different parameters",
                instance_id
            )))
        }
    }
}
