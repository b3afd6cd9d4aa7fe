//! Provision runtime orchestration

use keb_models::{OperationState, ProvisioningParameters};
use tracing::{error, info, warn};

use super::{Error, ProvisioningServices};
use crate::activities::{
    build_runtime_input, claim_operation, create_runtime, mark_operation_failed, record_dispatch,
    release_operation, resolve_credentials, ActivityContext,
};
use crate::activity_types::{
    BuildRuntimeInputInput, ClaimOperationInput, CreateRuntimeInput, MarkOperationFailedInput,
    RecordDispatchInput, ReleaseOperationInput, ResolveCredentialsInput,
};
use crate::input;
use crate::names::orchestrations::PROVISION_RUNTIME;
use crate::retry::Transient;
use crate::types::{ProvisionOperationInput, ProvisionOperationOutput};

/// What happened to a queued provisioning operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The provisioner accepted the runtime; the operation is in progress
    Dispatched(ProvisionOperationOutput),
    /// The operation was no longer pending
    Skipped(OperationState),
    /// A transient failure; the operation stays pending
    Requeue(String),
    /// A permanent failure; the operation is marked failed
    Failed(String),
}

pub async fn provision_runtime_orchestration(
    services: &ProvisioningServices,
    input: ProvisionOperationInput,
) -> Result<DispatchOutcome, Error> {
    let operation = services
        .storage
        .operations()
        .get_operation_by_id(&input.operation_id)
        .await?;

    if operation.state != OperationState::Pending {
        info!(
            orchestration = PROVISION_RUNTIME,
            operation_id = %operation.id,
            state = %operation.state,
            "Operation is not pending, skipping dispatch"
        );
        return Ok(DispatchOutcome::Skipped(operation.state));
    }

    info!(
        orchestration = PROVISION_RUNTIME,
        operation_id = %operation.id,
        instance_id = %operation.instance_id,
        "Dispatching provisioning operation"
    );

    match provision_runtime_impl(services, &operation.id, &operation.instance_id, &operation.provisioning_parameters).await {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.is_transient() => {
            warn!(
                orchestration = PROVISION_RUNTIME,
                operation_id = %operation.id,
                error = %e,
                "Dispatch failed temporarily"
            );
            Ok(DispatchOutcome::Requeue(e.to_string()))
        }
        Err(e) => {
            error!(
                orchestration = PROVISION_RUNTIME,
                operation_id = %operation.id,
                error = %e,
                "Dispatch failed"
            );
            let message = e.to_string();
            mark_failed(services, &operation.id, &message).await;
            Ok(DispatchOutcome::Failed(message))
        }
    }
}

async fn provision_runtime_impl(
    services: &ProvisioningServices,
    operation_id: &str,
    instance_id: &str,
    raw_parameters: &str,
) -> Result<DispatchOutcome, Error> {
    let parameters: ProvisioningParameters = serde_json::from_str(raw_parameters).map_err(|e| {
        Error::InvalidOperation(format!("cannot decode provisioning parameters: {}", e))
    })?;
    let plan = services
        .composer
        .catalog()
        .get(&parameters.plan_id)
        .ok_or_else(|| input::Error::UnknownPlan(parameters.plan_id.clone()))?;
    let tenant = parameters.ers_context.globalaccount_id.clone();

    // Step 1: Assign a hyperscaler credential to the global account
    let credentials = resolve_credentials::activity(
        ActivityContext::new(resolve_credentials::NAME, operation_id, services),
        ResolveCredentialsInput {
            hyperscaler_type: plan.provider,
            tenant: tenant.clone(),
        },
    )
    .await?;
    let credential_name = credentials.credential.name.clone();

    // Step 2: Compose the runtime input
    let built = build_runtime_input::activity(
        ActivityContext::new(build_runtime_input::NAME, operation_id, services),
        BuildRuntimeInputInput {
            parameters,
            credential: credentials.credential,
        },
    )
    .await?;

    // Step 3: Claim the operation; only the winner talks to the provisioner
    let claim = claim_operation::activity(
        ActivityContext::new(claim_operation::NAME, operation_id, services),
        ClaimOperationInput {
            operation_id: operation_id.to_string(),
        },
    )
    .await?;
    if !claim.claimed {
        return Ok(DispatchOutcome::Skipped(claim.state));
    }

    // Step 4: Hand the runtime over to the provisioner
    let created = match create_runtime::activity(
        ActivityContext::new(create_runtime::NAME, operation_id, services),
        CreateRuntimeInput {
            tenant,
            runtime_input: built.runtime_input,
        },
    )
    .await
    {
        Ok(created) => created,
        Err(e) if e.is_transient() => {
            release_operation::activity(
                ActivityContext::new(release_operation::NAME, operation_id, services),
                ReleaseOperationInput {
                    operation_id: operation_id.to_string(),
                    description: claim.previous_description,
                },
            )
            .await?;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    // Step 5: Record the remote IDs
    record_dispatch::activity(
        ActivityContext::new(record_dispatch::NAME, operation_id, services),
        RecordDispatchInput {
            operation_id: operation_id.to_string(),
            instance_id: instance_id.to_string(),
            provisioner_operation_id: created.provisioner_operation_id.clone(),
            runtime_id: created.runtime_id.clone(),
        },
    )
    .await?;

    Ok(DispatchOutcome::Dispatched(ProvisionOperationOutput {
        provisioner_operation_id: created.provisioner_operation_id,
        runtime_id: created.runtime_id,
        credential_name,
    }))
}

/// Best effort: a failure here leaves the operation as it is for the next attempt.
async fn mark_failed(services: &ProvisioningServices, operation_id: &str, message: &str) {
    let result = mark_operation_failed::activity(
        ActivityContext::new(mark_operation_failed::NAME, operation_id, services),
        MarkOperationFailedInput {
            operation_id: operation_id.to_string(),
            message: message.to_string(),
        },
    )
    .await;

    if let Err(e) = result {
        warn!(
            orchestration = PROVISION_RUNTIME,
            operation_id = %operation_id,
            error = %e,
            "Failed to mark operation as failed"
        );
    }
}
