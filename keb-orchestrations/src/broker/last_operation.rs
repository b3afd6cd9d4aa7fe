use chrono::Utc;
use keb_models::{Instance, Operation, OperationState, OperationType, RemoteOperationState};
use tracing::{debug, info, warn};

use super::{instance_lookup, Error, KymaEnvironmentBroker, LastOperationResponse};
use crate::director::is_valid_url;
use crate::storage::{modify_instance, modify_operation};

const DASHBOARD_EXISTS: &str = "Dashboard URL already exists in the instance";
const OUT_OF_DATE: &str = "instance is out of date";
const TRY_AGAIN: &str = "action can be processed again";

impl KymaEnvironmentBroker {
    /// Report the state of an operation, advancing it from the provisioner's view if needed.
    ///
    /// An empty `operation_data` selects the most recent operation of the instance.
    pub async fn last_operation(
        &self,
        instance_id: &str,
        operation_data: &str,
    ) -> Result<LastOperationResponse, Error> {
        let instance = self
            .storage
            .instances()
            .get_by_id(instance_id)
            .await
            .map_err(|e| instance_lookup(instance_id, e))?;
        let operation = self.find_operation(instance_id, operation_data).await?;

        if operation.kind == OperationType::Provision && is_valid_url(&instance.dashboard_url) {
            if operation.state != OperationState::Succeeded {
                self.finish(&operation, OperationState::Succeeded, DASHBOARD_EXISTS).await?;
            }
            return Ok(response(OperationState::Succeeded, DASHBOARD_EXISTS));
        }

        match operation.state {
            state if state.is_terminal() => return Ok(response(state, &operation.description)),
            OperationState::Pending => {
                return Ok(response(OperationState::InProgress, &operation.description))
            }
            _ => {}
        }

        let Some(remote_id) = operation.provisioner_operation_id.as_deref() else {
            return Ok(response(OperationState::InProgress, &operation.description));
        };
        let status = self
            .provisioner
            .runtime_operation_status(&instance.global_account_id, remote_id)
            .await
            .map_err(|source| Error::Provisioner {
                instance_id: instance_id.to_string(),
                source,
            })?;
        debug!(
            instance_id = %instance_id,
            operation_id = %operation.id,
            remote_state = ?status.state,
            "Got runtime operation status"
        );
        let message = status.message.unwrap_or_default();

        match status.state {
            RemoteOperationState::Succeeded if operation.kind == OperationType::Provision => {
                self.handle_dashboard_url(instance, &operation, message).await
            }
            RemoteOperationState::Succeeded => {
                self.finish(&operation, OperationState::Succeeded, &message).await?;
                Ok(response(OperationState::Succeeded, &message))
            }
            RemoteOperationState::Failed => {
                self.finish(&operation, OperationState::Failed, &message).await?;
                Ok(response(OperationState::Failed, &message))
            }
            RemoteOperationState::InProgress
            | RemoteOperationState::Pending
            | RemoteOperationState::Unknown => Ok(response(OperationState::InProgress, &message)),
        }
    }

    async fn find_operation(&self, instance_id: &str, operation_data: &str) -> Result<Operation, Error> {
        let operations = self.storage.operations();
        let result = if operation_data.is_empty() {
            operations.get_operation_by_instance_id(instance_id).await
        } else {
            operations.get_operation_by_id(operation_data).await
        };
        let not_found = || Error::OperationNotFound {
            instance_id: instance_id.to_string(),
            operation_id: operation_data.to_string(),
        };

        match result {
            Ok(operation) if operation.instance_id == instance_id => Ok(operation),
            Ok(_) => Err(not_found()),
            Err(e) if e.is_not_found() => Err(not_found()),
            Err(e) => Err(e.into()),
        }
    }

    async fn handle_dashboard_url(
        &self,
        instance: Instance,
        operation: &Operation,
        message: String,
    ) -> Result<LastOperationResponse, Error> {
        let runtime_id = operation
            .runtime_id
            .clone()
            .or_else(|| instance.runtime_id.clone())
            .unwrap_or_default();

        let url = match self
            .director
            .get_console_url(&instance.global_account_id, &runtime_id)
            .await
        {
            Ok(url) => url,
            Err(e) if e.is_temporary() => {
                warn!(instance_id = %instance.instance_id, error = %e, "Cannot get console URL yet");
                return self
                    .outdated_check(&instance, operation, "cannot get URL from director")
                    .await;
            }
            Err(e) => {
                let description = format!("cannot get URL from director: {}", e);
                self.finish(operation, OperationState::Failed, &description).await?;
                return Ok(response(OperationState::Failed, &description));
            }
        };

        let stored = modify_instance(self.storage.instances(), &instance.instance_id, |stored| {
            stored.dashboard_url = url.clone();
            stored.updated_at = Utc::now();
            true
        })
        .await;
        if let Err(e) = stored {
            warn!(instance_id = %instance.instance_id, error = %e, "Cannot store dashboard URL");
            return self
                .outdated_check(&instance, operation, "cannot update instance in storage")
                .await;
        }

        info!(
            instance_id = %instance.instance_id,
            operation_id = %operation.id,
            dashboard_url = %url,
            "Runtime provisioned"
        );
        self.finish(operation, OperationState::Succeeded, &message).await?;
        Ok(response(OperationState::Succeeded, &message))
    }

    /// Give up once the instance is older than the grace period, otherwise ask to poll again.
    async fn outdated_check(
        &self,
        instance: &Instance,
        operation: &Operation,
        prefix: &str,
    ) -> Result<LastOperationResponse, Error> {
        let outdated = (Utc::now() - instance.created_at)
            .to_std()
            .map(|age| age > self.grace_period)
            .unwrap_or(false);

        if outdated {
            let description = format!("{}: {}", prefix, OUT_OF_DATE);
            warn!(instance_id = %instance.instance_id, "Cannot get dashboard URL, giving up");
            self.finish(operation, OperationState::Failed, &description).await?;
            Ok(response(OperationState::Failed, &description))
        } else {
            Ok(response(
                OperationState::InProgress,
                &format!("{}: {}", prefix, TRY_AGAIN),
            ))
        }
    }

    /// Persist a terminal state unless another caller got there first.
    async fn finish(
        &self,
        operation: &Operation,
        state: OperationState,
        description: &str,
    ) -> Result<(), Error> {
        modify_operation(self.storage.operations(), &operation.id, |op| {
            if op.state.is_terminal() {
                return false;
            }
            op.state = state;
            op.description = description.to_string();
            true
        })
        .await?;
        Ok(())
    }
}

fn response(state: OperationState, description: &str) -> LastOperationResponse {
    LastOperationResponse {
        state,
        description: description.to_string(),
    }
}

