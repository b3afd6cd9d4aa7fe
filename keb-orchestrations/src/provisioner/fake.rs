//! In-process provisioner used by tests to drive operations to a chosen state.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use keb_models::{OperationStatus, ProvisionRuntimeInput, RemoteOperationState, RuntimeStatus};

use super::{Client, Error, ProvisionedRuntime};

#[derive(Default)]
struct State {
    operations: HashMap<String, OperationStatus>,
    inputs: Vec<(String, ProvisionRuntimeInput)>,
    busy_runtimes: HashMap<String, String>,
    next_id: u32,
    fail_next_provision: Option<Error>,
}

#[derive(Default)]
pub(crate) struct FakeClient {
    state: Mutex<State>,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish_operation(&self, operation_id: &str, state: RemoteOperationState, message: &str) {
        let mut guard = self.state.lock().unwrap();
        if let Some(op) = guard.operations.get_mut(operation_id) {
            op.state = state;
            op.message = Some(message.to_string());
            if let Some(runtime_id) = op.runtime_id.clone() {
                guard.busy_runtimes.remove(&runtime_id);
            }
        }
    }

    pub fn fail_next_provision(&self, error: Error) {
        self.state.lock().unwrap().fail_next_provision = Some(error);
    }

    /// Tenants and inputs of every accepted provision call, in order.
    pub fn provisioned(&self) -> Vec<(String, ProvisionRuntimeInput)> {
        self.state.lock().unwrap().inputs.clone()
    }

    fn start(&self, runtime_id: &str) -> Result<String, Error> {
        let mut guard = self.state.lock().unwrap();
        if let Some(op) = guard.busy_runtimes.get(runtime_id) {
            return Err(Error::Conflict(format!(
                "operation {} is in progress for runtime {}",
                op, runtime_id
            )));
        }
        guard.next_id += 1;
        let operation_id = format!("remote-op-{}", guard.next_id);
        guard.operations.insert(
            operation_id.clone(),
            OperationStatus {
                id: Some(operation_id.clone()),
                state: RemoteOperationState::InProgress,
                message: Some("Operation in progress".to_string()),
                runtime_id: Some(runtime_id.to_string()),
            },
        );
        guard
            .busy_runtimes
            .insert(runtime_id.to_string(), operation_id.clone());
        Ok(operation_id)
    }
}

#[async_trait]
impl Client for FakeClient {
    async fn provision_runtime(
        &self,
        tenant: &str,
        input: &ProvisionRuntimeInput,
    ) -> Result<ProvisionedRuntime, Error> {
        let runtime_id = {
            let mut guard = self.state.lock().unwrap();
            if let Some(err) = guard.fail_next_provision.take() {
                return Err(err);
            }
            guard.inputs.push((tenant.to_string(), input.clone()));
            format!("runtime-{}", guard.inputs.len())
        };
        let operation_id = self.start(&runtime_id)?;
        Ok(ProvisionedRuntime {
            operation_id,
            runtime_id,
        })
    }

    async fn deprovision_runtime(&self, _tenant: &str, runtime_id: &str) -> Result<String, Error> {
        self.start(runtime_id)
    }

    async fn upgrade_runtime(
        &self,
        _tenant: &str,
        runtime_id: &str,
        _input: &ProvisionRuntimeInput,
    ) -> Result<String, Error> {
        self.start(runtime_id)
    }

    async fn runtime_operation_status(
        &self,
        _tenant: &str,
        operation_id: &str,
    ) -> Result<OperationStatus, Error> {
        self.state
            .lock()
            .unwrap()
            .operations
            .get(operation_id)
            .cloned()
            .ok_or_else(|| Error::Application(format!("operation {} not found", operation_id)))
    }

    async fn runtime_status(&self, _tenant: &str, _runtime_id: &str) -> Result<RuntimeStatus, Error> {
        Ok(RuntimeStatus {
            connection_status: Some("Ready".to_string()),
            ..Default::default()
        })
    }
}
