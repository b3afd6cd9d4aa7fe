//! Broker gateway: the service-broker method contract for Kyma runtimes.
//!
//! `provision` only validates, persists and enqueues; the provisioner is
//! called later by the dispatch workers. `last_operation` reconciles the
//! stored operation with the provisioner and the director.

use std::sync::Arc;
use std::time::Duration;

use keb_models::OperationState;
use serde_json::Value;
use thiserror::Error;

use crate::director;
use crate::input::{self, Composer};
use crate::orchestrations::Queue;
use crate::provisioner;
use crate::storage::{self, BrokerStorage};

mod deprovision;
mod instance;
mod last_operation;
mod provision;

/// Time after creation during which a missing console URL is still awaited.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3 * 60 * 60);

#[derive(Debug, Error)]
pub enum Error {
    #[error("service_id '{0}' not recognized")]
    UnrecognizedService(String),
    #[error("plan ID '{0}' is not recognized")]
    UnrecognizedPlan(String),
    #[error("malformed request for instance '{instance_id}': {message}")]
    MalformedRequest { instance_id: String, message: String },
    #[error("globalaccount_id cannot be empty (instance '{0}')")]
    MissingGlobalAccount(String),
    #[error("invalid parameters for instance '{instance_id}': {source}")]
    InvalidParameters {
        instance_id: String,
        #[source]
        source: input::Error,
    },
    #[error("instance '{0}' not found")]
    InstanceNotFound(String),
    #[error("operation '{operation_id}' of instance '{instance_id}' not found")]
    OperationNotFound {
        instance_id: String,
        operation_id: String,
    },
    #[error("{0}")]
    Conflict(String),
    #[error("{0} is not supported")]
    NotSupported(&'static str),
    #[error("provisioner call for instance '{instance_id}' failed: {source}")]
    Provisioner {
        instance_id: String,
        #[source]
        source: provisioner::Error,
    },
    #[error("stored parameters of instance '{instance_id}' cannot be decoded: {source}")]
    CorruptParameters {
        instance_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Storage(#[from] storage::Error),
}

impl Error {
    /// Errors caused by the request itself; never worth retrying.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::UnrecognizedService(_)
                | Error::UnrecognizedPlan(_)
                | Error::MalformedRequest { .. }
                | Error::MissingGlobalAccount(_)
                | Error::InvalidParameters { .. }
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
            || matches!(self, Error::Provisioner { source, .. } if source.is_conflict())
    }
}

/// Provisioning request as received from the platform.
#[derive(Debug, Clone, Default)]
pub struct ProvisionDetails {
    pub service_id: String,
    pub plan_id: String,
    /// Raw ERS context JSON
    pub raw_context: String,
    /// Raw provisioning parameters JSON
    pub raw_parameters: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionResponse {
    pub is_async: bool,
    /// ID of the provisioning operation, used to poll `last_operation`
    pub operation_data: String,
    /// True when an identical earlier request was replayed
    pub already_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprovisionResponse {
    pub is_async: bool,
    pub operation_data: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastOperationResponse {
    pub state: OperationState,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDetails {
    pub service_id: String,
    pub plan_id: String,
    pub dashboard_url: String,
    pub parameters: Value,
}

/// Kyma environment broker
pub struct KymaEnvironmentBroker {
    storage: BrokerStorage,
    composer: Arc<Composer>,
    queue: Arc<dyn Queue>,
    provisioner: Arc<dyn provisioner::Client>,
    director: Arc<dyn director::Client>,
    grace_period: Duration,
}

impl KymaEnvironmentBroker {
    pub fn new(
        storage: BrokerStorage,
        composer: Arc<Composer>,
        queue: Arc<dyn Queue>,
        provisioner: Arc<dyn provisioner::Client>,
        director: Arc<dyn director::Client>,
    ) -> Self {
        Self {
            storage,
            composer,
            queue,
            provisioner,
            director,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// ID of the enabled plan called `name`.
    pub fn plan_id(&self, name: &str) -> Option<&str> {
        self.composer
            .catalog()
            .plans()
            .find(|plan| plan.name == name)
            .map(|plan| plan.id.as_str())
    }

    pub fn update(&self, _instance_id: &str) -> Result<(), Error> {
        Err(Error::NotSupported("update"))
    }

    pub fn bind(&self, _instance_id: &str, _binding_id: &str) -> Result<(), Error> {
        Err(Error::NotSupported("bind"))
    }

    pub fn unbind(&self, _instance_id: &str, _binding_id: &str) -> Result<(), Error> {
        Err(Error::NotSupported("unbind"))
    }

    pub fn get_binding(&self, _instance_id: &str, _binding_id: &str) -> Result<(), Error> {
        Err(Error::NotSupported("get binding"))
    }

    pub fn last_binding_operation(&self, _instance_id: &str, _binding_id: &str) -> Result<(), Error> {
        Err(Error::NotSupported("last binding operation"))
    }
}

/// Map a storage lookup miss on the instance to [`Error::InstanceNotFound`].
fn instance_lookup(instance_id: &str, err: storage::Error) -> Error {
    if err.is_not_found() {
        Error::InstanceNotFound(instance_id.to_string())
    } else {
        Error::Storage(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::director::MockClient as MockDirector;
    use crate::hyperscaler::CredentialPool;
    use crate::input::{ComponentLists, OptionalComponents, PlanCatalog, AZURE_PLAN_ID};
    use crate::orchestrations::{provision_runtime_orchestration, ProvisioningServices};
    use crate::provisioner::fake::FakeClient;
    use crate::provisioner::MockClient as MockProvisioner;
    use crate::storage::{MemoryCredentials, MemoryOperations, MockInstances};
    use crate::types::ProvisionOperationInput;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use keb_models::{
        Credential, HyperscalerType, Instance, Operation, OperationStatus, OperationType,
        RemoteOperationState, KYMA_SERVICE_ID,
    };
    use std::sync::Mutex;

    const GLOBAL_ACCOUNT: &str = "e8f7ec0a-0cd6-41f0-905d-5d1efa9fb6c4";
    const CLUSTER_TESTING: &str = r#"{"name":"cluster-testing"}"#;

    #[derive(Default)]
    struct RecordingQueue {
        added: Mutex<Vec<String>>,
    }

    impl RecordingQueue {
        fn added(&self) -> Vec<String> {
            self.added.lock().unwrap().clone()
        }
    }

    impl Queue for RecordingQueue {
        fn add(&self, operation_id: &str) {
            self.added.lock().unwrap().push(operation_id.to_string());
        }
    }

    struct Harness {
        broker: KymaEnvironmentBroker,
        storage: BrokerStorage,
        queue: Arc<RecordingQueue>,
        composer: Arc<Composer>,
    }

    impl Harness {
        fn new(provisioner: Arc<dyn provisioner::Client>, director: MockDirector) -> Self {
            Self::with_composer(provisioner, director, false)
        }

        fn with_composer(
            provisioner: Arc<dyn provisioner::Client>,
            director: MockDirector,
            on_demand_versions: bool,
        ) -> Self {
            Self::build(provisioner, director, BrokerStorage::in_memory(), on_demand_versions)
        }

        fn with_storage(
            provisioner: Arc<dyn provisioner::Client>,
            director: MockDirector,
            storage: BrokerStorage,
        ) -> Self {
            Self::build(provisioner, director, storage, false)
        }

        fn build(
            provisioner: Arc<dyn provisioner::Client>,
            director: MockDirector,
            storage: BrokerStorage,
            on_demand_versions: bool,
        ) -> Self {
            let queue = Arc::new(RecordingQueue::default());
            let composer = Arc::new(
                Composer::new(
                    Arc::new(PlanCatalog::builtin()),
                    Arc::new(ComponentLists::builtin()),
                    Arc::new(OptionalComponents::default()),
                )
                .with_on_demand_versions(on_demand_versions),
            );
            let broker = KymaEnvironmentBroker::new(
                storage.clone(),
                composer.clone(),
                queue.clone(),
                provisioner,
                Arc::new(director),
            );
            Self {
                broker,
                storage,
                queue,
                composer,
            }
        }

        /// Run the dispatch worker step for `operation_id` against `provisioner`.
        async fn dispatch(&self, provisioner: Arc<dyn provisioner::Client>, operation_id: &str) {
            let credentials = CredentialPool::new(self.storage.credentials());
            credentials
                .register([Credential::unassigned("azure-1", HyperscalerType::Azure)])
                .await
                .unwrap();
            let services = ProvisioningServices {
                storage: self.storage.clone(),
                credentials,
                composer: self.composer.clone(),
                provisioner,
            };
            provision_runtime_orchestration(
                &services,
                ProvisionOperationInput {
                    operation_id: operation_id.to_string(),
                },
            )
            .await
            .unwrap();
        }

        async fn operation(&self, operation_id: &str) -> Operation {
            self.storage
                .operations()
                .get_operation_by_id(operation_id)
                .await
                .unwrap()
        }
    }

    fn details(service_id: &str, plan_id: &str, parameters: &str) -> ProvisionDetails {
        ProvisionDetails {
            service_id: service_id.to_string(),
            plan_id: plan_id.to_string(),
            raw_context: format!(
                r#"{{"globalaccount_id":"{}","subaccount_id":"sub-1"}}"#,
                GLOBAL_ACCOUNT
            ),
            raw_parameters: parameters.to_string(),
        }
    }

    fn no_director() -> MockDirector {
        MockDirector::new()
    }

    fn dispatched_instance(created_at: DateTime<Utc>, dashboard_url: &str) -> Instance {
        Instance {
            instance_id: "inst-1".to_string(),
            service_id: KYMA_SERVICE_ID.to_string(),
            plan_id: AZURE_PLAN_ID.to_string(),
            global_account_id: GLOBAL_ACCOUNT.to_string(),
            sub_account_id: "sub-1".to_string(),
            runtime_id: Some("runtime-1".to_string()),
            dashboard_url: dashboard_url.to_string(),
            provisioning_parameters: "{}".to_string(),
            created_at,
            updated_at: created_at,
            version: 0,
        }
    }

    /// Instance with a dispatched provisioning operation "op-1".
    async fn seed_in_progress(storage: &BrokerStorage, created_at: DateTime<Utc>, dashboard_url: &str) {
        storage
            .instances()
            .insert(dispatched_instance(created_at, dashboard_url))
            .await
            .unwrap();
        seed_operation(storage).await;
    }

    async fn seed_operation(storage: &BrokerStorage) {
        let mut op = Operation::new(
            "op-1",
            "inst-1",
            OperationType::Provision,
            OperationState::InProgress,
            "Operation created",
        );
        op.provisioner_operation_id = Some("remote-op-1".to_string());
        op.runtime_id = Some("runtime-1".to_string());
        storage.operations().insert_operation(op).await.unwrap();
    }

    fn remote_succeeded() -> MockProvisioner {
        let mut provisioner = MockProvisioner::new();
        provisioner
            .expect_runtime_operation_status()
            .returning(|_, _| {
                Ok(OperationStatus {
                    id: Some("remote-op-1".to_string()),
                    state: RemoteOperationState::Succeeded,
                    message: Some("Operation succeeded".to_string()),
                    runtime_id: Some("runtime-1".to_string()),
                })
            });
        provisioner
    }

    fn director_failing(error: director::Error) -> MockDirector {
        let mut director = MockDirector::new();
        director
            .expect_get_console_url()
            .times(1)
            .returning(move |_, _| Err(error.clone()));
        director
    }

    #[tokio::test]
    async fn test_provision_then_poll_until_dashboard_url() {
        let fake = Arc::new(FakeClient::new());
        let mut director = MockDirector::new();
        director
            .expect_get_console_url()
            .withf(|account, runtime| account == GLOBAL_ACCOUNT && runtime == "runtime-1")
            .times(1)
            .returning(|_, _| Ok("http://example.com".to_string()));
        let h = Harness::new(fake.clone(), director);

        let resp = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING))
            .await
            .unwrap();
        assert!(resp.is_async);
        assert!(!resp.already_exists);
        assert_eq!(h.queue.added(), vec![resp.operation_data.clone()]);

        let last = h.broker.last_operation("inst-1", &resp.operation_data).await.unwrap();
        assert_eq!(last.state, OperationState::InProgress);

        h.dispatch(fake.clone(), &resp.operation_data).await;
        let last = h.broker.last_operation("inst-1", &resp.operation_data).await.unwrap();
        assert_eq!(last.state, OperationState::InProgress);

        let op = h.operation(&resp.operation_data).await;
        let remote_id = op.provisioner_operation_id.unwrap();
        fake.finish_operation(&remote_id, RemoteOperationState::Succeeded, "Operation succeeded");

        let last = h.broker.last_operation("inst-1", &resp.operation_data).await.unwrap();
        assert_eq!(last.state, OperationState::Succeeded);

        let instance = h.storage.instances().get_by_id("inst-1").await.unwrap();
        assert_eq!(instance.dashboard_url, "http://example.com");
        assert_eq!(h.operation(&resp.operation_data).await.state, OperationState::Succeeded);

        // Director is not asked again
        let last = h.broker.last_operation("inst-1", "").await.unwrap();
        assert_eq!(last.state, OperationState::Succeeded);
    }

    #[tokio::test]
    async fn test_dashboard_url_short_circuits_polling() {
        // Neither mock expects a call
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());
        seed_in_progress(&h.storage, Utc::now(), "https://console.example.com").await;

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::Succeeded);
        assert_eq!(last.description, "Dashboard URL already exists in the instance");
        assert_eq!(h.operation("op-1").await.state, OperationState::Succeeded);
    }

    #[tokio::test]
    async fn test_temporary_director_error_within_grace_period() {
        let h = Harness::new(
            Arc::new(remote_succeeded()),
            director_failing(director::Error::Temporary("no label yet".to_string())),
        );
        seed_in_progress(&h.storage, Utc::now(), "").await;

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::InProgress);
        assert_eq!(last.description, "cannot get URL from director: action can be processed again");
        assert_eq!(h.operation("op-1").await.state, OperationState::InProgress);
    }

    #[tokio::test]
    async fn test_temporary_director_error_after_grace_period() {
        let h = Harness::new(
            Arc::new(remote_succeeded()),
            director_failing(director::Error::Temporary("no label yet".to_string())),
        );
        seed_in_progress(&h.storage, Utc::now() - ChronoDuration::hours(4), "").await;

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::Failed);
        assert_eq!(last.description, "cannot get URL from director: instance is out of date");
        assert_eq!(h.operation("op-1").await.state, OperationState::Failed);
    }

    /// Instances whose reads see `instance` and whose updates always fail.
    fn instances_failing_update(instance: Instance) -> BrokerStorage {
        let mut instances = MockInstances::new();
        instances
            .expect_get_by_id()
            .returning(move |_| Ok(instance.clone()));
        instances
            .expect_update()
            .returning(|_| Err(storage::Error::Internal("connection reset".to_string())));
        BrokerStorage::new(
            Arc::new(instances),
            Arc::new(MemoryOperations::default()),
            Arc::new(MemoryCredentials::default()),
        )
    }

    fn director_returning_url() -> MockDirector {
        let mut director = MockDirector::new();
        director
            .expect_get_console_url()
            .times(1)
            .returning(|_, _| Ok("http://example.com".to_string()));
        director
    }

    #[tokio::test]
    async fn test_storing_dashboard_url_fails_within_grace_period() {
        let storage = instances_failing_update(dispatched_instance(Utc::now(), ""));
        seed_operation(&storage).await;
        let h = Harness::with_storage(Arc::new(remote_succeeded()), director_returning_url(), storage);

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::InProgress);
        assert_eq!(
            last.description,
            "cannot update instance in storage: action can be processed again"
        );
        assert_eq!(h.operation("op-1").await.state, OperationState::InProgress);
    }

    #[tokio::test]
    async fn test_storing_dashboard_url_fails_after_grace_period() {
        let storage = instances_failing_update(dispatched_instance(Utc::now() - ChronoDuration::hours(4), ""));
        seed_operation(&storage).await;
        let h = Harness::with_storage(Arc::new(remote_succeeded()), director_returning_url(), storage);

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::Failed);
        assert_eq!(last.description, "cannot update instance in storage: instance is out of date");
        let op = h.operation("op-1").await;
        assert_eq!(op.state, OperationState::Failed);
        assert_eq!(op.description, last.description);
    }

    #[tokio::test]
    async fn test_grace_period_is_configurable() {
        let h = Harness::new(
            Arc::new(remote_succeeded()),
            director_failing(director::Error::Temporary("no label yet".to_string())),
        );
        let broker = h.broker.with_grace_period(Duration::from_secs(60));
        seed_in_progress(&h.storage, Utc::now() - ChronoDuration::minutes(5), "").await;

        let last = broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::Failed);
    }

    #[tokio::test]
    async fn test_permanent_director_error_fails_operation() {
        let h = Harness::new(
            Arc::new(remote_succeeded()),
            director_failing(director::Error::Permanent("runtime is FAILED".to_string())),
        );
        seed_in_progress(&h.storage, Utc::now(), "").await;

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::Failed);
        assert!(last.description.starts_with("cannot get URL from director:"));
        assert_eq!(h.operation("op-1").await.state, OperationState::Failed);
    }

    #[tokio::test]
    async fn test_remote_failure_is_persisted() {
        let mut provisioner = MockProvisioner::new();
        provisioner.expect_runtime_operation_status().times(1).returning(|_, _| {
            Ok(OperationStatus {
                id: Some("remote-op-1".to_string()),
                state: RemoteOperationState::Failed,
                message: Some("quota exceeded".to_string()),
                runtime_id: Some("runtime-1".to_string()),
            })
        });
        let h = Harness::new(Arc::new(provisioner), no_director());
        seed_in_progress(&h.storage, Utc::now(), "").await;

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();
        assert_eq!(last.state, OperationState::Failed);
        assert_eq!(last.description, "quota exceeded");

        // Terminal state is served from the ledger
        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();
        assert_eq!(last.state, OperationState::Failed);
        assert_eq!(last.description, "quota exceeded");
    }

    #[tokio::test]
    async fn test_unrecognized_remote_state_is_in_progress() {
        let mut provisioner = MockProvisioner::new();
        provisioner.expect_runtime_operation_status().returning(|_, _| {
            Ok(OperationStatus {
                id: None,
                state: RemoteOperationState::Unknown,
                message: None,
                runtime_id: None,
            })
        });
        let h = Harness::new(Arc::new(provisioner), no_director());
        seed_in_progress(&h.storage, Utc::now(), "").await;

        let last = h.broker.last_operation("inst-1", "op-1").await.unwrap();

        assert_eq!(last.state, OperationState::InProgress);
        assert_eq!(h.operation("op-1").await.state, OperationState::InProgress);
    }

    #[tokio::test]
    async fn test_transient_poll_error_does_not_fail_operation() {
        let mut provisioner = MockProvisioner::new();
        provisioner
            .expect_runtime_operation_status()
            .returning(|_, _| Err(provisioner::Error::Transport("timeout".to_string())));
        let h = Harness::new(Arc::new(provisioner), no_director());
        seed_in_progress(&h.storage, Utc::now(), "").await;

        let err = h.broker.last_operation("inst-1", "op-1").await.unwrap_err();

        assert!(matches!(err, Error::Provisioner { .. }));
        assert_eq!(h.operation("op-1").await.state, OperationState::InProgress);
    }

    #[tokio::test]
    async fn test_last_operation_unknown_ids() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());
        seed_in_progress(&h.storage, Utc::now(), "").await;

        let err = h.broker.last_operation("inst-2", "op-1").await.unwrap_err();
        assert!(matches!(err, Error::InstanceNotFound(id) if id == "inst-2"));

        let err = h.broker.last_operation("inst-1", "op-9").await.unwrap_err();
        assert!(matches!(err, Error::OperationNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unrecognized_service_is_rejected_without_operation() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());

        let err = h
            .broker
            .provision("inst-1", details("not-kyma", AZURE_PLAN_ID, CLUSTER_TESTING))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(matches!(err, Error::UnrecognizedService(_)));
        let lookup = h.storage.operations().get_operation_by_instance_id("inst-1").await;
        assert!(lookup.unwrap_err().is_not_found());
        assert!(h.queue.added().is_empty());
    }

    #[tokio::test]
    async fn test_provision_validation_errors() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());

        let err = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, "unknown-plan", CLUSTER_TESTING))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnrecognizedPlan(_)));

        let mut missing_account = details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING);
        missing_account.raw_context = r#"{"subaccount_id":"sub-1"}"#.to_string();
        let err = h.broker.provision("inst-1", missing_account).await.unwrap_err();
        assert!(matches!(err, Error::MissingGlobalAccount(_)));

        let mut bad_context = details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING);
        bad_context.raw_context = "not json".to_string();
        let err = h.broker.provision("inst-1", bad_context).await.unwrap_err();
        assert!(matches!(err, Error::MalformedRequest { .. }));

        let err = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, r#"{"name": 7}"#))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedRequest { .. }));

        let err = h
            .broker
            .provision(
                "inst-1",
                details(KYMA_SERVICE_ID, AZURE_PLAN_ID, r#"{"name":"c","region":"mars-1"}"#),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameters { .. }));
        assert!(err.is_validation());

        assert!(h.queue.added().is_empty());
    }

    #[tokio::test]
    async fn test_provision_replay() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());

        let first = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING))
            .await
            .unwrap();
        let replay = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING))
            .await
            .unwrap();

        assert!(replay.already_exists);
        assert_eq!(replay.operation_data, first.operation_data);
        assert_eq!(h.queue.added().len(), 1);

        let err = h
            .broker
            .provision(
                "inst-1",
                details(KYMA_SERVICE_ID, AZURE_PLAN_ID, r#"{"name":"other-cluster"}"#),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_kyma_version_requires_on_demand_versions() {
        let params = r#"{"name":"cluster-testing","kymaVersion":"1.11.0"}"#;

        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());
        let resp = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, params))
            .await
            .unwrap();
        let op = h.operation(&resp.operation_data).await;
        let stored: keb_models::ProvisioningParameters =
            serde_json::from_str(&op.provisioning_parameters).unwrap();
        assert_eq!(stored.parameters.kyma_version, None);

        // Version has no component list
        let h = Harness::with_composer(Arc::new(MockProvisioner::new()), no_director(), true);
        let err = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, params))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameters {
                source: input::Error::UnsupportedKymaVersion(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_deprovision_rules() {
        let fake = Arc::new(FakeClient::new());
        let mut director = MockDirector::new();
        director
            .expect_get_console_url()
            .times(1)
            .returning(|_, _| Ok("https://console.example.com".to_string()));
        let h = Harness::new(fake.clone(), director);

        let err = h.broker.deprovision("inst-1").await.unwrap_err();
        assert!(matches!(err, Error::InstanceNotFound(_)));

        let resp = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING))
            .await
            .unwrap();
        let err = h.broker.deprovision("inst-1").await.unwrap_err();
        assert!(err.is_conflict());

        h.dispatch(fake.clone(), &resp.operation_data).await;
        let remote_id = h.operation(&resp.operation_data).await.provisioner_operation_id.unwrap();
        fake.finish_operation(&remote_id, RemoteOperationState::Succeeded, "done");
        let last = h.broker.last_operation("inst-1", &resp.operation_data).await.unwrap();
        assert_eq!(last.state, OperationState::Succeeded);

        let first = h.broker.deprovision("inst-1").await.unwrap();
        let second = h.broker.deprovision("inst-1").await.unwrap();
        assert_eq!(first, second);

        let op = h.operation(&first.operation_data).await;
        assert_eq!(op.kind, OperationType::Deprovision);
        assert_eq!(op.state, OperationState::InProgress);

        let last = h.broker.last_operation("inst-1", "").await.unwrap();
        assert_eq!(last.state, OperationState::InProgress);

        let remote_id = op.provisioner_operation_id.unwrap();
        fake.finish_operation(&remote_id, RemoteOperationState::Succeeded, "deprovisioned");
        let last = h.broker.last_operation("inst-1", "").await.unwrap();
        assert_eq!(last.state, OperationState::Succeeded);
        assert_eq!(last.description, "deprovisioned");
    }

    #[tokio::test]
    async fn test_deprovision_without_runtime_succeeds_immediately() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());
        let resp = h
            .broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING))
            .await
            .unwrap();
        modify_failed(&h.storage, &resp.operation_data).await;

        let deprovisioned = h.broker.deprovision("inst-1").await.unwrap();

        let op = h.operation(&deprovisioned.operation_data).await;
        assert_eq!(op.kind, OperationType::Deprovision);
        assert_eq!(op.state, OperationState::Succeeded);
    }

    async fn modify_failed(storage: &BrokerStorage, operation_id: &str) {
        crate::storage::modify_operation(storage.operations(), operation_id, |op| {
            op.state = OperationState::Failed;
            true
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_deprovision_surfaces_provisioner_errors() {
        let mut provisioner = MockProvisioner::new();
        provisioner
            .expect_deprovision_runtime()
            .times(1)
            .returning(|_, _| Err(provisioner::Error::Conflict("operation in progress".to_string())));
        let h = Harness::new(Arc::new(provisioner), no_director());
        seed_in_progress(&h.storage, Utc::now(), "").await;
        modify_failed(&h.storage, "op-1").await;

        let err = h.broker.deprovision("inst-1").await.unwrap_err();

        assert!(err.is_conflict());
        let latest = h.storage.operations().get_operation_by_instance_id("inst-1").await.unwrap();
        assert_eq!(latest.id, "op-1");
    }

    #[tokio::test]
    async fn test_get_instance() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());
        h.broker
            .provision("inst-1", details(KYMA_SERVICE_ID, AZURE_PLAN_ID, CLUSTER_TESTING))
            .await
            .unwrap();

        let details = h.broker.get_instance("inst-1").await.unwrap();

        assert_eq!(details.service_id, KYMA_SERVICE_ID);
        assert_eq!(details.plan_id, AZURE_PLAN_ID);
        assert_eq!(details.dashboard_url, "");
        assert_eq!(details.parameters["parameters"]["name"], "cluster-testing");
        assert_eq!(details.parameters["ers_context"]["globalaccount_id"], GLOBAL_ACCOUNT);
    }

    #[tokio::test]
    async fn test_get_instance_with_undecodable_parameters() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());
        let mut instance = dispatched_instance(Utc::now(), "");
        instance.provisioning_parameters = "{not json".to_string();
        h.storage.instances().insert(instance).await.unwrap();

        let err = h.broker.get_instance("inst-1").await.unwrap_err();

        assert!(matches!(err, Error::CorruptParameters { ref instance_id, .. } if instance_id == "inst-1"));
        assert!(err.to_string().contains("inst-1"));
    }

    #[test]
    fn test_binding_operations_are_not_supported() {
        let h = Harness::new(Arc::new(MockProvisioner::new()), no_director());

        assert!(matches!(h.broker.update("inst-1"), Err(Error::NotSupported(_))));
        assert!(matches!(h.broker.bind("inst-1", "b-1"), Err(Error::NotSupported(_))));
        assert!(matches!(h.broker.unbind("inst-1", "b-1"), Err(Error::NotSupported(_))));
        assert!(matches!(h.broker.get_binding("inst-1", "b-1"), Err(Error::NotSupported(_))));
        assert!(matches!(
            h.broker.last_binding_operation("inst-1", "b-1"),
            Err(Error::NotSupported(_))
        ));
    }
}
