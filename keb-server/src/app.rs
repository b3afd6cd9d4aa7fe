use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use keb_models::{Credential, HyperscalerType};
use keb_orchestrations::broker::KymaEnvironmentBroker;
use keb_orchestrations::director;
use keb_orchestrations::hyperscaler::CredentialPool;
use keb_orchestrations::input::{ComponentLists, Composer, OptionalComponents, PlanCatalog};
use keb_orchestrations::orchestrations::{ProvisionExecutor, ProvisioningServices, WorkQueue};
use keb_orchestrations::provisioner;
use keb_orchestrations::storage::BrokerStorage;
use serde::Deserialize;

use crate::config::Config;

/// Broker wired to its dispatch workers.
pub struct App {
    pub broker: KymaEnvironmentBroker,
    pub queue: Arc<WorkQueue>,
    pub storage: BrokerStorage,
}

/// Entry of the hyperscaler credential seed file
#[derive(Debug, Deserialize)]
struct CredentialSeed {
    name: String,
    hyperscaler_type: HyperscalerType,
}

impl App {
    pub async fn build(config: &Config, db_in_memory: bool, workers: usize) -> Result<Self> {
        let storage = if db_in_memory {
            tracing::warn!("Using in-memory storage, nothing survives this process");
            BrokerStorage::in_memory()
        } else {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set (or pass --db-in-memory)")?;
            BrokerStorage::postgres(crate::db::connect(url).await?)
        };

        let composer = Arc::new(build_composer(config)?);

        let credentials = CredentialPool::new(storage.credentials());
        if let Some(path) = &config.credentials_file {
            let seeds = load_credential_seeds(path)?;
            tracing::info!(count = seeds.len(), "Registering hyperscaler credentials");
            credentials
                .register(seeds)
                .await
                .context("Failed to register hyperscaler credentials")?;
        }

        let http = reqwest::Client::new();
        let provisioner: Arc<dyn provisioner::Client> = Arc::new(
            provisioner::GraphQlClient::new(&config.provisioner_url)
                .with_request_dump(config.dump_provisioner_requests),
        );
        let oauth = Arc::new(director::OAuthClient::new(
            http.clone(),
            config.director_oauth.clone(),
        ));
        let director: Arc<dyn director::Client> =
            Arc::new(director::GraphQlClient::new(http, &config.director_url, oauth));

        let services = ProvisioningServices {
            storage: storage.clone(),
            credentials,
            composer: composer.clone(),
            provisioner: provisioner.clone(),
        };
        let executor = Arc::new(ProvisionExecutor::new(services, config.retry_delay));
        let queue = WorkQueue::start(workers, executor);

        let broker = KymaEnvironmentBroker::new(
            storage.clone(),
            composer,
            queue.clone(),
            provisioner,
            director,
        )
        .with_grace_period(config.grace_period);

        Ok(Self {
            broker,
            queue,
            storage,
        })
    }
}

fn build_composer(config: &Config) -> Result<Composer> {
    let catalog = match &config.plans_file {
        Some(path) => PlanCatalog::load(path)
            .with_context(|| format!("Failed to load plans from {}", path.display()))?,
        None => PlanCatalog::builtin(),
    }
    .retain_enabled(&config.enabled_plans);
    if catalog.plans().next().is_none() {
        anyhow::bail!("ENABLED_PLANS ({}) enables no known plan", config.enabled_plans.join(","));
    }

    let mut components = match &config.components_file {
        Some(path) => ComponentLists::load(path)
            .with_context(|| format!("Failed to load managed components from {}", path.display()))?,
        None => ComponentLists::builtin(),
    };
    if let Some(version) = &config.kyma_version {
        components
            .components(version)
            .with_context(|| format!("KYMA_VERSION {} has no component list", version))?;
        components.default_version = version.clone();
    }

    tracing::info!(
        plans = %catalog.plans().map(|p| p.name.as_str()).collect::<Vec<_>>().join(","),
        kyma_version = %components.default_version,
        on_demand_versions = config.enable_on_demand_version,
        "Composer configured"
    );

    Ok(Composer::new(
        Arc::new(catalog),
        Arc::new(components),
        Arc::new(OptionalComponents::default()),
    )
    .with_on_demand_versions(config.enable_on_demand_version))
}

fn load_credential_seeds(path: &Path) -> Result<Vec<Credential>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
    parse_credential_seeds(&raw)
        .with_context(|| format!("Failed to parse credentials file {}", path.display()))
}

fn parse_credential_seeds(raw: &str) -> Result<Vec<Credential>> {
    let seeds: Vec<CredentialSeed> = serde_yaml::from_str(raw)?;
    Ok(seeds
        .into_iter()
        .map(|seed| Credential::unassigned(seed.name, seed.hyperscaler_type))
        .collect())
}
