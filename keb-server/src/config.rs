use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use keb_orchestrations::director::OAuthCredentials;

const DEFAULT_GRACE_PERIOD_SECS: u64 = 3 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Required unless running with `--db-in-memory`
    pub database_url: Option<String>,
    pub provisioner_url: String,
    pub director_url: String,
    pub director_oauth: OAuthCredentials,
    pub enabled_plans: Vec<String>,
    pub plans_file: Option<PathBuf>,
    pub components_file: Option<PathBuf>,
    pub credentials_file: Option<PathBuf>,
    pub kyma_version: Option<String>,
    pub enable_on_demand_version: bool,
    pub dump_provisioner_requests: bool,
    pub grace_period: Duration,
    pub workers: usize,
    pub retry_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            provisioner_url: std::env::var("PROVISIONER_URL")
                .context("PROVISIONER_URL must be set")?,
            director_url: std::env::var("DIRECTOR_URL").context("DIRECTOR_URL must be set")?,
            director_oauth: OAuthCredentials {
                token_url: std::env::var("DIRECTOR_OAUTH_TOKEN_URL")
                    .context("DIRECTOR_OAUTH_TOKEN_URL must be set")?,
                client_id: std::env::var("DIRECTOR_OAUTH_CLIENT_ID")
                    .context("DIRECTOR_OAUTH_CLIENT_ID must be set")?,
                client_secret: std::env::var("DIRECTOR_OAUTH_CLIENT_SECRET")
                    .context("DIRECTOR_OAUTH_CLIENT_SECRET must be set")?,
            },
            enabled_plans: std::env::var("ENABLED_PLANS")
                .unwrap_or_else(|_| "azure".to_string())
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            plans_file: optional("PLANS_FILE").map(PathBuf::from),
            components_file: optional("MANAGED_COMPONENTS_FILE").map(PathBuf::from),
            credentials_file: optional("HYPERSCALER_CREDENTIALS_FILE").map(PathBuf::from),
            kyma_version: optional("KYMA_VERSION"),
            enable_on_demand_version: flag("ENABLE_ON_DEMAND_VERSION")?,
            dump_provisioner_requests: flag("DUMP_PROVISIONER_REQUESTS")?,
            grace_period: Duration::from_secs(
                std::env::var("GRACE_PERIOD_SECONDS")
                    .unwrap_or_else(|_| DEFAULT_GRACE_PERIOD_SECS.to_string())
                    .parse()
                    .context("GRACE_PERIOD_SECONDS must be a number of seconds")?,
            ),
            workers: std::env::var("WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("WORKERS must be a positive number")?,
            retry_delay: Duration::from_secs(
                std::env::var("DISPATCH_RETRY_SECONDS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("DISPATCH_RETRY_SECONDS must be a number of seconds")?,
            ),
        })
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn flag(name: &str) -> Result<bool> {
    match optional(name) {
        None => Ok(false),
        Some(value) => value
            .parse()
            .with_context(|| format!("{} must be true or false", name)),
    }
}
