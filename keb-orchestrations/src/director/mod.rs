//! Director metadata client used to resolve a runtime's console URL.
//!
//! Errors are split into temporary ones (the runtime is not registered or
//! labelled yet, director unreachable) and permanent ones (the runtime failed
//! or carries an unusable label).

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::retry::Transient;

mod graphql;
mod oauth;

pub use graphql::GraphQlClient;
pub use oauth::{OAuthClient, OAuthCredentials};

/// Runtime label under which the director publishes the console URL
pub const CONSOLE_URL_LABEL: &str = "runtime_consoleUrl";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("temporary director error: {0}")]
    Temporary(String),
    #[error("director error: {0}")]
    Permanent(String),
}

impl Error {
    pub fn is_temporary(&self) -> bool {
        matches!(self, Error::Temporary(_))
    }
}

impl Transient for Error {
    fn is_transient(&self) -> bool {
        self.is_temporary()
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Client: Send + Sync {
    /// Console URL registered for `runtime_id` in the global account's tenant.
    async fn get_console_url(&self, account_id: &str, runtime_id: &str) -> Result<String, Error>;
}

/// Runtime as registered in the director
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct DirectorRuntime {
    pub id: String,
    #[serde(default)]
    pub status: Option<RuntimeCondition>,
    #[serde(default)]
    pub labels: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RuntimeCondition {
    pub condition: String,
}

/// True for absolute URLs such as `https://console.example.com`.
pub fn is_valid_url(raw: &str) -> bool {
    reqwest::Url::parse(raw)
        .map(|url| url.has_host())
        .unwrap_or(false)
}

/// Extract and classify the console URL from a director runtime.
pub fn console_url_from_runtime(
    runtime_id: &str,
    runtime: Option<&DirectorRuntime>,
) -> Result<String, Error> {
    let runtime = runtime.ok_or_else(|| {
        Error::Temporary(format!("director returned no runtime for ID {}", runtime_id))
    })?;

    if let Some(status) = &runtime.status {
        if status.condition.eq_ignore_ascii_case("failed") {
            return Err(Error::Permanent(format!(
                "runtime {} is in condition FAILED",
                runtime_id
            )));
        }
    }

    let label = runtime.labels.get(CONSOLE_URL_LABEL).ok_or_else(|| {
        Error::Temporary(format!(
            "runtime {} has no {} label yet",
            runtime_id, CONSOLE_URL_LABEL
        ))
    })?;
    let url = label.as_str().ok_or_else(|| {
        Error::Permanent(format!(
            "label {} of runtime {} is not a string: {}",
            CONSOLE_URL_LABEL, runtime_id, label
        ))
    })?;

    if !is_valid_url(url) {
        return Err(Error::Permanent(format!(
            "console URL {:?} of runtime {} is not a valid URL",
            url, runtime_id
        )));
    }
    Ok(url.to_string())
}
