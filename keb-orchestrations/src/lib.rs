//! KEB Orchestrations - provisioning core of the Kyma environment broker
//!
//! This crate holds the broker gateway, the dispatch orchestration with its
//! activities, and the collaborators they drive: the hyperscaler credential
//! pool, the cluster input composer, the provisioner and director clients
//! and the operation ledger.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use keb_orchestrations::broker::KymaEnvironmentBroker;
//! use keb_orchestrations::orchestrations::{ProvisionExecutor, ProvisioningServices, WorkQueue};
//!
//! # fn example(services: ProvisioningServices, director: Arc<dyn keb_orchestrations::director::Client>) {
//! let executor = Arc::new(ProvisionExecutor::new(services.clone(), Duration::from_secs(10)));
//! let queue = WorkQueue::start(4, executor);
//! let broker = KymaEnvironmentBroker::new(
//!     services.storage.clone(),
//!     services.composer.clone(),
//!     queue,
//!     services.provisioner.clone(),
//!     director,
//! );
//! # }
//! ```

// Orchestration exports
pub mod names;
pub mod orchestrations;
pub mod types;

// Activity exports
pub mod activities;
pub mod activity_types;

pub mod broker;
pub mod director;
pub mod hyperscaler;
pub mod input;
pub mod provisioner;
pub mod retry;
pub mod storage;

// Re-export key types for convenience
pub use activity_types::*;
pub use types::*;
