//! Shared data model for the Kyma environment broker: instances, operations,
//! provisioning parameters, hyperscaler credentials and the cluster input
//! handed to the remote provisioner.

mod cluster;
mod hyperscaler;
mod instance;
mod parameters;
mod runtime;

pub use cluster::*;
pub use hyperscaler::*;
pub use instance::*;
pub use parameters::*;
pub use runtime::*;

/// Service ID under which the broker registers the Kyma offering
pub const KYMA_SERVICE_ID: &str = "47c9dcbf-ff30-448e-ab36-d3bad66ba281";
