//! Input and output types for orchestrations

use serde::{Deserialize, Serialize};

// ============================================================================
// Provision Runtime Orchestration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionOperationInput {
    /// Broker operation to dispatch
    pub operation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionOperationOutput {
    /// Operation ID assigned by the provisioner
    pub provisioner_operation_id: String,
    /// Runtime ID assigned by the provisioner
    pub runtime_id: String,
    /// Hyperscaler credential the runtime was provisioned with
    pub credential_name: String,
}
