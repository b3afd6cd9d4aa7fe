//! Input and output types for activities

use keb_models::{
    Credential, HyperscalerType, OperationState, ProvisionRuntimeInput, ProvisioningParameters,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// Resolve Credentials Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolveCredentialsInput {
    pub hyperscaler_type: HyperscalerType,
    /// Tenant the credential is bound to (the global account ID)
    pub tenant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolveCredentialsOutput {
    pub credential: Credential,
}

// ============================================================================
// Build Runtime Input Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildRuntimeInputInput {
    pub parameters: ProvisioningParameters,
    pub credential: Credential,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildRuntimeInputOutput {
    pub runtime_input: ProvisionRuntimeInput,
}

// ============================================================================
// Claim Operation Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimOperationInput {
    pub operation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimOperationOutput {
    /// False if another dispatcher got there first
    pub claimed: bool,
    /// State found when the claim was attempted
    pub state: OperationState,
    /// Description to restore if the claim is released
    pub previous_description: String,
}

// ============================================================================
// Release Operation Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseOperationInput {
    pub operation_id: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReleaseOperationOutput {
    pub released: bool,
}

// ============================================================================
// Create Runtime Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRuntimeInput {
    pub tenant: String,
    pub runtime_input: ProvisionRuntimeInput,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateRuntimeOutput {
    pub provisioner_operation_id: String,
    pub runtime_id: String,
}

// ============================================================================
// Record Dispatch Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordDispatchInput {
    pub operation_id: String,
    pub instance_id: String,
    pub provisioner_operation_id: String,
    pub runtime_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordDispatchOutput {
    /// True once the operation and the instance hold the runtime
    pub updated: bool,
}

// ============================================================================
// Mark Operation Failed Activity
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkOperationFailedInput {
    pub operation_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkOperationFailedOutput {
    pub updated: bool,
}
