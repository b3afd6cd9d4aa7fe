//! Name constants for orchestrations and activities
//!
//! Naming convention: {crate-name}::{type}::{name}. Names appear in every log
//! line an orchestration or activity emits.

/// Orchestration names
pub mod orchestrations {
    /// Dispatch a pending provisioning operation to the provisioner
    ///
    /// **Input:** [`crate::types::ProvisionOperationInput`]
    /// **Output:** [`crate::types::ProvisionOperationOutput`]
    /// **Activities used:**
    /// - [`super::activities::RESOLVE_CREDENTIALS`]
    /// - [`super::activities::BUILD_RUNTIME_INPUT`]
    /// - [`super::activities::CLAIM_OPERATION`]
    /// - [`super::activities::CREATE_RUNTIME`]
    /// - [`super::activities::RELEASE_OPERATION`]
    /// - [`super::activities::RECORD_DISPATCH`]
    pub const PROVISION_RUNTIME: &str = "keb-orchestrations::orchestration::provision-runtime";
}

/// Activity names
pub mod activities {
    /// Assign a hyperscaler credential to the tenant
    ///
    /// **Idempotent:** Yes (returns the credential already bound to the tenant)
    pub const RESOLVE_CREDENTIALS: &str = "keb-orchestrations::activity::resolve-credentials";

    /// Compose the provisioner request from plan defaults and tenant parameters
    ///
    /// **Idempotent:** Yes (pure)
    pub const BUILD_RUNTIME_INPUT: &str = "keb-orchestrations::activity::build-runtime-input";

    /// Take the pending operation for this dispatcher (pending to in progress)
    ///
    /// **Idempotent:** No (only one caller wins the version check)
    pub const CLAIM_OPERATION: &str = "keb-orchestrations::activity::claim-operation";

    /// Put a claimed operation back to pending after a temporary failure
    pub const RELEASE_OPERATION: &str = "keb-orchestrations::activity::release-operation";

    /// Ask the provisioner to create the runtime
    ///
    /// **Idempotent:** No (the provisioner creates a new runtime per call)
    pub const CREATE_RUNTIME: &str = "keb-orchestrations::activity::create-runtime";

    /// Move the operation to in progress and store the runtime ID on the instance
    pub const RECORD_DISPATCH: &str = "keb-orchestrations::activity::record-dispatch";

    /// Mark the operation as failed with a message
    pub const MARK_OPERATION_FAILED: &str = "keb-orchestrations::activity::mark-operation-failed";
}
