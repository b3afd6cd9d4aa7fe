//! Activities: the single steps an orchestration is built from.

use tracing::{error, info, warn};

use crate::orchestrations::ProvisioningServices;

pub mod build_runtime_input;
pub mod claim_operation;
pub mod create_runtime;
pub mod mark_operation_failed;
pub mod record_dispatch;
pub mod release_operation;
pub mod resolve_credentials;

/// Per-invocation context: the activity name, the operation it serves and the shared services.
pub struct ActivityContext<'a> {
    name: &'static str,
    operation_id: &'a str,
    services: &'a ProvisioningServices,
}

impl<'a> ActivityContext<'a> {
    pub fn new(name: &'static str, operation_id: &'a str, services: &'a ProvisioningServices) -> Self {
        Self {
            name,
            operation_id,
            services,
        }
    }

    pub fn services(&self) -> &'a ProvisioningServices {
        self.services
    }

    pub fn trace_info(&self, message: impl AsRef<str>) {
        info!(activity = self.name, operation_id = %self.operation_id, "{}", message.as_ref());
    }

    pub fn trace_warn(&self, message: impl AsRef<str>) {
        warn!(activity = self.name, operation_id = %self.operation_id, "{}", message.as_ref());
    }

    pub fn trace_error(&self, message: impl AsRef<str>) {
        error!(activity = self.name, operation_id = %self.operation_id, "{}", message.as_ref());
    }
}
