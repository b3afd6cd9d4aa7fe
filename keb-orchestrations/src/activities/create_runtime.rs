//! Create runtime activity

use super::ActivityContext;
use crate::activity_types::{CreateRuntimeInput, CreateRuntimeOutput};
use crate::orchestrations::Error;

pub const NAME: &str = crate::names::activities::CREATE_RUNTIME;

pub async fn activity(
    ctx: ActivityContext<'_>,
    input: CreateRuntimeInput,
) -> Result<CreateRuntimeOutput, Error> {
    ctx.trace_info(format!(
        "Requesting runtime {} from provisioner",
        input.runtime_input.runtime_input.name
    ));

    let provisioned = ctx
        .services()
        .provisioner
        .provision_runtime(&input.tenant, &input.runtime_input)
        .await?;

    ctx.trace_info(format!(
        "Provisioner accepted runtime {} (operation {})",
        provisioned.runtime_id, provisioned.operation_id
    ));
    Ok(CreateRuntimeOutput {
        provisioner_operation_id: provisioned.operation_id,
        runtime_id: provisioned.runtime_id,
    })
}
