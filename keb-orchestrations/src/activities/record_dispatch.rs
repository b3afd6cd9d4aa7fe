//! Record dispatch activity

use keb_models::OperationState;

use super::claim_operation::is_claimed;
use super::ActivityContext;
use crate::activity_types::{RecordDispatchInput, RecordDispatchOutput};
use crate::orchestrations::Error;
use crate::storage::{modify_instance, modify_operation};

pub const NAME: &str = crate::names::activities::RECORD_DISPATCH;

pub async fn activity(
    ctx: ActivityContext<'_>,
    input: RecordDispatchInput,
) -> Result<RecordDispatchOutput, Error> {
    let storage = &ctx.services().storage;

    let mut updated = false;
    modify_operation(storage.operations(), &input.operation_id, |op| {
        updated = is_claimed(op);
        if !updated {
            return false;
        }
        op.state = OperationState::InProgress;
        op.description = "Operation created".to_string();
        op.provisioner_operation_id = Some(input.provisioner_operation_id.clone());
        op.runtime_id = Some(input.runtime_id.clone());
        true
    })
    .await
    .map_err(Error::Record)?;

    if !updated {
        ctx.trace_error(format!(
            "Operation is no longer claimed, runtime {} is not recorded",
            input.runtime_id
        ));
        return Err(Error::LostClaim {
            operation_id: input.operation_id,
            runtime_id: input.runtime_id,
        });
    }

    modify_instance(storage.instances(), &input.instance_id, |instance| {
        instance.runtime_id = Some(input.runtime_id.clone());
        true
    })
    .await
    .map_err(Error::Record)?;

    ctx.trace_info(format!(
        "Operation in progress (runtime {}, provisioner operation {})",
        input.runtime_id, input.provisioner_operation_id
    ));
    Ok(RecordDispatchOutput { updated })
}
