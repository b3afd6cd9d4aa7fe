//! Mark operation failed activity

use keb_models::OperationState;

use super::ActivityContext;
use crate::activity_types::{MarkOperationFailedInput, MarkOperationFailedOutput};
use crate::orchestrations::Error;
use crate::storage::modify_operation;

pub const NAME: &str = crate::names::activities::MARK_OPERATION_FAILED;

pub async fn activity(
    ctx: ActivityContext<'_>,
    input: MarkOperationFailedInput,
) -> Result<MarkOperationFailedOutput, Error> {
    let mut updated = false;
    modify_operation(
        ctx.services().storage.operations(),
        &input.operation_id,
        |op| {
            updated = !op.state.is_terminal();
            if updated {
                op.state = OperationState::Failed;
                op.description = input.message.clone();
            }
            updated
        },
    )
    .await?;

    if updated {
        ctx.trace_info(format!("Operation marked as failed: {}", input.message));
    }
    Ok(MarkOperationFailedOutput { updated })
}
