//! Release operation activity

use keb_models::OperationState;

use super::claim_operation::is_claimed;
use super::ActivityContext;
use crate::activity_types::{ReleaseOperationInput, ReleaseOperationOutput};
use crate::orchestrations::Error;
use crate::storage::modify_operation;

pub const NAME: &str = crate::names::activities::RELEASE_OPERATION;

pub async fn activity(
    ctx: ActivityContext<'_>,
    input: ReleaseOperationInput,
) -> Result<ReleaseOperationOutput, Error> {
    let mut released = false;
    modify_operation(ctx.services().storage.operations(), &input.operation_id, |op| {
        released = is_claimed(op);
        if released {
            op.state = OperationState::Pending;
            op.description = input.description.clone();
        }
        released
    })
    .await
    .map_err(Error::Release)?;

    if released {
        ctx.trace_info("Operation back to pending");
    }
    Ok(ReleaseOperationOutput { released })
}
