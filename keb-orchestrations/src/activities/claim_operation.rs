//! Claim operation activity

use keb_models::{Operation, OperationState};

use super::ActivityContext;
use crate::activity_types::{ClaimOperationInput, ClaimOperationOutput};
use crate::orchestrations::Error;
use crate::storage::modify_operation;

pub const NAME: &str = crate::names::activities::CLAIM_OPERATION;

/// Description of an operation a dispatcher has taken but not yet handed to the provisioner.
pub const DISPATCHING: &str = "Dispatching runtime to provisioner";

/// In progress without a provisioner operation: held by a dispatcher.
pub(crate) fn is_claimed(op: &Operation) -> bool {
    op.state == OperationState::InProgress && op.provisioner_operation_id.is_none()
}

pub async fn activity(
    ctx: ActivityContext<'_>,
    input: ClaimOperationInput,
) -> Result<ClaimOperationOutput, Error> {
    let mut claimed = false;
    let mut state = OperationState::Pending;
    let mut previous_description = String::new();
    modify_operation(ctx.services().storage.operations(), &input.operation_id, |op| {
        state = op.state;
        claimed = op.state == OperationState::Pending;
        if claimed {
            previous_description = std::mem::replace(&mut op.description, DISPATCHING.to_string());
            op.state = OperationState::InProgress;
        }
        claimed
    })
    .await?;

    if claimed {
        ctx.trace_info("Operation claimed for dispatch");
    } else {
        ctx.trace_warn(format!("Operation is {}, another dispatcher took it", state));
    }
    Ok(ClaimOperationOutput {
        claimed,
        state,
        previous_description,
    })
}
