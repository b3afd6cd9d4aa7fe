//! Resolve hyperscaler credentials activity

use super::ActivityContext;
use crate::activity_types::{ResolveCredentialsInput, ResolveCredentialsOutput};
use crate::orchestrations::Error;

/// Activity name for logging
pub const NAME: &str = crate::names::activities::RESOLVE_CREDENTIALS;

pub async fn activity(
    ctx: ActivityContext<'_>,
    input: ResolveCredentialsInput,
) -> Result<ResolveCredentialsOutput, Error> {
    ctx.trace_info(format!(
        "Resolving {} credential for tenant {}",
        input.hyperscaler_type, input.tenant
    ));

    let credential = ctx
        .services()
        .credentials
        .assign(input.hyperscaler_type, &input.tenant)
        .await?;

    ctx.trace_info(format!("Using credential {}", credential.name));
    Ok(ResolveCredentialsOutput { credential })
}
