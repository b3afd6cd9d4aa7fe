//! Build provisioner runtime input activity

use super::ActivityContext;
use crate::activity_types::{BuildRuntimeInputInput, BuildRuntimeInputOutput};
use crate::orchestrations::Error;

pub const NAME: &str = crate::names::activities::BUILD_RUNTIME_INPUT;

pub async fn activity(
    ctx: ActivityContext<'_>,
    input: BuildRuntimeInputInput,
) -> Result<BuildRuntimeInputOutput, Error> {
    let runtime_input = ctx
        .services()
        .composer
        .compose(&input.parameters, &input.credential)?;

    ctx.trace_info(format!(
        "Runtime input ready: {} nodes of {} in {}, Kyma {} with {} components",
        runtime_input.cluster_config.node_count,
        runtime_input.cluster_config.machine_type,
        runtime_input.cluster_config.region,
        runtime_input.kyma_config.version,
        runtime_input.kyma_config.components.len()
    ));
    Ok(BuildRuntimeInputOutput { runtime_input })
}
