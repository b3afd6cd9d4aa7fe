use std::time::Duration;

use anyhow::Result;
use keb_models::{ErsContext, OperationState, ProvisioningParametersDto, KYMA_SERVICE_ID};
use keb_orchestrations::broker::{KymaEnvironmentBroker, LastOperationResponse, ProvisionDetails};
use keb_orchestrations::retry::poll_until;

use crate::app::App;
use crate::cli::ProvisionRequest;
use crate::config::Config;

const POLL_INTERVAL: Duration = Duration::from_secs(10);
const POLL_TIMEOUT: Duration = Duration::from_secs(90 * 60);

pub async fn run_provision(config: Config, db_in_memory: bool, request: ProvisionRequest) -> Result<()> {
    let app = App::build(&config, db_in_memory, 1).await?;

    let plan_id = app_plan_id(&app, &request.plan)?;
    let context = ErsContext {
        globalaccount_id: request.global_account,
        subaccount_id: request.subaccount,
        ..Default::default()
    };
    let parameters = ProvisioningParametersDto {
        name: request.name,
        node_count: request.node_count,
        machine_type: request.machine_type,
        region: request.region,
        components: request.components,
        kyma_version: request.kyma_version,
        ..Default::default()
    };
    let details = ProvisionDetails {
        service_id: KYMA_SERVICE_ID.to_string(),
        plan_id,
        raw_context: serde_json::to_string(&context)?,
        raw_parameters: serde_json::to_string(&parameters)?,
    };

    let response = app.broker.provision(&request.instance_id, details).await?;
    if response.already_exists {
        println!("Provisioning already requested");
    }
    println!("Instance:  {}", request.instance_id);
    println!("Operation: {}", response.operation_data);

    if request.wait {
        let last = wait_for(&app.broker, &request.instance_id, &response.operation_data).await?;
        print_last_operation(&last);
    }

    // Lets the worker finish dispatching what was queued
    app.queue.shutdown().await;
    Ok(())
}

pub async fn run_deprovision(
    config: Config,
    db_in_memory: bool,
    instance_id: String,
    wait: bool,
) -> Result<()> {
    let app = App::build(&config, db_in_memory, 1).await?;

    let response = app.broker.deprovision(&instance_id).await?;
    println!("Instance:  {}", instance_id);
    println!("Operation: {}", response.operation_data);

    if wait {
        let last = wait_for(&app.broker, &instance_id, &response.operation_data).await?;
        print_last_operation(&last);
    }

    app.queue.shutdown().await;
    Ok(())
}

pub async fn run_last_operation(
    config: Config,
    db_in_memory: bool,
    instance_id: String,
    operation: String,
) -> Result<()> {
    let app = App::build(&config, db_in_memory, 1).await?;

    let last = app.broker.last_operation(&instance_id, &operation).await?;
    print_last_operation(&last);

    app.queue.shutdown().await;
    Ok(())
}

pub async fn run_get(config: Config, db_in_memory: bool, instance_id: String, output: String) -> Result<()> {
    let app = App::build(&config, db_in_memory, 1).await?;

    let instance = app.broker.get_instance(&instance_id).await?;

    if output == "json" {
        let value = serde_json::json!({
            "service_id": instance.service_id,
            "plan_id": instance.plan_id,
            "dashboard_url": instance.dashboard_url,
            "parameters": instance.parameters,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("Instance: {}", instance_id);
        println!("{}", "=".repeat(60));
        println!("  Service ID:    {}", instance.service_id);
        println!("  Plan ID:       {}", instance.plan_id);
        println!(
            "  Dashboard URL: {}",
            if instance.dashboard_url.is_empty() { "-" } else { &instance.dashboard_url }
        );
        println!();
        println!("Parameters:");
        println!("{}", serde_json::to_string_pretty(&instance.parameters["parameters"])?);
    }

    app.queue.shutdown().await;
    Ok(())
}

fn app_plan_id(app: &App, plan: &str) -> Result<String> {
    app.broker
        .plan_id(plan)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Plan '{}' is not enabled", plan))
}

async fn wait_for(
    broker: &KymaEnvironmentBroker,
    instance_id: &str,
    operation_id: &str,
) -> Result<LastOperationResponse> {
    tracing::info!("Waiting for operation {} to finish", operation_id);
    let last = poll_until(POLL_INTERVAL, POLL_TIMEOUT, || async {
        let last = broker.last_operation(instance_id, operation_id).await?;
        tracing::debug!(state = %last.state, description = %last.description, "Polled operation");
        Ok::<_, keb_orchestrations::broker::Error>(last.state.is_terminal().then_some(last))
    })
    .await?;
    Ok(last)
}

fn print_last_operation(last: &LastOperationResponse) {
    let marker = match last.state {
        OperationState::Succeeded => "✓",
        OperationState::Failed => "✗",
        _ => "…",
    };
    println!("{} {}", marker, last.state);
    if !last.description.is_empty() {
        println!("  {}", last.description);
    }
}
