use clap::{Args as ClapArgs, Parser, Subcommand};

/// Kyma Environment Broker - provisions managed Kyma runtimes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Keep instances, operations and credentials in memory instead of Postgres
    #[arg(long, global = true)]
    pub db_in_memory: bool,

    #[command(subcommand)]
    pub mode: Mode,
}

#[derive(Subcommand, Debug)]
pub enum Mode {
    /// Run the dispatch workers until Ctrl+C
    Worker {
        /// Number of dispatch workers (default: WORKERS or 4)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Provision a Kyma runtime
    Provision(ProvisionRequest),

    /// Deprovision the runtime of an instance
    Deprovision {
        instance_id: String,

        /// Poll until the operation finishes
        #[arg(long)]
        wait: bool,
    },

    /// Show the state of an instance's operation
    LastOperation {
        instance_id: String,

        /// Operation ID (default: the most recent operation)
        #[arg(long, default_value = "")]
        operation: String,
    },

    /// Get details of an instance
    Get {
        instance_id: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        output: String,
    },
}

#[derive(ClapArgs, Debug)]
pub struct ProvisionRequest {
    pub instance_id: String,

    /// Plan name: azure, gcp or aws
    #[arg(long, default_value = "azure")]
    pub plan: String,

    /// Global account the runtime is billed to
    #[arg(long)]
    pub global_account: String,

    #[arg(long, default_value = "")]
    pub subaccount: String,

    /// Runtime name
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long)]
    pub machine_type: Option<String>,

    #[arg(long)]
    pub node_count: Option<i32>,

    /// Optional components to keep installed (Kiali, Tracing)
    #[arg(long = "component")]
    pub components: Vec<String>,

    /// Kyma version (only with ENABLE_ON_DEMAND_VERSION)
    #[arg(long)]
    pub kyma_version: Option<String>,

    /// Poll until the operation finishes
    #[arg(long)]
    pub wait: bool,
}
