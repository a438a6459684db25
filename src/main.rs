#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::Parser;
use relay_gateway::server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "relay-gateway",
    about = "Load-balancing reverse proxy in front of the service directory"
)]
struct Cli {
    /// Path to gateway config file (.toml or .json)
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Proxy listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<String>,

    /// Admin listen address (health/ready/metrics/snapshot)
    #[arg(long)]
    admin_listen: Option<String>,

    /// How often to refresh the routing snapshot, e.g. "1s" or "500ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    polling_rate: Option<Duration>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let rt = server::runtime::build("relay-gateway")?;
    rt.block_on(server::bootstrap::run_gateway(server::bootstrap::GatewayArgs {
        config_path: cli.config,
        listen: cli.listen,
        admin_listen: cli.admin_listen,
        polling_rate: cli.polling_rate,
    }))
}
