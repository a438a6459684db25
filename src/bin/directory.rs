#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::Result;
use clap::Parser;
use relay_gateway::server;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "relay-directory",
    about = "Service directory with active health probing"
)]
struct Cli {
    /// Path to the static service config (.toml, .json or .yaml)
    #[arg(short, long, env = "REGISTRY_CONFIG_PATH", default_value = "services.json")]
    config: PathBuf,

    /// Listen address, overrides the config file
    #[arg(short, long)]
    listen: Option<String>,

    /// Health probe interval, e.g. "1s" or "500ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    polling_rate: Option<Duration>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let rt = server::runtime::build("relay-directory")?;
    rt.block_on(server::bootstrap::run_directory(server::bootstrap::DirectoryArgs {
        config_path: cli.config,
        listen: cli.listen,
        polling_rate: cli.polling_rate,
    }))
}
