use clap::Parser;
use tracing_subscriber::EnvFilter;

use crowny_exchange::api;
use crowny_exchange::config::Config;

/// crowny-exchange — multi-tenant AMM + auto-trading gateway.
#[derive(Parser)]
#[command(name = "crowny-exchange", version, about)]
struct Cli {
    /// Host to bind the HTTP + WebSocket listener on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to bind (defaults to $PORT or 7400).
    #[arg(long)]
    port: Option<u16>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(api::serve(&cli.host, config))
}
