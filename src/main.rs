//! Gateway binary

use clap::Parser;
use llmgate::config::GatewayConfig;
use llmgate::Gateway;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "gateway", version, about = "Multi-provider LLM gateway")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, env = "LLMGATE_CONFIG")]
    config: Option<String>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => GatewayConfig::from_file(path).await?,
        None => GatewayConfig::from_env()?,
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    info!(version = llmgate::VERSION, "starting llmgate");
    let gateway = Gateway::new(config)?;
    gateway.run().await?;
    Ok(())
}
