use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use sentinel_core::{AppConfig, ConfigLoader, FeedConnector, ShutdownToken};
use sentinel_exchange::BinanceConnector;
use sentinel_store::InfluxStore;
use sentinel_supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Real-time market data capture pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the capture pipeline
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Sentinel.toml")]
        config: String,
        /// Capture raw top-of-book levels alongside the binned stream
        #[arg(long)]
        raw_book: bool,
    },
    /// Short bounded capture run, for smoke-testing a deployment
    DryRun {
        /// Config file path
        #[arg(short, long, default_value = "config/Sentinel.toml")]
        config: String,
        /// Capture raw top-of-book levels alongside the binned stream
        #[arg(long)]
        raw_book: bool,
        /// Run length in seconds
        #[arg(long, default_value_t = 60)]
        duration_secs: u64,
    },
    /// Load and print the resolved configuration, then exit
    CheckConfig {
        /// Config file path
        #[arg(short, long, default_value = "config/Sentinel.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { config, raw_book } => {
            let mut config = ConfigLoader::load(&config)?;
            if raw_book {
                config.encoding.raw_book = true;
            }
            run(config).await
        }
        Commands::DryRun {
            config,
            raw_book,
            duration_secs,
        } => {
            let mut config = ConfigLoader::load(&config)?;
            if raw_book {
                config.encoding.raw_book = true;
            }
            config.exchange.run_duration_secs = Some(duration_secs);
            run(config).await
        }
        Commands::CheckConfig { config } => {
            let mut config = ConfigLoader::load(&config)?;
            if !config.influx.token.is_empty() {
                config.influx.token = "<redacted>".to_string();
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    let connector = select_connector(&config)?;
    info!(
        exchange = %config.exchange.id,
        symbols = ?config.exchange.symbols,
        "Starting capture"
    );

    let store = Arc::new(InfluxStore::connect(&config.influx).await?);
    let supervisor = Supervisor::new(config, connector, store);
    supervisor.run(ShutdownToken::new()).await
}

fn select_connector(config: &AppConfig) -> anyhow::Result<Arc<dyn FeedConnector>> {
    match config.exchange.id.as_str() {
        "binance" => Ok(Arc::new(BinanceConnector::new(&config.exchange.ws_url))),
        other => anyhow::bail!("unsupported exchange id: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_connector_known_exchange() {
        let config = AppConfig::default();
        let connector = select_connector(&config).unwrap();
        assert_eq!(connector.descriptor().exchange, "binance");
    }

    #[test]
    fn test_select_connector_rejects_unknown_exchange() {
        let mut config = AppConfig::default();
        config.exchange.id = "kraken".to_string();
        assert!(select_connector(&config).is_err());
    }
}
