use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cellmon::config::Config;
use cellmon::store::MemoryStore;
use cellmon::types::Technology;
use cellmon::verify::HttpTowerLookup;
use cellmon::{decoder, Cellmon};

#[derive(Parser)]
#[command(name = "cellmon")]
#[command(author, version, about = "rogue cellular base station detector")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll the local capture process and verify incoming cells
    Daemon,

    /// Decode a compound cell identifier
    Decode {
        /// Radio access technology (gsm, umts, lte, nr)
        technology: Technology,

        /// Compound cell identifier
        id: i64,

        /// NR sector-id bit width (4-14)
        #[arg(short, long)]
        sector_bits: Option<u8>,
    },

    /// Resolve a (mcc, mnc) pair against the operator dataset
    Resolve {
        /// Mobile country code
        mcc: i64,

        /// Mobile network code
        mnc: i64,
    },

    /// Import a diagnostic log archive and verify every cell in it
    Import {
        /// Path to the log file, one diagnostic line per record
        file: PathBuf,
    },
}

/// Route tracing output through `RUST_LOG`, with `--debug` forcing the
/// debug level regardless of the environment
pub fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

fn build_cellmon(config: Config) -> Result<Cellmon> {
    let lookup = HttpTowerLookup::new(
        config.verification.lookup_endpoint.clone(),
        config.verification.lookup_timeout_secs,
    )
    .context("Failed to build tower lookup client")?;
    Ok(Cellmon::new(config, Arc::new(MemoryStore::new()), Arc::new(lookup)))
}

/// One daemon poll: print fresh verdicts, tolerate capture failures.
///
/// A transport error on one poll must not take the monitor down; it is
/// logged and the next tick retries.
async fn poll_and_report(cellmon: &Cellmon) {
    match cellmon.poll_capture().await {
        Ok(Some(results)) => {
            for (id, verdict) in results {
                println!(
                    "cell #{}: score {} ({}){}",
                    id,
                    verdict.score,
                    verdict.classification,
                    if verdict.finished { "" } else { " [pending]" }
                );
            }
        }
        Ok(None) => {} // capture process idle
        Err(e) => warn!("Capture query failed, retrying next poll: {}", e),
    }
}

pub async fn run_command(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Daemon => {
            let interval = config.general.poll_interval_secs;
            let cellmon = build_cellmon(config)?;
            info!("Polling capture process every {}s", interval);
            let mut ticker =
                tokio::time::interval(tokio::time::Duration::from_secs(interval));
            loop {
                ticker.tick().await;
                poll_and_report(&cellmon).await;
            }
        }

        Commands::Decode {
            technology,
            id,
            sector_bits,
        } => {
            let decoded = decoder::decode(technology, id, sector_bits)?;
            println!(
                "{} {} -> station {}, sector {}",
                technology, id, decoded.station, decoded.sector
            );
        }

        Commands::Resolve { mcc, mnc } => {
            let table =
                cellmon::operators::OperatorTable::load(&config.operators.dataset_path);
            match table.resolve(mcc, mnc) {
                Some(op) => println!(
                    "{}-{}: {} ({}, {})",
                    mcc,
                    mnc,
                    op.network_name.as_deref().unwrap_or("<unnamed>"),
                    op.country_name,
                    op.iso
                ),
                None => match table.resolve_country(mcc) {
                    Some(country) => {
                        println!("{}-{}: unknown network in {}", mcc, mnc, country.name)
                    }
                    None => println!("{}-{}: not found", mcc, mnc),
                },
            }
        }

        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read log file: {}", file.display()))?;
            let now = chrono::Utc::now();
            let cellmon = build_cellmon(config)?;
            let lines = content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| (l.to_string(), now))
                .collect::<Vec<_>>();
            let results = cellmon.import_archive(lines).await?;
            for (id, verdict) in &results {
                println!(
                    "cell #{}: score {} ({})",
                    id, verdict.score, verdict.classification
                );
            }
            println!("Imported {} cells", results.len());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellmon::store::MemoryStore;
    use cellmon::verify::StaticTowerLookup;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_cli_parses_decode_command() {
        let cli = Cli::try_parse_from(["cellmon", "--debug", "decode", "lte", "1234567"]).unwrap();
        assert!(cli.debug);
        match cli.command {
            Commands::Decode {
                technology,
                id,
                sector_bits,
            } => {
                assert_eq!(technology, Technology::Lte);
                assert_eq!(id, 1234567);
                assert_eq!(sector_bits, None);
            }
            _ => panic!("expected decode command"),
        }
    }

    fn cellmon_on_port(port: u16) -> Cellmon {
        let mut config = Config::default();
        config.capture.port = port;
        config.operators.dataset_path = "/nonexistent/operators.json.gz".to_string();
        Cellmon::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(StaticTowerLookup::new(vec![])),
        )
    }

    #[tokio::test]
    async fn test_poll_survives_transport_error() {
        // server sends a non-final frame and hangs up mid-response
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut wire = (3u32).to_be_bytes().to_vec();
            wire.push(0);
            wire.extend_from_slice(b"abc");
            socket.write_all(&wire).await.unwrap();
        });

        let cellmon = cellmon_on_port(port);
        // must return, not propagate or panic; the daemon loop keeps ticking
        poll_and_report(&cellmon).await;
    }

    #[tokio::test]
    async fn test_poll_idles_on_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let cellmon = cellmon_on_port(port);
        poll_and_report(&cellmon).await;
    }
}
