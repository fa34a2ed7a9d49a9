//! SRT Filter CLI - inspect and exercise packet filter configurations

use anyhow::Context;
use clap::{Parser, Subcommand};
use srt_cli::scenario::SessionConfig;
use srt_cli::{display_config, display_filter, display_loopback, run_loopback, ScenarioConfig};
use srt_filter::{FilterConfig, FilterRegistry, PacketFilter};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "srt-filter-cli")]
#[command(about = "SRT packet filter tool", long_about = None)]
struct Args {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a configuration string and build the filter it names
    Parse {
        /// Configuration, e.g. "fec,cols:10,rows:5"
        config: String,

        /// Payload size to build the filter against
        #[arg(long, default_value = "1316")]
        payload_size: usize,

        /// Socket id of the session
        #[arg(long, default_value = "4096")]
        socket_id: u32,

        /// Initial sequence number
        #[arg(long, default_value = "0")]
        isn: u32,
    },

    /// Run a loopback simulation
    Simulate {
        /// Scenario file (TOML)
        #[arg(short, long, conflicts_with = "config")]
        scenario: Option<PathBuf>,

        /// Configuration string, used with default session settings
        #[arg(short, long)]
        config: Option<String>,

        /// Number of data packets
        #[arg(short, long)]
        packets: Option<u32>,

        /// Offsets of data packets to drop, comma separated
        #[arg(short, long, value_delimiter = ',')]
        drop: Vec<u32>,

        /// Initial sequence number
        #[arg(long)]
        isn: Option<u32>,

        /// Payload size of every packet
        #[arg(long)]
        payload_size: Option<usize>,
    },

    /// Print an example scenario file
    ExampleScenario {
        /// Write to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let registry = FilterRegistry::builtin();

    match args.command {
        Command::Parse {
            config,
            payload_size,
            socket_id,
            isn,
        } => {
            let config = FilterConfig::parse(&config)
                .with_context(|| format!("Invalid filter configuration '{}'", config))?;
            display_config(&config);

            let session = SessionConfig {
                socket_id,
                isn,
                payload_size,
            };
            let filter = PacketFilter::new(&registry, session.to_parameters()?, config)?;
            display_filter(&filter);
        }

        Command::Simulate {
            scenario,
            config,
            packets,
            drop,
            isn,
            payload_size,
        } => {
            let mut scenario = match (scenario, config) {
                (Some(path), _) => {
                    tracing::info!("Loading scenario from {}", path.display());
                    ScenarioConfig::from_file(&path)
                        .with_context(|| format!("Failed to load scenario '{}'", path.display()))?
                }
                (None, Some(config)) => ScenarioConfig::with_filter(&config),
                (None, None) => {
                    tracing::info!("No scenario given, running the example");
                    ScenarioConfig::example()
                }
            };
            if let Some(packets) = packets {
                scenario.run.packets = packets;
            }
            if !drop.is_empty() {
                scenario.run.drop = drop;
            }
            if let Some(isn) = isn {
                scenario.session.isn = isn;
            }
            if let Some(payload_size) = payload_size {
                scenario.session.payload_size = payload_size;
            }

            let report = run_loopback(&registry, &scenario)?;
            display_loopback(&report);

            if !report.fully_recovered() {
                tracing::warn!(
                    "{} packets unrecovered, {} corrupt",
                    report.unrecovered.len(),
                    report.mismatched.len()
                );
            }
        }

        Command::ExampleScenario { output } => {
            let scenario = ScenarioConfig::example();
            match output {
                Some(path) => {
                    scenario
                        .to_file(&path)
                        .with_context(|| format!("Failed to write '{}'", path.display()))?;
                    tracing::info!("Example scenario written to {}", path.display());
                }
                None => print!("{}", scenario.to_toml()?),
            }
        }
    }

    Ok(())
}
