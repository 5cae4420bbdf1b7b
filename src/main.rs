use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use eyre::{Error, Result, WrapErr};
use log::info;

use flashroute::arb::finder::FinderKind;
use flashroute::config::Config;
use flashroute::io::Input;
use flashroute::pipeline;
use flashroute::utils::logger::setup_logger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find the best route in a snapshot
    Run {
        /// Snapshot file, `-` for stdin
        #[arg(short, long)]
        input: PathBuf,
        /// Finder to run, overrides the snapshot and the environment
        #[arg(short, long, value_enum)]
        mode: Option<FinderKind>,
        /// Minimum `price_transport - 1` for a path to be sized
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Where to write the route, stdout when unset
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the circuits through the snapshot's flashloan tokens
    Circuits {
        /// Snapshot file, `-` for stdin
        #[arg(short, long)]
        input: PathBuf,
        /// Number of hops per circuit
        #[arg(short, long, default_value_t = 3)]
        length: usize,
    },
}

/// Reads and parses a snapshot
fn read_input(path: &Path) -> Result<Input> {
    let raw = if path == Path::new("-") {
        let mut raw = String::new();
        io::stdin().read_to_string(&mut raw)?;
        raw
    } else {
        fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?
    };
    serde_json::from_str(&raw).wrap_err("parsing snapshot")
}

fn main() -> Result<(), Error> {
    let mut config = Config::from_env()?;
    setup_logger(config.log_level)?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            input,
            mode,
            threshold,
            output,
        } => {
            let mut snapshot = read_input(&input)?;
            if let Some(mode) = mode {
                snapshot.mode = Some(mode);
            }
            if let Some(threshold) = threshold {
                config.threshold = threshold;
            }
            let result = pipeline::run(snapshot, &config)?;
            let json = serde_json::to_string_pretty(&result)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)?;
                    info!("route written to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Circuits { input, length } => {
            for circuit in pipeline::circuits(read_input(&input)?, length)? {
                let tokens: Vec<&str> = circuit.iter().map(|tkn| tkn.as_str()).collect();
                println!("{}", tokens.join(" -> "));
            }
        }
    }

    Ok(())
}
