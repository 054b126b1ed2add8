//! Command-line front-end for the trade-loop discovery engine: loads a
//! JSON snapshot, runs full-graph discovery, and prints the ranked loops.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use loop_engine_core::{DiscoveryConfig, DiscoveryEngine, Snapshot};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "loop-engine", about = "Trade-loop discovery engine CLI")]
struct Cli {
    /// Path to a JSON-encoded snapshot (wallets + items).
    snapshot: PathBuf,

    /// Path to a JSON-encoded `DiscoveryConfig` override. Defaults are used
    /// for any field the file omits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the full `DiscoveryResult` (including stats) as JSON instead
    /// of a human-readable summary.
    #[arg(long)]
    json: bool,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<DiscoveryConfig> {
    match path {
        None => Ok(DiscoveryConfig::default()),
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.snapshot)?;
    let snapshot: Snapshot = serde_json::from_str(&raw)?;
    let config = load_config(cli.config.as_ref())?;

    info!(wallets = snapshot.wallets.len(), items = snapshot.items.len(), "loaded snapshot");

    let engine = DiscoveryEngine::new(&config);
    let result = engine.discover(&snapshot, &config);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result_as_json(&result))?);
    } else {
        println!(
            "found {} loop(s) ({} cycles, {} permutations eliminated, timed_out={})",
            result.loops.len(),
            result.stats.cycles_found,
            result.stats.permutations_eliminated,
            result.stats.timed_out
        );
        for loop_ in &result.loops {
            println!(
                "  {} participants={} quality={:.3} efficiency={:.3}",
                loop_.id, loop_.participants, loop_.quality, loop_.efficiency
            );
        }
    }

    Ok(())
}

/// `DiscoveryResult` does not itself derive `Serialize` (its `loops` field
/// does; the stats struct is assembled here instead of pulling `serde`
/// derives into a type whose core purpose is in-process orchestration).
fn result_as_json(result: &loop_engine_core::DiscoveryResult) -> serde_json::Value {
    serde_json::json!({
        "loops": result.loops,
        "stats": {
            "scc_ms": result.stats.scc_ms,
            "cycle_ms": result.stats.cycle_ms,
            "dedup_ms": result.stats.dedup_ms,
            "cycles_found": result.stats.cycles_found,
            "permutations_eliminated": result.stats.permutations_eliminated,
            "timed_out": result.stats.timed_out,
        },
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().expect("static filter directive")))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "loop-engine failed");
            ExitCode::FAILURE
        }
    }
}
