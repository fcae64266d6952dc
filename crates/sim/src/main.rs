//! Scan-cycle simulator CLI
//!
//! Compiles a Structured Text program, then drives the interpreter for
//! a fixed number of scans, applying scripted stimulus from a scenario
//! file between scans and reporting watched values after each one.

mod engine;
mod scenario;

use clap::Parser as ClapParser;
use engine::Simulator;
use rung_runtime::{SlotKind, Value};
use scenario::ScenarioFile;
use std::path::PathBuf;
use std::process;
use tracing::{info, warn};

#[derive(ClapParser)]
#[command(name = "rungs")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Simulate a Structured Text program under scan-cycle semantics", long_about = None)]
struct Cli {
    /// Input .st source file
    input: PathBuf,

    /// Scenario file with scripted stimulus (TOML)
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Number of scans to run (overrides the scenario)
    #[arg(long)]
    scans: Option<u64>,

    /// Scan period in milliseconds (overrides the scenario)
    #[arg(long)]
    scan_ms: Option<i64>,

    /// Access paths to report each scan; repeatable
    #[arg(short, long)]
    watch: Vec<String>,

    /// Emit one JSON object per scan instead of a table
    #[arg(long)]
    json: bool,
}

/// Scans to run when neither the CLI nor the scenario says
const DEFAULT_SCANS: u64 = 20;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let source = match std::fs::read_to_string(&cli.input) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading {}: {}", cli.input.display(), e);
            process::exit(1);
        }
    };

    let (mut sim, warnings) = match Simulator::load(&source) {
        Ok(loaded) => loaded,
        Err(message) => {
            eprintln!("Compile failed:\n{}", message);
            process::exit(1);
        }
    };
    for diagnostic in &warnings {
        warn!("{}", diagnostic);
    }

    let scenario = match &cli.scenario {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(text) => match ScenarioFile::from_toml(&text) {
                Ok(s) => s,
                Err(message) => {
                    eprintln!("Error in {}: {}", path.display(), message);
                    process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error reading {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => ScenarioFile::default(),
    };

    let scans = cli
        .scans
        .or(scenario.scenario.scans)
        .unwrap_or(DEFAULT_SCANS);
    let scan_ms = cli
        .scan_ms
        .or(scenario.scenario.scan_ms)
        .unwrap_or(sim.state().scan_time_ms);
    sim.state_mut().scan_time_ms = scan_ms;

    let mut watch: Vec<String> = cli.watch;
    watch.extend(scenario.scenario.watch.iter().cloned());
    if watch.is_empty() {
        watch = sim.default_watch();
    }

    info!(
        program = %cli.input.display(),
        scans,
        scan_ms,
        "starting simulation"
    );
    sim.start();

    if !cli.json {
        print_header(&watch);
    }

    for scan_index in 0..scans {
        for failure in scenario.apply(scan_index, sim.state_mut()) {
            warn!("scan {}: {}", scan_index, failure);
        }

        let report = sim.tick(scan_ms);
        for diagnostic in &report.diagnostics {
            warn!("scan {}: {}", scan_index, diagnostic);
        }

        if cli.json {
            print_json_row(&sim, scan_index, &watch);
        } else {
            print_row(&sim, scan_index, &watch);
        }
    }

    sim.stop();
}

const COLUMN_WIDTH: usize = 12;

fn print_header(watch: &[String]) {
    let mut line = format!("{:>6}  {:>10}", "scan", "elapsed");
    for name in watch {
        line.push_str(&format!("  {:>width$}", name, width = COLUMN_WIDTH));
    }
    println!("{}", line);
}

fn print_row(sim: &Simulator, scan_index: u64, watch: &[String]) {
    let elapsed = rungc::timeval::format_time_ms(sim.state().elapsed_ms);
    let mut line = format!("{:>6}  {:>10}", scan_index, elapsed);
    for name in watch {
        let text = match sim.read(name) {
            Some(value) => value.to_string(),
            None => "-".to_string(),
        };
        line.push_str(&format!("  {:>width$}", text, width = COLUMN_WIDTH));
    }
    println!("{}", line);
}

fn print_json_row(sim: &Simulator, scan_index: u64, watch: &[String]) {
    let mut values = serde_json::Map::new();
    for name in watch {
        values.insert(name.clone(), watch_json(sim, name));
    }
    let row = serde_json::json!({
        "scan": scan_index,
        "elapsedMs": sim.state().elapsed_ms,
        "values": values,
    });
    println!("{}", row);
}

/// A watched value as JSON. Watching an instance name yields the whole
/// record; scalars yield their plain value.
fn watch_json(sim: &Simulator, name: &str) -> serde_json::Value {
    let state = sim.state();
    match state.slot_kind(name) {
        Some(SlotKind::Timer) => serde_json::to_value(state.get_timer(name)).unwrap_or_default(),
        Some(SlotKind::Counter) => {
            serde_json::to_value(state.get_counter(name)).unwrap_or_default()
        }
        Some(SlotKind::Edge) => serde_json::to_value(state.get_edge(name)).unwrap_or_default(),
        Some(SlotKind::Bistable) => {
            serde_json::to_value(state.get_bistable(name)).unwrap_or_default()
        }
        _ => match sim.read(name) {
            Some(Value::Bool(b)) => serde_json::Value::Bool(b),
            Some(Value::Int(n)) => serde_json::Value::from(n),
            Some(Value::Real(r)) => {
                serde_json::Number::from_f64(r).map(serde_json::Value::Number).unwrap_or_default()
            }
            Some(Value::Time(ms)) => {
                serde_json::Value::String(rungc::timeval::format_time_ms(ms))
            }
            None => serde_json::Value::Null,
        },
    }
}
