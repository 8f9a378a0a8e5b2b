//! Headless arena runner.
//!
//! This binary runs arena scenarios without graphics and prints a JSON
//! summary. Designed for AI tuning, CI testing and determinism checks.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario with the ticks and tick length it declares
//! cargo run -p arena_headless -- run crates/arena_headless/scenarios/corridor.ron
//!
//! # Override the run length and swap in a config file
//! cargo run -p arena_headless -- run scenario.ron --ticks 2000 --dt-ms 16 --config tuned.ron
//!
//! # Validate a config file and print the effective values
//! cargo run -p arena_headless -- check-config crates/arena_headless/scenarios/arena_config.ron
//! ```
//!
//! Output (stdout): one JSON document
//! Logs (stderr): Debug information

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use arena_headless::runner::run_arena;
use arena_headless::scenario::{dt_from_millis, load_config, Scenario};

#[derive(Parser)]
#[command(name = "arena_headless")]
#[command(about = "Headless arena runner for NPC AI testing and CI")]
#[command(version)]
struct Cli {
    /// Log level for stderr output (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print the JSON summary
    Run {
        /// Scenario file to load
        scenario: PathBuf,

        /// Number of ticks to run (defaults to the scenario's value)
        #[arg(long)]
        ticks: Option<u64>,

        /// Tick length in milliseconds (defaults to the scenario's value)
        #[arg(long)]
        dt_ms: Option<u32>,

        /// Arena config file, replacing any config inside the scenario
        #[arg(long)]
        config: Option<PathBuf>,

        /// Pretty-print the JSON summary
        #[arg(long)]
        pretty: bool,
    },

    /// Parse a config file and print the effective values as JSON
    CheckConfig {
        /// Config file to check
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for the summary)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(tracing_subscriber::filter::LevelFilter::from_level(
            cli.log_level,
        ))
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            dt_ms,
            config,
            pretty,
        } => cmd_run(&scenario, ticks, dt_ms, config, pretty),
        Commands::CheckConfig { config } => cmd_check_config(&config),
    }
}

/// Run a single scenario
fn cmd_run(
    path: &std::path::Path,
    ticks: Option<u64>,
    dt_ms: Option<u32>,
    config_path: Option<PathBuf>,
    pretty: bool,
) {
    let scenario = match Scenario::load(path) {
        Ok(s) => s,
        Err(e) => fatal(&format!("Cannot load scenario '{}'", path.display()), &e),
    };

    let config_override = match config_path.as_deref().map(load_config).transpose() {
        Ok(c) => c,
        Err(e) => fatal("Cannot load config", &e),
    };

    let mut arena = match scenario.build_arena(config_override) {
        Ok(a) => a,
        Err(e) => fatal(&format!("Cannot set up scenario '{}'", scenario.name), &e),
    };

    let ticks = ticks.unwrap_or(scenario.ticks);
    let dt = dt_ms.map_or_else(|| scenario.dt(), dt_from_millis);

    tracing::info!(
        scenario = %scenario.name,
        ticks = ticks,
        dt = %dt,
        agents = scenario.agents.len(),
        "Starting run"
    );

    let summary = run_arena(&scenario.name, &mut arena, ticks, dt);
    print_json(&summary, pretty);
}

/// Validate a config file
fn cmd_check_config(path: &std::path::Path) {
    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Config is valid");
            print_json(&config, true);
        }
        Err(e) => fatal(&format!("Invalid config '{}'", path.display()), &e),
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => fatal("Cannot serialize output", &e),
    }
}

fn fatal(context: &str, error: &dyn std::error::Error) -> ! {
    tracing::error!(error = %error, "{context}");
    eprintln!("FATAL: {context}: {error}");
    std::process::exit(1);
}
