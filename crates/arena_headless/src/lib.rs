//! Headless scenario runner for NPC AI testing and CI verification.
//!
//! Loads a RON scenario (map, target, agents), runs the arena for a number
//! of ticks without rendering and reports the outcome as JSON. This enables:
//!
//! - **AI tuning**: Compare agent behavior across config changes
//! - **CI verification**: Scenario outcomes and state hashes are reproducible
//!
//! # Output
//!
//! - **stdout**: The JSON run summary
//! - **stderr**: Logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Run a scenario with its own tick count
//! cargo run -p arena_headless -- run crates/arena_headless/scenarios/corridor.ron
//!
//! # Override ticks and tick length, with debug logging
//! cargo run -p arena_headless -- run scenario.ron --ticks 1000 --dt-ms 16 --log-level debug
//!
//! # Validate a config file
//! cargo run -p arena_headless -- check-config crates/arena_headless/scenarios/arena_config.ron
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod runner;
pub mod scenario;

pub use runner::{run_arena, AgentSummary, RunSummary, TargetSummary};
pub use scenario::{load_config, AgentPlacement, Scenario, ScenarioError, TargetPlacement};
