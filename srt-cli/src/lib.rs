//! SRT Filter CLI Library
//!
//! Scenario files, a loopback simulation and report formatting shared by
//! the `srt-filter-cli` tool.

pub mod report;
pub mod scenario;
pub mod simulate;

pub use report::{display_config, display_filter, display_loopback, format_bytes, format_losses};
pub use scenario::{ScenarioConfig, ScenarioError};
pub use simulate::{run_loopback, LoopbackReport, SimulateError};
