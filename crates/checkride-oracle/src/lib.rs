//! checkride-oracle — grading oracle integrations.
//!
//! Implements the `GradingOracle` trait for an OpenAI-compatible completion
//! API, an offline rule-based grader, and a scripted test double.

pub mod config;
pub mod mock;
pub mod openai;
pub mod stub;

pub use checkride_core::error::OracleError;
pub use config::{create_oracle, load_config, CheckrideConfig, OracleConfig};
