pub mod config;
pub mod error;
pub mod processing;
pub mod telemetry;
