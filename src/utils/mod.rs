// Ambient support: configuration, errors, telemetry sinks and CSV export.
pub mod config;
pub mod error;
pub mod export;
pub mod recorder;
pub mod sink;
