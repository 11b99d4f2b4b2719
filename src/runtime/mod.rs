// Runtime: fixed-rate tick loop, telemetry ring buffers and derived analytics.
pub mod analytics;
pub mod history;
pub mod knobs;
pub mod runner;
