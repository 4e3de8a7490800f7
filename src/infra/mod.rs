//! Runtime bootstrap: tracing, metric descriptions and wiring from settings.

pub mod bootstrap;
pub mod error;
pub mod telemetry;
