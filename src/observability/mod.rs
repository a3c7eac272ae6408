//! Observability for the sprinkler bridge
//!
//! Structured logging through `tracing`, configured from the environment.

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{command_span, lifecycle_span, mqtt_span};
