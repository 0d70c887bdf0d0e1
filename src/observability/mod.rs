//! Observability: structured logging setup and span helpers

pub mod logging;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, LogFormat};

// Span macros for structured logging
pub use logging::{delivery_span, session_span};
