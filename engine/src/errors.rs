//! Error types for the Neuroljus engine
//!
//! `EngineError` covers configuration, the memory store, and the telemetry
//! feed. Failures of the external model capability have their own taxonomy
//! in [`crate::llm::ModelError`] because those messages are shown verbatim
//! in the conversation thread.

use thiserror::Error;

/// Main engine error type
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Memory store read/write failure
    #[error("Memory store error: {0}")]
    Memory(String),

    /// Telemetry source failure (transport or malformed frame)
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}
