//! Neuroljus Engine Library
//!
//! Hybrid response controller for non-diagnostic, assistive conversation
//! in caregiving and autism-support contexts. Used by both the main binary
//! and integration tests.

/// Configuration management module
pub mod config;

/// Error types module
pub mod errors;

/// Supported locales and fixed texts
pub mod locale;

/// Behavioral telemetry: data model, aggregator and feed
pub mod signals;

/// Deterministic local rule engine
pub mod rules;

/// System-instruction composition for the delegated path
pub mod policy;

/// Persisted user memory
pub mod memory;

/// External model provider abstraction layer
pub mod llm;

/// Credential redaction wrapper
pub mod secrets;

/// Conversation controller and session state machine
pub mod chat;

/// Logging and observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
