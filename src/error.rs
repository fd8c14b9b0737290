//! Error types for the chat bus
//!
//! Defines bus, delivery, configuration and transport errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Event API errors
///
/// Backpressure and unknown subscribers are not errors; the only failure
/// is a producer submitting after the dispatcher has gone away.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BusError {
    /// The intake queue has no dispatcher draining it
    #[error("Dispatcher stopped")]
    DispatcherStopped,
}

/// Mailbox delivery errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// Mailbox is at capacity (non-blocking delivery only)
    #[error("Mailbox full")]
    Full,

    /// Mailbox was closed by logout or re-registration
    #[error("Mailbox closed")]
    Closed,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable is set but cannot be parsed
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

/// Transport-level errors
///
/// Ends the affected connection; never reaches the bus.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// A connection task panicked or was cancelled
    #[error("Connection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
