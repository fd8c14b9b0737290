//! Chat Message Bus Library
//!
//! Distributes chat events among many concurrently connected participants,
//! with a WebSocket binding built on tokio-tungstenite.
//!
//! # Features
//! - Registration and logout with join/leave announcements
//! - Current-user roster after every announcement
//! - Broadcast chat without self-echo
//! - Blocking per-subscriber receive
//! - One global delivery order shared by every mailbox
//!
//! # Architecture
//! ```text
//! caller -> Broker -> intake queue -> Dispatcher -> registry snapshot -> mailboxes -> Receive
//! ```
//! - `Broker` is the event API; clone it into every handler
//! - `Dispatcher` is the single task draining the intake queue
//! - `Registry` maps identities to bounded `Mailbox`es behind one lock
//!
//! # Example
//! ```ignore
//! use chat_bus::{Broker, BusConfig, Identity};
//!
//! #[tokio::main]
//! async fn main() {
//!     let broker = Broker::start(&BusConfig::default());
//!
//!     broker.register(Identity::from("alice")).await.unwrap();
//!     broker.register(Identity::from("bob")).await.unwrap();
//!     broker.send_message(Identity::from("bob"), "hi").await.unwrap();
//!
//!     // "** User [alice] joined the chat **", ...
//!     let payload = broker.receive(&Identity::from("alice")).await;
//! }
//! ```

pub mod broker;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod handler;
pub mod mailbox;
pub mod message;
pub mod registry;
pub mod types;

// Re-export main types for convenience
pub use broker::Broker;
pub use config::{BusConfig, OverflowPolicy};
pub use dispatcher::Dispatcher;
pub use error::{AppError, BusError, ConfigError, DeliveryError};
pub use event::BroadcastEvent;
pub use handler::handle_connection;
pub use mailbox::Mailbox;
pub use message::{Payload, Request, RequestFrame, Response, ResponseFrame};
pub use registry::Registry;
pub use types::{ConnectionId, Identity};
