//! Broker: the bus's event API
//!
//! Owns the registry and the producer end of the intake queue. Cheap to
//! clone; every transport handler gets its own handle to the same bus.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::BusConfig;
use crate::dispatcher::Dispatcher;
use crate::error::BusError;
use crate::event::BroadcastEvent;
use crate::message::{Request, Response};
use crate::registry::Registry;
use crate::types::Identity;

#[derive(Debug, Clone)]
pub struct Broker {
    registry: Arc<Registry>,
    /// Intake queue producer
    intake: mpsc::Sender<BroadcastEvent>,
}

impl Broker {
    /// Build a bus and the dispatcher that must be spawned to drive it
    pub fn new(config: &BusConfig) -> (Self, Dispatcher) {
        let registry = Arc::new(Registry::new(config.mailbox_capacity));
        let (intake, receiver) = mpsc::channel(config.intake_capacity.max(1));
        let dispatcher = Dispatcher::new(registry.clone(), receiver, config.overflow);
        (Self { registry, intake }, dispatcher)
    }

    /// Build a bus and spawn its dispatcher on the current runtime
    pub fn start(config: &BusConfig) -> Self {
        let (broker, dispatcher) = Self::new(config);
        tokio::spawn(dispatcher.run());
        broker
    }

    /// Queue an event, waiting while the intake queue is full
    async fn submit(&self, event: BroadcastEvent) -> Result<(), BusError> {
        self.intake
            .send(event)
            .await
            .map_err(|_| BusError::DispatcherStopped)
    }

    /// Claim an intake slot, waiting while the intake queue is full
    ///
    /// Registry changes happen only once a slot is held, so a caller
    /// cancelled while waiting leaves no unannounced join or leave behind.
    async fn reserve(&self) -> Result<mpsc::Permit<'_, BroadcastEvent>, BusError> {
        self.intake
            .reserve()
            .await
            .map_err(|_| BusError::DispatcherStopped)
    }

    /// Register `identity` and announce the join
    ///
    /// Re-registering replaces the previous mailbox and drops its unread payloads.
    pub async fn register(&self, identity: Identity) -> Result<(), BusError> {
        let permit = self.reserve().await?;
        if self.registry.register(identity.clone()) {
            info!("User re-registered: {}", identity);
        } else {
            info!("User joined: {}", identity);
        }
        permit.send(BroadcastEvent::joined(identity));
        Ok(())
    }

    /// Broadcast `[sender]: content` to everybody except `sender`
    pub async fn send_message(&self, sender: Identity, content: &str) -> Result<(), BusError> {
        debug!("Message from {} ({} bytes)", sender, content.len());
        self.submit(BroadcastEvent::chat(sender, content)).await
    }

    /// Remove `identity` and announce the departure
    ///
    /// The announcement goes out even if `identity` was not registered.
    pub async fn logout(&self, identity: Identity) -> Result<(), BusError> {
        let permit = self.reserve().await?;
        if self.registry.remove(&identity) {
            info!("User left: {}", identity);
        } else {
            debug!("Logout for unregistered user: {}", identity);
        }
        permit.send(BroadcastEvent::left(identity));
        Ok(())
    }

    /// Wait for the next payload for `identity`
    ///
    /// Returns an empty string right away if `identity` is not registered,
    /// and also when its mailbox is closed while waiting.
    pub async fn receive(&self, identity: &Identity) -> String {
        let Some(mailbox) = self.registry.lookup(identity) else {
            return String::new();
        };
        mailbox.recv().await.unwrap_or_default()
    }

    /// Serve one typed request
    pub async fn handle(&self, request: Request) -> Result<Response, BusError> {
        match request {
            Request::Register { identity } => {
                self.register(identity).await?;
                Ok(Response::Ok)
            }
            Request::SendMessage { sender, content } => {
                self.send_message(sender, &content).await?;
                Ok(Response::Sent)
            }
            Request::Receive { identity } => Ok(Response::Payload {
                payload: self.receive(&identity).await,
            }),
            Request::Logout { identity } => {
                self.logout(identity).await?;
                Ok(Response::Ok)
            }
        }
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.registry.contains(identity)
    }

    /// Currently registered identities, in roster order
    pub fn online(&self) -> Vec<Identity> {
        self.registry.identities()
    }
}
