//! Dispatcher task
//!
//! The single consumer of the intake queue. Events are fanned out one at a
//! time, in arrival order, which gives every mailbox the same relative order.
//!
//! For each event the dispatcher takes one registry snapshot, so a join or
//! leave is either fully visible to the fan-out or not at all. Delivery
//! happens outside the registry lock: a stalled fan-out never keeps other
//! callers from registering, logging out or receiving.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::OverflowPolicy;
use crate::error::DeliveryError;
use crate::event::BroadcastEvent;
use crate::mailbox::Mailbox;
use crate::registry::Registry;
use crate::types::Identity;

pub struct Dispatcher {
    registry: Arc<Registry>,
    /// Intake queue receiver
    receiver: mpsc::Receiver<BroadcastEvent>,
    overflow: OverflowPolicy,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        receiver: mpsc::Receiver<BroadcastEvent>,
        overflow: OverflowPolicy,
    ) -> Self {
        Self {
            registry,
            receiver,
            overflow,
        }
    }

    /// Run the dispatch loop
    ///
    /// Continuously drains the intake queue until all producers are dropped.
    pub async fn run(mut self) {
        info!("Dispatcher started ({:?} on overflow)", self.overflow);

        while let Some(event) = self.receiver.recv().await {
            self.dispatch(event).await;
        }

        info!("Dispatcher shutting down");
    }

    /// Fan one event out to every registered mailbox
    async fn dispatch(&self, event: BroadcastEvent) {
        let recipients = self.registry.snapshot();

        // Recomputed for every system event, never cached
        let roster = event.is_system.then(|| {
            BroadcastEvent::current_users(recipients.iter().map(|(identity, _)| identity))
        });

        debug!(
            "Dispatching {} from '{}' to {} recipients",
            if event.is_system { "system event" } else { "message" },
            event.sender,
            recipients.len()
        );

        for (identity, mailbox) in &recipients {
            if !event.is_system && *identity == event.sender {
                continue;
            }

            if !self.deliver(identity, mailbox, event.content.clone()).await {
                continue;
            }

            if let Some(roster) = &roster {
                self.deliver(identity, mailbox, roster.clone()).await;
            }
        }
    }

    /// Push one payload according to the overflow policy
    ///
    /// Failures only affect this recipient; returns whether it was delivered.
    async fn deliver(&self, identity: &Identity, mailbox: &Mailbox, payload: String) -> bool {
        let result = match self.overflow {
            OverflowPolicy::Block => mailbox.deliver(payload).await,
            OverflowPolicy::DropNewest => mailbox.try_deliver(payload),
        };

        match result {
            Ok(()) => true,
            Err(DeliveryError::Full) => {
                warn!("Mailbox for '{}' is full, payload dropped", identity);
                false
            }
            Err(DeliveryError::Closed) => {
                debug!("Mailbox for '{}' closed during fan-out", identity);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    const SHORT: Duration = Duration::from_millis(50);

    fn setup(
        mailbox_capacity: usize,
        overflow: OverflowPolicy,
    ) -> (Arc<Registry>, mpsc::Sender<BroadcastEvent>) {
        let registry = Arc::new(Registry::new(mailbox_capacity));
        let (tx, rx) = mpsc::channel(16);
        tokio::spawn(Dispatcher::new(registry.clone(), rx, overflow).run());
        (registry, tx)
    }

    async fn next(registry: &Registry, name: &str) -> String {
        let mailbox = registry.lookup(&Identity::from(name)).unwrap();
        timeout(Duration::from_secs(1), mailbox.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_system_event_reaches_subject_with_roster() {
        let (registry, tx) = setup(8, OverflowPolicy::Block);
        registry.register(Identity::from("alice"));
        registry.register(Identity::from("bob"));

        tx.send(BroadcastEvent::joined(Identity::from("bob")))
            .await
            .unwrap();

        for name in ["alice", "bob"] {
            assert_eq!(next(&registry, name).await, "** User [bob] joined the chat **");
            assert_eq!(
                next(&registry, name).await,
                "** Current users in chat: alice, bob **"
            );
        }
    }

    #[tokio::test]
    async fn test_chat_skips_sender() {
        let (registry, tx) = setup(8, OverflowPolicy::Block);
        for name in ["alice", "bob", "carol"] {
            registry.register(Identity::from(name));
        }

        tx.send(BroadcastEvent::chat(Identity::from("alice"), "hello"))
            .await
            .unwrap();

        assert_eq!(next(&registry, "bob").await, "[alice]: hello");
        assert_eq!(next(&registry, "carol").await, "[alice]: hello");

        let alice = registry.lookup(&Identity::from("alice")).unwrap();
        assert!(timeout(SHORT, alice.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_drop_newest_isolates_full_mailbox() {
        let (registry, tx) = setup(1, OverflowPolicy::DropNewest);
        registry.register(Identity::from("slow"));
        registry.register(Identity::from("fast"));

        tx.send(BroadcastEvent::chat(Identity::from("nobody"), "first"))
            .await
            .unwrap();
        assert_eq!(next(&registry, "fast").await, "[nobody]: first");

        tx.send(BroadcastEvent::chat(Identity::from("nobody"), "second"))
            .await
            .unwrap();
        assert_eq!(next(&registry, "fast").await, "[nobody]: second");

        // "slow" kept the first payload, the second was dropped
        assert_eq!(next(&registry, "slow").await, "[nobody]: first");
        let slow = registry.lookup(&Identity::from("slow")).unwrap();
        assert_eq!(slow.pending(), 0);
    }

    #[tokio::test]
    async fn test_block_stalls_until_owner_leaves() {
        let (registry, tx) = setup(1, OverflowPolicy::Block);
        registry.register(Identity::from("full"));
        registry.register(Identity::from("zed"));

        tx.send(BroadcastEvent::chat(Identity::from("nobody"), "one"))
            .await
            .unwrap();
        tx.send(BroadcastEvent::chat(Identity::from("nobody"), "two"))
            .await
            .unwrap();

        // "full" holds "one"; fan-out of "two" is stuck on it, so "zed" waits too
        assert_eq!(next(&registry, "zed").await, "[nobody]: one");
        let zed = registry.lookup(&Identity::from("zed")).unwrap();
        assert!(timeout(SHORT, zed.recv()).await.is_err());

        // Removing the stuck recipient lets the dispatcher continue
        assert!(registry.remove(&Identity::from("full")));
        assert_eq!(next(&registry, "zed").await, "[nobody]: two");
    }

    #[tokio::test]
    async fn test_closed_mailbox_does_not_stop_dispatch() {
        let (registry, tx) = setup(4, OverflowPolicy::Block);
        registry.register(Identity::from("alice"));
        registry.register(Identity::from("bob"));
        registry.lookup(&Identity::from("alice")).unwrap().close();

        tx.send(BroadcastEvent::chat(Identity::from("carol"), "still here"))
            .await
            .unwrap();
        assert_eq!(next(&registry, "bob").await, "[carol]: still here");
    }
}
