//! Subscriber registry
//!
//! Maps identities to mailboxes. The map sits behind one lock that is only
//! held for a single insert, removal, lookup or snapshot, never while a
//! payload is being delivered.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::mailbox::Mailbox;
use crate::types::Identity;

#[derive(Debug)]
pub struct Registry {
    mailbox_capacity: usize,
    /// Ordered so roster announcements list users alphabetically
    mailboxes: Mutex<BTreeMap<Identity, Mailbox>>,
}

impl Registry {
    pub fn new(mailbox_capacity: usize) -> Self {
        Self {
            mailbox_capacity,
            mailboxes: Mutex::new(BTreeMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<Identity, Mailbox>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.mailboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a fresh mailbox for `identity`
    ///
    /// An existing mailbox under the same identity is replaced and closed,
    /// discarding whatever it still held. Returns true if one was replaced.
    pub fn register(&self, identity: Identity) -> bool {
        let mailbox = Mailbox::new(self.mailbox_capacity);
        let previous = self.entries().insert(identity.clone(), mailbox);

        match previous {
            Some(old) => {
                debug!(
                    "Replaced mailbox for '{}' ({} unread payloads discarded)",
                    identity,
                    old.pending()
                );
                old.close();
                true
            }
            None => false,
        }
    }

    /// Remove and close the mailbox for `identity`
    ///
    /// Returns false if the identity was not registered.
    pub fn remove(&self, identity: &Identity) -> bool {
        let removed = self.entries().remove(identity);
        match removed {
            Some(mailbox) => {
                mailbox.close();
                true
            }
            None => false,
        }
    }

    pub fn lookup(&self, identity: &Identity) -> Option<Mailbox> {
        self.entries().get(identity).cloned()
    }

    /// Consistent copy of every registration, in identity order
    pub fn snapshot(&self) -> Vec<(Identity, Mailbox)> {
        self.entries()
            .iter()
            .map(|(identity, mailbox)| (identity.clone(), mailbox.clone()))
            .collect()
    }

    pub fn identities(&self) -> Vec<Identity> {
        self.entries().keys().cloned().collect()
    }

    pub fn contains(&self, identity: &Identity) -> bool {
        self.entries().contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new(20);
        let alice = Identity::from("alice");

        assert!(registry.lookup(&alice).is_none());
        assert!(!registry.register(alice.clone()));

        let mailbox = registry.lookup(&alice).unwrap();
        assert_eq!(mailbox.capacity(), 20);
        assert!(registry.contains(&alice));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_reregister_replaces_and_closes() {
        let registry = Registry::new(4);
        let alice = Identity::from("alice");
        registry.register(alice.clone());

        let old = registry.lookup(&alice).unwrap();
        old.try_deliver("unread".to_string()).unwrap();

        assert!(registry.register(alice.clone()));
        assert!(old.is_closed());

        let fresh = registry.lookup(&alice).unwrap();
        assert!(!fresh.is_closed());
        assert_eq!(fresh.pending(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let registry = Registry::new(4);
        let bob = Identity::from("bob");

        assert!(!registry.remove(&bob));

        registry.register(bob.clone());
        let mailbox = registry.lookup(&bob).unwrap();
        assert!(registry.remove(&bob));
        assert!(mailbox.is_closed());
        assert!(registry.lookup(&bob).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let registry = Registry::new(4);
        for name in ["carol", "alice", "bob"] {
            registry.register(Identity::from(name));
        }

        let names: Vec<String> = registry
            .snapshot()
            .into_iter()
            .map(|(identity, _)| identity.0)
            .collect();
        assert_eq!(names, ["alice", "bob", "carol"]);
        assert_eq!(registry.identities().len(), 3);
    }
}
