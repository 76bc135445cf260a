//! In-process publish/subscribe hub. Decouples the Voting Manager, the
//! Federation Manager and the Idle-Members Kicker so none of them holds a
//! direct reference to the others outside the narrow mutation interface
//! (spec §9 "Cyclic references").
//!
//! Delivery is synchronous: `publish` returns only after every subscriber has
//! run, so a `MemberAdded` subscriber (e.g. the Idle Kicker) always observes
//! the new roster before the publisher's caller proceeds to the next block
//! (spec §5).

use crate::error::FederationError;
use crate::types::{BlockInfo, FederationMember};
use parking_lot::RwLock;

#[derive(Clone, Debug)]
pub enum Event {
    BlockConnected(BlockInfo),
    BlockDisconnected(BlockInfo),
    MemberAdded(FederationMember),
    MemberKicked(FederationMember),
}

type Subscriber = Box<dyn Fn(&Event) -> Result<(), FederationError> + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Subscribers are invoked in registration order.
    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&Event) -> Result<(), FederationError> + Send + Sync + 'static,
    {
        self.subscribers.write().push(Box::new(handler));
    }

    /// Deliver `event` to every subscriber in order, stopping at (and
    /// returning) the first error. Per spec §7, `InvariantViolation` and
    /// `Persistence` errors raised here are fatal to the embedding node.
    pub fn publish(&self, event: Event) -> Result<(), FederationError> {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            subscriber(&event)?;
        }
        Ok(())
    }
}
