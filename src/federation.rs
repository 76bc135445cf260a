//! The authoritative, in-memory ledger of current federation members (spec
//! §4.2). A singly-owned value constructed at node start and handed to
//! collaborators by reference/`Arc` — never a hidden global.

use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::persistence::federation_store::FederationStore;
use crate::types::{FederationMember, PubKeyBytes};
use parking_lot::RwLock;
use std::sync::Arc;

pub struct FederationManager {
    store: FederationStore,
    bus: Arc<EventBus>,
    members: RwLock<Vec<FederationMember>>,
    own_pubkey: Option<PubKeyBytes>,
}

impl FederationManager {
    /// Load the roster from `store`, or seed it with `genesis_members` (which
    /// may include multisig members injected at genesis, per spec §4.2) if
    /// no snapshot exists yet.
    pub fn new(
        store: FederationStore,
        bus: Arc<EventBus>,
        genesis_members: Vec<FederationMember>,
        own_pubkey: Option<PubKeyBytes>,
    ) -> Result<Self> {
        let members = match store.load()? {
            Some(loaded) => loaded,
            None => {
                store.save(&genesis_members)?;
                genesis_members
            }
        };
        Ok(Self {
            store,
            bus,
            members: RwLock::new(members),
            own_pubkey,
        })
    }

    /// Ordered roster snapshot; order defines PoA slot assignment (spec §4.2).
    pub fn get_members(&self) -> Vec<FederationMember> {
        self.members.read().clone()
    }

    pub fn roster_size(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_member(&self, pubkey: &PubKeyBytes) -> bool {
        self.members.read().iter().any(|m| &m.pubkey == pubkey)
    }

    pub fn get_member(&self, pubkey: &PubKeyBytes) -> Option<FederationMember> {
        self.members
            .read()
            .iter()
            .find(|m| &m.pubkey == pubkey)
            .cloned()
    }

    pub fn is_federation_member(&self) -> bool {
        match &self.own_pubkey {
            Some(pk) => self.is_member(pk),
            None => false,
        }
    }

    pub fn current_key(&self) -> Option<PubKeyBytes> {
        self.own_pubkey
    }

    /// Insert `member` if absent (no-op if already present), persist, and
    /// publish `MemberAdded` after persistence completes. Only called by the
    /// Voting Manager during poll execution or reversal (spec §4.2).
    pub fn add_member(&self, member: FederationMember) -> Result<bool> {
        {
            let mut members = self.members.write();
            if members.iter().any(|m| m.pubkey == member.pubkey) {
                return Ok(false);
            }
            members.push(member.clone());
            self.store.save(&members)?;
        }
        self.bus.publish(Event::MemberAdded(member))?;
        Ok(true)
    }

    /// Remove the member with `pubkey`, preserving the relative order of the
    /// remainder, persist, and publish `MemberKicked`. Multisig members are
    /// structurally immutable; this is the defensive re-check named in spec
    /// §4.1 ("reject ... defensively, at execution time").
    pub fn remove_member(&self, pubkey: &PubKeyBytes) -> Result<Option<FederationMember>> {
        let removed = {
            let mut members = self.members.write();
            let Some(idx) = members.iter().position(|m| &m.pubkey == pubkey) else {
                return Ok(None);
            };
            if members[idx].is_multisig {
                log::error!("refusing to execute KickMember against multisig member {pubkey}");
                return Ok(None);
            }
            let removed = members.remove(idx);
            self.store.save(&members)?;
            removed
        };
        self.bus.publish(Event::MemberKicked(removed.clone()))?;
        Ok(Some(removed))
    }
}
