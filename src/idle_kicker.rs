//! Tracks the last block height/time at which each federation member
//! produced a block, and schedules a `KickMember` vote for anyone idle past
//! `max_idle_seconds` (spec §4.3).

use crate::error::Result;
use crate::federation::FederationManager;
use crate::persistence::last_active_store::LastActiveStore;
use crate::types::{BlockInfo, VotingData};
use crate::voting::VotingManager;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

pub struct IdleMembersKicker {
    store: LastActiveStore,
    last_active: Mutex<HashMap<crate::types::PubKeyBytes, u64>>,
    federation: Arc<FederationManager>,
    voting: Arc<VotingManager>,
    max_idle_seconds: u64,
    tip_time: Mutex<u64>,
}

impl IdleMembersKicker {
    /// `now` is the node's current wall-clock time (Unix seconds). On a cold
    /// start (empty store) every current member is seeded with `now` so the
    /// very first block doesn't see an unseeded roster and declare everyone
    /// idle (spec §4.3 Initialization).
    pub fn new(
        store: LastActiveStore,
        federation: Arc<FederationManager>,
        voting: Arc<VotingManager>,
        max_idle_seconds: u64,
        now: u64,
    ) -> Result<Self> {
        let mut last_active = store.load()?;
        let mut seeded = false;
        for member in federation.get_members() {
            last_active.entry(member.pubkey).or_insert_with(|| {
                seeded = true;
                now
            });
        }
        if seeded {
            store.save(&last_active)?;
        }
        Ok(Self {
            store,
            last_active: Mutex::new(last_active),
            federation,
            voting,
            max_idle_seconds,
            tip_time: Mutex::new(now),
        })
    }

    /// Record the consensus tip time ahead of processing the block that
    /// carries it. Called by the wiring layer before the block's votes are
    /// applied, so a `MemberAdded` raised while applying them (re-entrantly,
    /// before `on_block_connected` itself runs) sees this block's time
    /// rather than the previous one's.
    pub fn note_tip_time(&self, time: u64) {
        *self.tip_time.lock() = time;
    }

    /// Record `block.miner` as active at `block.time`, then schedule a kick
    /// vote for any current, non-multisig member whose last-active timestamp
    /// is more than `max_idle_seconds` behind `block.time`. Only runs when
    /// this node is itself a federation member (spec §4.3: "only active
    /// members vote").
    pub fn on_block_connected(&self, block: &BlockInfo) -> Result<()> {
        self.note_tip_time(block.time);
        {
            let mut last_active = self.last_active.lock();
            last_active.insert(block.miner, block.time);
            self.store.save(&last_active)?;
        }

        if !self.federation.is_federation_member() {
            return Ok(());
        }

        let last_active = self.last_active.lock().clone();
        for member in self.federation.get_members() {
            if member.is_multisig {
                continue;
            }
            let idle_for = match last_active.get(&member.pubkey) {
                Some(&last_seen) => block.time.saturating_sub(last_seen),
                // Not yet seeded (should not happen once construction and
                // `on_member_added` both run): treat as freshly active
                // rather than idle since the epoch.
                None => {
                    log::warn!("no last-active record for federation member {}; treating as active", member.pubkey);
                    0
                }
            };
            if idle_for < self.max_idle_seconds {
                continue;
            }
            let vote = VotingData::kick_member(&member);
            if self.voting.is_duplicate(&vote) {
                continue;
            }
            match self.voting.schedule_vote(vote) {
                Ok(()) => log::info!(
                    "scheduling idle-kick vote against {} (idle {idle_for}s)",
                    member.pubkey
                ),
                Err(e) => log::debug!("not scheduling idle-kick vote against {}: {e}", member.pubkey),
            }
        }
        Ok(())
    }

    /// Seed `last_active[pubkey]` with the current tip time if it isn't
    /// already present (spec §4.3 `MemberAdded(m)`). A member admitted by an
    /// executed poll must not look idle since the epoch on the very next
    /// block.
    pub fn on_member_added(&self, pubkey: &crate::types::PubKeyBytes) -> Result<()> {
        let mut last_active = self.last_active.lock();
        if last_active.contains_key(pubkey) {
            return Ok(());
        }
        last_active.insert(*pubkey, *self.tip_time.lock());
        self.store.save(&last_active)?;
        Ok(())
    }

    /// Drop the bookkeeping entry for a kicked member; a future re-add starts
    /// the idle clock fresh (spec §4.3).
    pub fn on_member_kicked(&self, pubkey: &crate::types::PubKeyBytes) -> Result<()> {
        let mut last_active = self.last_active.lock();
        last_active.remove(pubkey);
        self.store.save(&last_active)?;
        Ok(())
    }

    pub fn last_active_snapshot(&self) -> HashMap<crate::types::PubKeyBytes, u64> {
        self.last_active.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::persistence::federation_store::FederationStore;
    use crate::persistence::whitelist_store::WhitelistStore;
    use crate::types::{FederationMember, Hash32, PubKeyBytes, PUBKEY_LEN};

    fn pubkey(id: u8) -> PubKeyBytes {
        PubKeyBytes([id; PUBKEY_LEN])
    }

    fn block(height: u64, miner: PubKeyBytes, time: u64) -> BlockInfo {
        BlockInfo {
            height,
            hash: Hash32([height as u8; 32]),
            parent_hash: Hash32::default(),
            time,
            miner,
            coinbase_script: Vec::new(),
        }
    }

    struct Fixture {
        federation: Arc<FederationManager>,
        voting: Arc<VotingManager>,
        kicker: IdleMembersKicker,
        _dir: tempfile::TempDir,
    }

    fn setup(max_idle_seconds: u64, own: u8) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let genesis = vec![
            FederationMember::new(pubkey(1), false),
            FederationMember::new(pubkey(2), false),
            FederationMember::new(pubkey(3), true),
        ];
        let bus = Arc::new(EventBus::new());
        let federation = Arc::new(
            FederationManager::new(
                FederationStore::new(dir.path().join("federation.json")),
                bus,
                genesis.clone(),
                Some(pubkey(own)),
            )
            .unwrap(),
        );
        let voting = Arc::new(
            VotingManager::new(
                &dir.path().join("polls.log"),
                WhitelistStore::new(dir.path().join("whitelist.json")),
                federation.clone(),
                4,
                Some(pubkey(own)),
                genesis,
            )
            .unwrap(),
        );
        // `now` matches the first block's time below: the node is assumed to
        // have started right before genesis, not at the Unix epoch.
        let kicker = IdleMembersKicker::new(
            LastActiveStore::new(dir.path().join("last_active.json")),
            federation.clone(),
            voting.clone(),
            max_idle_seconds,
            1_000,
        )
        .unwrap();
        Fixture {
            federation,
            voting,
            kicker,
            _dir: dir,
        }
    }

    #[test]
    fn cold_start_does_not_immediately_kick_the_whole_roster() {
        // Construction alone, before any block, must not already look idle.
        let f = setup(1, 1);
        assert_eq!(f.kicker.last_active_snapshot().len(), 3);
        assert!(f.voting.get_scheduled_votes().is_empty());
    }

    #[test]
    fn schedules_kick_for_idle_member() {
        let f = setup(100, 1);
        f.kicker.on_block_connected(&block(1, pubkey(1), 1_000)).unwrap();
        f.kicker.on_block_connected(&block(2, pubkey(2), 1_010)).unwrap();

        // K3 is multisig and is skipped regardless of idle time.
        f.kicker.on_block_connected(&block(3, pubkey(1), 1_200)).unwrap();

        let scheduled = f.voting.get_scheduled_votes();
        assert_eq!(scheduled.len(), 1);
        let target = scheduled[0].as_member().unwrap();
        assert_eq!(target.pubkey, pubkey(2));
    }

    #[test]
    fn active_members_are_never_scheduled() {
        let f = setup(1_000, 1);
        f.kicker.on_block_connected(&block(1, pubkey(1), 1_000)).unwrap();
        f.kicker.on_block_connected(&block(2, pubkey(2), 1_100)).unwrap();
        assert!(f.voting.get_scheduled_votes().is_empty());
    }

    #[test]
    fn non_member_node_never_schedules_kicks() {
        let f = setup(1, 9); // own_pubkey 9 is not in the federation
        f.kicker.on_block_connected(&block(1, pubkey(1), 1_000)).unwrap();
        f.kicker.on_block_connected(&block(2, pubkey(2), 5_000)).unwrap();
        assert!(f.voting.get_scheduled_votes().is_empty());
    }

    #[test]
    fn duplicate_idle_kick_is_not_rescheduled() {
        let f = setup(10, 1);
        f.kicker.on_block_connected(&block(1, pubkey(1), 1_000)).unwrap();
        f.kicker.on_block_connected(&block(2, pubkey(1), 1_100)).unwrap();
        f.kicker.on_block_connected(&block(3, pubkey(1), 1_200)).unwrap();
        assert_eq!(f.voting.get_scheduled_votes().len(), 1);
    }

    #[test]
    fn member_added_mid_block_is_not_immediately_kicked() {
        let f = setup(50, 1);
        f.kicker.on_block_connected(&block(1, pubkey(1), 1_000)).unwrap();

        // A poll executes inside this block, admitting K4 before the kicker's
        // own `on_block_connected` for the same block has run — exactly the
        // ordering `note_tip_time` exists to handle.
        f.kicker.note_tip_time(1_040);
        f.federation.add_member(FederationMember::new(pubkey(4), false)).unwrap();
        f.kicker.on_member_added(&pubkey(4)).unwrap();
        assert_eq!(f.kicker.last_active_snapshot().get(&pubkey(4)), Some(&1_040));

        f.kicker.on_block_connected(&block(2, pubkey(1), 1_040)).unwrap();
        assert!(
            f.voting.get_scheduled_votes().is_empty(),
            "K4 was just seeded and must not look idle on the very next block"
        );

        // Seeding never overwrites an existing entry.
        f.kicker.on_member_added(&pubkey(4)).unwrap();
        assert_eq!(f.kicker.last_active_snapshot().get(&pubkey(4)), Some(&1_040));
    }

    #[test]
    fn last_active_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = vec![FederationMember::new(pubkey(1), false)];
        let bus = Arc::new(EventBus::new());
        let federation = Arc::new(
            FederationManager::new(
                FederationStore::new(dir.path().join("federation.json")),
                bus,
                genesis.clone(),
                Some(pubkey(1)),
            )
            .unwrap(),
        );
        let voting = Arc::new(
            VotingManager::new(
                &dir.path().join("polls.log"),
                WhitelistStore::new(dir.path().join("whitelist.json")),
                federation.clone(),
                4,
                Some(pubkey(1)),
                genesis,
            )
            .unwrap(),
        );
        {
            let kicker = IdleMembersKicker::new(
                LastActiveStore::new(dir.path().join("last_active.json")),
                federation.clone(),
                voting.clone(),
                100,
                500,
            )
            .unwrap();
            kicker.on_block_connected(&block(1, pubkey(1), 500)).unwrap();
        }
        let reloaded = IdleMembersKicker::new(
            LastActiveStore::new(dir.path().join("last_active.json")),
            federation,
            voting,
            100,
            500,
        )
        .unwrap();
        assert_eq!(reloaded.last_active_snapshot().get(&pubkey(1)), Some(&500));
    }
}
