//! Aggregates per-member votes embedded in block coinbases into polls,
//! finalizes polls when a majority is reached, and executes the resulting
//! membership/whitelist changes (spec §4.1). The single-writer path is
//! `on_block_connected`/`on_block_disconnected`; readers take a shared lock
//! (spec §5).

use crate::error::{FederationError, Result, ValidationError};
use crate::federation::FederationManager;
use crate::persistence::poll_log::{PollLog, PollLogRecord};
use crate::persistence::whitelist_store::WhitelistStore;
use crate::types::{
    BlockInfo, FederationMember, Poll, PollState, PubKeyBytes, ScheduledVote, VotingData,
    VotingDataKey, WhitelistedHash,
};
use crate::vote_codec;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::Arc;

pub struct VotingManager {
    federation: Arc<FederationManager>,
    whitelist_store: WhitelistStore,
    whitelist: RwLock<Vec<WhitelistedHash>>,
    poll_log: Mutex<PollLog>,
    polls: RwLock<BTreeMap<u64, Poll>>,
    scheduled: Mutex<VecDeque<ScheduledVote>>,
    next_poll_id: Mutex<u64>,
    max_reorg_length: u64,
    own_pubkey: Option<PubKeyBytes>,
    /// Federation roster at genesis, used as the base for `members_at`
    /// replay (spec §6 `GetMembersAt`).
    genesis_members: Vec<FederationMember>,
}

impl VotingManager {
    pub fn new(
        poll_log_path: &Path,
        whitelist_store: WhitelistStore,
        federation: Arc<FederationManager>,
        max_reorg_length: u64,
        own_pubkey: Option<PubKeyBytes>,
        genesis_members: Vec<FederationMember>,
    ) -> Result<Self> {
        let (poll_log, records) = PollLog::open(poll_log_path)?;
        let whitelist = whitelist_store.load()?;

        let mut polls = BTreeMap::new();
        let mut max_id = 0u64;
        for record in records {
            apply_record_to_table(&mut polls, record);
        }
        for id in polls.keys() {
            max_id = max_id.max(*id + 1);
        }

        Ok(Self {
            federation,
            whitelist_store,
            whitelist: RwLock::new(whitelist),
            poll_log: Mutex::new(poll_log),
            polls: RwLock::new(polls),
            scheduled: Mutex::new(VecDeque::new()),
            next_poll_id: Mutex::new(max_id),
            max_reorg_length,
            own_pubkey,
            genesis_members,
        })
    }

    // ---- admin-facing scheduling --------------------------------------

    /// Enqueue `v` for inclusion in the next mined block. Rejects a vote
    /// identical to one already scheduled, or already cast by this node in
    /// any pending/finished poll (spec §4.1, I6, P5).
    pub fn schedule_vote(&self, v: VotingData) -> Result<()> {
        self.reject_multisig_kick(&v)?;

        let mut scheduled = self.scheduled.lock();
        if scheduled.iter().any(|s| s == &v) {
            return Err(ValidationError::DuplicateVote.into());
        }
        drop(scheduled);
        if self.already_voted_for(&v) {
            return Err(ValidationError::DuplicateVote.into());
        }
        self.scheduled.lock().push_back(v);
        Ok(())
    }

    fn reject_multisig_kick(&self, v: &VotingData) -> Result<()> {
        if v.key != VotingDataKey::KickMember {
            return Ok(());
        }
        let Some(target) = v.as_member() else {
            return Ok(());
        };
        if let Some(existing) = self.federation.get_member(&target.pubkey) {
            if existing.is_multisig {
                return Err(ValidationError::MultisigImmutable.into());
            }
        }
        Ok(())
    }

    fn already_voted_for(&self, v: &VotingData) -> bool {
        let Some(own) = self.own_pubkey else {
            return false;
        };
        self.polls
            .read()
            .values()
            .any(|p| p.data == *v && p.votes_in_favor.contains_key(&own))
    }

    /// True if `v` is already scheduled or already voted for by this node —
    /// the duplicate-suppression check the Idle Kicker also needs before
    /// scheduling a kick (spec §4.3).
    pub fn is_duplicate(&self, v: &VotingData) -> bool {
        self.scheduled.lock().iter().any(|s| s == v) || self.already_voted_for(v)
    }

    pub fn get_scheduled_votes(&self) -> Vec<ScheduledVote> {
        self.scheduled.lock().iter().cloned().collect()
    }

    /// Drain the scheduled-votes queue atomically. Called exactly once per
    /// produced block by the block producer (spec §4.1).
    pub fn get_and_clean_scheduled_votes(&self) -> Vec<ScheduledVote> {
        std::mem::take(&mut *self.scheduled.lock()).into_iter().collect()
    }

    // ---- snapshots ------------------------------------------------------

    pub fn get_pending_polls(&self) -> Vec<Poll> {
        self.polls_in_state(PollState::Pending)
    }

    pub fn get_approved_polls(&self) -> Vec<Poll> {
        self.polls_in_state(PollState::Approved)
    }

    pub fn get_executed_polls(&self) -> Vec<Poll> {
        self.polls_in_state(PollState::Executed)
    }

    fn polls_in_state(&self, state: PollState) -> Vec<Poll> {
        let mut polls: Vec<Poll> = self
            .polls
            .read()
            .values()
            .filter(|p| p.state == state)
            .cloned()
            .collect();
        polls.sort_by_key(|p| p.id);
        polls
    }

    pub fn whitelist(&self) -> Vec<WhitelistedHash> {
        self.whitelist.read().clone()
    }

    /// Roster as it stood at `height`, replaying executed AddMember/KickMember
    /// polls over the genesis roster (spec §6 `GetMembersAt`).
    pub fn members_at(&self, height: u64) -> Vec<FederationMember> {
        let mut roster = self.genesis_members.clone();
        let polls = self.polls.read();
        let mut executed: Vec<&Poll> = polls
            .values()
            .filter(|p| matches!(p.executed_height, Some(h) if h <= height))
            .filter(|p| matches!(p.data.key, VotingDataKey::AddMember | VotingDataKey::KickMember))
            .collect();
        executed.sort_by_key(|p| (p.executed_height.unwrap(), p.id));

        for p in executed {
            let Some(m) = p.data.as_member() else {
                continue;
            };
            match p.data.key {
                VotingDataKey::AddMember => {
                    if !roster.iter().any(|r| r.pubkey == m.pubkey) {
                        roster.push(m);
                    }
                }
                VotingDataKey::KickMember => {
                    roster.retain(|r| r.pubkey != m.pubkey);
                }
                _ => {}
            }
        }
        roster
    }

    // ---- block connect ---------------------------------------------------

    pub fn on_block_connected(&self, block: &BlockInfo) -> Result<()> {
        let entries = vote_codec::decode(&block.coinbase_script)?;
        for v in entries {
            self.process_vote(v, block)?;
        }
        self.execute_due_polls(block.height)?;
        Ok(())
    }

    fn process_vote(&self, data: VotingData, block: &BlockInfo) -> Result<()> {
        let existing_id = self
            .polls
            .read()
            .values()
            .find(|p| p.data == data)
            .map(|p| p.id);

        match existing_id {
            None => self.create_poll(data, block),
            Some(id) => self.add_vote(id, block),
        }
    }

    fn create_poll(&self, data: VotingData, block: &BlockInfo) -> Result<()> {
        let id = {
            let mut next = self.next_poll_id.lock();
            let id = *next;
            *next += 1;
            id
        };

        self.poll_log.lock().append(&PollLogRecord::Created {
            id,
            data: data.clone(),
            start_height: block.height,
            start_hash: block.hash,
            voter: block.miner,
        })?;

        let mut votes_in_favor = BTreeMap::new();
        votes_in_favor.insert(block.miner, block.height);
        let poll = Poll {
            id,
            data,
            start_height: block.height,
            start_hash: block.hash,
            votes_in_favor,
            poll_applied_height: None,
            executed_height: None,
            state: PollState::Pending,
        };
        log::debug!("poll {id} created at height {}", block.height);
        self.polls.write().insert(id, poll);
        Ok(())
    }

    fn add_vote(&self, id: u64, block: &BlockInfo) -> Result<()> {
        let (is_pending, already_voted) = {
            let polls = self.polls.read();
            let poll = polls
                .get(&id)
                .ok_or_else(|| FederationError::InvariantViolation(format!("poll {id} missing")))?;
            (
                poll.state == PollState::Pending,
                poll.votes_in_favor.contains_key(&block.miner),
            )
        };
        if !is_pending || already_voted {
            // Approved/Executed polls ignore further votes; duplicate votes
            // from the same miner are silently idempotent (spec §4.1).
            return Ok(());
        }

        self.poll_log.lock().append(&PollLogRecord::VoteAdded {
            id,
            voter: block.miner,
            height: block.height,
        })?;
        self.polls
            .write()
            .get_mut(&id)
            .expect("poll just read still exists")
            .votes_in_favor
            .insert(block.miner, block.height);

        let threshold = self.federation.roster_size() / 2 + 1;
        let crosses_threshold = {
            let polls = self.polls.read();
            polls.get(&id).unwrap().votes_in_favor.len() >= threshold
        };
        if crosses_threshold {
            self.poll_log.lock().append(&PollLogRecord::Approved {
                id,
                height: block.height,
            })?;
            let mut polls = self.polls.write();
            let poll = polls.get_mut(&id).unwrap();
            poll.state = PollState::Approved;
            poll.poll_applied_height = Some(block.height);
            log::info!("poll {id} approved at height {}", block.height);
        }
        Ok(())
    }

    fn execute_due_polls(&self, height: u64) -> Result<()> {
        let due: Vec<u64> = {
            let polls = self.polls.read();
            let mut due: Vec<&Poll> = polls
                .values()
                .filter(|p| p.state == PollState::Approved)
                .filter(|p| height.saturating_sub(p.poll_applied_height.unwrap()) >= self.max_reorg_length)
                .collect();
            due.sort_by_key(|p| (p.poll_applied_height.unwrap(), p.id));
            due.iter().map(|p| p.id).collect()
        };
        for id in due {
            self.execute_poll(id, height)?;
        }
        Ok(())
    }

    fn execute_poll(&self, id: u64, height: u64) -> Result<()> {
        let data = self
            .polls
            .read()
            .get(&id)
            .ok_or_else(|| FederationError::InvariantViolation(format!("poll {id} missing")))?
            .data
            .clone();

        self.apply_effect(&data)?;

        self.poll_log.lock().append(&PollLogRecord::Executed { id, height })?;
        let mut polls = self.polls.write();
        let poll = polls.get_mut(&id).unwrap();
        poll.state = PollState::Executed;
        poll.executed_height = Some(height);
        log::info!("poll {id} executed at height {height}");
        Ok(())
    }

    fn apply_effect(&self, data: &VotingData) -> Result<()> {
        match data.key {
            VotingDataKey::AddMember => {
                if let Some(member) = data.as_member() {
                    self.federation.add_member(member)?;
                }
            }
            VotingDataKey::KickMember => {
                if let Some(member) = data.as_member() {
                    if member.is_multisig {
                        log::error!(
                            "defensive check: refusing to execute KickMember against multisig {}",
                            member.pubkey
                        );
                    } else {
                        self.federation.remove_member(&member.pubkey)?;
                    }
                }
            }
            VotingDataKey::WhitelistHash => {
                if let Some(hash) = data.as_hash() {
                    self.whitelist_insert(hash)?;
                }
            }
            VotingDataKey::RemoveHash => {
                if let Some(hash) = data.as_hash() {
                    self.whitelist_remove(hash)?;
                }
            }
        }
        Ok(())
    }

    fn undo_effect(&self, data: &VotingData) -> Result<()> {
        match data.key {
            VotingDataKey::AddMember => {
                if let Some(member) = data.as_member() {
                    self.federation.remove_member(&member.pubkey)?;
                }
            }
            VotingDataKey::KickMember => {
                if let Some(member) = data.as_member() {
                    if !member.is_multisig {
                        self.federation.add_member(member)?;
                    }
                }
            }
            VotingDataKey::WhitelistHash => {
                if let Some(hash) = data.as_hash() {
                    self.whitelist_remove(hash)?;
                }
            }
            VotingDataKey::RemoveHash => {
                if let Some(hash) = data.as_hash() {
                    self.whitelist_insert(hash)?;
                }
            }
        }
        Ok(())
    }

    fn whitelist_insert(&self, hash: WhitelistedHash) -> Result<()> {
        let mut wl = self.whitelist.write();
        if !wl.contains(&hash) {
            wl.push(hash);
            self.whitelist_store.save(&wl)?;
        }
        Ok(())
    }

    fn whitelist_remove(&self, hash: WhitelistedHash) -> Result<()> {
        let mut wl = self.whitelist.write();
        if let Some(pos) = wl.iter().position(|h| *h == hash) {
            wl.remove(pos);
            self.whitelist_store.save(&wl)?;
        }
        Ok(())
    }

    // ---- block disconnect -------------------------------------------------

    /// Reverse block `B`'s effect on poll state, in the order spec §4.1
    /// prescribes: executed-at-H polls first, then approved-at-H polls, then
    /// the per-vote removal (which may delete polls created in `B`).
    pub fn on_block_disconnected(&self, block: &BlockInfo) -> Result<()> {
        let h = block.height;

        let executed_ids = self.poll_ids_where(|p| p.state == PollState::Executed && p.executed_height == Some(h));
        for id in executed_ids {
            self.undo_execution(id)?;
        }

        let approved_ids = self.poll_ids_where(|p| p.state == PollState::Approved && p.poll_applied_height == Some(h));
        for id in approved_ids {
            self.undo_approval(id)?;
        }

        let voted_ids = self.poll_ids_where(|p| p.votes_in_favor.values().any(|&vh| vh == h));
        for id in voted_ids {
            self.remove_votes_at_height(id, h)?;
        }

        Ok(())
    }

    fn poll_ids_where(&self, pred: impl Fn(&Poll) -> bool) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .polls
            .read()
            .values()
            .filter(|p| pred(p))
            .map(|p| p.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn undo_execution(&self, id: u64) -> Result<()> {
        let data = self.polls.read().get(&id).unwrap().data.clone();
        self.undo_effect(&data)?;

        self.poll_log.lock().append(&PollLogRecord::RevertedToApproved { id })?;
        let mut polls = self.polls.write();
        let poll = polls.get_mut(&id).unwrap();
        poll.state = PollState::Approved;
        poll.executed_height = None;
        log::info!("poll {id} execution reverted");
        Ok(())
    }

    fn undo_approval(&self, id: u64) -> Result<()> {
        self.poll_log.lock().append(&PollLogRecord::RevertedToPending { id })?;
        let mut polls = self.polls.write();
        let poll = polls.get_mut(&id).unwrap();
        poll.state = PollState::Pending;
        poll.poll_applied_height = None;
        log::info!("poll {id} approval reverted");
        Ok(())
    }

    fn remove_votes_at_height(&self, id: u64, h: u64) -> Result<()> {
        let voters: Vec<PubKeyBytes> = self
            .polls
            .read()
            .get(&id)
            .map(|p| {
                p.votes_in_favor
                    .iter()
                    .filter(|(_, &vh)| vh == h)
                    .map(|(k, _)| *k)
                    .collect()
            })
            .unwrap_or_default();

        for voter in voters {
            self.poll_log
                .lock()
                .append(&PollLogRecord::VoteRemoved { id, voter })?;
            if let Some(poll) = self.polls.write().get_mut(&id) {
                poll.votes_in_favor.remove(&voter);
            }
        }

        let should_delete = self
            .polls
            .read()
            .get(&id)
            .map(|p| p.votes_in_favor.is_empty() && p.start_height == h)
            .unwrap_or(false);
        if should_delete {
            self.poll_log.lock().append(&PollLogRecord::Deleted { id })?;
            self.polls.write().remove(&id);
            log::debug!("poll {id} deleted on reorg past its creation height");
        }
        Ok(())
    }
}

fn apply_record_to_table(polls: &mut BTreeMap<u64, Poll>, record: PollLogRecord) {
    match record {
        PollLogRecord::Created {
            id,
            data,
            start_height,
            start_hash,
            voter,
        } => {
            let mut votes_in_favor = BTreeMap::new();
            votes_in_favor.insert(voter, start_height);
            polls.insert(
                id,
                Poll {
                    id,
                    data,
                    start_height,
                    start_hash,
                    votes_in_favor,
                    poll_applied_height: None,
                    executed_height: None,
                    state: PollState::Pending,
                },
            );
        }
        PollLogRecord::VoteAdded { id, voter, height } => {
            if let Some(p) = polls.get_mut(&id) {
                p.votes_in_favor.insert(voter, height);
            }
        }
        PollLogRecord::Approved { id, height } => {
            if let Some(p) = polls.get_mut(&id) {
                p.state = PollState::Approved;
                p.poll_applied_height = Some(height);
            }
        }
        PollLogRecord::Executed { id, height } => {
            if let Some(p) = polls.get_mut(&id) {
                p.state = PollState::Executed;
                p.executed_height = Some(height);
            }
        }
        PollLogRecord::RevertedToApproved { id } => {
            if let Some(p) = polls.get_mut(&id) {
                p.state = PollState::Approved;
                p.executed_height = None;
            }
        }
        PollLogRecord::RevertedToPending { id } => {
            if let Some(p) = polls.get_mut(&id) {
                p.state = PollState::Pending;
                p.poll_applied_height = None;
            }
        }
        PollLogRecord::VoteRemoved { id, voter } => {
            if let Some(p) = polls.get_mut(&id) {
                p.votes_in_favor.remove(&voter);
            }
        }
        PollLogRecord::Deleted { id } => {
            polls.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::persistence::federation_store::FederationStore;
    use crate::types::{Hash32, PUBKEY_LEN};

    struct Fixture {
        voting: VotingManager,
        federation: Arc<FederationManager>,
        keys: Vec<PubKeyBytes>,
        _dir: tempfile::TempDir,
    }

    fn pubkey(id: u8) -> PubKeyBytes {
        PubKeyBytes([id; PUBKEY_LEN])
    }

    fn block(height: u64, miner: PubKeyBytes, script: Vec<u8>) -> BlockInfo {
        BlockInfo {
            height,
            hash: Hash32([height as u8; 32]),
            parent_hash: Hash32([(height.saturating_sub(1)) as u8; 32]),
            time: 1_000 + height,
            miner,
            coinbase_script: script,
        }
    }

    fn setup(n_members: u8, max_reorg: u64, own: Option<u8>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let genesis: Vec<FederationMember> = (1..=n_members)
            .map(|i| FederationMember::new(pubkey(i), false))
            .collect();
        let bus = Arc::new(EventBus::new());
        let federation = Arc::new(
            FederationManager::new(
                FederationStore::new(dir.path().join("federation.json")),
                bus,
                genesis.clone(),
                own.map(pubkey),
            )
            .unwrap(),
        );
        let voting = VotingManager::new(
            &dir.path().join("polls.log"),
            WhitelistStore::new(dir.path().join("whitelist.json")),
            federation.clone(),
            max_reorg,
            own.map(pubkey),
            genesis,
        )
        .unwrap();
        Fixture {
            voting,
            federation,
            keys: (1..=n_members).map(pubkey).collect(),
            _dir: dir,
        }
    }

    fn add_member_script(member: &FederationMember) -> Vec<u8> {
        vote_codec::encode(&[VotingData::add_member(member.clone())])
    }

    #[test]
    fn majority_add_member_flow() {
        // 3-member federation, threshold = floor(3/2)+1 = 2.
        let f = setup(3, 4, Some(1));
        let kx = FederationMember::new(pubkey(99), false);
        let script = add_member_script(&kx);

        f.voting
            .on_block_connected(&block(1, f.keys[0], script.clone()))
            .unwrap();
        assert_eq!(f.voting.get_pending_polls().len(), 1);

        // Duplicate vote from the same miner at height 2: no change.
        f.voting
            .on_block_connected(&block(2, f.keys[0], script.clone()))
            .unwrap();
        assert_eq!(f.voting.get_pending_polls()[0].votes_in_favor.len(), 1);

        // Second distinct voter crosses the threshold of 2 -> Approved.
        f.voting
            .on_block_connected(&block(3, f.keys[1], script.clone()))
            .unwrap();
        assert_eq!(f.voting.get_approved_polls().len(), 1);
        let approved = &f.voting.get_approved_polls()[0];
        assert_eq!(approved.poll_applied_height, Some(3));

        // Not yet executed until height 3 + max_reorg(4) = 7.
        for h in 4..7 {
            f.voting.on_block_connected(&block(h, f.keys[2], vec![])).unwrap();
        }
        assert!(f.voting.get_executed_polls().is_empty());

        f.voting.on_block_connected(&block(7, f.keys[2], vec![])).unwrap();
        let executed = f.voting.get_executed_polls();
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].executed_height, Some(7));
        assert!(f.federation.is_member(&pubkey(99)));
    }

    #[test]
    fn duplicate_schedule_is_rejected() {
        let f = setup(3, 4, Some(1));
        let kx = FederationMember::new(pubkey(99), false);
        let v = VotingData::add_member(kx);

        f.voting.schedule_vote(v.clone()).unwrap();
        let err = f.voting.schedule_vote(v.clone()).unwrap_err();
        assert!(matches!(
            err,
            FederationError::Validation(ValidationError::DuplicateVote)
        ));
        assert_eq!(f.voting.get_scheduled_votes(), vec![v.clone()]);

        // Mining a block with the scheduled vote creates exactly one Pending poll.
        let script = vote_codec::encode(&[v]);
        let drained = f.voting.get_and_clean_scheduled_votes();
        assert_eq!(drained.len(), 1);
        assert!(f.voting.get_scheduled_votes().is_empty());

        f.voting.on_block_connected(&block(1, f.keys[0], script)).unwrap();
        let pending = f.voting.get_pending_polls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].votes_in_favor_hex(), vec![f.keys[0].to_hex()]);
    }

    #[test]
    fn multisig_kick_is_rejected_at_schedule_time() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = vec![
            FederationMember::new(pubkey(1), false),
            FederationMember::new(pubkey(2), true),
            FederationMember::new(pubkey(3), false),
        ];
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
        let voting = VotingManager::new(
            &dir.path().join("polls.log"),
            WhitelistStore::new(dir.path().join("whitelist.json")),
            federation,
            4,
            Some(pubkey(1)),
            genesis,
        )
        .unwrap();

        let kick = VotingData::kick_member(&FederationMember::new(pubkey(2), true));
        let err = voting.schedule_vote(kick).unwrap_err();
        assert!(matches!(
            err,
            FederationError::Validation(ValidationError::MultisigImmutable)
        ));
        assert!(voting.get_scheduled_votes().is_empty());
    }

    #[test]
    fn reorg_reverses_execution_and_approval_and_deletes_creation_vote() {
        let f = setup(3, 4, Some(1));
        let kx = FederationMember::new(pubkey(99), false);
        let script = add_member_script(&kx);

        let b1 = block(1, f.keys[0], script.clone());
        let b3 = block(3, f.keys[1], script.clone());
        f.voting.on_block_connected(&b1).unwrap();
        f.voting.on_block_connected(&b3).unwrap();
        for h in 4..7 {
            f.voting.on_block_connected(&block(h, f.keys[2], vec![])).unwrap();
        }
        let b7 = block(7, f.keys[2], vec![]);
        f.voting.on_block_connected(&b7).unwrap();
        assert!(f.federation.is_member(&pubkey(99)));
        assert_eq!(f.voting.get_executed_polls().len(), 1);

        // Disconnect height 7: execution undone, member removed, poll back to Approved.
        f.voting.on_block_disconnected(&b7).unwrap();
        assert!(!f.federation.is_member(&pubkey(99)));
        assert_eq!(f.voting.get_approved_polls().len(), 1);

        // Disconnect height 3: approval undone, poll back to Pending with only K1's vote.
        f.voting.on_block_disconnected(&b3).unwrap();
        let pending = f.voting.get_pending_polls();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].votes_in_favor.len(), 1);
        assert!(pending[0].votes_in_favor.contains_key(&f.keys[0]));

        // Disconnect height 1: the only vote is removed and, since start_height == 1,
        // the poll is deleted entirely.
        f.voting.on_block_disconnected(&b1).unwrap();
        assert!(f.voting.get_pending_polls().is_empty());
        assert!(f.voting.get_approved_polls().is_empty());
        assert!(f.voting.get_executed_polls().is_empty());
    }

    #[test]
    fn whitelist_add_and_remove_round_trip() {
        let f = setup(2, 1, Some(1));
        let hash = WhitelistedHash([7u8; 32]);
        let script = vote_codec::encode(&[VotingData::whitelist_hash(hash)]);

        f.voting.on_block_connected(&block(1, f.keys[0], script.clone())).unwrap();
        f.voting.on_block_connected(&block(2, f.keys[1], script)).unwrap();
        assert_eq!(f.voting.get_approved_polls().len(), 1);
        f.voting.on_block_connected(&block(3, f.keys[0], vec![])).unwrap();
        assert_eq!(f.voting.whitelist(), vec![hash]);

        let remove_script = vote_codec::encode(&[VotingData::remove_hash(hash)]);
        f.voting
            .on_block_connected(&block(4, f.keys[0], remove_script.clone()))
            .unwrap();
        f.voting
            .on_block_connected(&block(5, f.keys[1], remove_script))
            .unwrap();
        f.voting.on_block_connected(&block(6, f.keys[0], vec![])).unwrap();
        assert!(f.voting.whitelist().is_empty());
    }

    #[test]
    fn poll_log_replay_rebuilds_identical_state() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = vec![
            FederationMember::new(pubkey(1), false),
            FederationMember::new(pubkey(2), false),
            FederationMember::new(pubkey(3), false),
        ];
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
        let kx = FederationMember::new(pubkey(99), false);
        let script = add_member_script(&kx);

        {
            let voting = VotingManager::new(
                &dir.path().join("polls.log"),
                WhitelistStore::new(dir.path().join("whitelist.json")),
                federation.clone(),
                4,
                Some(pubkey(1)),
                genesis.clone(),
            )
            .unwrap();
            voting
                .on_block_connected(&block(1, pubkey(1), script.clone()))
                .unwrap();
            voting
                .on_block_connected(&block(3, pubkey(2), script))
                .unwrap();
            assert_eq!(voting.get_approved_polls().len(), 1);
        }

        let reloaded = VotingManager::new(
            &dir.path().join("polls.log"),
            WhitelistStore::new(dir.path().join("whitelist.json")),
            federation,
            4,
            Some(pubkey(1)),
            genesis,
        )
        .unwrap();
        let approved = reloaded.get_approved_polls();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].poll_applied_height, Some(3));
        assert_eq!(approved[0].votes_in_favor.len(), 2);
    }
}
