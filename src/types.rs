use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Compressed public key length used by the coinbase-embedded federation
/// member encoding (matches the chain's own pubkey serialization).
pub const PUBKEY_LEN: usize = 33;

/// A federation member's public key, modeled as raw bytes since signature
/// verification of the underlying block is a collaborator's responsibility
/// (see spec §1, out of scope).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PubKeyBytes(pub [u8; PUBKEY_LEN]);

impl PubKeyBytes {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != PUBKEY_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; PUBKEY_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PubKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKey({})", self.to_hex())
    }
}

impl fmt::Display for PubKeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for PubKeyBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PubKeyBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PubKeyBytes::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte content digest: block hashes and whitelisted hashes both use
/// this shape.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Hash32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash32::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A 32-byte digest granted special privilege by governance.
pub type WhitelistedHash = Hash32;

/// Which aspect of federation state a `VotingData` entry targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum VotingDataKey {
    AddMember = 0,
    KickMember = 1,
    WhitelistHash = 2,
    RemoveHash = 3,
}

impl VotingDataKey {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for VotingDataKey {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AddMember),
            1 => Ok(Self::KickMember),
            2 => Ok(Self::WhitelistHash),
            3 => Ok(Self::RemoveHash),
            other => Err(other),
        }
    }
}

/// The atomic unit of voting carried in block coinbases.
///
/// Two `VotingData` values are equal iff `key` and `payload` match exactly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingData {
    pub key: VotingDataKey,
    pub payload: Vec<u8>,
}

impl VotingData {
    pub fn add_member(member: FederationMember) -> Self {
        Self {
            key: VotingDataKey::AddMember,
            payload: member.canonical_bytes(),
        }
    }

    pub fn kick_member(member: &FederationMember) -> Self {
        Self {
            key: VotingDataKey::KickMember,
            payload: member.canonical_bytes(),
        }
    }

    pub fn whitelist_hash(hash: WhitelistedHash) -> Self {
        Self {
            key: VotingDataKey::WhitelistHash,
            payload: hash.0.to_vec(),
        }
    }

    pub fn remove_hash(hash: WhitelistedHash) -> Self {
        Self {
            key: VotingDataKey::RemoveHash,
            payload: hash.0.to_vec(),
        }
    }

    /// Decode the payload as a `FederationMember`, for `AddMember`/`KickMember` votes.
    pub fn as_member(&self) -> Option<FederationMember> {
        FederationMember::from_bytes(&self.payload)
    }

    /// Decode the payload as a 32-byte digest, for hash votes.
    pub fn as_hash(&self) -> Option<Hash32> {
        if self.payload.len() != 32 {
            return None;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&self.payload);
        Some(Hash32(arr))
    }
}

/// A member of the PoA federation. Multisig members are immutable: they can
/// never be the target of an add/kick poll.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationMember {
    pub pubkey: PubKeyBytes,
    pub is_multisig: bool,
}

impl FederationMember {
    pub fn new(pubkey: PubKeyBytes, is_multisig: bool) -> Self {
        Self { pubkey, is_multisig }
    }

    /// Canonical serialization used as `VotingData` payload: pubkey bytes
    /// followed by a single member-type flag byte.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PUBKEY_LEN + 1);
        out.extend_from_slice(&self.pubkey.0);
        out.push(self.is_multisig as u8);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PUBKEY_LEN + 1 {
            return None;
        }
        let mut arr = [0u8; PUBKEY_LEN];
        arr.copy_from_slice(&bytes[..PUBKEY_LEN]);
        Some(Self {
            pubkey: PubKeyBytes(arr),
            is_multisig: bytes[PUBKEY_LEN] != 0,
        })
    }
}

/// Lifecycle state of a `Poll`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollState {
    Pending,
    Approved,
    Executed,
}

/// An aggregated vote being accumulated or already finalized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Poll {
    pub id: u64,
    pub data: VotingData,
    pub start_height: u64,
    pub start_hash: Hash32,
    /// voter pubkey (hex-keyed via `PubKeyBytes`) -> height at which that
    /// vote was recorded. Kept per-height so a reorg can surgically remove
    /// only the votes introduced by the disconnected block.
    pub votes_in_favor: BTreeMap<PubKeyBytes, u64>,
    pub poll_applied_height: Option<u64>,
    pub executed_height: Option<u64>,
    pub state: PollState,
}

impl Poll {
    pub fn votes_in_favor_hex(&self) -> Vec<String> {
        self.votes_in_favor.keys().map(|k| k.to_hex()).collect()
    }
}

/// An entry in the outgoing queue drained by the block producer, same shape
/// as `VotingData`.
pub type ScheduledVote = VotingData;

/// The minimal shape of on-chain block information the core needs. The real
/// block wire format, header validation and PoA slot timing are external
/// collaborators (spec §1); this is the narrow view passed across that
/// boundary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    pub hash: Hash32,
    pub parent_hash: Hash32,
    /// Unix seconds, taken from the block header.
    pub time: u64,
    /// The PoA slot-holder that produced this block. Standing in for a
    /// dedicated slot oracle: in a round-robin PoA chain the miner of a
    /// connected block *is* the result of `SlotAssignment(time)` (see
    /// DESIGN.md).
    pub miner: PubKeyBytes,
    /// Raw bytes of the coinbase's voting-data `OP_RETURN` output, or empty
    /// if the block carries no votes. Decoded by `vote_codec`.
    pub coinbase_script: Vec<u8>,
}
