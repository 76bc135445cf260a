//! Proof-of-authority federation governance core: aggregates per-member
//! votes embedded in block coinbases into majority-backed polls, applies
//! their effect to the federation roster and hash whitelist, and schedules
//! kick votes against members who stop producing blocks.
//!
//! The three components (`FederationManager`, `VotingManager`,
//! `IdleMembersKicker`) communicate only through the narrow mutation
//! interface and the `EventBus`; block production, gossip, the mempool and
//! header validation are all external collaborators (spec §1).

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod federation;
pub mod idle_kicker;
pub mod persistence;
pub mod rpc;
pub mod types;
pub mod vote_codec;
pub mod voting;

pub use config::FederationConfig;
pub use error::{FederationError, Result};
pub use federation::FederationManager;
pub use idle_kicker::IdleMembersKicker;
pub use voting::VotingManager;
