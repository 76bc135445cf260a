use crate::vote_codec::VoteCodecError;
use thiserror::Error;

/// Errors returned to the admin edge (spec §7, kind 1 & 2). Recoverable: the
/// caller's state is untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Multisig members can't be voted on")]
    MultisigImmutable,
    #[error("invalid public key: {0}")]
    InvalidPubKey(String),
    #[error("invalid hash: {0}")]
    InvalidHash(String),
    #[error("vote already scheduled or already cast by this node")]
    DuplicateVote,
}

/// All error kinds the core can raise (spec §7). `Persistence` and
/// `InvariantViolation` are fatal: callers must not swallow them, and the
/// embedding node is expected to shut down cleanly on either.
#[derive(Debug, Error)]
pub enum FederationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    VoteCodec(#[from] VoteCodecError),
}

pub type Result<T> = std::result::Result<T, FederationError>;
