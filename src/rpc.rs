//! Admin JSON-RPC surface (spec §6): schedule votes, inspect poll and
//! membership state. Mirrors the teacher's `#[rpc(server)]` + manual
//! `RpcResult` error-mapping style.

use crate::error::FederationError;
use crate::federation::FederationManager;
use crate::types::{FederationMember, Poll, PubKeyBytes, VotingData, WhitelistedHash};
use crate::voting::VotingManager;
use jsonrpsee::core::{RpcResult, async_trait};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use std::sync::Arc;

#[rpc(server)]
pub trait FederationRpc {
    #[method(name = "vote_add_member")]
    fn vote_add_member(&self, pubkey_hex: String, is_multisig: bool) -> RpcResult<()>;

    #[method(name = "vote_kick_member")]
    fn vote_kick_member(&self, pubkey_hex: String) -> RpcResult<()>;

    #[method(name = "vote_whitelist_hash")]
    fn vote_whitelist_hash(&self, hash_hex: String) -> RpcResult<()>;

    #[method(name = "vote_remove_hash")]
    fn vote_remove_hash(&self, hash_hex: String) -> RpcResult<()>;

    #[method(name = "get_scheduled_votes")]
    fn get_scheduled_votes(&self) -> RpcResult<Vec<VotingData>>;

    #[method(name = "get_pending_polls")]
    fn get_pending_polls(&self) -> RpcResult<Vec<Poll>>;

    #[method(name = "get_approved_polls")]
    fn get_approved_polls(&self) -> RpcResult<Vec<Poll>>;

    #[method(name = "get_executed_polls")]
    fn get_executed_polls(&self) -> RpcResult<Vec<Poll>>;

    #[method(name = "get_members")]
    fn get_members(&self) -> RpcResult<Vec<FederationMember>>;

    #[method(name = "get_whitelist")]
    fn get_whitelist(&self) -> RpcResult<Vec<String>>;
}

pub struct FederationRpcImpl {
    federation: Arc<FederationManager>,
    voting: Arc<VotingManager>,
}

impl FederationRpcImpl {
    pub fn new(federation: Arc<FederationManager>, voting: Arc<VotingManager>) -> Self {
        Self { federation, voting }
    }

    fn member_from_hex(&self, pubkey_hex: &str, is_multisig: bool) -> RpcResult<FederationMember> {
        let pubkey = PubKeyBytes::from_hex(pubkey_hex)
            .map_err(|e| rpc_err_msg(format!("invalid public key: {e}")))?;
        Ok(FederationMember::new(pubkey, is_multisig))
    }

    fn hash_from_hex(&self, hash_hex: &str) -> RpcResult<WhitelistedHash> {
        WhitelistedHash::from_hex(hash_hex).map_err(|e| rpc_err_msg(format!("invalid hash: {e}")))
    }
}

#[async_trait]
impl FederationRpcServer for FederationRpcImpl {
    fn vote_add_member(&self, pubkey_hex: String, is_multisig: bool) -> RpcResult<()> {
        let member = self.member_from_hex(&pubkey_hex, is_multisig)?;
        self.voting
            .schedule_vote(VotingData::add_member(member))
            .map_err(rpc_err)
    }

    fn vote_kick_member(&self, pubkey_hex: String) -> RpcResult<()> {
        let pubkey = PubKeyBytes::from_hex(&pubkey_hex)
            .map_err(|e| rpc_err_msg(format!("invalid public key: {e}")))?;
        let member = self
            .federation
            .get_member(&pubkey)
            .ok_or_else(|| rpc_err_msg(format!("{pubkey_hex} is not a current federation member")))?;
        self.voting.schedule_vote(VotingData::kick_member(&member)).map_err(rpc_err)
    }

    fn vote_whitelist_hash(&self, hash_hex: String) -> RpcResult<()> {
        let hash = self.hash_from_hex(&hash_hex)?;
        self.voting.schedule_vote(VotingData::whitelist_hash(hash)).map_err(rpc_err)
    }

    fn vote_remove_hash(&self, hash_hex: String) -> RpcResult<()> {
        let hash = self.hash_from_hex(&hash_hex)?;
        self.voting.schedule_vote(VotingData::remove_hash(hash)).map_err(rpc_err)
    }

    fn get_scheduled_votes(&self) -> RpcResult<Vec<VotingData>> {
        Ok(self.voting.get_scheduled_votes())
    }

    fn get_pending_polls(&self) -> RpcResult<Vec<Poll>> {
        Ok(self.voting.get_pending_polls())
    }

    fn get_approved_polls(&self) -> RpcResult<Vec<Poll>> {
        Ok(self.voting.get_approved_polls())
    }

    fn get_executed_polls(&self) -> RpcResult<Vec<Poll>> {
        Ok(self.voting.get_executed_polls())
    }

    fn get_members(&self) -> RpcResult<Vec<FederationMember>> {
        Ok(self.federation.get_members())
    }

    fn get_whitelist(&self) -> RpcResult<Vec<String>> {
        Ok(self.voting.whitelist().iter().map(|h| h.to_hex()).collect())
    }
}

fn rpc_err(e: FederationError) -> ErrorObjectOwned {
    rpc_err_msg(e.to_string())
}

fn rpc_err_msg(msg: String) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(-32000, msg, None::<()>)
}
