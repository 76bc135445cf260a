//! Thin HTTP client for the admin RPC surface, for use by CLIs and tests
//! that don't want to link the whole node (mirrors the teacher's client.rs).

use crate::types::{FederationMember, Poll, VotingData};
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;

pub struct FederationClient {
    client: HttpClient,
}

impl FederationClient {
    pub fn new(url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let client = HttpClientBuilder::default().build(url)?;
        Ok(Self { client })
    }

    pub async fn vote_add_member(
        &self,
        pubkey_hex: &str,
        is_multisig: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        self.client
            .request("vote_add_member", rpc_params![pubkey_hex, is_multisig])
            .await
            .map_err(Into::into)
    }

    pub async fn vote_kick_member(&self, pubkey_hex: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.client
            .request("vote_kick_member", rpc_params![pubkey_hex])
            .await
            .map_err(Into::into)
    }

    pub async fn vote_whitelist_hash(&self, hash_hex: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.client
            .request("vote_whitelist_hash", rpc_params![hash_hex])
            .await
            .map_err(Into::into)
    }

    pub async fn vote_remove_hash(&self, hash_hex: &str) -> Result<(), Box<dyn std::error::Error>> {
        self.client
            .request("vote_remove_hash", rpc_params![hash_hex])
            .await
            .map_err(Into::into)
    }

    pub async fn get_scheduled_votes(&self) -> Result<Vec<VotingData>, Box<dyn std::error::Error>> {
        self.client
            .request("get_scheduled_votes", rpc_params![])
            .await
            .map_err(Into::into)
    }

    pub async fn get_pending_polls(&self) -> Result<Vec<Poll>, Box<dyn std::error::Error>> {
        self.client.request("get_pending_polls", rpc_params![]).await.map_err(Into::into)
    }

    pub async fn get_approved_polls(&self) -> Result<Vec<Poll>, Box<dyn std::error::Error>> {
        self.client.request("get_approved_polls", rpc_params![]).await.map_err(Into::into)
    }

    pub async fn get_executed_polls(&self) -> Result<Vec<Poll>, Box<dyn std::error::Error>> {
        self.client.request("get_executed_polls", rpc_params![]).await.map_err(Into::into)
    }

    pub async fn get_members(&self) -> Result<Vec<FederationMember>, Box<dyn std::error::Error>> {
        self.client.request("get_members", rpc_params![]).await.map_err(Into::into)
    }

    pub async fn get_whitelist(&self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        self.client.request("get_whitelist", rpc_params![]).await.map_err(Into::into)
    }
}
