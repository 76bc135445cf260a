//! Example wiring binary: constructs the governance core and exposes its
//! admin RPC surface. Block connect/disconnect notifications are expected
//! from an external chain-sync component via the process's stdin as
//! newline-delimited JSON `BlockInfo` records — a stand-in for the real
//! node's block pipeline, which is out of scope for this core (spec §1).

use federation_core::config::FederationConfig;
use federation_core::error::Result;
use federation_core::events::{Event, EventBus};
use federation_core::federation::FederationManager;
use federation_core::idle_kicker::IdleMembersKicker;
use federation_core::persistence::federation_store::FederationStore;
use federation_core::persistence::last_active_store::LastActiveStore;
use federation_core::persistence::whitelist_store::WhitelistStore;
use federation_core::rpc::{FederationRpcImpl, FederationRpcServer};
use federation_core::types::{BlockInfo, FederationMember, PubKeyBytes};
use federation_core::voting::VotingManager;
use jsonrpsee::server::Server;
use std::env;
use std::io::BufRead;
use std::sync::Arc;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn genesis_members(data_dir: &std::path::Path, own_pubkey: Option<PubKeyBytes>) -> Vec<FederationMember> {
    let genesis_path = data_dir.join("genesis.json");
    if let Ok(bytes) = std::fs::read(&genesis_path) {
        if let Ok(members) = serde_json::from_slice::<Vec<FederationMember>>(&bytes) {
            return members;
        }
    }
    // No genesis file yet: bootstrap a single-member federation around this
    // node so it can start scheduling votes to admit others.
    match own_pubkey {
        Some(pk) => vec![FederationMember::new(pk, false)],
        None => Vec::new(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = args
        .get(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from("federation.toml"));
    let config = if config_path.exists() {
        FederationConfig::load(&config_path).expect("failed to load config")
    } else {
        log::warn!("no config at {config_path:?}, using defaults");
        FederationConfig::default()
    };

    let own_pubkey = args.get(2).map(|s| {
        PubKeyBytes::from_hex(s).expect("argv[2] must be a 33-byte hex public key")
    });

    std::fs::create_dir_all(&config.data_dir).expect("failed to create data directory");
    let genesis = genesis_members(&config.data_dir, own_pubkey);
    log::info!("genesis federation has {} member(s)", genesis.len());

    let bus = Arc::new(EventBus::new());
    let federation = Arc::new(
        FederationManager::new(
            FederationStore::new(config.data_dir.join("federation.json")),
            bus.clone(),
            genesis.clone(),
            own_pubkey,
        )
        .expect("failed to initialize federation manager"),
    );
    let voting = Arc::new(
        VotingManager::new(
            &config.data_dir.join("polls.log"),
            WhitelistStore::new(config.data_dir.join("whitelist.json")),
            federation.clone(),
            config.max_reorg_length,
            own_pubkey,
            genesis,
        )
        .expect("failed to initialize voting manager"),
    );
    let idle_kicker = Arc::new(
        IdleMembersKicker::new(
            LastActiveStore::new(config.data_dir.join("last_active.json")),
            federation.clone(),
            voting.clone(),
            config.max_idle_seconds,
            unix_now(),
        )
        .expect("failed to initialize idle-members kicker"),
    );

    let voting_for_connect = voting.clone();
    let idle_for_connect = idle_kicker.clone();
    bus.subscribe(move |event| match event {
        Event::BlockConnected(block) => {
            // Record this block's time before applying its votes: executing
            // a poll can publish `MemberAdded` re-entrantly, before
            // `idle_for_connect.on_block_connected` below has a chance to.
            idle_for_connect.note_tip_time(block.time);
            voting_for_connect.on_block_connected(block)?;
            idle_for_connect.on_block_connected(block)?;
            Ok(())
        }
        _ => Ok(()),
    });

    let voting_for_disconnect = voting.clone();
    bus.subscribe(move |event| match event {
        Event::BlockDisconnected(block) => voting_for_disconnect.on_block_disconnected(block),
        _ => Ok(()),
    });

    let idle_for_kick = idle_kicker.clone();
    bus.subscribe(move |event| match event {
        Event::MemberKicked(member) => idle_for_kick.on_member_kicked(&member.pubkey),
        _ => Ok(()),
    });

    let idle_for_add = idle_kicker.clone();
    bus.subscribe(move |event| match event {
        Event::MemberAdded(member) => idle_for_add.on_member_added(&member.pubkey),
        _ => Ok(()),
    });

    let server = Server::builder()
        .build(&config.rpc_addr)
        .await
        .expect("failed to bind RPC listener");
    let rpc_impl = FederationRpcImpl::new(federation.clone(), voting.clone());
    let handle = server.start(rpc_impl.into_rpc());
    log::info!("admin RPC listening on {}", config.rpc_addr);

    // Read newline-delimited BlockInfo JSON from stdin and feed it to the bus.
    // `{"disconnect": true, ...}` rewinds instead of connecting.
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line.expect("failed to read stdin");
        if line.trim().is_empty() {
            continue;
        }
        let envelope: serde_json::Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("skipping malformed block envelope: {e}");
                continue;
            }
        };
        let disconnect = envelope
            .get("disconnect")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let block: BlockInfo = match serde_json::from_value(envelope) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("skipping malformed block: {e}");
                continue;
            }
        };
        let event = if disconnect {
            Event::BlockDisconnected(block)
        } else {
            Event::BlockConnected(block)
        };
        if let Err(e) = bus.publish(event) {
            log::error!("fatal error processing block event: {e}");
            handle.stop().ok();
            return Err(e);
        }
    }

    handle.stopped().await;
    Ok(())
}
