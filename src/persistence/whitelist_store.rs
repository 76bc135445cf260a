//! `whitelist.json`: an ordered set of hex hashes, rewritten on every change.

use super::{atomic_write_json, read_json_if_exists};
use crate::types::WhitelistedHash;
use std::io;
use std::path::PathBuf;

pub struct WhitelistStore {
    path: PathBuf,
}

impl WhitelistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> io::Result<Vec<WhitelistedHash>> {
        Ok(read_json_if_exists(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, hashes: &[WhitelistedHash]) -> io::Result<()> {
        atomic_write_json(&self.path, &hashes)
    }
}
