//! `last_active.json`: `{ pubkey-hex: unix-seconds }`, rewritten on every
//! change.

use super::{atomic_write_json, read_json_if_exists};
use crate::types::PubKeyBytes;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

pub struct LastActiveStore {
    path: PathBuf,
}

impl LastActiveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> io::Result<HashMap<PubKeyBytes, u64>> {
        Ok(read_json_if_exists(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, entries: &HashMap<PubKeyBytes, u64>) -> io::Result<()> {
        atomic_write_json(&self.path, entries)
    }
}
