//! `federation.json`: the current roster snapshot, rewritten on every
//! change.

use super::{atomic_write_json, read_json_if_exists};
use crate::types::FederationMember;
use std::io;
use std::path::{Path, PathBuf};

pub struct FederationStore {
    path: PathBuf,
}

impl FederationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> io::Result<Option<Vec<FederationMember>>> {
        read_json_if_exists(&self.path)
    }

    pub fn save(&self, members: &[FederationMember]) -> io::Result<()> {
        atomic_write_json(&self.path, &members)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
