//! `polls.log`: an append-only, length + CRC framed log of poll mutations.
//! The in-memory poll table is rebuilt by replaying this file at startup —
//! reorg-revert is then naturally just "append a reverting record", never a
//! rewrite of history (spec §9 "Persistence of polls").

use crate::types::{Hash32, PubKeyBytes, VotingData};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum PollLogRecord {
    Created {
        id: u64,
        data: VotingData,
        start_height: u64,
        start_hash: Hash32,
        voter: PubKeyBytes,
    },
    VoteAdded {
        id: u64,
        voter: PubKeyBytes,
        height: u64,
    },
    Approved {
        id: u64,
        height: u64,
    },
    Executed {
        id: u64,
        height: u64,
    },
    RevertedToApproved {
        id: u64,
    },
    RevertedToPending {
        id: u64,
    },
    VoteRemoved {
        id: u64,
        voter: PubKeyBytes,
    },
    Deleted {
        id: u64,
    },
}

pub struct PollLog {
    file: File,
    path: PathBuf,
}

impl PollLog {
    /// Open (creating if absent) the log and replay every well-formed record
    /// in file order. A truncated or CRC-mismatched record at EOF is treated
    /// as an unflushed partial write from a prior crash and discarded rather
    /// than erroring, per spec §4.1 "crash recovery is deterministic".
    pub fn open(path: &Path) -> io::Result<(Self, Vec<PollLogRecord>)> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let records = replay(&mut file)?;
        file.seek(SeekFrom::End(0))?;

        Ok((
            Self {
                file,
                path: path.to_path_buf(),
            },
            records,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, flushing before returning so the caller only
    /// acknowledges the mutation once it is durable (spec §4.1: "Each
    /// mutation ... is written before the in-memory change is acknowledged
    /// to the caller").
    pub fn append(&mut self, record: &PollLogRecord) -> io::Result<()> {
        let payload = bincode::serialize(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let crc = crc32fast::hash(&payload);

        let mut framed = Vec::with_capacity(8 + payload.len());
        framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        framed.extend_from_slice(&crc.to_le_bytes());
        framed.extend_from_slice(&payload);

        self.file.write_all(&framed)?;
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }
}

fn replay(file: &mut File) -> io::Result<Vec<PollLogRecord>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos + 8 <= buf.len() {
        let len = u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
        let crc = u32::from_le_bytes(buf[pos + 4..pos + 8].try_into().unwrap());
        let body_start = pos + 8;
        let body_end = body_start + len;
        if body_end > buf.len() {
            log::warn!(
                "polls.log: truncated record at offset {pos} (declared len {len}), discarding tail"
            );
            break;
        }
        let body = &buf[body_start..body_end];
        if crc32fast::hash(body) != crc {
            log::warn!("polls.log: CRC mismatch at offset {pos}, discarding tail");
            break;
        }
        match bincode::deserialize::<PollLogRecord>(body) {
            Ok(record) => records.push(record),
            Err(e) => {
                log::warn!("polls.log: failed to decode record at offset {pos}: {e}, discarding tail");
                break;
            }
        }
        pos = body_end;
    }
    Ok(records)
}
