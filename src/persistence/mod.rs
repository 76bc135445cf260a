pub mod federation_store;
pub mod last_active_store;
pub mod poll_log;
pub mod whitelist_store;

use std::io;
use std::path::Path;

/// Serialize `value` as pretty JSON and atomically replace `path`'s contents
/// via a write-to-temp-then-rename, so a crash mid-write never leaves a
/// half-written snapshot behind (spec §6: "rewritten on change").
pub(crate) fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let tmp_path = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp_path, bytes)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

pub(crate) fn read_json_if_exists<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> io::Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
