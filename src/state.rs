//! Persisted poll progress: the last fully processed message id and the last
//! dispatch instant, written atomically so a crash mid-write never leaves a
//! corrupt cursor.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ingest::types::MessageId;

/// Wire shape: `{"last_id": string|null, "last_dispatch_time": number}`.
/// `last_id` is monotonically non-decreasing across ticks and restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(with = "id_string", default)]
    pub last_id: Option<MessageId>,
    #[serde(default)]
    pub last_dispatch_time: f64,
}

/// The snowflake is stored as a string, matching the channel wire format.
mod id_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(v: &Option<u64>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match v {
            Some(id) => s.serialize_str(&id.to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| s.parse::<u64>().map_err(de::Error::custom))
            .transpose()
    }
}

pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Zero cursor when no prior state exists or the persisted state is
    /// unreadable. Corruption is survivable: the poll loop re-seeds.
    pub fn load(&self) -> Cursor {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Cursor::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state file unreadable, starting from zero cursor"
                );
                Cursor::default()
            }
        }
    }

    /// Write-then-replace so a crash or power loss mid-save never yields a
    /// half-written file.
    pub fn save(&self, cursor: &Cursor) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_string(cursor).context("encoding cursor")?;
        fs::write(&tmp, body)
            .with_context(|| format!("writing cursor to {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing cursor at {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("state.json"));
        let cursor = Cursor {
            last_id: Some(1_334_155),
            last_dispatch_time: 1_700_000_000.5,
        };
        store.save(&cursor).unwrap();
        assert_eq!(store.load(), cursor);
    }

    #[test]
    fn missing_file_loads_zero_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("nope.json"));
        assert_eq!(store.load(), Cursor::default());
    }

    #[test]
    fn corrupt_file_loads_zero_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let store = CursorStore::new(&path);
        assert_eq!(store.load(), Cursor::default());
    }

    #[test]
    fn last_id_is_stored_as_string() {
        let cursor = Cursor {
            last_id: Some(42),
            last_dispatch_time: 0.0,
        };
        let json = serde_json::to_string(&cursor).unwrap();
        assert_eq!(json, r#"{"last_id":"42","last_dispatch_time":0.0}"#);

        let none: Cursor = serde_json::from_str(r#"{"last_id":null,"last_dispatch_time":1.0}"#).unwrap();
        assert_eq!(none.last_id, None);
    }

    #[test]
    fn save_leaves_no_temp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = CursorStore::new(&path);
        store.save(&Cursor::default()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
