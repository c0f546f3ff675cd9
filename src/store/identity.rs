//! Durable player identity, remembered per room across sessions

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::ws::protocol::PlayerId;

/// Identity record persisted per room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredIdentity {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub room: String,
    pub saved_at: DateTime<Utc>,
}

impl StoredIdentity {
    pub fn new(id: PlayerId, name: String, color: String, room: String) -> Self {
        Self {
            id,
            name,
            color,
            room,
            saved_at: Utc::now(),
        }
    }

    /// What a later session asks the server to hand back
    pub fn durable(&self) -> DurableIdentity {
        DurableIdentity {
            previous_player_id: self.id.clone(),
            previous_name: self.name.clone(),
        }
    }
}

/// Identity a new session requests to resume
#[derive(Debug, Clone, PartialEq)]
pub struct DurableIdentity {
    pub previous_player_id: PlayerId,
    pub previous_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("identity store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("identity record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Storage for one identity record per room
pub trait IdentityStore: Send + Sync {
    fn load(&self, room: &str) -> Result<Option<StoredIdentity>, StoreError>;
    fn save(&self, identity: &StoredIdentity) -> Result<(), StoreError>;
}

/// One JSON file per room under a directory
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, room: &str) -> PathBuf {
        self.dir.join(format!("player_{}.json", file_safe(room)))
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self, room: &str) -> Result<Option<StoredIdentity>, StoreError> {
        let path = self.path_for(room);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, identity: &StoredIdentity) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(&identity.room);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(identity)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Process-local store, for embedding hosts without a disk and for tests
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: DashMap<String, StoredIdentity>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self, room: &str) -> Result<Option<StoredIdentity>, StoreError> {
        Ok(self.records.get(room).map(|r| r.value().clone()))
    }

    fn save(&self, identity: &StoredIdentity) -> Result<(), StoreError> {
        self.records.insert(identity.room.clone(), identity.clone());
        Ok(())
    }
}

/// Room ids come from URLs; keep file names to a safe alphabet
fn file_safe(room: &str) -> String {
    room.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_per_room() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path().join("ids"));

        assert!(store.load("alpha").unwrap().is_none());

        let record = StoredIdentity::new("p1".into(), "Ace".into(), "#ff4444".into(), "alpha".into());
        store.save(&record).unwrap();

        assert_eq!(store.load("alpha").unwrap(), Some(record.clone()));
        assert!(store.load("beta").unwrap().is_none());
        assert_eq!(
            record.durable(),
            DurableIdentity {
                previous_player_id: "p1".into(),
                previous_name: "Ace".into(),
            }
        );
    }

    #[test]
    fn corrupt_record_is_an_error_not_a_panic() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileIdentityStore::new(dir.path());
        fs::write(dir.path().join("player_alpha.json"), "{oops").unwrap();
        assert!(matches!(store.load("alpha"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn room_ids_are_sanitized_for_file_names() {
        assert_eq!(file_safe("../etc/passwd"), "___etc_passwd");
        assert_eq!(file_safe("room-42_x"), "room-42_x");
    }

    #[test]
    fn memory_store_overwrites_latest() {
        let store = MemoryIdentityStore::new();
        store
            .save(&StoredIdentity::new("p1".into(), "A".into(), "red".into(), "r".into()))
            .unwrap();
        store
            .save(&StoredIdentity::new("p2".into(), "B".into(), "blue".into(), "r".into()))
            .unwrap();
        assert_eq!(store.load("r").unwrap().unwrap().id, "p2");
    }
}
