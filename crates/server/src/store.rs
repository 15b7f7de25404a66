//! Saved positions, keyed by match id.
//!
//! Only snapshots this server published ever reach the store, so a loaded
//! position is always one that was reached by accepted moves.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Store lock poisoned")]
    Poisoned,

    #[error("Store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPosition {
    pub fen: String,
    pub turn: u32,
    pub saved_at: DateTime<Utc>,
}

pub trait PositionStore: Send + Sync {
    fn save(&self, match_id: &str, position: SavedPosition) -> Result<(), StoreError>;

    fn load(&self, match_id: &str) -> Result<Option<SavedPosition>, StoreError>;
}

type PositionMap = HashMap<String, SavedPosition>;

#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    positions: Mutex<PositionMap>,
}

impl MemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PositionStore for MemoryPositionStore {
    fn save(&self, match_id: &str, position: SavedPosition) -> Result<(), StoreError> {
        let mut positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        positions.insert(match_id.to_string(), position);
        Ok(())
    }

    fn load(&self, match_id: &str) -> Result<Option<SavedPosition>, StoreError> {
        let positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(positions.get(match_id).cloned())
    }
}

/// Whole map kept in memory and rewritten to a bincode file on every save.
#[derive(Debug)]
pub struct FilePositionStore {
    path: PathBuf,
    positions: Mutex<PositionMap>,
}

impl FilePositionStore {
    /// Open the store, starting empty when the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let positions = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            bincode::deserialize_from(reader)?
        } else {
            PositionMap::new()
        };
        tracing::info!(
            path = %path.display(),
            count = positions.len(),
            "Opened position store"
        );
        Ok(Self {
            path,
            positions: Mutex::new(positions),
        })
    }

    /// Write to a sibling temp file and rename it over the store, so a
    /// failed write never leaves a truncated file behind.
    fn write(&self, positions: &PositionMap) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let result = Self::write_to(&tmp, positions).and_then(|()| {
            fs::rename(&tmp, &self.path)?;
            Ok(())
        });
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn write_to(path: &Path, positions: &PositionMap) -> Result<(), StoreError> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, positions)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl PositionStore for FilePositionStore {
    fn save(&self, match_id: &str, position: SavedPosition) -> Result<(), StoreError> {
        let mut positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        let mut updated = positions.clone();
        updated.insert(match_id.to_string(), position);
        self.write(&updated)?;
        *positions = updated;
        Ok(())
    }

    fn load(&self, match_id: &str) -> Result<Option<SavedPosition>, StoreError> {
        let positions = self.positions.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(positions.get(match_id).cloned())
    }
}
