//! Local solo leaderboard and the key-value port it persists through

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::events::{ClientEvent, EventSink};

/// Key the solo leaderboard is stored under
pub const SOLO_LEADERBOARD_KEY: &str = "soloLeaderboard";

/// Entries kept after every write
pub const SOLO_LEADERBOARD_SIZE: usize = 10;

pub type LeaderboardResult<T> = Result<T, LeaderboardError>;

#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("leaderboard storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("leaderboard data is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("leaderboard storage unavailable: {0}")]
    Unavailable(String),
}

/// Per-client persistent string storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> LeaderboardResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> LeaderboardResult<()>;
}

/// One JSON file per key inside a directory
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> LeaderboardResult<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> LeaderboardResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), value)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> LeaderboardResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| LeaderboardError::Unavailable(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> LeaderboardResult<()> {
        self.values
            .lock()
            .map_err(|e| LeaderboardError::Unavailable(e.to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One completed solo game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoloScore {
    pub name: String,
    #[serde(default)]
    pub points: i64,
    /// Milliseconds
    pub time: u64,
}

/// Points descending, then time ascending
fn compare_solo(a: &SoloScore, b: &SoloScore) -> Ordering {
    b.points.cmp(&a.points).then_with(|| a.time.cmp(&b.time))
}

pub struct SoloLeaderboard {
    store: Arc<dyn KeyValueStore>,
    entries: Vec<SoloScore>,
}

impl SoloLeaderboard {
    /// Read the persisted board. Missing or unreadable data yields an empty board.
    pub fn load(store: Arc<dyn KeyValueStore>, events: &dyn EventSink) -> Self {
        let entries = match store.get(SOLO_LEADERBOARD_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<SoloScore>>(&raw) {
                Ok(mut entries) => {
                    entries.sort_by(compare_solo);
                    entries.truncate(SOLO_LEADERBOARD_SIZE);
                    entries
                }
                Err(e) => {
                    events.record(ClientEvent::LeaderboardReset {
                        reason: e.to_string(),
                    });
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                events.record(ClientEvent::LeaderboardReset {
                    reason: e.to_string(),
                });
                Vec::new()
            }
        };

        Self { store, entries }
    }

    pub fn entries(&self) -> &[SoloScore] {
        &self.entries
    }

    /// Add a finished game and write the board through.
    ///
    /// Returns the 1-based rank if the game made the board. The in-memory
    /// board is updated even when the write fails.
    pub fn record(
        &mut self,
        name: &str,
        points: i64,
        elapsed: Duration,
    ) -> LeaderboardResult<Option<usize>> {
        let score = SoloScore {
            name: name.to_string(),
            points,
            time: elapsed.as_millis() as u64,
        };

        // New entries rank after existing equal ones
        let position = self
            .entries
            .iter()
            .position(|existing| compare_solo(&score, existing) == Ordering::Less)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, score);
        self.entries.truncate(SOLO_LEADERBOARD_SIZE);

        let rank = (position < SOLO_LEADERBOARD_SIZE).then_some(position + 1);
        let raw = serde_json::to_string(&self.entries)?;
        self.store.set(SOLO_LEADERBOARD_KEY, &raw)?;

        tracing::debug!("Recorded solo game for {}: rank {:?}", name, rank);
        Ok(rank)
    }
}
