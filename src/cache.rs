//! Cross-run cache of the parsed game tree.
//!
//! Parsing a full install touches thousands of bundle records; when
//! debugging the export side it is convenient to snapshot the parsed
//! [`Game`] and reload it on the next run. The snapshot is a plain
//! serde_json document and is not part of the on-disk interface — archive
//! handles are never serialized, the [`crate::cas::CasCache`] is rebuilt
//! fresh each run. An unreadable or stale snapshot falls back to a full
//! parse and is rewritten.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::FormatError;
use crate::game::Game;

pub struct GameCache {
    path: PathBuf,
}

impl GameCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached tree, or `None` when it is missing or unreadable.
    pub fn load(&self) -> Option<Game> {
        let data = std::fs::read(&self.path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(game) => Some(game),
            Err(err) => {
                warn!("Discarding unreadable game cache {}: {err}", self.path.display());
                None
            }
        }
    }

    /// Persist the parsed tree. Failures here are the caller's to ignore —
    /// the cache is a convenience, not a source of truth.
    pub fn store(&self, game: &Game) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec(game)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&self.path, data)
    }

    /// Load from the cache, rebuilding and re-persisting on a miss.
    pub fn load_or_rebuild(
        &self,
        rebuild: impl FnOnce() -> Result<Game, FormatError>,
    ) -> Result<Game, FormatError> {
        info!("Loading game from cache");
        if let Some(game) = self.load() {
            return Ok(game);
        }

        info!("Cache entry invalid or not found, reinitializing");
        let game = rebuild()?;
        if let Err(err) = self.store(&game) {
            warn!("Could not persist game cache {}: {err}", self.path.display());
        }
        Ok(game)
    }
}
