//! CAS archives and the process-wide archive-handle cache.
//!
//! A `.cas` file is a plain concatenation of framed blocks (see `writer.rs`
//! for the block layout). The [`Cas`] value itself is deliberately small —
//! just the archive path plus the layout it belongs to — so the parsed game
//! tree stays serializable. File handles live in a separate [`CasCache`]
//! and are acquired lazily.
//!
//! # Handle sharing
//!
//! One archive handle carries one seek cursor, so every consumer locks the
//! handle around its complete seek-then-read section. The cache hands out
//! `Arc<Mutex<File>>`; two extractions with independent caches never share
//! a handle.

use byteorder::{BigEndian, ReadBytesExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Block encodings ──────────────────────────────────────────────────────────

/// Stored block: payload is uncompressed, `size == compressed_size`.
pub const MAGIC_STORED: u16 = 0x70;
/// Stored block, alternate framing: `compressed_size` is always zero.
pub const MAGIC_STORED_ALT: u16 = 0x71;
/// Oodle-compressed block.
pub const MAGIC_OODLE: u16 = 0x1170;

/// Whether `magic` is one of the known CAS block encodings.
pub fn is_known_block_magic(magic: u16) -> bool {
    matches!(magic, MAGIC_STORED | MAGIC_STORED_ALT | MAGIC_OODLE)
}

// ── Cas ──────────────────────────────────────────────────────────────────────

/// One `.cas` archive file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cas {
    /// Layout subdirectory this archive was discovered under ("Data" or
    /// "Patch"); extracted files mirror it in the output tree.
    pub layout_dir: String,
    /// Absolute path of the archive.
    pub path: PathBuf,
}

impl Cas {
    pub fn new(layout_dir: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            layout_dir: layout_dir.into(),
            path:       path.into(),
        }
    }

    /// Whether a file part starts at `offset`: the u16 big-endian value at
    /// `offset + 4` (past the block's decompressed-size field) must be a
    /// known block encoding. A short read or unopenable archive counts as
    /// "no" — this probe is the discriminator of the bundle payload
    /// heuristic and must stay recoverable.
    pub fn has_file_at(&self, cache: &CasCache, offset: u64) -> bool {
        let handle = match cache.handle(&self.path) {
            Ok(handle) => handle,
            Err(_)     => return false,
        };
        let mut file = handle.lock();
        if file.seek(SeekFrom::Start(offset + 0x4)).is_err() {
            return false;
        }
        match file.read_u16::<BigEndian>() {
            Ok(magic) => is_known_block_magic(magic),
            Err(_)    => false,
        }
    }

    /// Whether `path` names an actual CAS archive (a regular file with the
    /// `.cas` suffix).
    pub fn is_valid_cas_file(path: &Path) -> bool {
        path.is_file() && path.extension().is_some_and(|ext| ext == "cas")
    }
}

// ── CasCache ─────────────────────────────────────────────────────────────────

/// Cache of open archive handles, keyed by path.
///
/// Explicitly constructed and threaded through the CAS layer rather than
/// process-global, so independent extractions can run with disjoint caches.
/// Handles stay open for the lifetime of the cache.
#[derive(Default)]
pub struct CasCache {
    handles: Mutex<HashMap<PathBuf, Arc<Mutex<File>>>>,
}

impl CasCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the shared handle for `path`, opening the archive on first use.
    pub fn handle(&self, path: &Path) -> io::Result<Arc<Mutex<File>>> {
        let mut handles = self.handles.lock();
        if let Some(handle) = handles.get(path) {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(Mutex::new(File::open(path)?));
        handles.insert(path.to_owned(), Arc::clone(&handle));
        Ok(handle)
    }

    /// Number of archives opened so far.
    pub fn open_count(&self) -> usize {
        self.handles.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn handle_is_opened_once_and_shared() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game_0.cas");
        std::fs::write(&path, b"payload").unwrap();

        let cache = CasCache::new();
        let first = cache.handle(&path).unwrap();
        let second = cache.handle(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.open_count(), 1);
    }

    #[test]
    fn missing_archive_fails_to_open() {
        let cache = CasCache::new();
        assert!(cache.handle(Path::new("/nonexistent/void.cas")).is_err());
    }

    #[test]
    fn probe_detects_known_block_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.cas");
        let mut file = File::create(&path).unwrap();
        // size=5, magic=0x70, compressed_size=5, payload "HELLO"
        file.write_all(&5u32.to_be_bytes()).unwrap();
        file.write_all(&MAGIC_STORED.to_be_bytes()).unwrap();
        file.write_all(&5u16.to_be_bytes()).unwrap();
        file.write_all(b"HELLO").unwrap();
        drop(file);

        let cache = CasCache::new();
        let cas = Cas::new("Data", &path);
        assert!(cas.has_file_at(&cache, 0));
        // Offset 2 lands on the compressed-size field, not a block start.
        assert!(!cas.has_file_at(&cache, 2));
        // Past EOF: short read counts as "no block here".
        assert!(!cas.has_file_at(&cache, 4096));
    }

    #[test]
    fn cas_file_detection() {
        let dir = tempfile::tempdir().unwrap();
        let cas = dir.path().join("cas_01.cas");
        let toc = dir.path().join("cas_01.toc");
        std::fs::write(&cas, b"").unwrap();
        std::fs::write(&toc, b"").unwrap();
        assert!(Cas::is_valid_cas_file(&cas));
        assert!(!Cas::is_valid_cas_file(&toc));
        assert!(!Cas::is_valid_cas_file(dir.path()));
    }
}
