//! Game root: the Data layout plus the Patch overlay.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cas::CasCache;
use crate::error::FormatError;
use crate::layout::Layout;

/// Layout subdirectory of the base game files.
pub const DATA_DIR: &str = "Data";
/// Layout subdirectory of the patch overlay.
pub const PATCH_DIR: &str = "Patch";

/// A loaded game installation.
#[derive(Debug, Serialize, Deserialize)]
pub struct Game {
    /// Root of the installation on the host filesystem.
    pub path:  PathBuf,
    pub data:  Layout,
    pub patch: Layout,
}

impl Game {
    /// Load both layouts. The Patch layout layers over Data: patch packages
    /// hold back-references to the same-index Data packages.
    pub fn load(path: &Path, cache: &CasCache) -> Result<Self, FormatError> {
        let data = Layout::load(path, DATA_DIR, None, cache)?;
        let patch = Layout::load(path, PATCH_DIR, Some(&data), cache)?;
        Ok(Self {
            path: path.to_owned(),
            data,
            patch,
        })
    }

    /// Both layouts, base game first.
    pub fn layouts(&self) -> [&Layout; 2] {
        [&self.data, &self.patch]
    }
}
