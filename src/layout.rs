//! Layout descriptor loader.
//!
//! `<game>/<Data|Patch>/layout.toc` declares the install chunks of one
//! layout. Its payload is a tagged record tree whose
//! `installManifest.installChunks[]` entries name each chunk's directory
//! and superbundles; the chunk's ordinal position is its package index.
//!
//! Loading is two-phase: all packages of the layout are discovered first,
//! then every superbundle index is parsed against the complete package
//! list (bundle payloads reference sibling packages by index, and the
//! Patch layout's packages reference their Data counterparts).

use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::cas::CasCache;
use crate::error::FormatError;
use crate::package::{self, Package, PackageBundles};
use crate::record::Record;
use crate::tocfile;

/// File name of the layout descriptor.
pub const LAYOUT_FILE: &str = "layout.toc";

/// A discovered set of install chunks rooted at one layout descriptor.
#[derive(Debug, Serialize, Deserialize)]
pub struct Layout {
    /// Subdirectory of the game root ("Data" or "Patch").
    pub dir:      String,
    /// Name of the layout descriptor file.
    pub name:     String,
    /// Packages by install-chunk index, densely numbered from 0.
    pub packages: Vec<Arc<Package>>,
    /// Parsed superbundle indexes, parallel to `packages`.
    pub bundles:  Vec<PackageBundles>,
}

impl Layout {
    /// Load the layout descriptor under `<game_root>/<dir>` and parse every
    /// superbundle it references. `parent` layers this layout over another
    /// one (Patch over Data): each package links to the same-index package
    /// of the parent.
    pub fn load(
        game_root: &Path,
        dir: &str,
        parent: Option<&Layout>,
        cache: &CasCache,
    ) -> Result<Self, FormatError> {
        let layout_path = game_root.join(dir).join(LAYOUT_FILE);
        debug!("Reading layout {}", layout_path.display());

        let payload = tocfile::read_payload(&layout_path)?;
        let root = Record::parse(&mut Cursor::new(payload))?;
        let chunks = root.record("installManifest")?.list("installChunks")?;

        let mut packages = Vec::with_capacity(chunks.len());
        for (idx, chunk) in chunks.iter().enumerate() {
            let id = *chunk.guid("id")?;
            let name = chunk.string("name")?.to_owned();
            let install_bundle = chunk.string("installBundle")?.to_owned();

            debug!(
                "Processing install chunk id=0x{} name={} bundle={}",
                hex::encode(id),
                name,
                install_bundle,
            );

            let split_superbundles = chunk
                .list_or_empty("splitSuperbundles")?
                .iter()
                .map(|entry| entry.string("superbundle").map(str::to_owned))
                .collect::<Result<Vec<_>, _>>()?;

            let superbundles = chunk
                .list_or_empty("superbundles")?
                .iter()
                .map(|entry| {
                    let raw = entry.blob("data")?;
                    String::from_utf8(raw.to_vec()).map_err(|_| {
                        FormatError::TypeMismatch {
                            field:    "data".to_owned(),
                            expected: "utf-8 string",
                            actual:   "blob",
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let parent_package = parent.and_then(|layout| layout.packages.get(idx)).cloned();

            packages.push(Arc::new(Package::discover(
                game_root,
                dir,
                idx,
                id,
                name,
                install_bundle,
                parent_package,
                superbundles,
                split_superbundles,
            )));
        }

        let mut bundles = Vec::with_capacity(packages.len());
        for pkg in &packages {
            bundles.push(package::load_bundles(game_root, pkg, &packages, cache)?);
        }

        Ok(Layout {
            dir:  dir.to_owned(),
            name: LAYOUT_FILE.to_owned(),
            packages,
            bundles,
        })
    }
}
