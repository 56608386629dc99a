//! Install-chunk packages and CAS-identifier resolution.
//!
//! A package is one install chunk: a subdirectory of the layout holding
//! `.cas` archives and, optionally, split superbundles. Packages are built
//! in two phases. Discovery ([`Package::discover`]) records the directory,
//! the sorted archive list and the superbundle names from the layout
//! descriptor; bundle loading ([`load_bundles`]) then parses every
//! superbundle index against the fully-built package list, because bundle
//! payloads reference archives of *other* packages by index.
//!
//! # CAS identifiers
//!
//! A 32-bit CAS identifier packs three fields:
//!
//! ```text
//! bits 31..16   is_patch      must be 0 or 1
//! bits 15..8    package index
//! bits  7..0    archive index, 1-based; 0 means "none"
//! ```
//!
//! Resolution never raises — an identifier that fails any rule yields
//! `None`, which is exactly what the bundle payload heuristic relies on to
//! tell identifiers and offsets apart.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cas::{Cas, CasCache};
use crate::error::FormatError;
use crate::index::TocIndex;
use crate::tocfile;

// ── Package ──────────────────────────────────────────────────────────────────

/// One install chunk of a layout.
#[derive(Debug, Serialize, Deserialize)]
pub struct Package {
    /// Ordinal position within the layout's install-chunk list.
    pub idx:        usize,
    /// Install-chunk GUID from the layout descriptor.
    pub id:         [u8; 16],
    /// Install-chunk name from the layout descriptor.
    pub name:       String,
    /// Directory of this chunk, relative to the layout root.
    pub rel_path:   String,
    /// Layout subdirectory ("Data" or "Patch").
    pub layout_dir: String,
    /// Same-index package of the parent layout, when layered.
    pub parent:     Option<Arc<Package>>,
    /// Discovered archives, sorted by path. Externally 1-based.
    pub cas_files:  Vec<Arc<Cas>>,
    /// Superbundle names delivered in the layout root.
    pub superbundles: Vec<String>,
    /// Split-superbundle names delivered inside this chunk's directory.
    pub split_superbundles: Vec<String>,
    /// Whether the chunk's directory exists in this install.
    pub available:  bool,
}

impl Package {
    /// Discover the package directory and its CAS archives.
    #[allow(clippy::too_many_arguments)]
    pub fn discover(
        game_root: &Path,
        layout_dir: &str,
        idx: usize,
        id: [u8; 16],
        name: String,
        rel_path: String,
        parent: Option<Arc<Package>>,
        superbundles: Vec<String>,
        split_superbundles: Vec<String>,
    ) -> Self {
        let package_root = game_root.join(layout_dir).join(&rel_path);
        let available = package_root.exists();

        let cas_files = if available {
            debug!("Loading package from {}", package_root.display());
            discover_cas_files(&package_root, layout_dir)
        } else {
            warn!("Package {} unavailable", package_root.display());
            Vec::new()
        };

        Self {
            idx,
            id,
            name,
            rel_path,
            layout_dir: layout_dir.to_owned(),
            parent,
            cas_files,
            superbundles,
            split_superbundles,
            available,
        }
    }
}

fn discover_cas_files(package_root: &Path, layout_dir: &str) -> Vec<Arc<Cas>> {
    let entries = match std::fs::read_dir(package_root) {
        Ok(entries) => entries,
        Err(_)      => return Vec::new(),
    };

    let mut cas_files: Vec<Arc<Cas>> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| Cas::is_valid_cas_file(path))
        .map(|path| Arc::new(Cas::new(layout_dir, path)))
        .collect();
    cas_files.sort_by(|a, b| a.path.cmp(&b.path));
    cas_files
}

// ── CAS-id resolution ────────────────────────────────────────────────────────

/// Resolves CAS identifiers against a fully-built package list.
pub struct CasResolver<'a> {
    packages: &'a [Arc<Package>],
    current:  &'a Arc<Package>,
}

impl<'a> CasResolver<'a> {
    pub fn new(packages: &'a [Arc<Package>], current: &'a Arc<Package>) -> Self {
        Self { packages, current }
    }

    /// Resolve a 32-bit CAS identifier to an archive. Returns `None` on any
    /// rule violation instead of raising.
    pub fn resolve(&self, value: u32) -> Option<Arc<Cas>> {
        let package_index = (value >> 8 & 0xFF) as usize;
        let cas_index = (value & 0xFF) as usize;
        let is_patch = value >> 16;

        if cas_index < 0x1 {
            return None;
        }
        if is_patch > 0x1 {
            return None;
        }

        let mut package = if package_index == self.current.idx {
            self.current
        } else {
            self.packages.get(package_index)?
        };

        // An identifier with the patch bit clear, resolved from within the
        // Patch layout, points at the base-data package underneath.
        if is_patch == 0x0 {
            if let Some(parent) = &package.parent {
                package = parent;
            }
        }

        if cas_index > package.cas_files.len() {
            return None;
        }
        Some(Arc::clone(&package.cas_files[cas_index - 1]))
    }
}

// ── Superbundle loading ──────────────────────────────────────────────────────

/// Parsed indexes of one package, keyed by superbundle logical name in
/// layout order. `None` marks a superbundle that was not shipped in this
/// install.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PackageBundles {
    pub superbundles:       Vec<(String, Option<TocIndex>)>,
    pub split_superbundles: Vec<(String, Option<TocIndex>)>,
}

/// Parse every superbundle index referenced by `package`.
///
/// Split superbundles live in the package directory, with the leading
/// `Win32/` stripped from their logical name; plain superbundles live in
/// the layout root under their full name.
pub fn load_bundles(
    game_root: &Path,
    package: &Arc<Package>,
    packages: &[Arc<Package>],
    cache: &CasCache,
) -> Result<PackageBundles, FormatError> {
    let mut bundles = PackageBundles::default();
    if !package.available {
        return Ok(bundles);
    }

    let layout_root = game_root.join(&package.layout_dir);
    let package_root = layout_root.join(&package.rel_path);
    let resolver = CasResolver::new(packages, package);

    for name in &package.split_superbundles {
        let stem = name.strip_prefix("Win32/").unwrap_or(name);
        let bundle_path = package_root.join(stem);

        debug!("Initializing split superbundle {}", bundle_path.display());
        let index = load_superbundle(&bundle_path, &resolver, cache)?;
        bundles.split_superbundles.push((name.clone(), index));
    }

    for name in &package.superbundles {
        let bundle_path = layout_root.join(name);

        debug!("Initializing superbundle {}", bundle_path.display());
        let index = load_superbundle(&bundle_path, &resolver, cache)?;
        bundles.superbundles.push((name.clone(), index));
    }

    Ok(bundles)
}

/// Load one `<path>.toc` / `<path>.sb` pair. A missing `.toc` is a
/// non-fatal skip; any other failure aborts.
fn load_superbundle(
    path: &Path,
    resolver: &CasResolver<'_>,
    cache: &CasCache,
) -> Result<Option<TocIndex>, FormatError> {
    let toc_path = with_suffix(path, ".toc");
    if !toc_path.exists() {
        warn!("Superbundle {} unavailable", path.display());
        return Ok(None);
    }

    debug!("Loading index and superbundle {}", path.display());
    let payload = tocfile::read_payload(&toc_path)?;
    let mut sb_file = File::open(with_suffix(path, ".sb"))?;

    let index = TocIndex::parse(&mut Cursor::new(payload), &mut sb_file, resolver, cache)?;
    Ok(Some(index))
}

/// Append a literal suffix to a path. Superbundle names routinely contain
/// dots, so `Path::set_extension` would truncate them.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(
        idx: usize,
        layout_dir: &str,
        cas_count: usize,
        parent: Option<Arc<Package>>,
    ) -> Arc<Package> {
        let cas_files = (1..=cas_count)
            .map(|i| {
                Arc::new(Cas::new(
                    layout_dir,
                    format!("/game/{layout_dir}/pkg{idx}/cas_{i:02}.cas"),
                ))
            })
            .collect();
        Arc::new(Package {
            idx,
            id: [0u8; 16],
            name: format!("chunk{idx}"),
            rel_path: format!("pkg{idx}"),
            layout_dir: layout_dir.to_owned(),
            parent,
            cas_files,
            superbundles: Vec::new(),
            split_superbundles: Vec::new(),
            available: true,
        })
    }

    fn id(is_patch: u32, package_index: u32, cas_index: u32) -> u32 {
        (is_patch << 16) | (package_index << 8) | cas_index
    }

    #[test]
    fn resolves_within_current_package() {
        let packages = vec![package(0, "Data", 3, None)];
        let resolver = CasResolver::new(&packages, &packages[0]);

        let cas = resolver.resolve(id(0, 0, 2)).unwrap();
        assert!(cas.path.ends_with("cas_02.cas"));
    }

    #[test]
    fn resolves_sibling_package() {
        let packages = vec![package(0, "Data", 1, None), package(1, "Data", 2, None)];
        let resolver = CasResolver::new(&packages, &packages[0]);

        let cas = resolver.resolve(id(0, 1, 2)).unwrap();
        assert!(cas.path.ends_with("pkg1/cas_02.cas"));
    }

    #[test]
    fn invalid_identifiers_resolve_to_none() {
        let packages = vec![package(0, "Data", 2, None)];
        let resolver = CasResolver::new(&packages, &packages[0]);

        // cas_index == 0 is the "none" sentinel.
        assert!(resolver.resolve(id(0, 0, 0)).is_none());
        // is_patch outside {0, 1}.
        assert!(resolver.resolve(id(2, 0, 1)).is_none());
        // package index not in the layout.
        assert!(resolver.resolve(id(0, 9, 1)).is_none());
        // archive index past the discovered list.
        assert!(resolver.resolve(id(0, 0, 3)).is_none());
    }

    #[test]
    fn patch_layout_redirects_base_data_ids_to_parent() {
        let data_pkg = package(0, "Data", 2, None);
        let patch_packages = vec![package(0, "Patch", 1, Some(Arc::clone(&data_pkg)))];
        let resolver = CasResolver::new(&patch_packages, &patch_packages[0]);

        // Patch bit clear: the id names the base-data archive.
        let cas = resolver.resolve(id(0, 0, 2)).unwrap();
        assert_eq!(cas.layout_dir, "Data");

        // Patch bit set: the id stays within the patch package.
        let cas = resolver.resolve(id(1, 0, 1)).unwrap();
        assert_eq!(cas.layout_dir, "Patch");
    }

    #[test]
    fn suffix_append_preserves_dotted_names() {
        let path = Path::new("/game/Data/streaming/default.v1");
        assert_eq!(
            with_suffix(path, ".toc"),
            PathBuf::from("/game/Data/streaming/default.v1.toc")
        );
    }
}
