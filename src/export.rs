//! Exporter driver: walks the loaded game tree and materializes assets.
//!
//! Output mirrors the install: `<output>/Data/…` and `<output>/Patch/…`,
//! with the layout subdirectory taken from the archive an asset actually
//! resolved to — a patch bundle entry stored in a base-data archive lands
//! under `Data/`. Within a layout:
//!
//! | Kind         | Path                                             |
//! |--------------|--------------------------------------------------|
//! | Ebx          | `<name>.ebx`                                     |
//! | Resource     | `<name><content-type extension>`                 |
//! | Chunk        | `<bundle name>/<guid>.chunk`                     |
//! | Toc resource | `TocResources/<superbundle name>/<sha1-hex>.bin` |
//!
//! Existing output files are skipped, so an interrupted run can simply be
//! restarted. Nothing is ever deleted or overwritten.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::GameCache;
use crate::cas::CasCache;
use crate::codec::{CodecError, Decompressor, NullDecompressor, OodleDecompressor};
use crate::error::FormatError;
use crate::game::Game;
use crate::index::TocIndex;
use crate::layout::Layout;
use crate::resource::CasLocation;
use crate::writer::{CasWriter, WriteError};

// ── Configuration ────────────────────────────────────────────────────────────

/// Everything the exporter consumes.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Root of the installed game.
    pub game_folder:   PathBuf,
    /// Root of the extraction output.
    pub output_folder: PathBuf,
    pub export_ebx:           bool,
    pub export_resources:     bool,
    pub export_chunks:        bool,
    pub export_toc_resources: bool,
    /// Location of the game's Oodle shared library.
    pub oodle_path:    PathBuf,
    /// Reuse a serialized game tree across runs.
    pub cache_enabled: bool,
    pub cache_path:    PathBuf,
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Could not open game folder {0}, check your configuration")]
    MissingGameFolder(PathBuf),

    #[error("Could not create output folder {path}: {source}")]
    OutputFolder { path: PathBuf, source: io::Error },

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Exporter ─────────────────────────────────────────────────────────────────

/// Drives extraction: game tree in, mirrored output directory out.
pub struct Exporter {
    config: ExportConfig,
    cache:  CasCache,
    writer: CasWriter,
}

impl Exporter {
    /// Build an exporter with the standard capabilities: pass-through for
    /// stored blocks plus the game's Oodle library for compressed ones.
    pub fn new(config: ExportConfig) -> Result<Self, ExportError> {
        let oodle = OodleDecompressor::load(&config.oodle_path)?;
        let mut decompressors: HashMap<String, Box<dyn Decompressor>> = HashMap::new();
        decompressors.insert("null".to_owned(), Box::new(NullDecompressor));
        decompressors.insert("oodle".to_owned(), Box::new(oodle));
        Self::with_decompressors(config, decompressors)
    }

    /// Build an exporter with an explicit capability map. Configuration
    /// errors surface here, before any parsing begins.
    pub fn with_decompressors(
        config: ExportConfig,
        decompressors: HashMap<String, Box<dyn Decompressor>>,
    ) -> Result<Self, ExportError> {
        if !config.game_folder.exists() {
            return Err(ExportError::MissingGameFolder(config.game_folder.clone()));
        }
        std::fs::create_dir_all(&config.output_folder).map_err(|source| {
            ExportError::OutputFolder {
                path: config.output_folder.clone(),
                source,
            }
        })?;

        Ok(Self {
            config,
            cache: CasCache::new(),
            writer: CasWriter::new(decompressors),
        })
    }

    /// Load the game and export every enabled asset kind.
    pub fn export(&self) -> Result<(), ExportError> {
        let game = self.load_game()?;

        info!(
            "Starting export of files to {}",
            self.config.output_folder.display()
        );
        for layout in game.layouts() {
            self.export_layout(layout)?;
        }
        info!("Export completed successfully");
        Ok(())
    }

    /// Load the parsed game tree, through the cross-run cache when enabled.
    pub fn load_game(&self) -> Result<Game, ExportError> {
        if self.config.cache_enabled {
            let cache = GameCache::new(&self.config.cache_path);
            return Ok(cache.load_or_rebuild(|| {
                info!("Loading game from {}", self.config.game_folder.display());
                Game::load(&self.config.game_folder, &self.cache)
            })?);
        }
        info!("Loading game from {}", self.config.game_folder.display());
        Ok(Game::load(&self.config.game_folder, &self.cache)?)
    }

    fn export_layout(&self, layout: &Layout) -> Result<(), ExportError> {
        info!("Processing layout {}", layout.dir);
        for (package, bundles) in layout.packages.iter().zip(&layout.bundles) {
            info!("Exporting package {}:{}", package.idx, package.rel_path);
            self.export_superbundles(&bundles.split_superbundles)?;
            self.export_superbundles(&bundles.superbundles)?;
        }
        Ok(())
    }

    fn export_superbundles(
        &self,
        superbundles: &[(String, Option<TocIndex>)],
    ) -> Result<(), ExportError> {
        for (name, index) in superbundles {
            let Some(index) = index else {
                warn!("Skipping unavailable superbundle {name}");
                continue;
            };

            info!("Exporting superbundle {name}");
            for bundle in &index.bundles {
                debug!("Exporting bundle {}", bundle.name);

                if self.config.export_ebx {
                    for ebx in &bundle.ebx {
                        self.export_file(
                            &ebx.location,
                            Path::new(&ebx.filename()),
                            Some(ebx.orig_size),
                        )?;
                    }
                }

                if self.config.export_resources {
                    for resource in &bundle.resources {
                        self.export_file(
                            &resource.location,
                            Path::new(&resource.filename()),
                            Some(resource.orig_size),
                        )?;
                    }
                }

                if self.config.export_chunks {
                    for chunk in &bundle.chunks {
                        let rel = Path::new(&bundle.name).join(chunk.filename());
                        self.export_file(&chunk.location, &rel, Some(chunk.orig_size()))?;
                    }
                }
            }

            if self.config.export_toc_resources {
                for item in &index.resources {
                    let rel = Path::new("TocResources").join(name).join(item.filename());
                    self.export_file(&item.location, &rel, None)?;
                }
            }
        }
        Ok(())
    }

    /// Materialize one asset, skipping output files that already exist.
    fn export_file(
        &self,
        location: &CasLocation,
        rel_path: &Path,
        orig_size: Option<u64>,
    ) -> Result<(), ExportError> {
        let path = self
            .config
            .output_folder
            .join(&location.cas.layout_dir)
            .join(rel_path);

        if path.exists() {
            debug!("Skipping existing file {}", path.display());
            return Ok(());
        }

        debug!("Writing {}", path.display());
        self.writer.write(
            &self.cache,
            &location.cas,
            location.offset,
            &path,
            location.size,
            orig_size,
        )?;
        Ok(())
    }
}
