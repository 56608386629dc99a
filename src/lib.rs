//! # frostbite-unpack — Frostbite CAS archive extractor
//!
//! Reads a shipped Frostbite game install and writes every asset payload
//! back out, decompressed, into a mirrored output tree. Four layered
//! binary decoders do the work:
//!
//! - the layout descriptor (`layout.rs`) enumerates install chunks
//! - each install chunk's superbundle indexes (`index.rs`) list bundles
//!   and free-standing resources
//! - each bundle manifest (`bundle.rs`) names its Ebx/Resource/Chunk
//!   assets and locates them in the CAS archives
//! - the CAS payload decoder (`writer.rs`) streams an asset's framed,
//!   possibly Oodle-compressed blocks to disk
//!
//! Layout and index files share a schema-tagged record format decoded by
//! `record.rs`. CAS identifiers resolve through the package layer
//! (`package.rs`), which also handles the Patch layout's fallthrough to
//! base-game archives. Archive handles are opened once per path and shared
//! through an explicit [`CasCache`].

pub mod error;
pub mod stream;
pub mod record;
pub mod tocfile;
pub mod cas;
pub mod resource;
pub mod package;
pub mod layout;
pub mod game;
pub mod index;
pub mod bundle;
pub mod codec;
pub mod writer;
pub mod export;
pub mod cache;

// Flat re-exports for the most common types.
pub use bundle::SbBundle;
pub use cas::{Cas, CasCache};
pub use codec::{CodecError, Decompressor, NullDecompressor, OodleDecompressor};
pub use error::FormatError;
pub use export::{ExportConfig, ExportError, Exporter};
pub use game::Game;
pub use index::TocIndex;
pub use layout::Layout;
pub use package::{CasResolver, Package};
pub use record::{Record, Value};
pub use resource::{CasLocation, Chunk, Ebx, Resource, TocResource};
pub use writer::{CasWriter, WriteError};
