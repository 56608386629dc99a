//! Asset records reachable through CAS archives.
//!
//! Four kinds of assets come out of the index and bundle parsers, differing
//! in which metadata they carry and how their output filename is chosen:
//!
//! | Kind          | Named by          | Output filename                  |
//! |---------------|-------------------|----------------------------------|
//! | [`Ebx`]       | path string       | `<name>.ebx`                     |
//! | [`Resource`]  | path string       | `<name><content-type extension>` |
//! | [`Chunk`]     | 16-byte id        | `<guid>.chunk`                   |
//! | [`TocResource`] | SHA-1 digest    | `<sha1-hex>.bin`                 |
//!
//! Every record carries a complete [`CasLocation`] — the parsers fail before
//! producing a half-located record, so downstream code never has to handle
//! a missing archive, offset or size.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::cas::Cas;

// ── Content types ────────────────────────────────────────────────────────────

/// Fixed lookup from resource content-type id to output file extension.
/// Unknown ids fall back to a synthetic `.res_<id-hex>` extension.
const RESOURCE_TYPES: &[(u32, &str)] = &[
    (0x0DEAFE10, ".ies"),
    (0x10F0E5A1, ".shaderdb"),
    (0x2D47A5FF, ".swfmovie"),
    (0x30B4A553, ".occludermesh"),
    (0x49B156D4, ".mesh"),
    (0x51A3C853, ".assetbank"),
    (0x5BDFDEFE, ".lightingsystem"),
    (0x6BDE20BA, ".itexture"),
    (0x85EA8656, ".clothasset"),
    (0x91043F65, ".havok"),
    (0x957C32B1, ".atlastexture"),
    (0xAFECB022, ".luac"),
    (0xB2EB3B82, ".wave"),
    (0xC417BBD3, ".movietexture"),
    (0xD070EED1, ".animtrackdata"),
    (0xEFC70728, ".zonestreamergrid"),
];

/// Extension for a known content-type id.
pub fn content_type_extension(id: u32) -> Option<&'static str> {
    RESOURCE_TYPES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, ext)| *ext)
}

// ── CasLocation ──────────────────────────────────────────────────────────────

/// Where an asset's framed payload lives: archive, byte offset, on-archive
/// compressed size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasLocation {
    pub cas:    Arc<Cas>,
    pub offset: u64,
    pub size:   u64,
}

// ── Asset records ────────────────────────────────────────────────────────────

/// Ebx data file, referenced by bundles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ebx {
    pub name:      String,
    pub sha1:      [u8; 20],
    pub orig_size: u64,
    pub location:  CasLocation,
}

impl Ebx {
    pub fn filename(&self) -> String {
        format!("{}.ebx", self.name)
    }
}

/// Resource data file with content-type information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub name:            String,
    pub sha1:            [u8; 20],
    pub orig_size:       u64,
    pub content_type_id: u32,
    /// Opaque per-resource metadata blob.
    pub meta:            [u8; 16],
    /// 64-bit resource id.
    pub rid:             u64,
    pub location:        CasLocation,
}

impl Resource {
    pub fn content_type(&self) -> Option<&'static str> {
        content_type_extension(self.content_type_id)
    }

    pub fn filename(&self) -> String {
        match self.content_type() {
            Some(ext) => format!("{}{}", self.name, ext),
            None      => format!("{}.res_{:x}", self.name, self.content_type_id),
        }
    }
}

/// Chunk data file, identified by a 16-byte id instead of a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub uid:            [u8; 16],
    pub sha1:           [u8; 20],
    pub range_start:    u16,
    pub logical_size:   u16,
    pub logical_offset: u32,
    pub h32:            Option<u32>,
    pub first_mip:      Option<u32>,
    pub location:       CasLocation,
}

impl Chunk {
    /// The decompressed size of a chunk is derived, never stored.
    pub fn orig_size(&self) -> u64 {
        u64::from(self.logical_offset) + u64::from(self.logical_size)
    }

    pub fn guid(&self) -> Uuid {
        Uuid::from_bytes(self.uid)
    }

    pub fn filename(&self) -> String {
        format!("{}.chunk", self.guid())
    }
}

/// Free-standing index resource, not tied to any bundle and carrying no
/// name — only its digest and flags word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TocResource {
    pub sha1:     [u8; 20],
    pub flags:    u32,
    pub location: CasLocation,
}

impl TocResource {
    pub fn filename(&self) -> String {
        format!("{}.bin", hex::encode(self.sha1))
    }
}
