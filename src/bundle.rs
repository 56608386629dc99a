//! Bundle manifest parser.
//!
//! A `.sb` superbundle file is a concatenation of bundle records. Each
//! record lists a group of assets — Ebx, Resources, Chunks — together with
//! where their payloads live in the CAS archives:
//!
//! ```text
//! magic        u32 BE   = 0x20
//! unknown      u32 BE
//! bundle_len   u32 BE   total record length from the bundle offset
//! count        u32 BE   (skipped)
//! offsets      3×u32 BE (skipped)
//! padding      u32 BE
//! meta_size    u32 BE   length of the metadata region that follows
//! header       8×u32 BE magic 0x9D798ED6, total, ebx, resources, chunks,
//!                       string_offset, chunk_meta_offset, chunk_meta_size
//! ```
//!
//! The metadata region holds the digest table (one SHA-1 per asset, Ebx ∥
//! Resources ∥ Chunks), the per-kind entry tables, the chunk-metadata
//! record, and the name string table. The payload section after it holds
//! one location per asset.
//!
//! # Location entries
//!
//! A payload entry is either `(offset)` or `(cas_id, offset)` with no
//! discriminator; the CAS identifier is stateful across entries. The
//! decoder guesses: a value that resolves as a CAS identifier *and* whose
//! offset interpretation does not land on a block boundary in the current
//! archive is taken as a new identifier. The probe is not airtight but is
//! known-correct on shipped data; [`read_entry`] preserves it exactly,
//! including the order of its checks.

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Seek, SeekFrom};
use tracing::debug;

use crate::cas::CasCache;
use crate::error::FormatError;
use crate::package::CasResolver;
use crate::record::Record;
use crate::resource::{CasLocation, Chunk, Ebx, Resource};
use crate::stream::FrostbiteRead;

/// Magic of a bundle record.
pub const BUNDLE_MAGIC: u32 = 0x20;
/// Magic of the metadata header inside a bundle record.
pub const BUNDLE_HEADER_MAGIC: u32 = 0x9D79_8ED6;

/// One parsed bundle and its asset records.
#[derive(Debug, Serialize, Deserialize)]
pub struct SbBundle {
    pub name:      String,
    /// Record size as declared by the index descriptor.
    pub size:      u32,
    /// Flags word from the index's bundle-ref table.
    pub flags:     u32,
    pub ebx:       Vec<Ebx>,
    pub resources: Vec<Resource>,
    pub chunks:    Vec<Chunk>,
}

struct Header {
    total:         u32,
    ebx:           u32,
    resources:     u32,
    chunks:        u32,
    string_offset: u32,
}

/// Name and decompressed size shared by the Ebx and Resource entry tables.
struct NamedEntry {
    name:      String,
    orig_size: u64,
}

struct ChunkEntry {
    uid:            [u8; 16],
    range_start:    u16,
    logical_size:   u16,
    logical_offset: u32,
}

impl SbBundle {
    /// Parse one bundle record starting at `bundle_offset` of the `.sb`
    /// stream.
    pub fn parse<S: FrostbiteRead>(
        sb: &mut S,
        bundle_offset: u64,
        name: String,
        size: u32,
        flags: u32,
        resolver: &CasResolver<'_>,
        cache: &CasCache,
    ) -> Result<Self, FormatError> {
        debug!("Reading bundle {name} at offset 0x{bundle_offset:x}");
        sb.seek(SeekFrom::Start(bundle_offset))?;

        // Outer container.
        let magic = sb.read_u32::<BigEndian>()?;
        if magic != BUNDLE_MAGIC {
            return Err(FormatError::BadMagic {
                offset:   bundle_offset,
                expected: BUNDLE_MAGIC,
                actual:   magic,
            });
        }
        sb.seek(SeekFrom::Current(4))?; // unknown
        let bundle_len = u64::from(sb.read_u32::<BigEndian>()?);
        sb.seek(SeekFrom::Current(4))?; // count
        sb.seek(SeekFrom::Current(12))?; // three offsets
        sb.seek(SeekFrom::Current(4))?; // padding

        let meta_size = u64::from(sb.read_u32::<BigEndian>()?);
        let meta_offset = sb.stream_position()?;

        let header = read_header(sb, meta_offset)?;
        let string_section = meta_offset + u64::from(header.string_offset);

        // Digest table: one SHA-1 per asset, Ebx ∥ Resources ∥ Chunks.
        let mut digests = Vec::with_capacity(header.total as usize);
        for _ in 0..header.total {
            digests.push(sb.read_array::<20>()?);
        }

        let ebx_entries = read_named_entries(sb, header.ebx, string_section)?;
        let resource_entries = read_named_entries(sb, header.resources, string_section)?;

        // Resource extras come as three parallel passes over the table.
        let mut content_type_ids = Vec::with_capacity(resource_entries.len());
        for _ in 0..resource_entries.len() {
            content_type_ids.push(sb.read_u32::<BigEndian>()?);
        }
        let mut metas = Vec::with_capacity(resource_entries.len());
        for _ in 0..resource_entries.len() {
            metas.push(sb.read_array::<16>()?);
        }
        let mut rids = Vec::with_capacity(resource_entries.len());
        for _ in 0..resource_entries.len() {
            rids.push(sb.read_u64::<BigEndian>()?);
        }

        let mut chunk_entries = Vec::with_capacity(header.chunks as usize);
        for _ in 0..header.chunks {
            chunk_entries.push(ChunkEntry {
                uid:            sb.read_array()?,
                range_start:    sb.read_u16::<BigEndian>()?,
                logical_size:   sb.read_u16::<BigEndian>()?,
                logical_offset: sb.read_u32::<BigEndian>()?,
            });
        }

        // Chunk metadata rides as one free-standing record field.
        let chunk_meta: Vec<Record> = if header.chunks > 0 {
            let record = Record::parse_single_field(sb)?;
            record.list("chunkMeta")?.to_vec()
        } else {
            Vec::new()
        };
        if chunk_meta.len() < chunk_entries.len() {
            return Err(FormatError::StructuralMismatch {
                what:     "chunkMeta",
                expected: chunk_entries.len() as u64,
                actual:   chunk_meta.len() as u64,
            });
        }

        let mut bundle = SbBundle {
            name,
            size,
            flags,
            ebx: Vec::new(),
            resources: Vec::new(),
            chunks: Vec::new(),
        };

        if header.total == 0 {
            return Ok(bundle);
        }

        let file_count = ebx_entries.len() + resource_entries.len() + chunk_entries.len();
        if digests.len() < file_count {
            return Err(FormatError::StructuralMismatch {
                what:     "digest table",
                expected: file_count as u64,
                actual:   digests.len() as u64,
            });
        }

        // Payload section: one location per asset, in table order. The CAS
        // identifier carries over from entry to entry.
        sb.seek(SeekFrom::Start(meta_offset + meta_size))?;
        let mut cas_id = sb.read_u32::<BigEndian>()?;

        let mut locations = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            let (next_cas_id, offset) = read_entry(sb, cas_id, resolver, cache)?;
            let size = u64::from(sb.read_u32::<BigEndian>()?);

            let cas = resolver
                .resolve(next_cas_id)
                .ok_or(FormatError::UnresolvedCasId(next_cas_id))?;

            locations.push(CasLocation { cas, offset, size });
            cas_id = next_cas_id;
        }

        let chunk_locations = locations.split_off(ebx_entries.len() + resource_entries.len());
        let resource_locations = locations.split_off(ebx_entries.len());
        let ebx_locations = locations;

        for (idx, (entry, location)) in ebx_entries.into_iter().zip(ebx_locations).enumerate() {
            bundle.ebx.push(Ebx {
                name:      entry.name,
                sha1:      digests[idx],
                orig_size: entry.orig_size,
                location,
            });
        }

        let resource_base = bundle.ebx.len();
        for (idx, (entry, location)) in
            resource_entries.into_iter().zip(resource_locations).enumerate()
        {
            bundle.resources.push(Resource {
                name:            entry.name,
                sha1:            digests[resource_base + idx],
                orig_size:       entry.orig_size,
                content_type_id: content_type_ids[idx],
                meta:            metas[idx],
                rid:             rids[idx],
                location,
            });
        }

        let chunk_base = bundle.ebx.len() + bundle.resources.len();
        for (idx, (entry, location)) in
            chunk_entries.into_iter().zip(chunk_locations).enumerate()
        {
            let meta = &chunk_meta[idx];
            bundle.chunks.push(Chunk {
                uid:            entry.uid,
                sha1:           digests[chunk_base + idx],
                range_start:    entry.range_start,
                logical_size:   entry.logical_size,
                logical_offset: entry.logical_offset,
                h32:            Some(meta.u32("h32")?),
                first_mip:      meta.record("meta")?.u32_opt("firstMip")?,
                location,
            });
        }

        // The payload section must land exactly on the declared record end.
        let consumed = sb.stream_position()? - bundle_offset;
        if consumed != bundle_len {
            return Err(FormatError::PayloadOverrun {
                expected: bundle_len,
                actual:   consumed,
            });
        }

        Ok(bundle)
    }

    /// Total number of asset records in this bundle.
    pub fn file_count(&self) -> usize {
        self.ebx.len() + self.resources.len() + self.chunks.len()
    }
}

fn read_header<S: FrostbiteRead>(sb: &mut S, meta_offset: u64) -> Result<Header, FormatError> {
    let magic = sb.read_u32::<BigEndian>()?;
    if magic != BUNDLE_HEADER_MAGIC {
        return Err(FormatError::BadMagic {
            offset:   meta_offset,
            expected: BUNDLE_HEADER_MAGIC,
            actual:   magic,
        });
    }
    let total = sb.read_u32::<BigEndian>()?;
    let ebx = sb.read_u32::<BigEndian>()?;
    let resources = sb.read_u32::<BigEndian>()?;
    let chunks = sb.read_u32::<BigEndian>()?;
    let string_offset = sb.read_u32::<BigEndian>()?;
    sb.read_u32::<BigEndian>()?; // chunk_meta_offset
    sb.read_u32::<BigEndian>()?; // chunk_meta_size
    Ok(Header {
        total,
        ebx,
        resources,
        chunks,
        string_offset,
    })
}

fn read_named_entries<S: FrostbiteRead>(
    sb: &mut S,
    count: u32,
    string_section: u64,
) -> Result<Vec<NamedEntry>, FormatError> {
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_off = u64::from(sb.read_u32::<BigEndian>()?);
        let name = sb.read_cstring_at(string_section + name_off)?;
        let orig_size = u64::from(sb.read_u32::<BigEndian>()?);
        entries.push(NamedEntry { name, orig_size });
    }
    Ok(entries)
}

/// Read one payload entry: either `(offset)` or `(cas_id, offset)`.
///
/// The value read first may be a new CAS identifier or an offset under the
/// current one. It is taken as a new identifier only when it resolves to an
/// archive *and* the current archive does not have a block starting at that
/// value — otherwise it is an offset and the current identifier carries
/// over. Preserved exactly as shipped extraction behaviour depends on it.
fn read_entry<S: FrostbiteRead>(
    sb: &mut S,
    cas_id: u32,
    resolver: &CasResolver<'_>,
    cache: &CasCache,
) -> Result<(u32, u64), FormatError> {
    let addr = sb.read_u32::<BigEndian>()?;

    if resolver.resolve(addr).is_some() {
        if let Some(prev_cas) = resolver.resolve(cas_id) {
            if !prev_cas.has_file_at(cache, u64::from(addr)) {
                let offset = u64::from(sb.read_u32::<BigEndian>()?);
                return Ok((addr, offset));
            }
        }
    }

    Ok((cas_id, u64::from(addr)))
}
