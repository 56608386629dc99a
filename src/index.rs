//! Superbundle index (`.toc` payload) parser.
//!
//! The index payload lists the bundles of one superbundle plus a set of
//! free-standing resources that carry no filename, only a digest. Its
//! header is a row of absolute offsets into the payload; the parser checks
//! each documented waypoint as it passes it, so a drifted read surfaces as
//! a structural mismatch at the first wrong offset instead of as garbage
//! records later.
//!
//! ```text
//! magic        u32 BE   = 0x30
//! length       u32 BE   (skipped)
//! item_count   u32 BE   number of bundles
//! offset1      u32 BE   start of the resource flags table
//! offset2      u32 BE   start of the resource digest table
//! res_count    u32 BE   number of free-standing resources
//! offset4      u32 BE   end of the digest table
//! offset5      u32 BE   start of the resource location table
//! offset6      u32 BE   start of the bundle-name string table
//! offset7      u32 BE   (skipped)
//! sec4_size    u32 BE   (skipped)
//! ```
//!
//! After the header: `item_count` bundle refs, 4 skipped bytes, alignment
//! to 8, then one 16-byte descriptor per bundle whose name lives in the
//! string table at `offset6`.

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Deserialize, Serialize};
use std::io::{Seek, SeekFrom};
use tracing::debug;

use crate::bundle::SbBundle;
use crate::cas::CasCache;
use crate::error::FormatError;
use crate::package::CasResolver;
use crate::resource::{CasLocation, TocResource};
use crate::stream::FrostbiteRead;

/// Magic of the index payload.
pub const INDEX_MAGIC: u32 = 0x30;

/// A parsed superbundle index: its bundles and its free-standing resources.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TocIndex {
    pub bundles:   Vec<SbBundle>,
    pub resources: Vec<TocResource>,
}

impl TocIndex {
    /// Parse an index payload, instantiating every bundle it references
    /// from the sibling `.sb` stream.
    pub fn parse<R, S>(
        toc: &mut R,
        sb: &mut S,
        resolver: &CasResolver<'_>,
        cache: &CasCache,
    ) -> Result<Self, FormatError>
    where
        R: FrostbiteRead,
        S: FrostbiteRead,
    {
        let magic = toc.read_u32::<BigEndian>()?;
        if magic != INDEX_MAGIC {
            return Err(FormatError::BadMagic {
                offset:   0,
                expected: INDEX_MAGIC,
                actual:   magic,
            });
        }

        toc.seek(SeekFrom::Current(4))?; // length
        let item_count = toc.read_u32::<BigEndian>()?;
        let offset1 = u64::from(toc.read_u32::<BigEndian>()?);
        let offset2 = u64::from(toc.read_u32::<BigEndian>()?);
        let res_count = toc.read_u32::<BigEndian>()?;
        let offset4 = u64::from(toc.read_u32::<BigEndian>()?);
        let offset5 = u64::from(toc.read_u32::<BigEndian>()?);
        let offset6 = u64::from(toc.read_u32::<BigEndian>()?);
        toc.seek(SeekFrom::Current(4))?; // offset7
        toc.seek(SeekFrom::Current(4))?; // sec4_size

        let mut index = TocIndex::default();

        if item_count == 0 {
            debug!("Index contains no bundles");
            return Ok(index);
        }
        debug!("Index contains {item_count} bundles");

        let mut bundle_refs = Vec::with_capacity(item_count as usize);
        for _ in 0..item_count {
            bundle_refs.push(toc.read_u32::<BigEndian>()?);
        }

        toc.seek(SeekFrom::Current(4))?;
        toc.align_to(8)?;

        for bundle_ref in bundle_refs {
            let string_off = u64::from(toc.read_u32::<BigEndian>()?);
            let size = toc.read_u32::<BigEndian>()?;
            toc.seek(SeekFrom::Current(4))?; // unknown
            let offset = u64::from(toc.read_u32::<BigEndian>()?);
            let name = toc.read_cstring_at(offset6 + string_off)?;

            index.bundles.push(SbBundle::parse(
                sb, offset, name, size, bundle_ref, resolver, cache,
            )?);
        }

        // Free-standing resources: flags, digests, locations, each table at
        // its own documented offset.
        toc.seek(SeekFrom::Start(offset1))?;
        let mut flags = Vec::with_capacity(res_count as usize);
        for _ in 0..res_count {
            flags.push(toc.read_u32::<BigEndian>()?);
        }
        expect_position(toc, offset2, "offset2")?;

        let mut digests = Vec::with_capacity(res_count as usize);
        for _ in 0..res_count {
            digests.push(toc.read_array::<20>()?);
        }
        expect_position(toc, offset4, "offset4")?;

        if offset5 != offset4 {
            return Err(FormatError::StructuralMismatch {
                what:     "offset5",
                expected: offset4,
                actual:   offset5,
            });
        }

        for idx in 0..res_count as usize {
            let cas_id = toc.read_u32::<BigEndian>()?;
            let offset = u64::from(toc.read_u32::<BigEndian>()?);
            let size = u64::from(toc.read_u32::<BigEndian>()?);

            let cas = resolver
                .resolve(cas_id)
                .ok_or(FormatError::UnresolvedCasId(cas_id))?;

            index.resources.push(TocResource {
                sha1:     digests[idx],
                flags:    flags[idx],
                location: CasLocation { cas, offset, size },
            });
        }
        expect_position(toc, offset6, "offset6")?;

        Ok(index)
    }
}

fn expect_position<R: FrostbiteRead>(
    stream: &mut R,
    expected: u64,
    what: &'static str,
) -> Result<(), FormatError> {
    let actual = stream.stream_position()?;
    if actual != expected {
        return Err(FormatError::StructuralMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
