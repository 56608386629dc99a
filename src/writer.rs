//! CAS payload decoder: materializes one asset from an archive to disk.
//!
//! # On-archive framing
//!
//! Starting at an asset's offset, the archive holds a sequence of blocks
//! until exactly `compressed_file_size` bytes of framed input — payloads
//! plus one 8-byte header per block — have been consumed:
//!
//! ```text
//! size             u32 BE   decompressed length of this block
//! magic            u16 BE   encoding tag
//! compressed_size  u16 BE   on-archive payload length
//! ```
//!
//! | Tag      | Payload                                                    |
//! |----------|------------------------------------------------------------|
//! | `0x70`   | stored; `size == compressed_size`, `size` bytes follow     |
//! | `0x71`   | stored, alternate framing; `compressed_size == 0`          |
//! | `0x1170` | Oodle; `compressed_size` bytes follow, decode to `size`    |
//!
//! Anything else is an unsupported encoding. After the last block the
//! framed-input total must hit `compressed_file_size` exactly, and when the
//! caller knows the asset's original size, the decoded-output total must
//! match it too.

use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use thiserror::Error;

use crate::cas::{Cas, CasCache, MAGIC_OODLE, MAGIC_STORED, MAGIC_STORED_ALT};
use crate::codec::{CodecError, Decompressor};
use crate::stream::FrostbiteRead;

/// Block encoding tag → decompressor capability name.
const DECOMPRESSION_LOOKUP: &[(u16, &str)] = &[
    (MAGIC_STORED, "null"),
    (MAGIC_STORED_ALT, "null"),
    (MAGIC_OODLE, "oodle"),
];

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum WriteError {
    /// A stored block's size fields violate its framing invariant.
    #[error(
        "Bad block header: magic=0x{magic:x} size=0x{size:x} compressed_size=0x{compressed_size:x}"
    )]
    BadBlockHeader {
        magic:           u16,
        size:            u32,
        compressed_size: u16,
    },

    #[error("Unsupported block encoding 0x{magic:x} at archive offset 0x{offset:x}")]
    UnsupportedEncoding { magic: u16, offset: u64 },

    #[error("No decompression mapping defined for block encoding 0x{magic:x}")]
    NoDecompressorMapping { magic: u16 },

    #[error("No decompression implementation registered for '{0}'")]
    NoDecompressor(String),

    /// The block sequence did not consume the declared compressed size.
    #[error("Framed input mismatch: requested 0x{expected:x} bytes but consumed 0x{actual:x}")]
    FramingMismatch { expected: u64, actual: u64 },

    /// The decoded output does not add up to the asset's original size.
    #[error("Decoded size mismatch: requested 0x{expected:x} bytes but wrote 0x{actual:x}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── CasWriter ────────────────────────────────────────────────────────────────

/// Streams framed CAS payloads through the configured decompressors into
/// output files.
pub struct CasWriter {
    decompressors: HashMap<String, Box<dyn Decompressor>>,
}

impl CasWriter {
    pub fn new(decompressors: HashMap<String, Box<dyn Decompressor>>) -> Self {
        Self { decompressors }
    }

    /// Decode the asset at `(cas, offset)` into `path`.
    ///
    /// `compressed_file_size` bounds the framed input; `file_size`, when
    /// known, is checked against the decoded output. The parent directory
    /// is created as needed. The archive handle stays locked for the whole
    /// asset so the seek-then-read sequence is exclusive.
    pub fn write(
        &self,
        cache: &CasCache,
        cas: &Cas,
        offset: u64,
        path: &Path,
        compressed_file_size: u64,
        file_size: Option<u64>,
    ) -> Result<(), WriteError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let handle = cache.handle(&cas.path)?;
        let mut src = handle.lock();
        src.seek(SeekFrom::Start(offset))?;

        let mut dst = File::create(path)?;
        let mut payload_size: u64 = 0;
        let mut result_size: u64 = 0;

        while payload_size < compressed_file_size {
            let block_offset = src.stream_position()?;
            let size = src.read_u32::<BigEndian>()?;
            let magic = src.read_u16::<BigEndian>()?;
            let compressed_size = src.read_u16::<BigEndian>()?;

            let payload = match magic {
                MAGIC_OODLE => src.read_block(compressed_size as usize)?,
                MAGIC_STORED | MAGIC_STORED_ALT => {
                    if magic == MAGIC_STORED && size != u32::from(compressed_size) {
                        return Err(WriteError::BadBlockHeader {
                            magic,
                            size,
                            compressed_size,
                        });
                    }
                    if magic == MAGIC_STORED_ALT && compressed_size != 0 {
                        return Err(WriteError::BadBlockHeader {
                            magic,
                            size,
                            compressed_size,
                        });
                    }
                    src.read_block(size as usize)?
                }
                other => {
                    return Err(WriteError::UnsupportedEncoding {
                        magic:  other,
                        offset: block_offset,
                    })
                }
            };

            let decompressor = self.decompressor_for(magic)?;
            let data = decompressor.decompress(&payload, compressed_size, size)?;

            payload_size += payload.len() as u64 + 8;
            result_size += data.len() as u64;

            dst.write_all(&data)?;
        }

        if payload_size != compressed_file_size {
            return Err(WriteError::FramingMismatch {
                expected: compressed_file_size,
                actual:   payload_size,
            });
        }
        if let Some(expected) = file_size {
            if result_size != expected {
                return Err(WriteError::SizeMismatch {
                    expected,
                    actual: result_size,
                });
            }
        }

        Ok(())
    }

    fn decompressor_for(&self, magic: u16) -> Result<&dyn Decompressor, WriteError> {
        let name = DECOMPRESSION_LOOKUP
            .iter()
            .find(|(known, _)| *known == magic)
            .map(|(_, name)| *name)
            .ok_or(WriteError::NoDecompressorMapping { magic })?;

        self.decompressors
            .get(name)
            .map(|decompressor| decompressor.as_ref())
            .ok_or_else(|| WriteError::NoDecompressor(name.to_owned()))
    }
}
