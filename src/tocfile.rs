//! Outer `.toc` container framing.
//!
//! Every `.toc` file (the layout descriptor as well as each superbundle
//! index) starts with the same 4-byte big-endian magic; the actual payload
//! — a tagged record tree or an index table — begins at absolute offset
//! 0x22C and runs to end of file. The bytes in between are an opaque
//! signature region this crate never interprets.

use byteorder::{BigEndian, ReadBytesExt};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

use crate::error::FormatError;

/// Magic of every `.toc` container.
pub const TOC_MAGIC: u32 = 0x00D1_CE01;
/// Absolute offset of the payload within the container.
pub const TOC_PAYLOAD_OFFSET: u64 = 0x22C;

/// Validate the container magic and return the payload bytes.
pub fn read_payload(path: &Path) -> Result<Vec<u8>, FormatError> {
    debug!("Reading toc container {}", path.display());

    let mut file = File::open(path)?;
    let magic = file.read_u32::<BigEndian>()?;
    if magic != TOC_MAGIC {
        return Err(FormatError::BadMagic {
            offset:   0,
            expected: TOC_MAGIC,
            actual:   magic,
        });
    }

    file.seek(SeekFrom::Start(TOC_PAYLOAD_OFFSET))?;
    let mut payload = Vec::new();
    file.read_to_end(&mut payload)?;
    Ok(payload)
}
