//! Primitive stream reads shared by every decoder.
//!
//! The Frostbite index formats mix endianness freely: container framing and
//! table counts are big-endian, tagged-record scalar fields are mostly
//! little-endian, and varints are LEB128. Fixed-width integer reads go
//! through `byteorder` with the endianness explicit per call; this trait
//! adds the pieces `byteorder` does not cover:
//!
//! - NUL-terminated UTF-8 strings, optionally at an absolute offset with the
//!   previous position restored afterwards (string tables store offsets, the
//!   caller must not lose its place in the entry table)
//! - unbounded LEB128 unsigned varints (7 payload bits per byte, MSB set
//!   means continuation)
//! - fixed byte blocks and alignment skips
//!
//! Every operation fails with `ErrorKind::UnexpectedEof` when the stream
//! ends mid-value; callers surface that as a short read with offset context.

use std::io::{self, Read, Seek, SeekFrom};

pub trait FrostbiteRead: Read + Seek {
    /// Read exactly `n` bytes.
    fn read_block(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a fixed-size byte array (GUIDs, SHA-1 digests, metadata blobs).
    fn read_array<const N: usize>(&mut self) -> io::Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator.
    fn read_cstring(&mut self) -> io::Result<String> {
        let mut raw = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            self.read_exact(&mut byte)?;
            if byte[0] == 0x00 {
                break;
            }
            raw.push(byte[0]);
        }
        String::from_utf8(raw)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Read a NUL-terminated string at `offset`, then restore the previous
    /// stream position.
    fn read_cstring_at(&mut self, offset: u64) -> io::Result<String> {
        let pos = self.stream_position()?;
        self.seek(SeekFrom::Start(offset))?;
        let result = self.read_cstring();
        self.seek(SeekFrom::Start(pos))?;
        result
    }

    /// Read an LEB128-encoded unsigned integer. Little-endian 7-bit groups,
    /// unbounded (the formats never produce values above u64 in practice).
    fn read_leb128(&mut self) -> io::Result<u64> {
        let mut result: u64 = 0;
        let mut shift = 0;
        loop {
            let mut byte = [0u8; 1];
            self.read_exact(&mut byte)?;
            result |= u64::from(byte[0] & 0x7f) << shift;
            if byte[0] & 0x80 == 0 {
                return Ok(result);
            }
            shift += 7;
        }
    }

    /// Advance to the next multiple of `alignment` from the stream origin.
    fn align_to(&mut self, alignment: u64) -> io::Result<u64> {
        let pos = self.stream_position()?;
        let aligned = pos.div_ceil(alignment) * alignment;
        if aligned != pos {
            self.seek(SeekFrom::Start(aligned))?;
        }
        Ok(aligned)
    }
}

impl<T: Read + Seek> FrostbiteRead for T {}
