//! Decompressor capabilities consumed by the CAS payload writer.
//!
//! Two block encodings exist in shipped archives: stored blocks (passed
//! through unchanged) and Oodle-compressed blocks. The writer is configured
//! with a mapping from capability name to implementation; the block-magic →
//! name table lives with the writer (`writer.rs`), so a build without the
//! Oodle library can still be wired up for stored-only archives and fails
//! with a precise error the moment a compressed block shows up.

use thiserror::Error;

pub mod oodle;

pub use oodle::OodleDecompressor;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// The codec produced a different number of bytes than the block header
    /// declared. Treated as corruption regardless of which codec ran.
    #[error("Decompressed size mismatch: expected 0x{expected:x} bytes, got 0x{actual:x}")]
    OutputSize { expected: u32, actual: u64 },

    /// The host-provided codec library could not be loaded or is missing
    /// the decompress entry point.
    #[error("Codec library error: {0}")]
    Library(#[from] libloading::Error),
}

// ── Decompressor capability ──────────────────────────────────────────────────

/// One decompression primitive.
///
/// `input_len` is the on-archive payload length from the block header and
/// `output_len` the expected decoded length; implementations must produce
/// exactly `output_len` bytes or fail.
pub trait Decompressor: Send + Sync {
    fn decompress(
        &self,
        payload: &[u8],
        input_len: u16,
        output_len: u32,
    ) -> Result<Vec<u8>, CodecError>;
}

/// Pass-through for stored blocks: returns the payload unchanged.
pub struct NullDecompressor;

impl Decompressor for NullDecompressor {
    fn decompress(
        &self,
        payload: &[u8],
        _input_len: u16,
        _output_len: u32,
    ) -> Result<Vec<u8>, CodecError> {
        Ok(payload.to_vec())
    }
}
