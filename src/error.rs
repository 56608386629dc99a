//! Structural errors shared by the format decoders.
//!
//! Every decoder in this crate fails fast: a wrong magic, a violated offset
//! assertion, or an unknown tag aborts the parse of the current archive tree.
//! Errors carry the stream offset and the expected-vs-actual values so a
//! mismatch can be located in a hex dump without re-running under a debugger.
//! The file path is attached by the caller that owns it (layout, package and
//! export layers log it via `tracing`).

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormatError {
    /// A fixed-width read hit end-of-stream mid-value.
    #[error("Short read: {0}")]
    Io(#[from] io::Error),

    #[error("Bad magic at offset 0x{offset:x}: expected 0x{expected:x}, got 0x{actual:x}")]
    BadMagic { offset: u64, expected: u32, actual: u32 },

    /// An offset waypoint documented by the format did not line up.
    #[error("Structural mismatch at {what}: expected offset 0x{expected:x}, got 0x{actual:x}")]
    StructuralMismatch {
        what:     &'static str,
        expected: u64,
        actual:   u64,
    },

    #[error("Record tag 0x{tag:02x} at offset 0x{offset:x} not recognized")]
    UnknownItemTag { offset: u64, tag: u8 },

    #[error("Field tag 0x{tag:02x} at offset 0x{offset:x} not recognized")]
    UnknownFieldTag { offset: u64, tag: u8 },

    /// A blob or list record did not end with its mandatory 0x00 terminator.
    #[error("Expected record at offset 0x{offset:x} to end with 0x00")]
    MissingTerminator { offset: u64 },

    /// A typed accessor was called on a field of a different shape.
    #[error("Field '{field}' holds a {actual}, expected a {expected}")]
    TypeMismatch {
        field:    String,
        expected: &'static str,
        actual:   &'static str,
    },

    #[error("Required field '{0}' is missing")]
    MissingField(String),

    /// A CAS identifier decoded structurally but resolved to no archive.
    #[error("No CAS archive for CAS identifier 0x{0:x}")]
    UnresolvedCasId(u32),

    /// A bundle's payload section did not consume exactly its declared length.
    #[error("Bundle payload overrun: expected length 0x{expected:x}, consumed 0x{actual:x}")]
    PayloadOverrun { expected: u64, actual: u64 },
}
