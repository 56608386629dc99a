//! Oodle decompression through the game's own codec library.
//!
//! The Oodle codec is proprietary; the game ships it as a shared library
//! and this crate only ever calls its decompress entry point. The library
//! is loaded once at configuration time — a missing or truncated library
//! fails the run before any archive is opened, not at the first compressed
//! block.
//!
//! # ABI
//!
//! `OodleLZ_Decompress` has carried the same C signature across the codec
//! generations the supported games ship. The wrapper enforces the safety
//! contract: both buffers are exact-length, non-overlapping allocations
//! owned by the caller, and the return value is the number of bytes
//! decoded (`<= 0` on failure).

use libloading::{Library, Symbol};
use std::ffi::c_void;
use std::path::Path;
use std::ptr;

use super::{CodecError, Decompressor};

/// Exported name of the decompress entry point.
const DECOMPRESS_SYMBOL: &[u8] = b"OodleLZ_Decompress\0";

#[allow(clippy::type_complexity)]
type OodleDecompress = unsafe extern "C" fn(
    src: *const u8,
    src_len: i64,
    dst: *mut u8,
    dst_len: i64,
    fuzz_safe: i32,
    check_crc: i32,
    verbosity: i32,
    dec_buf_base: *mut u8,
    dec_buf_size: i64,
    fp_callback: *mut c_void,
    callback_ctx: *mut c_void,
    scratch: *mut c_void,
    scratch_size: i64,
    thread_phase: i32,
) -> i64;

/// All-phases decode, the mode used for standalone blocks.
const THREAD_PHASE_ALL: i32 = 3;

pub struct OodleDecompressor {
    library: Library,
}

impl OodleDecompressor {
    /// Load the codec library and resolve the decompress entry point.
    pub fn load(path: &Path) -> Result<Self, CodecError> {
        // Safety: the library is the game's own codec, loaded read-only;
        // no initialization routines with preconditions are invoked.
        let library = unsafe { Library::new(path) }?;
        // Resolve once up front so a wrong library fails here.
        unsafe {
            library.get::<OodleDecompress>(DECOMPRESS_SYMBOL)?;
        }
        Ok(Self { library })
    }
}

impl Decompressor for OodleDecompressor {
    fn decompress(
        &self,
        payload: &[u8],
        _input_len: u16,
        output_len: u32,
    ) -> Result<Vec<u8>, CodecError> {
        let mut output = vec![0u8; output_len as usize];

        // Safety: `payload` and `output` are live, exact-length and disjoint
        // for the duration of the call; fuzz-safe decoding is requested so
        // malformed input cannot write out of bounds.
        let decoded = unsafe {
            let decompress: Symbol<OodleDecompress> = self.library.get(DECOMPRESS_SYMBOL)?;
            decompress(
                payload.as_ptr(),
                payload.len() as i64,
                output.as_mut_ptr(),
                i64::from(output_len),
                1, // fuzz_safe
                0, // check_crc
                0, // verbosity
                ptr::null_mut(),
                0,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                0,
                THREAD_PHASE_ALL,
            )
        };

        if decoded < 0 {
            return Err(CodecError::Decompression(format!(
                "OodleLZ_Decompress returned {decoded}"
            )));
        }
        if decoded as u64 != u64::from(output_len) {
            return Err(CodecError::OutputSize {
                expected: output_len,
                actual:   decoded as u64,
            });
        }
        Ok(output)
    }
}
