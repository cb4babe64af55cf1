//! C8: the `Coder`/`CoderFactory` capability §6 describes as an external
//! collaborator, plus a default registry sufficient to exercise the rest of
//! the crate end-to-end.

mod aes;
mod lzma2;
mod store;

use std::io::{self, Read, Write};

use crate::error::ArchiverError;

pub use aes::AesCoder;
pub use lzma2::Lzma2Coder;
pub use store::StoreCoder;

/// Compression method ids as used by the 7z container format. Opaque to the
/// rest of the core; documented here for interop per §6.
pub mod method_id {
    pub const COPY: u64 = 0x00;
    pub const LZMA: u64 = 0x03_01_01;
    pub const LZMA2: u64 = 0x21;
    pub const BZIP2: u64 = 0x04_02_02;
    pub const DEFLATE: u64 = 0x04_01_08;
    pub const AES_256_SHA_256: u64 = 0x06_F1_07_01;
}

/// A single-use entropy-coding (or encryption) engine. A fresh instance is
/// created for every job (and, for AES, every header) — coders are never
/// reused across `code()` calls.
pub trait Coder: Send {
    /// The method id this instance encodes data for; stored alongside its
    /// `serialize_properties` output in the folder's coder list.
    fn method_id(&self) -> u64;

    /// Reads `input` to EOF, writing its encoded form to `output`.
    /// `declared_input_size`/`declared_output_size` are hints, not
    /// guarantees — a coder must not rely on them for correctness.
    fn code(
        &mut self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        declared_input_size: Option<u64>,
        declared_output_size: Option<u64>,
    ) -> Result<(), ArchiverError>;

    /// Pre-code configuration; most coders have nothing to set beyond what
    /// the factory already gave them at construction (level, in particular),
    /// so the default is a no-op.
    fn set_properties(&mut self, _properties: &[(u8, Vec<u8>)]) {}

    /// Writes the decoder prelude bytes a reader would need to reconstruct
    /// this coder's state (e.g. LZMA2's one-byte dictionary-size property).
    /// Optional: codecs with nothing to say (store) write nothing and this
    /// must not be treated as failure.
    fn serialize_properties(&self, _writer: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    /// Supplies a password, UTF-16LE encoded, to coders that need one (AES).
    /// A no-op for coders that aren't encryption coders.
    fn set_password(&mut self, _utf16le_password: &[u8]) {}
}

/// The external collaborator §6 calls "the codec factory": maps a method id
/// (plus a level, for codecs where that's meaningful) to a fresh coder.
///
/// Supplied by the caller at [`crate::ParallelCompressor`] construction —
/// never looked up through global/static state (§9's "global codec factory
/// lookup" remapping).
pub trait CoderFactory: Send + Sync {
    fn create(&self, method_id: u64, level: u8) -> Result<Box<dyn Coder>, ArchiverError>;
}

/// The registry shipped with this crate: `Store`, `LZMA2`, and `AES-256`.
/// Sufficient to run every end-to-end scenario in the specification without
/// a caller having to supply their own coders.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCoderRegistry;

impl CoderFactory for DefaultCoderRegistry {
    fn create(&self, method_id: u64, level: u8) -> Result<Box<dyn Coder>, ArchiverError> {
        match method_id {
            method_id::COPY => Ok(Box::new(StoreCoder::new())),
            method_id::LZMA2 => Ok(Box::new(Lzma2Coder::new(level))),
            method_id::AES_256_SHA_256 => Ok(Box::new(AesCoder::new())),
            other => Err(ArchiverError::InvalidArgument(format!(
                "unsupported method id: {other:#x}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn registry_rejects_unknown_method_id() {
        let registry = DefaultCoderRegistry;
        let err = registry.create(0xDEAD_BEEF, 5).unwrap_err();
        assert!(matches!(err, ArchiverError::InvalidArgument(_)));
    }

    #[test]
    fn store_coder_round_trips_through_the_trait_object() {
        let registry = DefaultCoderRegistry;
        let mut coder = registry.create(method_id::COPY, 0).unwrap();
        let mut input = Cursor::new(b"hello coder".to_vec());
        let mut output = Vec::new();
        coder
            .code(&mut input, &mut output, Some(11), None)
            .unwrap();
        assert_eq!(output, b"hello coder");
    }
}
