//! `LZMA2`, backed by `xz2`'s raw (filter-only, no `.xz` container framing)
//! encoder — the same crate the teacher project already depended on for its
//! own compression path, retargeted from the `.xz` container to the raw
//! LZMA2 stream the 7z format actually embeds in a folder.

use std::io::{self, Read, Write};

use xz2::read::XzDecoder;
use xz2::stream::{Filters, LzmaOptions, Stream};
use xz2::write::XzEncoder;

use super::{method_id, Coder};
use crate::error::ArchiverError;

/// Dictionary sizes per level, loosely following 7-Zip's own LZMA2 presets.
fn dict_size_for_level(level: u8) -> u32 {
    match level.min(9) {
        0 => 1 << 18,
        1 => 1 << 20,
        2 => 2 << 20,
        3 | 4 => 4 << 20,
        5 | 6 => 8 << 20,
        7 => 16 << 20,
        8 => 32 << 20,
        _ => 64 << 20,
    }
}

/// Encodes the single dictionary-size property byte 7z's LZMA2 decoder
/// expects. 7z relates a property byte `p` (0..=40) to a dictionary size via
/// `dict_size(p) = (2 | (p & 1)) << (p / 2 + 11)`, with `p == 40` reserved
/// for `0xFFFF_FFFF`; encoding picks the smallest `p` whose dictionary size
/// covers the one actually configured.
fn encode_lzma2_dict_size_prop(dict_size: u32) -> u8 {
    if dict_size >= 0xFFFF_FFFF {
        return 40;
    }
    for prop in 0u32..40 {
        let decoded = (2 | (prop & 1)) << (prop / 2 + 11);
        if decoded >= dict_size {
            return prop as u8;
        }
    }
    40
}

pub struct Lzma2Coder {
    level: u8,
    dict_size: u32,
}

impl Lzma2Coder {
    pub fn new(level: u8) -> Self {
        Self {
            level: level.min(9),
            dict_size: dict_size_for_level(level),
        }
    }

    fn filters(&self) -> io::Result<Filters> {
        let mut opts = LzmaOptions::new_preset(self.level as u32)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        opts.dict_size(self.dict_size);
        let mut filters = Filters::new();
        filters.lzma2(&opts);
        Ok(filters)
    }
}

impl Coder for Lzma2Coder {
    fn method_id(&self) -> u64 {
        method_id::LZMA2
    }

    fn code(
        &mut self,
        input: &mut dyn Read,
        output: &mut dyn Write,
        _declared_input_size: Option<u64>,
        _declared_output_size: Option<u64>,
    ) -> Result<(), ArchiverError> {
        let filters = self
            .filters()
            .map_err(|e| ArchiverError::CoderError(e.to_string()))?;
        let stream = Stream::new_raw_encoder(&filters)
            .map_err(|e| ArchiverError::CoderError(e.to_string()))?;
        let mut encoder = XzEncoder::new_stream(output, stream);
        io::copy(input, &mut encoder)?;
        encoder.finish()?;
        Ok(())
    }

    fn serialize_properties(&self, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_all(&[encode_lzma2_dict_size_prop(self.dict_size)])
    }
}

/// Decodes a raw LZMA2 stream produced by [`Lzma2Coder`]. Not part of the
/// `Coder` trait (this crate does not implement reading/extraction, per the
/// Non-goals) — exists solely so unit tests can assert round-trip fidelity
/// at the coder layer.
#[cfg(test)]
fn decode_for_test(dict_size: u32, compressed: &[u8]) -> Vec<u8> {
    let mut opts = LzmaOptions::new_preset(6).unwrap();
    opts.dict_size(dict_size);
    let mut filters = Filters::new();
    filters.lzma2(&opts);
    let stream = Stream::new_raw_decoder(&filters).unwrap();
    let mut decoder = XzDecoder::new_stream(compressed, stream);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).unwrap();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_the_liblzma_decoder() {
        let mut coder = Lzma2Coder::new(5);
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        let mut input = io::Cursor::new(data.clone());
        let mut compressed = Vec::new();
        coder.code(&mut input, &mut compressed, None, None).unwrap();
        assert!(!compressed.is_empty());
        let roundtrip = decode_for_test(coder.dict_size, &compressed);
        assert_eq!(roundtrip, data);
    }

    #[test]
    fn dict_size_property_byte_decodes_back_to_a_covering_size() {
        for level in 0..=9u8 {
            let dict_size = dict_size_for_level(level);
            let prop = encode_lzma2_dict_size_prop(dict_size);
            let decoded = if prop == 40 {
                0xFFFF_FFFFu32
            } else {
                (2 | (prop as u32 & 1)) << (prop as u32 / 2 + 11)
            };
            assert!(decoded >= dict_size, "level {level}: {decoded} < {dict_size}");
        }
    }

    #[test]
    fn empty_input_produces_a_valid_stream() {
        let mut coder = Lzma2Coder::new(1);
        let mut input = io::Cursor::new(Vec::<u8>::new());
        let mut compressed = Vec::new();
        coder.code(&mut input, &mut compressed, Some(0), None).unwrap();
        let roundtrip = decode_for_test(coder.dict_size, &compressed);
        assert!(roundtrip.is_empty());
    }
}
