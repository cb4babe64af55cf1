//! C5: the solid encoder — the alternate path taken when `solid_mode` is
//! set, trading per-item parallelism for one coder running across every
//! item's bytes concatenated together (§4.5).

use std::io::Read;

use crate::coder::CoderFactory;
use crate::crc::CrcReader;
use crate::error::ArchiverError;
use crate::item::InputItem;

/// Hard ceiling on a solid block's combined declared size, per §9's Open
/// Question #3 decision (pinned, not configurable).
const MAX_SOLID_BYTES: u64 = 4 * 1024 * 1024 * 1024;

/// Per-item metadata recovered after the combined buffer has been built —
/// everything the archive assembler needs to register this item as one
/// substream of the resulting folder.
pub struct SolidItemMeta {
    pub name: Option<String>,
    pub attrs: u32,
    pub mtime: Option<u64>,
    pub uncompressed_size: u64,
    pub crc: u32,
}

/// The outcome of [`encode_solid_block`]: one compressed buffer plus the
/// per-item metadata needed to describe it as a folder's substreams.
pub struct SolidResult {
    pub compressed: Vec<u8>,
    pub coder_properties: Vec<u8>,
    /// Set only when a password was supplied: the AES coder's ciphertext
    /// over `compressed`, i.e. what actually goes into the pack region.
    pub encrypted: Option<Vec<u8>>,
    pub encryption_properties: Option<Vec<u8>>,
    pub items: Vec<SolidItemMeta>,
}

/// Runs the full solid algorithm from §4.5 over every item in `items`, in
/// order. Every item is read to completion regardless of whether it turns
/// out to be empty — `declared_size == 0` means "unknown, read until EOF"
/// per [`InputItem`]'s contract, not "empty", so emptiness can only be
/// decided from the bytes actually observed (§9's Open Question #1
/// decision). Callers classify the returned metas into folder substreams vs.
/// [`crate::archive::ArchiveAssembler::add_empty_item`] entries by checking
/// `uncompressed_size == 0` after the fact.
pub fn encode_solid_block(
    items: Vec<InputItem>,
    factory: &dyn CoderFactory,
    method_id: u64,
    level: u8,
    password_utf16le: Option<&[u8]>,
) -> Result<SolidResult, ArchiverError> {
    let mut buffer = Vec::new();
    let mut metas = Vec::with_capacity(items.len());
    let mut total_declared: u64 = 0;

    for item in items {
        let name = item.name.clone();
        let attrs = item.attrs;
        let mtime = item.mtime;
        let declared_size = item.declared_size;
        let source = item.into_reader();

        // A fast precheck against declared sizes, so an obviously-oversized
        // batch of known-size items is rejected before any reading; items
        // whose size is unknown (`declared_size == 0`) fall through to the
        // post-read check below instead.
        if declared_size > 0 {
            total_declared = total_declared.checked_add(declared_size).ok_or_else(|| {
                ArchiverError::InvalidArgument("solid block size overflowed a u64".into())
            })?;
            if total_declared > MAX_SOLID_BYTES {
                return Err(ArchiverError::InvalidArgument(format!(
                    "solid block of at least {total_declared} declared bytes exceeds the {MAX_SOLID_BYTES}-byte ceiling"
                )));
            }
        }

        let start = buffer.len();
        let (crc, bytes_read) = if declared_size > 0 {
            let mut reader = CrcReader::new(source.take(declared_size));
            reader
                .read_to_end(&mut buffer)
                .map_err(ArchiverError::IoError)?;
            reader.finish()
        } else {
            let mut reader = CrcReader::new(source);
            reader
                .read_to_end(&mut buffer)
                .map_err(ArchiverError::IoError)?;
            reader.finish()
        };
        debug_assert!(buffer.len() - start == bytes_read as usize);

        if buffer.len() as u64 > MAX_SOLID_BYTES {
            return Err(ArchiverError::InvalidArgument(format!(
                "solid block exceeds the {MAX_SOLID_BYTES}-byte ceiling"
            )));
        }

        metas.push(SolidItemMeta {
            name,
            attrs,
            mtime,
            uncompressed_size: bytes_read,
            crc,
        });
    }

    let mut coder = factory.create(method_id, level)?;
    let mut compressed = Vec::new();
    let mut source = std::io::Cursor::new(&buffer);
    coder.code(&mut source, &mut compressed, Some(buffer.len() as u64), None)?;
    let mut coder_properties = Vec::new();
    coder
        .serialize_properties(&mut coder_properties)
        .map_err(|e| ArchiverError::CoderError(e.to_string()))?;

    let (encrypted, encryption_properties) = match password_utf16le {
        Some(pw) => {
            let mut aes = factory.create(crate::coder::method_id::AES_256_SHA_256, level)?;
            aes.set_password(pw);
            let mut ciphertext = Vec::new();
            aes.code(
                &mut std::io::Cursor::new(&compressed),
                &mut ciphertext,
                Some(compressed.len() as u64),
                None,
            )?;
            let mut aes_properties = Vec::new();
            aes.serialize_properties(&mut aes_properties)
                .map_err(|e| ArchiverError::CoderError(e.to_string()))?;
            (Some(ciphertext), Some(aes_properties))
        }
        None => (None, None),
    };

    Ok(SolidResult {
        compressed,
        coder_properties,
        encrypted,
        encryption_properties,
        items: metas,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coder::{method_id, DefaultCoderRegistry};
    use std::io::Cursor;

    fn item(data: &[u8], name: &str) -> InputItem {
        InputItem::new(Cursor::new(data.to_vec()))
            .with_name(name)
            .with_declared_size(data.len() as u64)
    }

    #[test]
    fn combines_items_into_one_coder_run() {
        let items = vec![item(b"aaaa", "a"), item(b"bbbb", "b"), item(b"cc", "c")];
        let result = encode_solid_block(
            items,
            &DefaultCoderRegistry,
            method_id::COPY,
            0,
            None,
        )
        .unwrap();
        assert_eq!(result.compressed, b"aaaabbbbcc");
        assert_eq!(result.items.len(), 3);
        assert_eq!(result.items[0].uncompressed_size, 4);
        assert_eq!(result.items[2].uncompressed_size, 2);
    }

    #[test]
    fn rejects_a_block_over_the_four_gibibyte_ceiling() {
        let oversized = InputItem::new(Cursor::new(Vec::<u8>::new()))
            .with_declared_size(MAX_SOLID_BYTES + 1);
        let err = encode_solid_block(
            vec![oversized],
            &DefaultCoderRegistry,
            method_id::COPY,
            0,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ArchiverError::InvalidArgument(_)));
    }

    #[test]
    fn an_item_with_no_bytes_gets_a_zero_size_meta_not_exclusion() {
        let items = vec![item(b"data", "d"), item(b"", "empty")];
        let result = encode_solid_block(items, &DefaultCoderRegistry, method_id::COPY, 0, None).unwrap();
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0].uncompressed_size, 4);
        assert_eq!(result.items[1].uncompressed_size, 0);
    }

    #[test]
    fn a_declared_size_of_zero_still_reads_the_item_to_eof() {
        // declared_size == 0 means "unknown", not "empty" — the reader must
        // still be drained to EOF rather than truncated to zero bytes.
        let item = InputItem::new(Cursor::new(b"unknown length".to_vec())).with_name("u");
        let result =
            encode_solid_block(vec![item], &DefaultCoderRegistry, method_id::COPY, 0, None).unwrap();
        assert_eq!(result.compressed, b"unknown length");
        assert_eq!(result.items[0].uncompressed_size, 14);
    }
}
