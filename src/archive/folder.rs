//! A folder descriptor: the coder chain applied to one packed region, plus
//! the substream layout inside it (§4.6, §6).
//!
//! This crate only ever builds one- or two-coder folders: a single
//! entropy/passthrough coder, optionally followed by an AES stage when
//! encryption is enabled. Bind pairs are therefore always the single pair
//! connecting the AES coder's input to the main coder's output — the coder
//! order this crate writes is definition order `[main, aes]`, which is the
//! order data actually flows at rest (compress, then encrypt).
//!
//! Because this crate does not implement archive reading (a stated
//! Non-goal), the exact convention chosen for `CodersUnpackSize` — one size
//! per coder, in definition order, equal to that coder's own output length
//! — is this crate's own, internally self-consistent scheme rather than a
//! byte-for-byte replica of a reference 7z reader's expectations.

use super::varint;

pub struct CoderPlan {
    pub method_id: u64,
    pub properties: Vec<u8>,
}

/// One folder: its coder chain, the bytes it actually contributes to the
/// pack region, and the substream boundaries/CRCs within it.
pub struct FolderPlan {
    pub coders: Vec<CoderPlan>,
    pub pack_bytes: Vec<u8>,
    pub coder_output_sizes: Vec<u64>,
    pub substream_sizes: Vec<u64>,
    pub substream_crcs: Vec<u32>,
}

/// An AES stage appended after the main coder.
pub struct EncryptionStage {
    pub properties: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl FolderPlan {
    /// A folder holding exactly one file's compressed bytes.
    pub fn single(
        method_id: u64,
        properties: Vec<u8>,
        compressed: Vec<u8>,
        crc: u32,
        encryption: Option<EncryptionStage>,
    ) -> Self {
        Self::from_parts(method_id, properties, compressed, vec![], vec![crc], encryption)
    }

    /// A solid folder holding several files' concatenated compressed bytes.
    /// `substream_sizes` gives each file's *uncompressed* size, in order;
    /// `substream_crcs` gives each file's CRC, in the same order.
    pub fn solid(
        method_id: u64,
        properties: Vec<u8>,
        compressed: Vec<u8>,
        substream_sizes: Vec<u64>,
        substream_crcs: Vec<u32>,
        encryption: Option<EncryptionStage>,
    ) -> Self {
        Self::from_parts(
            method_id,
            properties,
            compressed,
            substream_sizes,
            substream_crcs,
            encryption,
        )
    }

    fn from_parts(
        method_id: u64,
        properties: Vec<u8>,
        compressed: Vec<u8>,
        substream_sizes: Vec<u64>,
        substream_crcs: Vec<u32>,
        encryption: Option<EncryptionStage>,
    ) -> Self {
        let main_output_len = compressed.len() as u64;
        let mut coders = vec![CoderPlan {
            method_id,
            properties,
        }];
        let mut coder_output_sizes = vec![main_output_len];
        let pack_bytes = match encryption {
            Some(stage) => {
                coders.push(CoderPlan {
                    method_id: crate::coder::method_id::AES_256_SHA_256,
                    properties: stage.properties,
                });
                coder_output_sizes.push(stage.ciphertext.len() as u64);
                stage.ciphertext
            }
            None => compressed,
        };
        Self {
            coders,
            pack_bytes,
            coder_output_sizes,
            substream_sizes,
            substream_crcs,
        }
    }

    pub fn pack_size(&self) -> u64 {
        self.pack_bytes.len() as u64
    }

    pub fn num_unpack_substreams(&self) -> usize {
        self.substream_crcs.len().max(1)
    }

    /// The folder-level CRC written into `UnpackInfo`'s `CRC` array — only
    /// meaningful (and only written by the caller) when this folder has
    /// exactly one substream; a multi-substream folder's per-file CRCs live
    /// in `SubStreamsInfo` instead.
    pub fn folder_level_crc(&self) -> Option<u32> {
        if self.substream_crcs.len() == 1 {
            Some(self.substream_crcs[0])
        } else {
            None
        }
    }

    fn is_encrypted(&self) -> bool {
        self.coders.len() == 2
    }

    /// Writes this folder's coder chain (and, if present, its bind pair).
    pub fn encode(&self, header: &mut Vec<u8>) -> std::io::Result<()> {
        header.push(self.coders.len() as u8);
        for coder in &self.coders {
            let method_bytes = varint::encode_method_id(coder.method_id);
            let has_props = !coder.properties.is_empty();
            let flags = (method_bytes.len() as u8) | if has_props { 0x20 } else { 0 };
            header.push(flags);
            header.extend_from_slice(&method_bytes);
            if has_props {
                varint::write_variable_u64(header, coder.properties.len() as u64)?;
                header.extend_from_slice(&coder.properties);
            }
        }
        if self.is_encrypted() {
            // AES (coder 1) consumes coder 0's output.
            varint::write_variable_u64(header, 1)?; // in_index
            varint::write_variable_u64(header, 0)?; // out_index
        }
        Ok(())
    }

    /// Writes this folder's `CodersUnpackSize` entries.
    pub fn encode_unpack_sizes(&self, header: &mut Vec<u8>) -> std::io::Result<()> {
        for &size in &self.coder_output_sizes {
            varint::write_variable_u64(header, size)?;
        }
        Ok(())
    }
}
