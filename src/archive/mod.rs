//! C6: the archive assembler. Buffers every folder's pack bytes and the
//! archive's file table in memory, then writes a 7z-format container in one
//! pass — no `Seek` required, because every size and offset the signature
//! header and end header need is already known before the first byte goes
//! out (§4.6's "no streaming output while jobs are in flight" Non-goal).

mod folder;
mod property_id;
mod varint;

use std::io::{self, Write};

use crate::coder::CoderFactory;
use crate::error::ArchiverError;

pub use folder::{CoderPlan, EncryptionStage, FolderPlan};

const SIGNATURE: &[u8; 6] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
const VERSION_MAJOR: u8 = 0;
const VERSION_MINOR: u8 = 4;

/// One row of the archive's file table.
struct FileEntry {
    name: Option<String>,
    attrs: u32,
    mtime: Option<u64>,
    has_stream: bool,
}

/// Bytes written and entries recorded once [`ArchiveAssembler::finish`] runs.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyStats {
    pub pack_bytes: u64,
    pub header_bytes: u64,
    pub file_count: usize,
}

/// Accumulates folders and file-table entries for one archive, then
/// serializes them in a single `finish()` call.
#[derive(Default)]
pub struct ArchiveAssembler {
    folders: Vec<FolderPlan>,
    entries: Vec<FileEntry>,
}

impl ArchiveAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a zero-byte item (including directories) — per §9's Open
    /// Question #1 decision, these get no folder and no pack bytes, and are
    /// recorded purely as `EMPTY_STREAM` file-table entries.
    pub fn add_empty_item(&mut self, name: Option<String>, attrs: u32, mtime: Option<u64>) {
        self.entries.push(FileEntry {
            name,
            attrs,
            mtime,
            has_stream: false,
        });
    }

    /// Registers one non-solid item: its own folder, one substream.
    pub fn add_folder_item(
        &mut self,
        name: Option<String>,
        attrs: u32,
        mtime: Option<u64>,
        folder: FolderPlan,
    ) {
        self.folders.push(folder);
        self.entries.push(FileEntry {
            name,
            attrs,
            mtime,
            has_stream: true,
        });
    }

    /// Registers the one shared folder a solid block's substreams belong to.
    /// Call once per solid block, then [`Self::add_solid_substream`] once per
    /// non-empty item in that block — split from a single "add the whole
    /// block" call so a caller can interleave zero-byte items'
    /// [`Self::add_empty_item`] calls with the solid substreams in the
    /// batch's original order (§5's order-preservation guarantee covers
    /// solid mode too: "item-input order").
    pub fn set_solid_folder(&mut self, folder: FolderPlan) {
        self.folders.push(folder);
    }

    /// Registers one substream of the most recently added solid folder.
    pub fn add_solid_substream(&mut self, name: Option<String>, attrs: u32, mtime: Option<u64>) {
        self.entries.push(FileEntry {
            name,
            attrs,
            mtime,
            has_stream: true,
        });
    }

    /// Serializes the signature header, pack region, and end header to
    /// `sink`, consuming `self`.
    pub fn finish<W: Write>(self, sink: W) -> Result<AssemblyStats, ArchiverError> {
        self.finish_impl(sink)
    }

    /// Like [`Self::finish`], but the header region is itself compressed
    /// with `method_id`/`level` and then encrypted, matching §4.6's
    /// "Encryption coupling": the method descriptor used for the header is
    /// the same coder family as the data, with AES appended when a password
    /// is set. The resulting `ENCODED_HEADER` section is this crate's own
    /// self-consistent convention (see `archive/folder.rs`'s module comment
    /// on why — no reference-reader byte-for-byte contract is owed, since
    /// reading archives is out of scope).
    pub fn finish_encrypted<W: Write>(
        self,
        sink: W,
        factory: &dyn CoderFactory,
        method_id: u64,
        level: u8,
        password_utf16le: &[u8],
    ) -> Result<AssemblyStats, ArchiverError> {
        tracing::debug!(folders = self.folders.len(), entries = self.entries.len(), "encoding encrypted header");
        let header_bytes = self
            .encode_header()
            .map_err(|e| ArchiverError::AssemblyError(e.to_string()))?;

        let mut header_coder = factory.create(method_id, level)?;
        let mut compressed_header = Vec::new();
        header_coder.code(
            &mut io::Cursor::new(&header_bytes),
            &mut compressed_header,
            Some(header_bytes.len() as u64),
            None,
        )?;
        let mut header_coder_properties = Vec::new();
        header_coder
            .serialize_properties(&mut header_coder_properties)
            .map_err(|e| ArchiverError::AssemblyError(e.to_string()))?;

        let mut aes = factory.create(crate::coder::method_id::AES_256_SHA_256, level)?;
        aes.set_password(password_utf16le);
        let mut encrypted_header = Vec::new();
        aes.code(
            &mut io::Cursor::new(&compressed_header),
            &mut encrypted_header,
            Some(compressed_header.len() as u64),
            None,
        )?;
        let mut aes_properties = Vec::new();
        aes.serialize_properties(&mut aes_properties)
            .map_err(|e| ArchiverError::AssemblyError(e.to_string()))?;

        let header_folder = FolderPlan::single(
            method_id,
            header_coder_properties,
            compressed_header,
            0, // the header folder carries no substream CRC of its own
            Some(EncryptionStage {
                properties: aes_properties,
                ciphertext: encrypted_header,
            }),
        );

        let mut encoded_header_wrapper = Vec::new();
        encoded_header_wrapper.push(property_id::ENCODED_HEADER);
        encoded_header_wrapper.push(property_id::PACK_INFO);
        varint::write_variable_u64(&mut encoded_header_wrapper, 0)?;
        varint::write_variable_u64(&mut encoded_header_wrapper, 1)?;
        encoded_header_wrapper.push(property_id::SIZE);
        varint::write_variable_u64(&mut encoded_header_wrapper, header_folder.pack_size())?;
        encoded_header_wrapper.push(property_id::END);
        encoded_header_wrapper.push(property_id::UNPACK_INFO);
        encoded_header_wrapper.push(property_id::FOLDER);
        varint::write_variable_u64(&mut encoded_header_wrapper, 1)?;
        encoded_header_wrapper.push(0); // external
        header_folder.encode(&mut encoded_header_wrapper)?;
        encoded_header_wrapper.push(property_id::CODERS_UNPACK_SIZE);
        header_folder.encode_unpack_sizes(&mut encoded_header_wrapper)?;
        encoded_header_wrapper.push(property_id::END); // UnpackInfo
        encoded_header_wrapper.push(property_id::END); // EncodedHeader
        encoded_header_wrapper.extend_from_slice(&header_folder.pack_bytes);

        tracing::debug!("writing container");
        self.write_container(sink, encoded_header_wrapper)
    }

    fn finish_impl<W: Write>(self, sink: W) -> Result<AssemblyStats, ArchiverError> {
        tracing::debug!(folders = self.folders.len(), entries = self.entries.len(), "encoding header");
        let header_bytes = self
            .encode_header()
            .map_err(|e| ArchiverError::AssemblyError(e.to_string()))?;
        tracing::debug!("writing container");
        self.write_container(sink, header_bytes)
    }

    /// Writes signature header + pack region + `next_header_bytes` (either a
    /// plain `HEADER` section or an `ENCODED_HEADER` wrapper) to `sink`.
    fn write_container<W: Write>(
        &self,
        mut sink: W,
        next_header_bytes: Vec<u8>,
    ) -> Result<AssemblyStats, ArchiverError> {
        let pack_region: Vec<u8> = self
            .folders
            .iter()
            .flat_map(|f| f.pack_bytes.iter().copied())
            .collect();
        let header_bytes = next_header_bytes;

        let next_header_offset = pack_region.len() as u64;
        let next_header_size = header_bytes.len() as u64;
        let next_header_crc = crc32fast::hash(&header_bytes);

        let mut start_header = Vec::with_capacity(20);
        start_header.extend_from_slice(&next_header_offset.to_le_bytes());
        start_header.extend_from_slice(&next_header_size.to_le_bytes());
        start_header.extend_from_slice(&next_header_crc.to_le_bytes());
        let start_header_crc = crc32fast::hash(&start_header);

        sink.write_all(SIGNATURE)?;
        sink.write_all(&[VERSION_MAJOR, VERSION_MINOR])?;
        sink.write_all(&start_header_crc.to_le_bytes())?;
        sink.write_all(&start_header)?;
        sink.write_all(&pack_region)?;
        sink.write_all(&header_bytes)?;

        Ok(AssemblyStats {
            pack_bytes: pack_region.len() as u64,
            header_bytes: header_bytes.len() as u64,
            file_count: self.entries.len(),
        })
    }

    fn encode_header(&self) -> io::Result<Vec<u8>> {
        let mut header = Vec::new();
        header.push(property_id::HEADER);

        if !self.folders.is_empty() {
            header.push(property_id::MAIN_STREAMS_INFO);

            header.push(property_id::PACK_INFO);
            varint::write_variable_u64(&mut header, 0)?;
            varint::write_variable_u64(&mut header, self.folders.len() as u64)?;
            header.push(property_id::SIZE);
            for folder in &self.folders {
                varint::write_variable_u64(&mut header, folder.pack_size())?;
            }
            header.push(property_id::END);

            header.push(property_id::UNPACK_INFO);
            header.push(property_id::FOLDER);
            varint::write_variable_u64(&mut header, self.folders.len() as u64)?;
            header.push(0); // external
            for folder in &self.folders {
                folder.encode(&mut header)?;
            }

            header.push(property_id::CODERS_UNPACK_SIZE);
            for folder in &self.folders {
                folder.encode_unpack_sizes(&mut header)?;
            }

            // A folder-level CRC array is only meaningful when every folder
            // has exactly one substream; mixed batches push per-file CRCs
            // into SubStreamsInfo instead (see encode_substreams_info).
            let folder_crcs: Vec<u32> = self
                .folders
                .iter()
                .filter_map(|f| f.folder_level_crc())
                .collect();
            if folder_crcs.len() == self.folders.len() && !folder_crcs.is_empty() {
                header.push(property_id::CRC);
                header.push(1);
                for crc in folder_crcs {
                    header.extend_from_slice(&crc.to_le_bytes());
                }
            }
            header.push(property_id::END); // UnpackInfo

            self.encode_substreams_info(&mut header)?;

            header.push(property_id::END); // MainStreamsInfo
        }

        self.encode_files_info(&mut header)?;
        header.push(property_id::END); // Header
        Ok(header)
    }

    fn encode_substreams_info(&self, header: &mut Vec<u8>) -> io::Result<()> {
        let needs_substreams_info = self.folders.iter().any(|f| f.num_unpack_substreams() > 1);
        if !needs_substreams_info {
            return Ok(());
        }

        header.push(property_id::SUBSTREAMS_INFO);

        header.push(property_id::NUM_UNPACK_STREAM);
        for folder in &self.folders {
            varint::write_variable_u64(header, folder.num_unpack_substreams() as u64)?;
        }

        if self.folders.iter().any(|f| f.substream_sizes.len() > 1) {
            header.push(property_id::SIZE);
            for folder in &self.folders {
                if folder.substream_sizes.len() > 1 {
                    for &size in &folder.substream_sizes[..folder.substream_sizes.len() - 1] {
                        varint::write_variable_u64(header, size)?;
                    }
                }
            }
        }

        header.push(property_id::CRC);
        header.push(1);
        for folder in &self.folders {
            if folder.num_unpack_substreams() > 1 {
                for &crc in &folder.substream_crcs {
                    header.extend_from_slice(&crc.to_le_bytes());
                }
            }
        }

        header.push(property_id::END);
        Ok(())
    }

    fn encode_files_info(&self, header: &mut Vec<u8>) -> io::Result<()> {
        if self.entries.is_empty() {
            return Ok(());
        }

        header.push(property_id::FILES_INFO);
        varint::write_variable_u64(header, self.entries.len() as u64)?;

        let empty_stream: Vec<bool> = self.entries.iter().map(|e| !e.has_stream).collect();
        if empty_stream.iter().any(|&b| b) {
            header.push(property_id::EMPTY_STREAM);
            let bits = varint::encode_bool_vector(&empty_stream);
            varint::write_variable_u64(header, bits.len() as u64)?;
            header.extend_from_slice(&bits);

            let empty_file: Vec<bool> = self
                .entries
                .iter()
                .filter(|e| !e.has_stream)
                .map(|e| e.attrs & property_id::ATTR_DIRECTORY == 0)
                .collect();
            if empty_file.iter().any(|&b| b) {
                header.push(property_id::EMPTY_FILE);
                let bits = varint::encode_bool_vector(&empty_file);
                varint::write_variable_u64(header, bits.len() as u64)?;
                header.extend_from_slice(&bits);
            }
        }

        header.push(property_id::NAME);
        let names = self.encode_names();
        varint::write_variable_u64(header, names.len() as u64 + 1)?; // +1 for external byte
        header.push(0); // external
        header.extend_from_slice(&names);

        let has_mtime: Vec<bool> = self.entries.iter().map(|e| e.mtime.is_some()).collect();
        if has_mtime.iter().any(|&b| b) {
            header.push(property_id::MTIME);
            let data = self.encode_times(&has_mtime);
            varint::write_variable_u64(header, data.len() as u64)?;
            header.extend_from_slice(&data);
        }

        header.push(property_id::WIN_ATTRIBUTES);
        let data = self.encode_attrs();
        varint::write_variable_u64(header, data.len() as u64)?;
        header.extend_from_slice(&data);

        header.push(property_id::END);
        Ok(())
    }

    fn encode_names(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for entry in &self.entries {
            let name = entry.name.as_deref().unwrap_or("");
            for unit in name.encode_utf16() {
                data.extend_from_slice(&unit.to_le_bytes());
            }
            data.extend_from_slice(&[0, 0]);
        }
        data
    }

    fn encode_times(&self, defined: &[bool]) -> Vec<u8> {
        let mut data = Vec::new();
        let all_defined = defined.iter().all(|&b| b);
        if all_defined {
            data.push(1);
        } else {
            data.push(0);
            data.extend_from_slice(&varint::encode_bool_vector(defined));
        }
        data.push(0); // external
        for entry in &self.entries {
            if let Some(mtime) = entry.mtime {
                data.extend_from_slice(&mtime.to_le_bytes());
            }
        }
        data
    }

    fn encode_attrs(&self) -> Vec<u8> {
        let mut data = Vec::new();
        data.push(1); // all defined — 0 stands in for "unknown"
        data.push(0); // external
        for entry in &self.entries {
            data.extend_from_slice(&entry.attrs.to_le_bytes());
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_archive_still_has_a_valid_signature_header() {
        let assembler = ArchiveAssembler::new();
        let mut out = Vec::new();
        let stats = assembler.finish(&mut out).unwrap();
        assert_eq!(stats.file_count, 0);
        assert_eq!(&out[0..6], SIGNATURE);
        assert_eq!(out.len(), 32 + stats.header_bytes as usize);
    }

    #[test]
    fn single_store_file_round_trips_pack_region_length() {
        let mut assembler = ArchiveAssembler::new();
        let data = b"hello archive".to_vec();
        let folder = FolderPlan::single(
            crate::coder::method_id::COPY,
            Vec::new(),
            data.clone(),
            crc32fast::hash(&data),
            None,
        );
        assembler.add_folder_item(Some("hello.txt".into()), 0, Some(12345), folder);
        let mut out = Vec::new();
        let stats = assembler.finish(&mut out).unwrap();
        assert_eq!(stats.pack_bytes, data.len() as u64);
        assert_eq!(stats.file_count, 1);

        let next_header_offset = u64::from_le_bytes(out[12..20].try_into().unwrap());
        assert_eq!(next_header_offset, data.len() as u64);
        let pack_start = 32usize;
        assert_eq!(&out[pack_start..pack_start + data.len()], &data[..]);
    }

    #[test]
    fn zero_byte_item_contributes_no_pack_bytes() {
        let mut assembler = ArchiveAssembler::new();
        assembler.add_empty_item(Some("empty.txt".into()), 0, None);
        let mut out = Vec::new();
        let stats = assembler.finish(&mut out).unwrap();
        assert_eq!(stats.pack_bytes, 0);
        assert_eq!(stats.file_count, 1);
    }

    #[test]
    fn directory_is_marked_empty_stream_but_not_empty_file() {
        let mut assembler = ArchiveAssembler::new();
        assembler.add_empty_item(Some("subdir".into()), property_id::ATTR_DIRECTORY, None);
        let mut out = Vec::new();
        let stats = assembler.finish(&mut out).unwrap();
        assert_eq!(stats.file_count, 1);
        // EMPTY_STREAM must appear; EMPTY_FILE must not (no non-directory
        // empty entries exist in this batch).
        let header_start = out.len() - stats.header_bytes as usize;
        let header = &out[header_start..];
        assert!(header.contains(&property_id::EMPTY_STREAM));
    }

    #[test]
    fn solid_folder_emits_substreams_info_with_one_crc_per_item() {
        let mut assembler = ArchiveAssembler::new();
        let combined = b"aaaabbbbcc".to_vec();
        let folder = FolderPlan::solid(
            crate::coder::method_id::COPY,
            Vec::new(),
            combined,
            vec![4, 4, 2],
            vec![
                crc32fast::hash(b"aaaa"),
                crc32fast::hash(b"bbbb"),
                crc32fast::hash(b"cc"),
            ],
            None,
        );
        assembler.set_solid_folder(folder);
        assembler.add_solid_substream(Some("a".into()), 0, None);
        assembler.add_solid_substream(Some("b".into()), 0, None);
        assembler.add_solid_substream(Some("c".into()), 0, None);
        let mut out = Vec::new();
        let stats = assembler.finish(&mut out).unwrap();
        assert_eq!(stats.file_count, 3);
        let header_start = out.len() - stats.header_bytes as usize;
        let header = &out[header_start..];
        assert!(header.contains(&property_id::SUBSTREAMS_INFO));
    }
}
