//! Header section property ids (§6). Mirrors the 7z format's tag values.

pub const END: u8 = 0x00;
pub const HEADER: u8 = 0x01;
pub const MAIN_STREAMS_INFO: u8 = 0x04;
pub const FILES_INFO: u8 = 0x05;
pub const PACK_INFO: u8 = 0x06;
pub const UNPACK_INFO: u8 = 0x07;
pub const SUBSTREAMS_INFO: u8 = 0x08;
pub const SIZE: u8 = 0x09;
pub const CRC: u8 = 0x0A;
pub const FOLDER: u8 = 0x0B;
pub const CODERS_UNPACK_SIZE: u8 = 0x0C;
pub const NUM_UNPACK_STREAM: u8 = 0x0D;
pub const EMPTY_STREAM: u8 = 0x0E;
pub const EMPTY_FILE: u8 = 0x0F;
pub const NAME: u8 = 0x11;
pub const MTIME: u8 = 0x14;
pub const WIN_ATTRIBUTES: u8 = 0x15;
pub const ENCODED_HEADER: u8 = 0x17;

/// Windows attribute bit used to flag an entry as a directory — kept here
/// because [`super::ArchiveAssembler`] reads it out of an item's opaque
/// attribute bits to decide EMPTY_STREAM/EMPTY_FILE membership (§9 Open
/// Question #1 decision).
pub const ATTR_DIRECTORY: u32 = 0x10;
