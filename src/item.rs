//! The input-item handle described in §3: a lazy, boxed byte source plus the
//! metadata the archive assembler needs once that source has been drained.

use std::io::Read;

/// One independent byte stream to be compressed: a file, an in-memory
/// buffer, a network source — anything that implements `Read`.
///
/// `InputItem` owns its source; the core never shares it between jobs.
pub struct InputItem {
    source: Box<dyn Read + Send>,
    /// Display name, stored UTF-16 at the boundary where it is needed (the
    /// archive's `NAME` property); kept as an owned `String` here since the
    /// UTF-16 conversion is a serialization concern, not a data-model one.
    pub name: Option<String>,
    /// 0 means unknown; the coder and the solid encoder treat 0 as "read
    /// until EOF" rather than "empty".
    pub declared_size: u64,
    /// Windows-style file attribute bits; 0 if the caller has none to offer.
    pub attrs: u32,
    /// Filesystem-style 64-bit modification tick (opaque to the core).
    pub mtime: Option<u64>,
    /// Caller-defined value carried through untouched; not interpreted here.
    pub user_tag: u64,
}

impl InputItem {
    pub fn new(source: impl Read + Send + 'static) -> Self {
        Self {
            source: Box::new(source),
            name: None,
            declared_size: 0,
            attrs: 0,
            mtime: None,
            user_tag: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = size;
        self
    }

    pub fn with_attrs(mut self, attrs: u32) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn with_mtime(mut self, mtime: u64) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn with_user_tag(mut self, tag: u64) -> Self {
        self.user_tag = tag;
        self
    }

    pub(crate) fn into_reader(self) -> Box<dyn Read + Send> {
        self.source
    }
}

impl std::fmt::Debug for InputItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputItem")
            .field("name", &self.name)
            .field("declared_size", &self.declared_size)
            .field("attrs", &self.attrs)
            .field("mtime", &self.mtime)
            .field("user_tag", &self.user_tag)
            .finish_non_exhaustive()
    }
}
