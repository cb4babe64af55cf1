//! C4's configuration surface: validated setters over the value described in
//! §3, with the coercions the spec mandates (never a hard error for an
//! out-of-range worker count or level — only the documented ceilings reject).

use std::path::PathBuf;

use crate::coder::method_id;
use crate::error::ArchiverError;

const MAX_WORKER_COUNT: usize = 256;
const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 100;

/// Raw key/IV material for the (currently inert — see DESIGN.md) direct-key
/// encryption path.
#[derive(Debug, Clone)]
pub struct RawEncryptionMaterial {
    pub key: Vec<u8>,
    pub iv: Vec<u8>,
}

/// Configuration for a [`crate::ParallelCompressor`]. Every setter is
/// idempotent and coerces out-of-range numeric values per §3 rather than
/// failing; only structurally invalid combinations (validated lazily, at
/// batch time) return an error.
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    worker_count: usize,
    level: u8,
    method_id: u64,
    password: Option<String>,
    solid_mode: bool,
    solid_block_size: usize,
    volume_size: Option<u64>,
    volume_prefix: Option<PathBuf>,
    progress_interval_ms: u64,
    raw_encryption_material: Option<RawEncryptionMaterial>,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            level: 5,
            // §3 names bare LZMA as the spec default, but `DefaultCoderRegistry`
            // never implements it (see DESIGN.md) — LZMA2 is the closest
            // coder this crate actually ships, so it is the substituted default.
            method_id: method_id::LZMA2,
            password: None,
            solid_mode: false,
            solid_block_size: 0,
            volume_size: None,
            volume_prefix: None,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            raw_encryption_material: None,
        }
    }
}

impl CompressorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0 is coerced to 1; values above 256 are coerced to 256.
    pub fn set_worker_count(&mut self, n: usize) -> &mut Self {
        self.worker_count = n.clamp(1, MAX_WORKER_COUNT);
        if n == 0 {
            self.worker_count = 1;
        }
        self
    }

    /// Values above 9 are coerced to 9.
    pub fn set_level(&mut self, level: u8) -> &mut Self {
        self.level = level.min(9);
        self
    }

    pub fn set_method_id(&mut self, method_id: u64) -> &mut Self {
        self.method_id = method_id;
        self
    }

    pub fn set_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.password = Some(password.into());
        self
    }

    pub fn clear_password(&mut self) -> &mut Self {
        self.password = None;
        self
    }

    pub fn set_solid_mode(&mut self, enabled: bool) -> &mut Self {
        self.solid_mode = enabled;
        self
    }

    pub fn set_solid_block_size(&mut self, items_per_block: usize) -> &mut Self {
        self.solid_block_size = items_per_block;
        self
    }

    pub fn set_volumes(&mut self, volume_size: u64, prefix: impl Into<PathBuf>) -> &mut Self {
        self.volume_size = Some(volume_size);
        self.volume_prefix = Some(prefix.into());
        self
    }

    pub fn clear_volumes(&mut self) -> &mut Self {
        self.volume_size = None;
        self.volume_prefix = None;
        self
    }

    pub fn set_progress_interval_ms(&mut self, ms: u64) -> &mut Self {
        self.progress_interval_ms = ms;
        self
    }

    /// Stored but not consulted while `password` is set — see the DESIGN.md
    /// Open Question decision: password-set is the canonical encryption
    /// enable, this is a reserved, currently-inert alternate path.
    pub fn set_raw_encryption_material(&mut self, key: Vec<u8>, iv: Vec<u8>) -> &mut Self {
        self.raw_encryption_material = Some(RawEncryptionMaterial { key, iv });
        self
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn method_id(&self) -> u64 {
        self.method_id
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn encryption_enabled(&self) -> bool {
        self.password.is_some()
    }

    pub fn solid_mode(&self) -> bool {
        self.solid_mode
    }

    pub fn solid_block_size(&self) -> usize {
        self.solid_block_size
    }

    pub fn volumes(&self) -> Option<(u64, &std::path::Path)> {
        match (self.volume_size, &self.volume_prefix) {
            (Some(size), Some(prefix)) => Some((size, prefix.as_path())),
            _ => None,
        }
    }

    pub fn progress_interval_ms(&self) -> u64 {
        self.progress_interval_ms
    }

    pub fn raw_encryption_material(&self) -> Option<&RawEncryptionMaterial> {
        self.raw_encryption_material.as_ref()
    }

    /// Validates combinations that can't be fixed by coercion; called once
    /// per batch rather than per setter, since a setter alone can't know
    /// whether e.g. a future `set_volumes` call will complete the pair.
    pub(crate) fn validate(&self) -> Result<(), ArchiverError> {
        if let Some(material) = &self.raw_encryption_material {
            if material.key.is_empty() != material.iv.is_empty() {
                return Err(ArchiverError::InvalidArgument(
                    "raw_encryption_material requires both key and iv, or neither".into(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_count_zero_coerces_to_one() {
        let mut c = CompressorConfig::new();
        c.set_worker_count(0);
        assert_eq!(c.worker_count(), 1);
    }

    #[test]
    fn worker_count_above_ceiling_coerces_to_256() {
        let mut c = CompressorConfig::new();
        c.set_worker_count(1_000_000);
        assert_eq!(c.worker_count(), 256);
    }

    #[test]
    fn level_above_nine_coerces_to_nine() {
        let mut c = CompressorConfig::new();
        c.set_level(250);
        assert_eq!(c.level(), 9);
    }

    #[test]
    fn password_is_the_canonical_encryption_switch() {
        let mut c = CompressorConfig::new();
        assert!(!c.encryption_enabled());
        c.set_password("hunter2");
        assert!(c.encryption_enabled());
    }
}
