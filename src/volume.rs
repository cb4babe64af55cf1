//! C7: the volume splitter — a pure byte-wise `Write` adapter that rotates
//! to a new `{prefix}.NNN` file whenever the current one would exceed
//! `volume_size` (§4.7). Has no knowledge of 7z section boundaries; a
//! single written byte can straddle a volume boundary.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `{prefix}.{NNN}`, three digits, 1-based.
fn volume_path(prefix: &Path, index: u32) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!(".{index:03}"));
    PathBuf::from(name)
}

/// A `Write` sink that transparently rotates across fixed-size volume files.
pub struct VolumeWriter {
    prefix: PathBuf,
    volume_size: u64,
    current: File,
    current_index: u32,
    bytes_in_current: u64,
}

impl VolumeWriter {
    pub fn create(prefix: impl Into<PathBuf>, volume_size: u64) -> io::Result<Self> {
        let prefix = prefix.into();
        let current_index = 1;
        let current = File::create(volume_path(&prefix, current_index))?;
        Ok(Self {
            prefix,
            volume_size: volume_size.max(1),
            current,
            current_index,
            bytes_in_current: 0,
        })
    }

    fn roll_over(&mut self) -> io::Result<()> {
        self.current.flush()?;
        self.current_index += 1;
        tracing::debug!(volume = self.current_index, "rolling over to a new volume");
        self.current = File::create(volume_path(&self.prefix, self.current_index))?;
        self.bytes_in_current = 0;
        Ok(())
    }

    /// Flushes and closes the final volume, reporting how many were created.
    pub fn finish(mut self) -> io::Result<u32> {
        self.current.flush()?;
        Ok(self.current_index)
    }
}

impl Write for VolumeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let remaining_in_volume = self.volume_size.saturating_sub(self.bytes_in_current);
        if remaining_in_volume == 0 {
            self.roll_over()?;
            return self.write(buf);
        }
        let chunk_len = (buf.len() as u64).min(remaining_in_volume) as usize;
        let written = self.current.write(&buf[..chunk_len])?;
        self.bytes_in_current += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.current.flush()
    }
}
