//! C1: a CRC-32-accumulating wrapper over any byte source.

use std::io::{self, Read};

/// Wraps a reader, folding every byte it returns through a CRC-32 (IEEE
/// polynomial, initial value all-ones, final XOR all-ones — `crc32fast`'s
/// default) accumulator and counting bytes seen.
///
/// The accumulator is only meaningful once the wrapped reader has been
/// drained to EOF; reading it mid-stream reports the checksum of whatever
/// has passed through so far, which is not generally useful on its own.
pub struct CrcReader<R> {
    inner: R,
    hasher: crc32fast::Hasher,
    bytes_seen: u64,
}

impl<R: Read> CrcReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: crc32fast::Hasher::new(),
            bytes_seen: 0,
        }
    }

    /// Bytes read through this wrapper so far.
    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    /// Consumes the wrapper, returning `(crc32, bytes_seen)`.
    pub fn finish(self) -> (u32, u64) {
        (self.hasher.finalize(), self.bytes_seen)
    }
}

impl<R: Read> Read for CrcReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_seen += n as u64;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn empty_stream_crc_is_zero_length() {
        let mut r = CrcReader::new(Cursor::new(Vec::<u8>::new()));
        let mut buf = [0u8; 16];
        assert_eq!(r.read(&mut buf).unwrap(), 0);
        let (crc, len) = r.finish();
        assert_eq!(len, 0);
        assert_eq!(crc, crc32fast::hash(&[]));
    }

    #[test]
    fn crc_matches_reference_hasher_across_partial_reads() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut r = CrcReader::new(Cursor::new(data.clone()));
        let mut buf = [0u8; 777]; // deliberately not a divisor of the length
        let mut total = 0usize;
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            total += n;
        }
        assert_eq!(total, data.len());
        let (crc, seen) = r.finish();
        assert_eq!(seen, data.len() as u64);
        assert_eq!(crc, crc32fast::hash(&data));
    }

    #[test]
    fn propagates_underlying_error_verbatim() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "boom"))
            }
        }
        let mut r = CrcReader::new(Failing);
        let mut buf = [0u8; 4];
        let err = r.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
    }
}
