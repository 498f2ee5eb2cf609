//! Streamed CRC32 reference checksums.
//!
//! Checksums are rendered exactly as the daemon's report carries them:
//! `0x` followed by 8 uppercase hex digits.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::core::errors::{HarnessError, Result};

/// Read chunk size for streamed checksumming.
const CHUNK_SIZE: usize = 64 * 1024;

/// An 8-hex-digit, `0x`-prefixed CRC32 rendering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum(String);

impl Checksum {
    /// Wrap a raw CRC32 value in the report's wire rendering.
    #[must_use]
    pub fn from_crc32(value: u32) -> Self {
        Self(format!("0x{value:08X}"))
    }

    /// The wire-format string, e.g. `0x1A2B3C4D`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Checksum {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// Compute a file's CRC32 by streaming fixed-size chunks.
///
/// Never loads the whole file; fixture files run to tens of megabytes.
pub fn checksum_file(path: &Path) -> Result<Checksum> {
    let mut file = File::open(path).map_err(|e| HarnessError::io(path, e))?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| HarnessError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Checksum::from_crc32(hasher.finalize()))
}

/// Checksum an in-memory buffer. Backs the test suite's independently
/// computed reference values; production paths stream via `checksum_file`.
#[must_use]
pub fn checksum_bytes(bytes: &[u8]) -> Checksum {
    Checksum::from_crc32(crc32fast::hash(bytes))
}
