//! Content hashing for change detection.
//!
//! Every source document is identified across builds by the SHA-256 of its
//! exact bytes. Modification times are never consulted.
//!
//! Digests are lowercase hex, always 64 characters.

use sha2::{Digest, Sha256};
use std::io::{self, Read, Seek, SeekFrom};

/// SHA-256 of everything readable from `reader`, as a hex string.
///
/// The reader is rewound to the start afterwards so the caller can go on
/// to read the same content.
pub fn hash_reader<R: Read + Seek>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    io::copy(reader, &mut hasher)?;
    reader.seek(SeekFrom::Start(0))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of an in-memory buffer, as a hex string.
#[cfg(test)]
pub(crate) fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
