//! Content digests

use std::fs;
use std::io::Read;
use std::path::Path;

use sha1::{Digest, Sha1};

use crate::errors::SyncError;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the SHA1 digest of in-memory data
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Stream a reader through SHA1 without buffering the whole input
pub fn digest_reader<R: Read>(mut reader: R) -> Result<String, SyncError> {
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Digest a file on disk
pub fn digest_file(path: &Path) -> Result<String, SyncError> {
    let file = fs::File::open(path)?;
    digest_reader(file)
}

/// Digests compare case-insensitively; the canonical form is lowercase
pub fn normalize_digest(digest: &str) -> String {
    digest.trim().to_ascii_lowercase()
}
