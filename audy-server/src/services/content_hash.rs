//! Content addressing for stored tracks
//!
//! A track's content id is the lowercase hex SHA-256 of its bytes. The id
//! names the storage directory and is the catalog's primary key.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Read buffer used while hashing (1 MiB)
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;

/// Length of a hex-encoded content id
pub const CONTENT_ID_LEN: usize = 64;

/// Hash a byte stream in a single buffered pass
///
/// Read errors are propagated; a partial digest is never returned.
pub fn hash_reader<R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Hash the contents of a file
pub fn hash_file(path: &Path) -> io::Result<String> {
    let file = File::open(path)?;
    let hash = hash_reader(file)?;
    tracing::debug!(path = %path.display(), hash = %hash, "Calculated content id");
    Ok(hash)
}

/// True for strings shaped like a content id (64 lowercase hex digits)
///
/// Used to reject path parameters before they touch the filesystem.
pub fn is_content_id(value: &str) -> bool {
    value.len() == CONTENT_ID_LEN
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
