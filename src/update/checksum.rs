use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{map_io_err, ReplacerResult};

/// Lowercase hex SHA-256 of a file
pub fn sha256_file(path: &Path) -> ReplacerResult<String> {
    let mut file = File::open(path).map_err(map_io_err(path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(map_io_err(path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest from a `sha256sum`-style line (`<hex>  <name>`) or a bare digest
pub fn parse_checksum_text(raw: &str) -> Option<String> {
    let token = raw.split_whitespace().next()?;
    let is_digest = token.len() == 64 && token.chars().all(|c| c.is_ascii_hexdigit());
    is_digest.then(|| token.to_ascii_lowercase())
}
