use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::Result;

/// Recorded in the catalog; fingerprints from a different algorithm are not comparable.
pub const FINGERPRINT_ALGORITHM: &str = "blake3";

/// Hex-encoded BLAKE3 digest of the file's full contents.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buf = [0u8; 1024 * 128];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn same_bytes_same_fingerprint_regardless_of_name() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("nested_copy.jpeg");
        fs::write(&a, b"identical content").unwrap();
        fs::write(&b, b"identical content").unwrap();

        let fa = fingerprint_file(&a).unwrap();
        assert_eq!(fa, fingerprint_file(&a).unwrap());
        assert_eq!(fa, fingerprint_file(&b).unwrap());
        assert_eq!(fa.len(), 64);
        assert!(fa.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_bytes_differ() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"one").unwrap();
        fs::write(&b, b"two").unwrap();
        assert_ne!(fingerprint_file(&a).unwrap(), fingerprint_file(&b).unwrap());
    }

    #[test]
    fn content_larger_than_one_chunk_matches_one_shot_hash() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.mp4");
        let data: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &data).unwrap();

        assert_eq!(
            fingerprint_file(&path).unwrap(),
            blake3::hash(&data).to_hex().to_string()
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(fingerprint_file(&dir.path().join("gone.jpg")).is_err());
    }
}
