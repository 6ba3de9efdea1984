use anyhow::Result;
use sha1::{Digest, Sha1};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Streaming SHA-1 of a file, as lowercase hex.
pub async fn sha1_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest equality check. Unreadable files and mismatches both report
/// `false`; the caller decides whether that means re-download.
pub async fn sha1_matches(path: &Path, expected: &str) -> bool {
    match sha1_file(path).await {
        Ok(actual) => actual.eq_ignore_ascii_case(expected),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn sha1_of_known_content() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("f.txt");
        std::fs::write(&path, b"hello").unwrap();

        let digest = sha1_file(&path).await.unwrap();
        assert_eq!(digest, "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d");
        assert!(sha1_matches(&path, "AAF4C61DDCC5E8A2DABEDE0F3B482CD9AEA9434D").await);
        assert!(!sha1_matches(&path, "0000000000000000000000000000000000000000").await);
    }

    #[tokio::test]
    async fn missing_file_is_a_mismatch() {
        let tmp = tempdir().unwrap();
        assert!(!sha1_matches(&tmp.path().join("absent"), "deadbeef").await);
    }
}
