//! Integrity-verified downloads
//!
//! The only network-fetch path in the engine. Remote content is
//! streamed in fixed-size chunks into a scoped temporary file while a
//! SHA-256 digest is computed incrementally; the file is handed to the
//! caller only when the computed digest matches the expected one, and
//! it is removed on every exit path (the temp file is owned by the
//! artifact and deleted on drop).

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Chunk size for streaming downloads (64 KiB)
const DOWNLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// A downloaded file whose digest has been verified.
///
/// Lifetime is scoped: the backing temporary file is removed when the
/// artifact is dropped, success or failure.
#[derive(Debug)]
pub struct VerifiedArtifact {
    file: NamedTempFile,
    digest: String,
}

impl VerifiedArtifact {
    /// Path to the verified file, valid until the artifact is dropped
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Hex-encoded SHA-256 digest of the file contents
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Downloader with digest verification
pub struct Downloader {
    client: reqwest::blocking::Client,
}

impl Downloader {
    /// Create a downloader with a default blocking client
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("hubforge/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Fetch `url` into a scoped temporary file and verify its SHA-256
    /// digest against `expected_sha256` (hex, case-insensitive).
    ///
    /// On mismatch the temporary file is removed and
    /// [`Error::Integrity`] is returned.
    pub fn fetch_verified(&self, url: &str, expected_sha256: &str) -> Result<VerifiedArtifact> {
        info!("Downloading {}", url);

        let mut response = self.client.get(url).send()?.error_for_status()?;

        let mut file = NamedTempFile::new()?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; DOWNLOAD_CHUNK_SIZE];
        let mut total: u64 = 0;

        loop {
            let n = response.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            file.write_all(&buffer[..n])?;
            total += n as u64;
        }
        file.flush()?;

        let computed = hex::encode(hasher.finalize());
        debug!("Downloaded {} bytes, sha256 {}", total, computed);

        if !computed.eq_ignore_ascii_case(expected_sha256) {
            // `file` drops here and the temporary file is removed
            return Err(Error::Integrity {
                url: url.to_string(),
                expected: expected_sha256.to_string(),
                computed,
            });
        }

        Ok(VerifiedArtifact {
            file,
            digest: computed,
        })
    }

    /// Fetch `url` into memory.
    ///
    /// For small trust-establishment payloads such as repository
    /// signing keys, which publish no digest to verify against.
    pub fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", url);
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.bytes()?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    // sha256 of "installer payload"
    const PAYLOAD: &[u8] = b"installer payload";
    const PAYLOAD_SHA256: &str =
        "340f4f42e5d28005ff7f01cc10e28f4aeb1f1ea60abeb75bf1aa49eab74a181b";

    fn serve(body: &'static [u8]) -> (mockito::ServerGuard, mockito::Mock, String) {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/installer.sh")
            .with_status(200)
            .with_body(body)
            .create();
        let url = format!("{}/installer.sh", server.url());
        (server, mock, url)
    }

    #[test]
    fn test_fetch_verified_matching_digest() {
        let (_server, _mock, url) = serve(PAYLOAD);
        let downloader = Downloader::new().unwrap();

        let artifact = downloader.fetch_verified(&url, PAYLOAD_SHA256).unwrap();
        assert_eq!(artifact.digest(), PAYLOAD_SHA256);
        assert_eq!(std::fs::read(artifact.path()).unwrap(), PAYLOAD);

        let path: PathBuf = artifact.path().to_path_buf();
        drop(artifact);
        assert!(!path.exists(), "temp file must be removed on drop");
    }

    #[test]
    fn test_fetch_verified_digest_is_case_insensitive() {
        let (_server, _mock, url) = serve(PAYLOAD);
        let downloader = Downloader::new().unwrap();
        let upper = PAYLOAD_SHA256.to_ascii_uppercase();
        assert!(downloader.fetch_verified(&url, &upper).is_ok());
    }

    #[test]
    fn test_fetch_verified_mismatch_leaves_no_file() {
        let (_server, _mock, url) = serve(PAYLOAD);
        let downloader = Downloader::new().unwrap();

        let wrong = "0000000000000000000000000000000000000000000000000000000000000000";
        let err = downloader.fetch_verified(&url, wrong).unwrap_err();
        match err {
            Error::Integrity {
                expected, computed, ..
            } => {
                assert_eq!(expected, wrong);
                assert_eq!(computed, PAYLOAD_SHA256);
            }
            other => panic!("expected Integrity, got {other:?}"),
        }
    }

    #[test]
    fn test_fetch_bytes_returns_body() {
        let (_server, _mock, url) = serve(PAYLOAD);
        let downloader = Downloader::new().unwrap();
        assert_eq!(downloader.fetch_bytes(&url).unwrap(), PAYLOAD);
    }

    #[test]
    fn test_fetch_bytes_http_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/key.asc")
            .with_status(404)
            .create();
        let downloader = Downloader::new().unwrap();

        let url = format!("{}/key.asc", server.url());
        assert!(matches!(
            downloader.fetch_bytes(&url).unwrap_err(),
            Error::Http(_)
        ));
    }

    #[test]
    fn test_fetch_verified_http_error() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/missing.sh")
            .with_status(404)
            .create();
        let downloader = Downloader::new().unwrap();

        let url = format!("{}/missing.sh", server.url());
        let err = downloader.fetch_verified(&url, PAYLOAD_SHA256).unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
