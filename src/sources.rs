//! Where pinned certificates come from.
//!
//! Every source yields raw DER certificates; turning them into a
//! [`PinStore`](crate::pinning::PinStore) is the loader's job.

use std::path::{Path, PathBuf};

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::CertificateDer;
use tracing::debug;

use crate::error::Error;
use crate::types::bundle::PinBundle;
use crate::types::pinning::PinnedCertificate;

/// Extension scanned for by [`DirectorySource`] unless told otherwise.
pub const DEFAULT_CERTIFICATE_EXTENSION: &str = "cer";

// ---------------------------------------------------------------------------
// Sync source trait (always available)
// ---------------------------------------------------------------------------

/// Produce the certificates to pin.
pub trait PinSource: Send + Sync {
    fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error>;
}

// ---------------------------------------------------------------------------
// Async source trait (fetch-gated)
// ---------------------------------------------------------------------------

#[cfg(feature = "fetch")]
/// Async equivalent of [`PinSource`].
#[async_trait::async_trait]
pub trait AsyncPinSource: Send + Sync {
    async fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error>;
}

// ---------------------------------------------------------------------------
// DirectorySource (sync - reads from filesystem)
// ---------------------------------------------------------------------------

/// Reads every file with a given extension in one directory, as raw bytes.
///
/// Not recursive. Files that cannot be read are skipped; a directory that
/// cannot be listed is an error.
pub struct DirectorySource {
    dir: PathBuf,
    extension: String,
}

impl DirectorySource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            extension: DEFAULT_CERTIFICATE_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }
}

impl PinSource for DirectorySource {
    fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::Source(format!("Cannot list {}: {}", self.dir.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(self.extension.as_str())
            })
            .collect();
        paths.sort();

        let mut certs = Vec::with_capacity(paths.len());
        for path in paths {
            match std::fs::read(&path) {
                Ok(der) => certs.push(PinnedCertificate::from_der(der)),
                Err(error) => debug!(path = %path.display(), %error, "skipping unreadable certificate file"),
            }
        }
        Ok(certs)
    }
}

/// Raw bytes of every `.cer` file in `dir`.
pub fn load_from_directory(dir: impl AsRef<Path>) -> Result<Vec<PinnedCertificate>, Error> {
    DirectorySource::new(dir.as_ref()).load_certificates()
}

// ---------------------------------------------------------------------------
// PemFileSource (sync - PEM bundle on disk)
// ---------------------------------------------------------------------------

/// Every `CERTIFICATE` block of one PEM file.
pub struct PemFileSource {
    path: PathBuf,
}

impl PemFileSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl PinSource for PemFileSource {
    fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error> {
        let data = std::fs::read(&self.path)
            .map_err(|e| Error::Source(format!("Cannot read {}: {}", self.path.display(), e)))?;
        CertificateDer::pem_slice_iter(&data)
            .map(|cert| {
                cert.map(|c| PinnedCertificate::from(&c)).map_err(|e| {
                    Error::Parse(format!("Bad PEM in {}: {}", self.path.display(), e))
                })
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// BundleSource (sync - JSON pin bundle)
// ---------------------------------------------------------------------------

/// Certificates from a [`PinBundle`].
pub struct BundleSource {
    bundle: PinBundle,
}

impl BundleSource {
    pub fn new(bundle: PinBundle) -> Self {
        Self { bundle }
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(Self::new(PinBundle::from_json(json)?))
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::Source(format!("Cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&data)
    }
}

impl PinSource for BundleSource {
    fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error> {
        self.bundle.decode_certificates()
    }
}

// ---------------------------------------------------------------------------
// ChainSource (sync - tries sources in order)
// ---------------------------------------------------------------------------

/// Composite source that tries a sequence of sources in order until one
/// yields at least one certificate.
pub struct ChainSource {
    sources: Vec<Box<dyn PinSource>>,
}

impl ChainSource {
    pub fn new(sources: Vec<Box<dyn PinSource>>) -> Self {
        Self { sources }
    }
}

impl PinSource for ChainSource {
    fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error> {
        let mut last_err = None;
        for source in &self.sources {
            match source.load_certificates() {
                Ok(certs) if !certs.is_empty() => return Ok(certs),
                Ok(_) => continue,
                Err(e) => last_err = Some(e),
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(vec![]),
        }
    }
}

// ---------------------------------------------------------------------------
// RemoteBundleSource (fetch-gated - JSON pin bundle over HTTPS)
// ---------------------------------------------------------------------------

#[cfg(feature = "fetch")]
/// Downloads a [`PinBundle`] from a URL. Redirects are refused.
pub struct RemoteBundleSource {
    url: String,
}

#[cfg(feature = "fetch")]
impl RemoteBundleSource {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[cfg(feature = "fetch")]
#[async_trait::async_trait]
impl AsyncPinSource for RemoteBundleSource {
    async fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Source(e.to_string()))?;

        let resp = client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Source(format!("Failed to fetch {}: {}", self.url, e)))?;

        if !resp.status().is_success() {
            return Err(Error::Source(format!(
                "HTTP {} fetching {}",
                resp.status(),
                self.url
            )));
        }

        let bundle: PinBundle = resp.json().await?;
        bundle.decode_certificates()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
