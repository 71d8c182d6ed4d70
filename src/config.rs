use std::path::{Path, PathBuf};

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::sources::{BundleSource, DirectorySource, PinSource, DEFAULT_CERTIFICATE_EXTENSION};
use crate::types::pinning::PinnedCertificate;

/// Pinning configuration, typically read from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityConfig {
    #[serde(default = "default_validate_domain_name")]
    pub validate_domain_name: bool,
    #[serde(default)]
    pub use_public_keys: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_directory: Option<PathBuf>,
    #[serde(default = "default_certificate_extension")]
    pub certificate_extension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bundle_path: Option<PathBuf>,
    /// Inline base64 DER certificates.
    #[serde(default)]
    pub certificates: Vec<String>,
}

fn default_validate_domain_name() -> bool {
    true
}

fn default_certificate_extension() -> String {
    DEFAULT_CERTIFICATE_EXTENSION.to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            validate_domain_name: default_validate_domain_name(),
            use_public_keys: false,
            certificate_directory: None,
            certificate_extension: default_certificate_extension(),
            bundle_path: None,
            certificates: vec![],
        }
    }
}

impl SecurityConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Inline certificates, then the bundle, then the directory, concatenated.
    pub fn load_certificates(&self) -> Result<Vec<PinnedCertificate>, Error> {
        let mut certs = self
            .certificates
            .iter()
            .map(|b64| {
                let der = general_purpose::STANDARD.decode(b64.trim())?;
                Ok(PinnedCertificate::from_der(der))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        if let Some(path) = &self.bundle_path {
            certs.extend(BundleSource::from_file(path)?.load_certificates()?);
        }
        if let Some(dir) = &self.certificate_directory {
            let source = DirectorySource::new(dir).with_extension(&self.certificate_extension);
            certs.extend(source.load_certificates()?);
        }
        Ok(certs)
    }
}
