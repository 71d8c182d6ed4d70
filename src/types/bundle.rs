use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use super::pinning::PinnedCertificate;
use crate::error::Error;

/// A distributable set of pinned certificates, each base64-encoded DER.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PinBundle {
    pub pin_bundle_version: String,
    pub created_at: String,
    #[serde(default)]
    pub certificates: Vec<String>,
}

impl PinBundle {
    /// Create a new empty bundle.
    pub fn new(created_at: &str) -> Self {
        Self {
            pin_bundle_version: "1.0".to_string(),
            created_at: created_at.to_string(),
            certificates: vec![],
        }
    }

    /// Append a certificate, skipping exact duplicates.
    pub fn add_certificate(&mut self, cert: &PinnedCertificate) {
        let encoded = general_purpose::STANDARD.encode(cert.as_der());
        if !self.certificates.contains(&encoded) {
            self.certificates.push(encoded);
        }
    }

    /// Decode every entry. One bad entry fails the whole bundle.
    pub fn decode_certificates(&self) -> Result<Vec<PinnedCertificate>, Error> {
        self.certificates
            .iter()
            .map(|b64| {
                let der = general_purpose::STANDARD.decode(b64.trim())?;
                Ok(PinnedCertificate::from_der(der))
            })
            .collect()
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
