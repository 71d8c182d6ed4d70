use std::borrow::Borrow;
use std::fmt;

use rustls::pki_types::CertificateDer;
use sha2::{Digest, Sha256};

/// One pinned DER-encoded X.509 certificate. Identity is byte equality.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PinnedCertificate(Vec<u8>);

impl PinnedCertificate {
    pub fn from_der(der: impl Into<Vec<u8>>) -> Self {
        Self(der.into())
    }

    pub fn as_der(&self) -> &[u8] {
        &self.0
    }

    /// Borrow as the certificate type the TLS engine consumes.
    pub fn to_certificate_der(&self) -> CertificateDer<'_> {
        CertificateDer::from(self.0.as_slice())
    }

    /// SHA-256 fingerprint of the DER bytes, formatted as `sha256:<hex>`.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl Borrow<[u8]> for PinnedCertificate {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for PinnedCertificate {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PinnedCertificate {
    fn from(der: Vec<u8>) -> Self {
        Self(der)
    }
}

impl From<&CertificateDer<'_>> for PinnedCertificate {
    fn from(cert: &CertificateDer<'_>) -> Self {
        Self(cert.as_ref().to_vec())
    }
}

impl fmt::Debug for PinnedCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PinnedCertificate")
            .field(&self.fingerprint())
            .finish()
    }
}

/// A public key taken from a certificate, held as its DER SubjectPublicKeyInfo.
///
/// Only produced by a [`KeyExtractor`](crate::crypto::KeyExtractor); compared by value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PinnedPublicKey(Vec<u8>);

impl PinnedPublicKey {
    pub(crate) fn from_spki(spki_der: impl Into<Vec<u8>>) -> Self {
        Self(spki_der.into())
    }

    pub fn spki_der(&self) -> &[u8] {
        &self.0
    }

    /// SHA-256 fingerprint of the SubjectPublicKeyInfo, formatted as `sha256:<hex>`.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.0)
    }
}

impl fmt::Debug for PinnedPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PinnedPublicKey")
            .field(&self.fingerprint())
            .finish()
    }
}

pub(crate) fn fingerprint(bytes: &[u8]) -> String {
    let hash = Sha256::digest(bytes);
    format!("sha256:{}", hex::encode(hash))
}
