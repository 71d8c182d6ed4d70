//! Public-key extraction from DER certificates.
//!
//! Extraction performs a single-certificate trust evaluation under the basic
//! X.509 policy: the certificate has to stand on its own against the
//! extractor's anchors, with no intermediates available. A certificate that
//! fails to parse and one that fails evaluation are both reported as an
//! [`Error::Extraction`]; only the [`ErrorCode`] tells them apart.

use rustls::pki_types::TrustAnchor;
use tracing::debug;
use x509_parser::prelude::*;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::error::{Error, ErrorCode};
use crate::types::pinning::{PinnedCertificate, PinnedPublicKey};

/// Turns certificate bytes into the public key they certify.
pub trait KeyExtractor: Send + Sync {
    fn extract_public_key(&self, cert_der: &[u8]) -> Result<PinnedPublicKey, Error>;
}

/// Subject name and key of a trusted root, both as complete DER structures.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor {
    subject: Vec<u8>,
    spki: Vec<u8>,
    /// The root's own certificate, when it was supplied as one.
    der: Option<Vec<u8>>,
}

impl Anchor {
    fn from_trust_anchor(anchor: &TrustAnchor<'_>) -> Self {
        // TrustAnchor stores both fields without their outer SEQUENCE header.
        Self {
            subject: der_sequence(anchor.subject.as_ref()),
            spki: der_sequence(anchor.subject_public_key_info.as_ref()),
            der: None,
        }
    }

    fn from_certificate(der: &[u8], cert: &X509Certificate<'_>) -> Self {
        Self {
            subject: cert.subject().as_raw().to_vec(),
            spki: cert.public_key().raw.to_vec(),
            der: Some(der.to_vec()),
        }
    }

    /// `cert` is this root itself: the exact certificate when known,
    /// otherwise same subject and key under a valid self-signature.
    fn is(&self, cert_der: &[u8], cert: &X509Certificate<'_>) -> bool {
        if self.subject != cert.subject().as_raw() || self.spki != cert.public_key().raw {
            return false;
        }
        match &self.der {
            Some(der) => der == cert_der,
            None => cert.verify_signature(None).is_ok(),
        }
    }
}

/// [`KeyExtractor`] backed by `x509-parser`.
///
/// A certificate is trusted when it is itself one of the anchors, or when its
/// signature verifies under the key of the anchor that issued it. A copy of
/// an anchor's subject and key is not enough: roots given as certificates
/// must match byte for byte, and roots given as [`TrustAnchor`]s must carry a
/// valid self-signature.
#[derive(Debug, Clone)]
pub struct X509KeyExtractor {
    anchors: Vec<Anchor>,
}

impl X509KeyExtractor {
    /// Anchored on the Mozilla root program, as shipped by `webpki-roots`.
    pub fn with_webpki_roots() -> Self {
        Self::from_trust_anchors(webpki_roots::TLS_SERVER_ROOTS)
    }

    pub fn from_trust_anchors<'a, I>(anchors: I) -> Self
    where
        I: IntoIterator<Item = &'a TrustAnchor<'a>>,
    {
        Self {
            anchors: anchors.into_iter().map(Anchor::from_trust_anchor).collect(),
        }
    }

    /// Anchored on the given root certificates. Every certificate must parse.
    pub fn from_anchor_certificates(certs: &[PinnedCertificate]) -> Result<Self, Error> {
        let anchors = certs
            .iter()
            .map(|cert| {
                let der = cert.as_der();
                parse_certificate(der).map(|c| Anchor::from_certificate(der, &c))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { anchors })
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    fn is_trusted(&self, cert_der: &[u8], cert: &X509Certificate<'_>) -> bool {
        let issuer = cert.issuer().as_raw();

        self.anchors.iter().any(|anchor| {
            anchor.is(cert_der, cert) || (anchor.subject == issuer && signed_by(cert, &anchor.spki))
        })
    }
}

impl Default for X509KeyExtractor {
    fn default() -> Self {
        Self::with_webpki_roots()
    }
}

impl KeyExtractor for X509KeyExtractor {
    fn extract_public_key(&self, cert_der: &[u8]) -> Result<PinnedPublicKey, Error> {
        let cert = parse_certificate(cert_der)?;
        if !self.is_trusted(cert_der, &cert) {
            return Err(Error::Extraction {
                code: ErrorCode::CertificateUntrusted,
                message: format!("no trust anchor vouches for '{}'", cert.subject()),
            });
        }
        Ok(PinnedPublicKey::from_spki(cert.public_key().raw))
    }
}

/// A certificate that produced no key, with the reason.
#[derive(Debug)]
pub struct DroppedCertificate {
    /// Position in the input sequence.
    pub index: usize,
    pub fingerprint: String,
    pub error: Error,
}

/// Outcome of extracting keys from a sequence of certificates.
#[derive(Debug, Default)]
pub struct KeyExtraction {
    /// Extracted keys, in input order.
    pub keys: Vec<PinnedPublicKey>,
    pub dropped: Vec<DroppedCertificate>,
}

/// Extract a key from every certificate, keeping failures aside.
pub fn extract_keys<'a, I>(extractor: &dyn KeyExtractor, certs: I) -> KeyExtraction
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut extraction = KeyExtraction::default();
    for (index, der) in certs.into_iter().enumerate() {
        match extractor.extract_public_key(der) {
            Ok(key) => extraction.keys.push(key),
            Err(error) => {
                let fingerprint = crate::types::pinning::fingerprint(der);
                debug!(index, %fingerprint, %error, "certificate yielded no public key");
                extraction.dropped.push(DroppedCertificate {
                    index,
                    fingerprint,
                    error,
                });
            }
        }
    }
    extraction
}

fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>, Error> {
    let malformed = |message: String| Error::Extraction {
        code: ErrorCode::CertificateMalformed,
        message,
    };
    let (rest, cert) = X509Certificate::from_der(der)
        .map_err(|e| malformed(format!("failed to parse certificate: {}", e)))?;
    if !rest.is_empty() {
        return Err(malformed(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }
    Ok(cert)
}

fn signed_by(cert: &X509Certificate<'_>, issuer_spki: &[u8]) -> bool {
    match SubjectPublicKeyInfo::from_der(issuer_spki) {
        Ok((_, spki)) => cert.verify_signature(Some(&spki)).is_ok(),
        Err(_) => false,
    }
}

/// Wrap `contents` in a DER SEQUENCE header.
fn der_sequence(contents: &[u8]) -> Vec<u8> {
    let len = contents.len();
    let mut out = Vec::with_capacity(len + 6);
    out.push(0x30);
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(contents);
    out
}
