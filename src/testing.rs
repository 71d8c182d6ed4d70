//! Fixtures shared by the unit tests.

use rcgen::{BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, Issuer, KeyPair};
use rustls::pki_types::CertificateDer;

use crate::crypto::KeyExtractor;
use crate::error::{Error, ErrorCode};
use crate::policy::ValidationPolicy;
use crate::trust::{ServerTrust, TrustClassification};
use crate::types::pinning::{PinnedCertificate, PinnedPublicKey};

fn distinguished_name(common_name: &str) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name.to_string());
    dn
}

fn leaf_params(host: &str) -> CertificateParams {
    let mut params = CertificateParams::new(vec![host.to_string()]).unwrap();
    params.is_ca = IsCa::NoCa;
    params.distinguished_name = distinguished_name(host);
    params
}

fn ca_params(name: &str) -> CertificateParams {
    let mut params = CertificateParams::default();
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.distinguished_name = distinguished_name(name);
    params
}

/// A fresh self-signed, non-CA certificate for `host`.
pub(crate) fn self_signed(host: &str) -> PinnedCertificate {
    let key = KeyPair::generate().unwrap();
    let cert = leaf_params(host).self_signed(&key).unwrap();
    PinnedCertificate::from_der(cert.der().as_ref().to_vec())
}

pub(crate) struct TestCa {
    pub cert: PinnedCertificate,
    issuer: Issuer<'static, KeyPair>,
}

impl TestCa {
    pub fn new(name: &str) -> Self {
        let params = ca_params(name);
        let key = KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();
        Self {
            cert: PinnedCertificate::from_der(cert.der().as_ref().to_vec()),
            issuer: Issuer::new(params, key),
        }
    }

    pub fn issue_leaf(&self, host: &str) -> PinnedCertificate {
        let key = KeyPair::generate().unwrap();
        let cert = leaf_params(host).signed_by(&key, &self.issuer).unwrap();
        PinnedCertificate::from_der(cert.der().as_ref().to_vec())
    }

    pub fn issue_intermediate(&self, name: &str) -> TestCa {
        let params = ca_params(name);
        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.issuer).unwrap();
        TestCa {
            cert: PinnedCertificate::from_der(cert.der().as_ref().to_vec()),
            issuer: Issuer::new(params, key),
        }
    }
}

pub(crate) fn der_chain(certs: &[&[u8]]) -> Vec<CertificateDer<'static>> {
    certs
        .iter()
        .map(|c| CertificateDer::from(c.to_vec()))
        .collect()
}

/// Trust context with a scripted evaluation result that records what it was given.
pub(crate) struct StubTrust {
    chain: Vec<CertificateDer<'static>>,
    result: Result<TrustClassification, String>,
    pub policy: Option<ValidationPolicy>,
    pub anchors: Option<Vec<PinnedCertificate>>,
    pub evaluations: usize,
}

impl StubTrust {
    pub fn new(chain: &[&[u8]]) -> Self {
        Self {
            chain: der_chain(chain),
            result: Ok(TrustClassification::Unspecified),
            policy: None,
            anchors: None,
            evaluations: 0,
        }
    }

    pub fn classified(mut self, classification: TrustClassification) -> Self {
        self.result = Ok(classification);
        self
    }

    pub fn broken(mut self) -> Self {
        self.result = Err("cannot build chain".to_string());
        self
    }
}

impl ServerTrust for StubTrust {
    fn set_policy(&mut self, policy: ValidationPolicy) {
        self.policy = Some(policy);
    }

    fn set_anchor_certificates(&mut self, anchors: &[&PinnedCertificate]) {
        self.anchors = Some(anchors.iter().map(|c| (*c).clone()).collect());
    }

    fn evaluate(&mut self) -> Result<TrustClassification, Error> {
        self.evaluations += 1;
        self.result.clone().map_err(Error::Evaluation)
    }

    fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }
}

/// Derives a key from the certificate bytes; inputs starting with `bad` fail.
pub(crate) struct StubExtractor;

impl StubExtractor {
    pub fn key_for(cert: &[u8]) -> PinnedPublicKey {
        let mut spki = b"key:".to_vec();
        spki.extend_from_slice(cert);
        PinnedPublicKey::from_spki(spki)
    }
}

impl KeyExtractor for StubExtractor {
    fn extract_public_key(&self, cert_der: &[u8]) -> Result<PinnedPublicKey, Error> {
        if cert_der.starts_with(b"bad") {
            return Err(Error::Extraction {
                code: ErrorCode::CertificateUntrusted,
                message: "stub refuses".to_string(),
            });
        }
        Ok(Self::key_for(cert_der))
    }
}
