//! rustls integration: pinning as a `ServerCertVerifier`.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, TrustAnchor, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::error::Error;
use crate::trust::WebPkiTrust;
use crate::verification::HttpSecurity;

/// Runs [`HttpSecurity`] once per server certificate presented to rustls.
pub struct PinningVerifier {
    security: Arc<HttpSecurity>,
    anchors: Arc<[TrustAnchor<'static>]>,
    provider: Arc<CryptoProvider>,
}

impl std::fmt::Debug for PinningVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinningVerifier")
            .field("security", &self.security)
            .field("anchors", &self.anchors.len())
            .finish()
    }
}

impl PinningVerifier {
    pub fn new(security: Arc<HttpSecurity>) -> Self {
        Self {
            security,
            anchors: webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect(),
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    pub fn security(&self) -> &HttpSecurity {
        &self.security
    }
}

fn domain_of(server_name: &ServerName<'_>) -> Option<String> {
    match server_name {
        ServerName::DnsName(name) => Some(name.as_ref().to_string()),
        ServerName::IpAddress(ip) => Some(std::net::IpAddr::from(*ip).to_string()),
        _ => None,
    }
}

impl ServerCertVerifier for PinningVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let chain = std::iter::once(end_entity)
            .chain(intermediates)
            .map(|c| c.clone().into_owned())
            .collect();
        let mut trust = WebPkiTrust::new(chain)
            .with_anchors(Arc::clone(&self.anchors))
            .at_unix(now);

        let domain = domain_of(server_name);
        if self.security.is_valid(&mut trust, domain.as_deref()) {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Client configuration whose only server check is `security`.
pub fn client_config(security: Arc<HttpSecurity>) -> Result<ClientConfig, Error> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(PinningVerifier::new(security)))
        .with_no_client_auth();
    Ok(config)
}

/// An HTTP client that refuses any server `security` rejects.
#[cfg(feature = "fetch")]
pub fn pinned_client(security: Arc<HttpSecurity>) -> Result<reqwest::Client, Error> {
    let config = client_config(security)?;
    Ok(reqwest::Client::builder()
        .use_preconfigured_tls(config)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self_signed, TestCa};
    use crate::types::pinning::PinnedCertificate;

    fn der(cert: &PinnedCertificate) -> CertificateDer<'static> {
        CertificateDer::from(cert.as_der().to_vec())
    }

    fn name(host: &str) -> ServerName<'static> {
        ServerName::try_from(host.to_string()).unwrap()
    }

    #[test]
    fn test_domain_of_dns_and_ip() {
        assert_eq!(
            domain_of(&name("api.example.com")).as_deref(),
            Some("api.example.com")
        );
        assert_eq!(domain_of(&name("10.0.0.1")).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_accepts_pinned_self_signed() {
        let cert = self_signed("pinned.example.com");
        let verifier = PinningVerifier::new(Arc::new(HttpSecurity::new(vec![cert.clone()], false)));

        let result = verifier.verify_server_cert(
            &der(&cert),
            &[],
            &name("pinned.example.com"),
            &[],
            UnixTime::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_rejects_wrong_host() {
        let cert = self_signed("pinned.example.com");
        let verifier = PinningVerifier::new(Arc::new(HttpSecurity::new(vec![cert.clone()], false)));

        let result = verifier.verify_server_cert(
            &der(&cert),
            &[],
            &name("evil.example.com"),
            &[],
            UnixTime::now(),
        );
        assert!(matches!(
            result,
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure
            ))
        ));
    }

    #[test]
    fn test_wrong_host_allowed_without_domain_validation() {
        let cert = self_signed("pinned.example.com");
        let security = HttpSecurity::new(vec![cert.clone()], false).validate_domain_name(false);
        let verifier = PinningVerifier::new(Arc::new(security));

        let result = verifier.verify_server_cert(
            &der(&cert),
            &[],
            &name("evil.example.com"),
            &[],
            UnixTime::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_rejects_unpinned_intermediate() {
        let ca = TestCa::new("Pinning Root");
        let intermediate = ca.issue_intermediate("Pinning Intermediate");
        let leaf = intermediate.issue_leaf("api.example.com");
        let security = HttpSecurity::new(vec![ca.cert.clone(), leaf.clone()], false);
        let verifier = PinningVerifier::new(Arc::new(security));

        let result = verifier.verify_server_cert(
            &der(&leaf),
            &[der(&intermediate.cert), der(&ca.cert)],
            &name("api.example.com"),
            &[],
            UnixTime::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_public_key_pins_decide_without_chain_trust() {
        let ca = TestCa::new("Pinning Root");
        let leaf = ca.issue_leaf("api.example.com");
        let extractor = Arc::new(
            crate::crypto::X509KeyExtractor::from_anchor_certificates(&[ca.cert.clone()]).unwrap(),
        );
        let security =
            HttpSecurity::with_extractor(vec![leaf.clone(), ca.cert.clone()], true, extractor);
        assert_eq!(security.store().len(), 2);
        let verifier = PinningVerifier::new(Arc::new(security));

        // The root is not in webpki-roots; the keys alone carry the decision.
        let accepted = verifier.verify_server_cert(
            &der(&leaf),
            &[der(&ca.cert)],
            &name("api.example.com"),
            &[],
            UnixTime::now(),
        );
        assert!(accepted.is_ok());

        let unpinned = ca.issue_leaf("api.example.com");
        let rejected = verifier.verify_server_cert(
            &der(&unpinned),
            &[der(&ca.cert)],
            &name("api.example.com"),
            &[],
            UnixTime::now(),
        );
        assert!(matches!(
            rejected,
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure
            ))
        ));
    }

    #[test]
    fn test_client_config_builds() {
        let cert = self_signed("pinned.example.com");
        let config = client_config(Arc::new(HttpSecurity::new(vec![cert], false))).unwrap();
        assert!(config.alpn_protocols.is_empty());
    }
}
