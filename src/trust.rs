//! The live handshake's trust context.
//!
//! [`ServerTrust`] is the narrow surface the evaluator needs from a TLS
//! engine. [`WebPkiTrust`] implements it on top of `rustls-webpki`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustls::crypto::WebPkiSupportedAlgorithms;
use rustls::pki_types::{CertificateDer, ServerName, TrustAnchor, UnixTime};
use tracing::warn;

use crate::error::Error;
use crate::policy::ValidationPolicy;
use crate::types::pinning::PinnedCertificate;

/// Outcome of a trust evaluation that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustClassification {
    /// Chains to an anchor; no override involved.
    Unspecified,
    /// Explicitly trusted by an override.
    Proceed,
    /// Explicitly distrusted by an override.
    Deny,
    /// Untrusted, for a reason an override could accept (unknown issuer, hostname mismatch).
    RecoverableFailure,
    /// Untrusted, and no override could change that.
    FatalFailure,
}

impl TrustClassification {
    pub fn is_trusted(self) -> bool {
        matches!(
            self,
            TrustClassification::Unspecified | TrustClassification::Proceed
        )
    }
}

/// A presented certificate chain plus its evaluation state.
///
/// Implementations are created per handshake and read by exactly one evaluation.
pub trait ServerTrust {
    fn set_policy(&mut self, policy: ValidationPolicy);

    /// Replace the anchor set with exactly `anchors`.
    fn set_anchor_certificates(&mut self, anchors: &[&PinnedCertificate]);

    /// `Err` means the chain could not be evaluated at all.
    fn evaluate(&mut self) -> Result<TrustClassification, Error>;

    /// The presented chain, leaf first.
    fn certificate_chain(&self) -> &[CertificateDer<'static>];
}

/// [`ServerTrust`] evaluated by `rustls-webpki` with server-auth key usage.
pub struct WebPkiTrust {
    chain: Vec<CertificateDer<'static>>,
    anchors: Arc<[TrustAnchor<'static>]>,
    policy: ValidationPolicy,
    time: UnixTime,
    algorithms: WebPkiSupportedAlgorithms,
}

impl WebPkiTrust {
    /// Trust context for `chain` with the `webpki-roots` anchors, the basic
    /// X.509 policy, and the current time.
    pub fn new(chain: Vec<CertificateDer<'static>>) -> Self {
        Self {
            chain,
            anchors: webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect(),
            policy: ValidationPolicy::BasicX509,
            time: UnixTime::now(),
            algorithms: rustls::crypto::ring::default_provider().signature_verification_algorithms,
        }
    }

    /// Start from a shared anchor set instead of `webpki-roots`.
    pub fn with_anchors(mut self, anchors: Arc<[TrustAnchor<'static>]>) -> Self {
        self.anchors = anchors;
        self
    }

    /// Evaluate as of `at` instead of now.
    ///
    /// Times before the Unix epoch are clamped to the epoch itself, where
    /// every real certificate is not yet valid.
    pub fn at(mut self, at: DateTime<Utc>) -> Self {
        let secs = u64::try_from(at.timestamp()).unwrap_or(0);
        self.time = UnixTime::since_unix_epoch(Duration::from_secs(secs));
        self
    }

    pub(crate) fn at_unix(mut self, time: UnixTime) -> Self {
        self.time = time;
        self
    }

    pub fn policy(&self) -> &ValidationPolicy {
        &self.policy
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }
}

impl ServerTrust for WebPkiTrust {
    fn set_policy(&mut self, policy: ValidationPolicy) {
        self.policy = policy;
    }

    fn set_anchor_certificates(&mut self, anchors: &[&PinnedCertificate]) {
        let mut converted = Vec::with_capacity(anchors.len());
        for cert in anchors {
            let der = cert.to_certificate_der();
            match webpki::anchor_from_trusted_cert(&der) {
                Ok(anchor) => converted.push(anchor.to_owned()),
                Err(error) => warn!(
                    fingerprint = %cert.fingerprint(),
                    %error,
                    "pinned certificate cannot serve as a trust anchor"
                ),
            }
        }
        self.anchors = converted.into();
    }

    fn evaluate(&mut self) -> Result<TrustClassification, Error> {
        let (leaf, intermediates) = self
            .chain
            .split_first()
            .ok_or_else(|| Error::Evaluation("empty certificate chain".to_string()))?;
        let end_entity = webpki::EndEntityCert::try_from(leaf)?;

        let verified = end_entity.verify_for_usage(
            self.algorithms.all,
            &self.anchors,
            intermediates,
            self.time,
            webpki::KeyUsage::server_auth(),
            None,
            None,
        );
        if let Err(error) = verified {
            return Ok(classify(&error));
        }

        if let Some(host) = self.policy.hostname() {
            let name = ServerName::try_from(host)
                .map_err(|e| Error::Evaluation(format!("invalid hostname '{}': {}", host, e)))?;
            if end_entity.verify_is_valid_for_subject_name(&name).is_err() {
                return Ok(TrustClassification::RecoverableFailure);
            }
        }

        Ok(TrustClassification::Unspecified)
    }

    fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }
}

fn classify(error: &webpki::Error) -> TrustClassification {
    match error {
        webpki::Error::BadDer | webpki::Error::BadDerTime => TrustClassification::FatalFailure,
        _ => TrustClassification::RecoverableFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self_signed, TestCa};

    fn chain(certs: &[&PinnedCertificate]) -> Vec<CertificateDer<'static>> {
        certs
            .iter()
            .map(|c| CertificateDer::from(c.as_der().to_vec()))
            .collect()
    }

    #[test]
    fn test_classification_trust() {
        assert!(TrustClassification::Unspecified.is_trusted());
        assert!(TrustClassification::Proceed.is_trusted());
        assert!(!TrustClassification::Deny.is_trusted());
        assert!(!TrustClassification::RecoverableFailure.is_trusted());
        assert!(!TrustClassification::FatalFailure.is_trusted());
    }

    #[test]
    fn test_empty_chain_is_structural_failure() {
        let mut trust = WebPkiTrust::new(vec![]);
        assert!(matches!(trust.evaluate(), Err(Error::Evaluation(_))));
    }

    #[test]
    fn test_garbage_leaf_is_structural_failure() {
        let mut trust = WebPkiTrust::new(vec![CertificateDer::from(b"junk".to_vec())]);
        assert!(trust.evaluate().is_err());
    }

    #[test]
    fn test_self_signed_unknown_to_default_roots() {
        let cert = self_signed("pinned.example.com");
        let mut trust = WebPkiTrust::new(chain(&[&cert]));
        assert_eq!(
            trust.evaluate().unwrap(),
            TrustClassification::RecoverableFailure
        );
    }

    #[test]
    fn test_pinned_self_signed_as_anchor() {
        let cert = self_signed("pinned.example.com");
        let mut trust = WebPkiTrust::new(chain(&[&cert]));
        trust.set_anchor_certificates(&[&cert]);
        assert_eq!(trust.anchor_count(), 1);
        assert_eq!(trust.evaluate().unwrap(), TrustClassification::Unspecified);
    }

    #[test]
    fn test_chain_through_intermediate() {
        let ca = TestCa::new("Test Root");
        let intermediate = ca.issue_intermediate("Test Intermediate");
        let leaf = intermediate.issue_leaf("api.example.com");

        let mut trust = WebPkiTrust::new(chain(&[&leaf, &intermediate.cert]));
        trust.set_anchor_certificates(&[&ca.cert]);
        assert_eq!(trust.evaluate().unwrap(), TrustClassification::Unspecified);
    }

    #[test]
    fn test_domain_bound_policy_checks_hostname() {
        let cert = self_signed("pinned.example.com");

        let mut trust = WebPkiTrust::new(chain(&[&cert]));
        trust.set_anchor_certificates(&[&cert]);
        trust.set_policy(ValidationPolicy::DomainBound(Some(
            "pinned.example.com".to_string(),
        )));
        assert_eq!(trust.evaluate().unwrap(), TrustClassification::Unspecified);

        trust.set_policy(ValidationPolicy::DomainBound(Some(
            "other.example.com".to_string(),
        )));
        assert_eq!(
            trust.evaluate().unwrap(),
            TrustClassification::RecoverableFailure
        );

        trust.set_policy(ValidationPolicy::DomainBound(None));
        assert_eq!(trust.evaluate().unwrap(), TrustClassification::Unspecified);

        trust.set_policy(ValidationPolicy::BasicX509);
        assert_eq!(trust.evaluate().unwrap(), TrustClassification::Unspecified);
    }

    #[test]
    fn test_invalid_hostname_is_structural_failure() {
        let cert = self_signed("pinned.example.com");
        let mut trust = WebPkiTrust::new(chain(&[&cert]));
        trust.set_anchor_certificates(&[&cert]);
        trust.set_policy(ValidationPolicy::DomainBound(Some("not a host!".to_string())));
        assert!(trust.evaluate().is_err());
    }

    #[test]
    fn test_unparseable_anchor_is_skipped() {
        let cert = self_signed("pinned.example.com");
        let junk = PinnedCertificate::from_der(b"junk".to_vec());
        let mut trust = WebPkiTrust::new(chain(&[&cert]));
        trust.set_anchor_certificates(&[&junk, &cert]);
        assert_eq!(trust.anchor_count(), 1);
    }

    #[test]
    fn test_evaluation_time_is_respected() {
        let cert = self_signed("pinned.example.com");
        let far_future: DateTime<Utc> = "5000-01-01T00:00:00Z".parse().unwrap();
        let mut trust = WebPkiTrust::new(chain(&[&cert])).at(far_future);
        trust.set_anchor_certificates(&[&cert]);
        assert_eq!(
            trust.evaluate().unwrap(),
            TrustClassification::RecoverableFailure
        );
    }

    #[test]
    fn test_time_before_epoch_clamps_to_epoch() {
        let cert = self_signed("pinned.example.com");
        let before_epoch: DateTime<Utc> = "1960-06-01T00:00:00Z".parse().unwrap();
        let mut trust = WebPkiTrust::new(chain(&[&cert])).at(before_epoch);
        assert_eq!(trust.time, UnixTime::since_unix_epoch(Duration::ZERO));

        trust.set_anchor_certificates(&[&cert]);
        assert_eq!(
            trust.evaluate().unwrap(),
            TrustClassification::RecoverableFailure
        );
    }
}
