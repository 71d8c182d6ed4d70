use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::crypto::{extract_keys, KeyExtractor, X509KeyExtractor};
use crate::error::{Error, ErrorCode};
use crate::pinning::PinStore;
use crate::policy::policy_for;
use crate::sources::{DirectorySource, PinSource};
use crate::trust::{ServerTrust, TrustClassification};
use crate::types::pinning::{PinnedCertificate, PinnedPublicKey};

/// Counts behind a chain comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    /// Chain entries found in the pin set.
    pub matched: usize,
    /// Entries compared: the chain length, or the number of extracted keys.
    pub total: usize,
    /// Chain entries whose key could not be extracted (public-key mode only).
    pub dropped: usize,
}

/// Why a handshake was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Nothing pinned; every chain is refused.
    EmptyPinStore,
    /// The TLS engine could not evaluate the chain at all.
    StructuralFailure { message: String },
    /// Evaluated, but not trusted.
    Untrusted { classification: TrustClassification },
    /// At least one compared entry is not pinned.
    PartialMatch(MatchSummary),
}

impl Rejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            Rejection::EmptyPinStore => ErrorCode::PinStoreEmpty,
            Rejection::StructuralFailure { .. } => ErrorCode::TrustEvaluationFailed,
            Rejection::Untrusted { .. } => ErrorCode::TrustUntrusted,
            Rejection::PartialMatch(_) => ErrorCode::ChainNotPinned,
        }
    }
}

/// Outcome of evaluating one handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Accepted(MatchSummary),
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Verdict::Accepted(_) => None,
            Verdict::Rejected(rejection) => Some(rejection),
        }
    }
}

/// Pins a TLS server identity to a fixed set of certificates or public keys.
///
/// Built once, then shared (typically behind an `Arc`) by every handshake that
/// needs a verdict. Nothing in it changes after construction.
pub struct HttpSecurity {
    store: PinStore,
    validate_domain_name: bool,
    extractor: Arc<dyn KeyExtractor>,
    dropped_pins: usize,
}

impl std::fmt::Debug for HttpSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSecurity")
            .field("store", &self.store)
            .field("validate_domain_name", &self.validate_domain_name)
            .field("extractor", &"<dyn KeyExtractor>")
            .field("dropped_pins", &self.dropped_pins)
            .finish()
    }
}

impl HttpSecurity {
    /// Pin `certs`, or the public keys they carry when `use_public_keys` is set.
    ///
    /// Keys are extracted against the `webpki-roots` anchors.
    pub fn new<I>(certs: I, use_public_keys: bool) -> Self
    where
        I: IntoIterator<Item = PinnedCertificate>,
    {
        Self::with_extractor(certs, use_public_keys, Arc::new(X509KeyExtractor::default()))
    }

    /// Like [`HttpSecurity::new`] with a caller-supplied key extractor, which
    /// is also used on live chains in public-key mode.
    pub fn with_extractor<I>(certs: I, use_public_keys: bool, extractor: Arc<dyn KeyExtractor>) -> Self
    where
        I: IntoIterator<Item = PinnedCertificate>,
    {
        let build = PinStore::build(certs, use_public_keys, extractor.as_ref());
        debug!(
            public_keys = use_public_keys,
            pins = build.store.len(),
            dropped = build.dropped.len(),
            "pin store built"
        );
        Self {
            store: build.store,
            validate_domain_name: true,
            extractor,
            dropped_pins: build.dropped.len(),
        }
    }

    /// Pin every `.cer` file in `dir`.
    pub fn from_directory(dir: impl AsRef<Path>, use_public_keys: bool) -> Result<Self, Error> {
        let certs = DirectorySource::new(dir.as_ref()).load_certificates()?;
        Ok(Self::new(certs, use_public_keys))
    }

    pub fn from_config(config: &SecurityConfig) -> Result<Self, Error> {
        let certs = config.load_certificates()?;
        Ok(Self::new(certs, config.use_public_keys)
            .validate_domain_name(config.validate_domain_name))
    }

    /// Check the hostname during evaluation (the default) or ignore it.
    pub fn validate_domain_name(mut self, validate: bool) -> Self {
        self.validate_domain_name = validate;
        self
    }

    pub fn validates_domain_name(&self) -> bool {
        self.validate_domain_name
    }

    pub fn store(&self) -> &PinStore {
        &self.store
    }

    /// Configured certificates that produced no pin.
    pub fn dropped_pin_count(&self) -> usize {
        self.dropped_pins
    }

    /// Should the handshake behind `trust` be allowed to proceed?
    pub fn is_valid(&self, trust: &mut dyn ServerTrust, domain: Option<&str>) -> bool {
        self.evaluate(trust, domain).is_accepted()
    }

    /// Evaluate `trust` for `domain`, keeping the reason for the outcome.
    pub fn evaluate(&self, trust: &mut dyn ServerTrust, domain: Option<&str>) -> Verdict {
        trust.set_policy(policy_for(domain, self.validate_domain_name));

        let verdict = match &self.store {
            _ if self.store.is_empty() => Verdict::Rejected(Rejection::EmptyPinStore),
            PinStore::Certificates(certs) => evaluate_certificates(certs, trust),
            PinStore::PublicKeys(keys) => self.evaluate_public_keys(keys, trust),
        };

        match &verdict {
            Verdict::Accepted(summary) => debug!(
                domain = domain.unwrap_or("-"),
                matched = summary.matched,
                "pinned chain accepted"
            ),
            Verdict::Rejected(rejection) => warn!(
                domain = domain.unwrap_or("-"),
                code = %rejection.code(),
                ?rejection,
                "pinned chain rejected"
            ),
        }
        verdict
    }

    // No overall evaluate() call on this path: only key membership decides.
    fn evaluate_public_keys(
        &self,
        keys: &std::collections::HashSet<PinnedPublicKey>,
        trust: &mut dyn ServerTrust,
    ) -> Verdict {
        let chain = trust.certificate_chain();
        let live = extract_keys(self.extractor.as_ref(), chain.iter().map(|c| &c[..]));
        let matched = live.keys.iter().filter(|k| keys.contains(*k)).count();

        let summary = MatchSummary {
            matched,
            total: live.keys.len(),
            dropped: live.dropped.len(),
        };
        if summary.matched == summary.total {
            Verdict::Accepted(summary)
        } else {
            Verdict::Rejected(Rejection::PartialMatch(summary))
        }
    }
}

fn evaluate_certificates(
    certs: &std::collections::HashSet<PinnedCertificate>,
    trust: &mut dyn ServerTrust,
) -> Verdict {
    let anchors: Vec<&PinnedCertificate> = certs.iter().collect();
    trust.set_anchor_certificates(&anchors);

    let classification = match trust.evaluate() {
        Ok(classification) => classification,
        Err(e) => {
            return Verdict::Rejected(Rejection::StructuralFailure {
                message: e.to_string(),
            })
        }
    };
    if !classification.is_trusted() {
        return Verdict::Rejected(Rejection::Untrusted { classification });
    }

    let chain = trust.certificate_chain();
    let matched = chain
        .iter()
        .filter(|c| certs.contains(&c[..]))
        .count();

    let summary = MatchSummary {
        matched,
        total: chain.len(),
        dropped: 0,
    };
    if summary.matched == summary.total {
        Verdict::Accepted(summary)
    } else {
        Verdict::Rejected(Rejection::PartialMatch(summary))
    }
}
