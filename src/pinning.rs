use std::collections::HashSet;

use tracing::debug;

use crate::crypto::{extract_keys, DroppedCertificate, KeyExtractor};
use crate::types::pinning::{PinnedCertificate, PinnedPublicKey};

/// The pinned material a handshake is compared against.
///
/// The mode is fixed at construction. A store is never mutated afterwards, so
/// one instance can be shared across concurrent evaluations without locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinStore {
    /// Raw certificates; a presented certificate matches by byte equality.
    Certificates(HashSet<PinnedCertificate>),
    /// Public keys extracted from the configured certificates.
    PublicKeys(HashSet<PinnedPublicKey>),
}

/// A freshly built store plus the configured certificates that were dropped.
#[derive(Debug)]
pub struct PinStoreBuild {
    pub store: PinStore,
    /// Certificates with no extractable key. Always empty in certificate mode.
    pub dropped: Vec<DroppedCertificate>,
}

impl PinStore {
    /// Build the store from configured certificates.
    ///
    /// In public-key mode every certificate goes through `extractor`; those
    /// that yield no key are dropped without failing the build, which can
    /// leave the store empty.
    pub fn build<I>(certs: I, use_public_keys: bool, extractor: &dyn KeyExtractor) -> PinStoreBuild
    where
        I: IntoIterator<Item = PinnedCertificate>,
    {
        let certs: Vec<PinnedCertificate> = certs.into_iter().collect();

        if !use_public_keys {
            return PinStoreBuild {
                store: PinStore::Certificates(certs.into_iter().collect()),
                dropped: vec![],
            };
        }

        let extraction = extract_keys(extractor, certs.iter().map(PinnedCertificate::as_der));
        if !extraction.dropped.is_empty() {
            debug!(
                dropped = extraction.dropped.len(),
                kept = extraction.keys.len(),
                "configured certificates dropped from public-key pin set"
            );
        }
        PinStoreBuild {
            store: PinStore::PublicKeys(extraction.keys.into_iter().collect()),
            dropped: extraction.dropped,
        }
    }

    pub fn uses_public_keys(&self) -> bool {
        matches!(self, PinStore::PublicKeys(_))
    }

    pub fn len(&self) -> usize {
        match self {
            PinStore::Certificates(certs) => certs.len(),
            PinStore::PublicKeys(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fingerprints of every pin, sorted.
    pub fn fingerprints(&self) -> Vec<String> {
        let mut fps: Vec<String> = match self {
            PinStore::Certificates(certs) => certs.iter().map(|c| c.fingerprint()).collect(),
            PinStore::PublicKeys(keys) => keys.iter().map(|k| k.fingerprint()).collect(),
        };
        fps.sort();
        fps
    }
}
