//! # trustpin
//!
//! TLS trust pinning for HTTP clients.
//!
//! A handshake is accepted only when the server's presented chain matches a
//! pre-configured allow-list, held either as raw certificates or as the public
//! keys extracted from them.
//!
//! ## Matching policy
//!
//! - **Certificate mode**: the chain must evaluate as trusted with the pinned
//!   certificates as its only anchors, and *every* certificate in it, leaf to
//!   root, must itself be pinned. One unpinned intermediate rejects the chain.
//! - **Public-key mode**: a key is extracted from every presented certificate;
//!   certificates that yield no key are left out, and every remaining key must
//!   be pinned. The chain's overall trust verdict is not consulted.
//! - An empty pin store rejects everything.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use trustpin::{verifier, HttpSecurity};
//!
//! // Pin every `.cer` file shipped with the application.
//! let security = Arc::new(HttpSecurity::from_directory("certs", false)?);
//!
//! // Hand rustls a verifier that consults the pins on every handshake.
//! let config = verifier::client_config(Arc::clone(&security))?;
//! # let _ = config;
//! # Ok::<(), trustpin::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Construction and configuration return `Result<T, Error>`. Evaluation never
//! fails: [`HttpSecurity::is_valid`] answers `bool`, and
//! [`HttpSecurity::evaluate`] returns a [`Verdict`] carrying the reason.

pub mod config;
pub mod crypto;
pub mod error;
pub mod pinning;
pub mod policy;
pub mod sources;
pub mod trust;
pub mod types;
pub mod verification;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SecurityConfig;
pub use crypto::{KeyExtractor, X509KeyExtractor};
pub use error::{Error, ErrorCode};
pub use pinning::PinStore;
pub use policy::ValidationPolicy;
pub use trust::{ServerTrust, TrustClassification, WebPkiTrust};
pub use types::pinning::{PinnedCertificate, PinnedPublicKey};
pub use verification::{HttpSecurity, MatchSummary, Rejection, Verdict};
