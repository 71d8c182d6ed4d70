use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Key extraction failed: {code}: {message}")]
    Extraction { code: ErrorCode, message: String },

    #[error("Trust evaluation failed: {0}")]
    Evaluation(String),

    #[error("Pin source error: {0}")]
    Source(String),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[cfg(feature = "fetch")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// The structured code for errors that carry one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Error::Extraction { code, .. } => Some(*code),
            Error::Evaluation(_) => Some(ErrorCode::TrustEvaluationFailed),
            Error::Parse(_) => Some(ErrorCode::CertificateMalformed),
            _ => None,
        }
    }
}

impl From<webpki::Error> for Error {
    fn from(err: webpki::Error) -> Self {
        Error::Evaluation(err.to_string())
    }
}

/// Error codes for structured verdicts and extraction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "PIN_STORE_EMPTY")]
    PinStoreEmpty,
    #[serde(rename = "TRUST_EVALUATION_FAILED")]
    TrustEvaluationFailed,
    #[serde(rename = "TRUST_UNTRUSTED")]
    TrustUntrusted,
    #[serde(rename = "CHAIN_NOT_PINNED")]
    ChainNotPinned,
    #[serde(rename = "CERTIFICATE_MALFORMED")]
    CertificateMalformed,
    #[serde(rename = "CERTIFICATE_UNTRUSTED")]
    CertificateUntrusted,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::PinStoreEmpty => "PIN_STORE_EMPTY",
            ErrorCode::TrustEvaluationFailed => "TRUST_EVALUATION_FAILED",
            ErrorCode::TrustUntrusted => "TRUST_UNTRUSTED",
            ErrorCode::ChainNotPinned => "CHAIN_NOT_PINNED",
            ErrorCode::CertificateMalformed => "CERTIFICATE_MALFORMED",
            ErrorCode::CertificateUntrusted => "CERTIFICATE_UNTRUSTED",
        };
        write!(f, "{}", s)
    }
}
