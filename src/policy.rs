//! Evaluation policy selection for a handshake.

/// Policy a trust context is evaluated under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// TLS server policy. The leaf must be valid for the hostname, when one is given.
    DomainBound(Option<String>),
    /// Structure and signatures only; the hostname is ignored.
    BasicX509,
}

impl ValidationPolicy {
    /// The hostname this policy binds to, if any.
    pub fn hostname(&self) -> Option<&str> {
        match self {
            ValidationPolicy::DomainBound(host) => host.as_deref(),
            ValidationPolicy::BasicX509 => None,
        }
    }
}

/// Build the policy for `domain`.
///
/// With `validate_domain_name` unset the domain is dropped and the basic X.509
/// policy is used. An absent domain under domain validation is passed through;
/// the TLS engine treats it as no hostname constraint.
pub fn policy_for(domain: Option<&str>, validate_domain_name: bool) -> ValidationPolicy {
    if validate_domain_name {
        ValidationPolicy::DomainBound(domain.map(str::to_string))
    } else {
        ValidationPolicy::BasicX509
    }
}
