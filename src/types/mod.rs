pub mod bundle;
pub mod pinning;
