//! Issuer version.

/// The version reported by the CLI and the health endpoint.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
