//! Issuance policy.
//!
//! Everything that is a policy choice rather than a structural rule of the
//! two-tier hierarchy lives here: subject organization, validity window,
//! whether the root carries an extended key usage, and whether the server
//! leaf advertises its name as a subjectAltName.

use std::time::Duration;

/// Organization attribute placed in every subject.
pub const DEFAULT_ORGANIZATION: &str = "Just Enough";

/// Validity window applied when no other is configured: ten years.
pub const DEFAULT_VALIDITY_DAYS: u32 = 3650;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Extended key usage carried by the root certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootExtendedKeyUsage {
    /// No extendedKeyUsage extension on the root.
    #[default]
    None,
    /// The root is also marked for server authentication.
    ServerAuth,
}

/// Policy applied by [`CertificateBuilder`](crate::cert::builder::CertificateBuilder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuancePolicy {
    pub organization: String,
    /// NotAfter minus NotBefore. Certificates always expire.
    pub validity: Duration,
    pub root_extended_key_usage: RootExtendedKeyUsage,
    /// Add the service name as a dNSName subjectAltName on the server leaf
    /// when it is a syntactically valid host name.
    pub server_dns_name: bool,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            organization: DEFAULT_ORGANIZATION.to_string(),
            validity: Duration::from_secs(u64::from(DEFAULT_VALIDITY_DAYS) * SECONDS_PER_DAY),
            root_extended_key_usage: RootExtendedKeyUsage::None,
            server_dns_name: true,
        }
    }
}

impl IssuancePolicy {
    /// Set the validity window in days.
    pub fn with_validity_days(mut self, days: u32) -> Self {
        self.validity = Duration::from_secs(u64::from(days) * SECONDS_PER_DAY);
        self
    }

    /// Set the subject organization.
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = organization.into();
        self
    }

    /// Set the root's extended key usage.
    pub fn with_root_extended_key_usage(mut self, usage: RootExtendedKeyUsage) -> Self {
        self.root_extended_key_usage = usage;
        self
    }

    /// Enable or disable the server subjectAltName.
    pub fn with_server_dns_name(mut self, enabled: bool) -> Self {
        self.server_dns_name = enabled;
        self
    }
}

/// Whether `name` can be carried as a dNSName: dot-separated labels of
/// ASCII letters, digits and hyphens, each 1..=63 long, 253 at most overall.
pub fn is_dns_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 253 {
        return false;
    }

    name.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}
