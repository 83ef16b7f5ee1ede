//! Role descriptors.
//!
//! Root, server and client certificates differ only in their subject, their
//! usage constraints and whether an issuer signs them. A [`RoleDescriptor`]
//! captures exactly that, so a single issuance path serves all three.

use crate::cert::policy::{is_dns_name, IssuancePolicy, RootExtendedKeyUsage};
use crate::cert::raw::RawCertificate;
use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use const_oid::ObjectIdentifier;
use std::fmt;
use x509_cert::ext::pkix::{KeyUsage, KeyUsages};

/// Appended to the service name to form the root's common name.
pub const CA_SUFFIX: &str = " CA";

/// Prefix of every client common name.
pub const CLIENT_PREFIX: &str = "Client";

/// The position of a certificate in the two-tier hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Root,
    Server,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Root => f.write_str("root"),
            Role::Server => f.write_str("server"),
            Role::Client => f.write_str("client"),
        }
    }
}

/// What to issue, and who signs it.
///
/// A `Root` has no issuer and is self-signed with its own fresh key; it is
/// the only variant that receives the CA flag. `Server` and `Client` are
/// signed by the borrowed issuer.
#[derive(Debug, Clone)]
pub enum RoleDescriptor<'a> {
    Root {
        common_name: String,
    },
    Server {
        common_name: String,
        issuer: &'a RawCertificate,
    },
    Client {
        common_name: String,
        issuer: &'a RawCertificate,
    },
}

impl<'a> RoleDescriptor<'a> {
    /// Root for `service`: common name `"<service> CA"`.
    pub fn root(service: &str) -> Self {
        RoleDescriptor::Root {
            common_name: format!("{}{}", service, CA_SUFFIX),
        }
    }

    /// Server leaf for `service`, signed by `issuer`.
    pub fn server(service: &str, issuer: &'a RawCertificate) -> Self {
        RoleDescriptor::Server {
            common_name: service.to_string(),
            issuer,
        }
    }

    /// Client leaf number `index`, signed by `issuer`.
    ///
    /// Indices are neither range-checked nor deduplicated.
    pub fn client(index: i64, issuer: &'a RawCertificate) -> Self {
        RoleDescriptor::Client {
            common_name: format!("{}{}", CLIENT_PREFIX, index),
            issuer,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            RoleDescriptor::Root { .. } => Role::Root,
            RoleDescriptor::Server { .. } => Role::Server,
            RoleDescriptor::Client { .. } => Role::Client,
        }
    }

    pub fn common_name(&self) -> &str {
        match self {
            RoleDescriptor::Root { common_name }
            | RoleDescriptor::Server { common_name, .. }
            | RoleDescriptor::Client { common_name, .. } => common_name,
        }
    }

    /// The signer, or `None` for a self-signed root.
    pub fn issuer(&self) -> Option<&'a RawCertificate> {
        match self {
            RoleDescriptor::Root { .. } => None,
            RoleDescriptor::Server { issuer, .. } | RoleDescriptor::Client { issuer, .. } => {
                Some(*issuer)
            }
        }
    }

    /// The CA flag follows the absence of an issuer, never the key usage.
    pub fn is_ca(&self) -> bool {
        self.issuer().is_none()
    }

    pub fn key_usage(&self) -> KeyUsage {
        match self {
            RoleDescriptor::Root { .. } => KeyUsage(
                KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment | KeyUsages::KeyCertSign,
            ),
            RoleDescriptor::Server { .. } | RoleDescriptor::Client { .. } => {
                KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment)
            }
        }
    }

    pub fn extended_key_usage(&self, policy: &IssuancePolicy) -> Vec<ObjectIdentifier> {
        match self {
            RoleDescriptor::Root { .. } => match policy.root_extended_key_usage {
                RootExtendedKeyUsage::None => Vec::new(),
                RootExtendedKeyUsage::ServerAuth => vec![ID_KP_SERVER_AUTH],
            },
            RoleDescriptor::Server { .. } => vec![ID_KP_SERVER_AUTH],
            RoleDescriptor::Client { .. } => vec![ID_KP_CLIENT_AUTH],
        }
    }

    /// dNSName entries for the subjectAltName extension.
    pub fn dns_names(&self, policy: &IssuancePolicy) -> Vec<String> {
        match self {
            RoleDescriptor::Server { common_name, .. }
                if policy.server_dns_name && is_dns_name(common_name) =>
            {
                vec![common_name.clone()]
            }
            _ => Vec::new(),
        }
    }
}
