//! Issued certificates paired with their private keys.

use crate::cert::pem;
use crate::crypto::keypair::KeyPair;
use crate::error::{Result, TlsParkError};
use const_oid::db::rfc4519::{CN, O};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::{Decode, DecodeOwned, Tag, Tagged};
use std::fmt;
use std::time::SystemTime;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName};
use x509_cert::name::Name;
use x509_cert::Certificate;

/// A key pair together with the certificate binding its public half.
///
/// This is the unit exported to and reconstructed from PEM. It is immutable:
/// both the parsed certificate and its exact signed DER encoding are kept.
#[derive(Clone)]
pub struct RawCertificate {
    key_pair: KeyPair,
    certificate: Certificate,
    der: Vec<u8>,
}

impl RawCertificate {
    /// Pair `key_pair` with the certificate encoded in `der`.
    ///
    /// The DER is parsed, not trusted. No signature is checked here.
    pub fn from_der(key_pair: KeyPair, der: Vec<u8>) -> Result<Self> {
        let certificate = Certificate::from_der(&der)
            .map_err(|e| TlsParkError::ParseError(format!("Failed to decode certificate: {}", e)))?;

        Ok(Self {
            key_pair,
            certificate,
            der,
        })
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The signed DER encoding, byte for byte as issued.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn common_name(&self) -> Option<String> {
        attribute(&self.certificate.tbs_certificate.subject, CN)
    }

    pub fn organization(&self) -> Option<String> {
        attribute(&self.certificate.tbs_certificate.subject, O)
    }

    pub fn issuer_common_name(&self) -> Option<String> {
        attribute(&self.certificate.tbs_certificate.issuer, CN)
    }

    /// The serial number, or `None` if it does not fit in 128 bits.
    pub fn serial_number(&self) -> Option<u128> {
        let bytes = self.certificate.tbs_certificate.serial_number.as_bytes();
        let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
        if significant.len() > 16 {
            return None;
        }

        Some(
            significant
                .iter()
                .fold(0u128, |acc, byte| (acc << 8) | u128::from(*byte)),
        )
    }

    pub fn not_before(&self) -> SystemTime {
        self.certificate
            .tbs_certificate
            .validity
            .not_before
            .to_system_time()
    }

    pub fn not_after(&self) -> SystemTime {
        self.certificate
            .tbs_certificate
            .validity
            .not_after
            .to_system_time()
    }

    /// Whether basicConstraints marks this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        self.extension::<BasicConstraints>()
            .map(|constraints| constraints.ca)
            .unwrap_or(false)
    }

    pub fn key_usage(&self) -> Option<KeyUsage> {
        self.extension::<KeyUsage>()
    }

    pub fn extended_key_usage(&self) -> Vec<ObjectIdentifier> {
        self.extension::<ExtendedKeyUsage>()
            .map(|usage| usage.0)
            .unwrap_or_default()
    }

    pub fn has_extended_key_usage(&self, oid: ObjectIdentifier) -> bool {
        self.extended_key_usage().contains(&oid)
    }

    /// dNSName entries of the subjectAltName extension.
    pub fn dns_names(&self) -> Vec<String> {
        self.extension::<SubjectAltName>()
            .map(|names| {
                names
                    .0
                    .iter()
                    .filter_map(|name| match name {
                        GeneralName::DnsName(dns) => Some(dns.to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// PEM `CERTIFICATE` block wrapping [`der`](Self::der).
    pub fn marshal_certificate(&self) -> Vec<u8> {
        pem::marshal_certificate(self)
    }

    /// PEM `EC PRIVATE KEY` block wrapping the SEC1 private key.
    pub fn marshal_private_key(&self) -> Result<Vec<u8>> {
        pem::marshal_private_key(self)
    }

    fn extension<T: AssociatedOid + DecodeOwned>(&self) -> Option<T> {
        self.certificate
            .tbs_certificate
            .extensions
            .as_ref()?
            .iter()
            .find(|extension| extension.extn_id == T::OID)
            .and_then(|extension| T::from_der(extension.extn_value.as_bytes()).ok())
    }
}

impl PartialEq for RawCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der && self.key_pair == other.key_pair
    }
}

impl Eq for RawCertificate {}

impl fmt::Debug for RawCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCertificate")
            .field("common_name", &self.common_name())
            .field("serial", &self.serial_number().map(|s| format!("{:032x}", s)))
            .field("is_ca", &self.is_ca())
            .finish_non_exhaustive()
    }
}

/// First string value of attribute `oid` in `name`.
pub(crate) fn attribute(name: &Name, oid: ObjectIdentifier) -> Option<String> {
    name.0
        .iter()
        .flat_map(|rdn| rdn.0.iter())
        .find(|atv| atv.oid == oid)
        .filter(|atv| {
            matches!(
                atv.value.tag(),
                Tag::Utf8String | Tag::PrintableString | Tag::Ia5String
            )
        })
        .and_then(|atv| String::from_utf8(atv.value.value().to_vec()).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::builder::CertificateBuilder;
    use crate::cert::policy::IssuancePolicy;
    use crate::cert::role::RoleDescriptor;
    use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
    use rand::rngs::OsRng;

    fn issue_root(service: &str) -> RawCertificate {
        let policy = IssuancePolicy::default();
        CertificateBuilder::new(&policy)
            .build(&RoleDescriptor::root(service), &mut OsRng)
            .unwrap()
    }

    #[test]
    fn test_from_der_rejects_garbage() {
        let key_pair = issue_root("widgets").key_pair().clone();
        let result = RawCertificate::from_der(key_pair, vec![0x30, 0x03, 0x02, 0x01]);
        assert!(matches!(result, Err(TlsParkError::ParseError(_))));
    }

    #[test]
    fn test_subject_accessors() {
        let root = issue_root("widgets");

        assert_eq!(root.common_name().as_deref(), Some("widgets CA"));
        assert_eq!(root.issuer_common_name().as_deref(), Some("widgets CA"));
        assert_eq!(root.organization().as_deref(), Some("Just Enough"));
    }

    #[test]
    fn test_extension_accessors() {
        let root = issue_root("widgets");
        let policy = IssuancePolicy::default();
        let server = CertificateBuilder::new(&policy)
            .build(&RoleDescriptor::server("widgets", &root), &mut OsRng)
            .unwrap();

        assert!(root.is_ca());
        assert!(root.key_usage().unwrap().key_cert_sign());
        assert!(root.extended_key_usage().is_empty());

        assert!(!server.is_ca());
        assert!(server.has_extended_key_usage(ID_KP_SERVER_AUTH));
        assert!(!server.has_extended_key_usage(ID_KP_CLIENT_AUTH));
        assert_eq!(server.dns_names(), vec!["widgets".to_string()]);
    }

    #[test]
    fn test_serial_number_roundtrips_through_der() {
        let root = issue_root("widgets");
        let reparsed =
            RawCertificate::from_der(root.key_pair().clone(), root.der().to_vec()).unwrap();

        assert!(root.serial_number().is_some());
        assert_eq!(root.serial_number(), reparsed.serial_number());
        assert_eq!(root, reparsed);
    }

    #[test]
    fn test_equality_requires_same_key() {
        let root = issue_root("widgets");
        let other_key = issue_root("widgets").key_pair().clone();
        let mismatched = RawCertificate::from_der(other_key, root.der().to_vec()).unwrap();

        assert_ne!(root, mismatched);
    }

    #[test]
    fn test_debug_shows_summary() {
        let root = issue_root("widgets");
        let debug = format!("{:?}", root);

        assert!(debug.contains("widgets CA"));
        assert!(debug.contains("is_ca: true"));
    }
}
