//! Certificate builder.
//!
//! One issuance path for every role: generate a key, draw a serial, fill a
//! TBS template from the [`RoleDescriptor`], sign it with ECDSA/SHA-256,
//! parse the signed DER back and verify the signature before handing the
//! result out.

use crate::cert::policy::IssuancePolicy;
use crate::cert::raw::RawCertificate;
use crate::cert::role::RoleDescriptor;
use crate::cert::verify::verify_signed_by;
use crate::crypto::keypair::{generate_key_pair, KeyPair};
use crate::crypto::serial::next_serial;
use crate::error::{Result, TlsParkError};
use const_oid::db::rfc4519::{CN, O};
use const_oid::db::rfc5912::{ECDSA_WITH_SHA_256, ID_EC_PUBLIC_KEY, SECP_256_R_1};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::{Any, AnyRef, BitString, Ia5String, OctetString, SetOfVec, Utf8StringRef};
use der::Encode;
use log::debug;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, VerifyingKey};
use rand::{CryptoRng, RngCore};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::certificate::{Certificate, Version};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{BasicConstraints, ExtendedKeyUsage, SubjectAltName};
use x509_cert::ext::Extension;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::Validity;
use x509_cert::TbsCertificate;

/// Issues certificates under an [`IssuancePolicy`].
#[derive(Debug, Clone, Copy)]
pub struct CertificateBuilder<'p> {
    policy: &'p IssuancePolicy,
}

impl<'p> CertificateBuilder<'p> {
    pub fn new(policy: &'p IssuancePolicy) -> Self {
        Self { policy }
    }

    /// Issue a certificate for `descriptor`, drawing all randomness from `rng`.
    ///
    /// A root is signed with its own fresh key and verified against itself;
    /// a leaf is signed with the issuer's key and verified against the
    /// issuer's certificate. A failed check yields
    /// [`TlsParkError::SignatureVerificationError`] and nothing else escapes.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Role of the certificate and, for leaves, its issuer
    /// * `rng` - Source of the key scalar and the serial number
    ///
    /// # Example
    ///
    /// ```
    /// use rand::rngs::OsRng;
    /// use tlspark::cert::builder::CertificateBuilder;
    /// use tlspark::cert::policy::IssuancePolicy;
    /// use tlspark::cert::role::RoleDescriptor;
    ///
    /// # fn example() -> tlspark::error::Result<()> {
    /// let policy = IssuancePolicy::default();
    /// let builder = CertificateBuilder::new(&policy);
    ///
    /// let root = builder.build(&RoleDescriptor::root("widgets"), &mut OsRng)?;
    /// let client = builder.build(&RoleDescriptor::client(0, &root), &mut OsRng)?;
    ///
    /// assert!(root.is_ca());
    /// assert_eq!(client.common_name().as_deref(), Some("Client0"));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn build<R: RngCore + CryptoRng>(
        &self,
        descriptor: &RoleDescriptor<'_>,
        rng: &mut R,
    ) -> Result<RawCertificate> {
        let key_pair = generate_key_pair(rng)?;
        let serial = next_serial(rng)?;

        let tbs = self.template(descriptor, &key_pair, serial)?;

        let signer = descriptor
            .issuer()
            .map_or(&key_pair, |issuer| issuer.key_pair());
        let certificate = sign(tbs, signer)?;

        let der = certificate.to_der().map_err(|e| {
            TlsParkError::CertificateConstructionError(format!("Failed to encode certificate: {}", e))
        })?;

        // Round-trip through the wire encoding; never trust the in-memory template.
        let issued = RawCertificate::from_der(key_pair, der).map_err(|e| {
            TlsParkError::CertificateConstructionError(format!(
                "Signed certificate does not parse: {}",
                e
            ))
        })?;

        let authority = descriptor
            .issuer()
            .map_or(issued.certificate(), |issuer| issuer.certificate());
        verify_signed_by(issued.certificate(), authority)?;

        debug!(
            "Issued {} certificate CN={} serial={:032x}",
            descriptor.role(),
            descriptor.common_name(),
            serial
        );

        Ok(issued)
    }

    fn template(
        &self,
        descriptor: &RoleDescriptor<'_>,
        key_pair: &KeyPair,
        serial: u128,
    ) -> Result<TbsCertificate> {
        let subject = distinguished_name(&self.policy.organization, descriptor.common_name())?;
        let issuer = match descriptor.issuer() {
            Some(issuer) => issuer.certificate().tbs_certificate.subject.clone(),
            None => subject.clone(),
        };

        let serial_number = SerialNumber::new(&serial.to_be_bytes()).map_err(|e| {
            TlsParkError::CertificateConstructionError(format!("Invalid serial number: {}", e))
        })?;

        let validity = Validity::from_now(self.policy.validity).map_err(|e| {
            TlsParkError::CertificateConstructionError(format!("Invalid validity window: {}", e))
        })?;

        Ok(TbsCertificate {
            version: Version::V3,
            serial_number,
            signature: ecdsa_with_sha256(),
            issuer,
            validity,
            subject,
            subject_public_key_info: subject_public_key_info(key_pair.verifying_key())?,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: Some(self.extensions(descriptor)?),
        })
    }

    fn extensions(&self, descriptor: &RoleDescriptor<'_>) -> Result<Vec<Extension>> {
        let basic_constraints = BasicConstraints {
            ca: descriptor.is_ca(),
            path_len_constraint: None,
        };

        let mut extensions = vec![
            encode_extension(&basic_constraints, true)?,
            encode_extension(&descriptor.key_usage(), true)?,
        ];

        let extended_key_usage = descriptor.extended_key_usage(self.policy);
        if !extended_key_usage.is_empty() {
            extensions.push(encode_extension(
                &ExtendedKeyUsage(extended_key_usage),
                false,
            )?);
        }

        let dns_names = descriptor.dns_names(self.policy);
        if !dns_names.is_empty() {
            let names = dns_names
                .iter()
                .map(|name| Ia5String::new(name).map(GeneralName::DnsName))
                .collect::<der::Result<Vec<_>>>()
                .map_err(|e| {
                    TlsParkError::CertificateConstructionError(format!("Invalid DNS name: {}", e))
                })?;
            extensions.push(encode_extension(&SubjectAltName(names), false)?);
        }

        Ok(extensions)
    }
}

fn sign(tbs_certificate: TbsCertificate, signer: &KeyPair) -> Result<Certificate> {
    let tbs_der = tbs_certificate.to_der().map_err(|e| {
        TlsParkError::CertificateConstructionError(format!("Failed to encode TBS: {}", e))
    })?;

    let signature: Signature = signer.signing_key().try_sign(&tbs_der).map_err(|e| {
        TlsParkError::CertificateConstructionError(format!("Failed to sign certificate: {}", e))
    })?;

    let signature = BitString::from_bytes(signature.to_der().as_bytes()).map_err(|e| {
        TlsParkError::CertificateConstructionError(format!(
            "Failed to create signature bitstring: {}",
            e
        ))
    })?;

    Ok(Certificate {
        tbs_certificate,
        signature_algorithm: ecdsa_with_sha256(),
        signature,
    })
}

fn ecdsa_with_sha256() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ECDSA_WITH_SHA_256,
        parameters: None,
    }
}

fn subject_public_key_info(public_key: &VerifyingKey) -> Result<SubjectPublicKeyInfoOwned> {
    let algorithm = AlgorithmIdentifierOwned {
        oid: ID_EC_PUBLIC_KEY,
        parameters: Some(Any::from(AnyRef::from(&SECP_256_R_1))),
    };

    let subject_public_key = BitString::from_bytes(public_key.to_encoded_point(false).as_bytes())
        .map_err(|e| {
            TlsParkError::CertificateConstructionError(format!("Failed to create bit string: {}", e))
        })?;

    Ok(SubjectPublicKeyInfoOwned {
        algorithm,
        subject_public_key,
    })
}

fn distinguished_name(organization: &str, common_name: &str) -> Result<Name> {
    Ok(RdnSequence(vec![
        relative_name(O, organization)?,
        relative_name(CN, common_name)?,
    ]))
}

fn relative_name(oid: ObjectIdentifier, value: &str) -> Result<RelativeDistinguishedName> {
    let attribute = AttributeTypeAndValue {
        oid,
        value: Utf8StringRef::new(value)
            .map_err(|e| TlsParkError::CertificateConstructionError(format!("Invalid name: {}", e)))?
            .into(),
    };

    let attributes = SetOfVec::try_from(vec![attribute]).map_err(|e| {
        TlsParkError::CertificateConstructionError(format!("Failed to add attribute: {}", e))
    })?;

    Ok(RelativeDistinguishedName::from(attributes))
}

fn encode_extension<T: Encode + AssociatedOid>(value: &T, critical: bool) -> Result<Extension> {
    let extn_value = value
        .to_der()
        .and_then(|der| OctetString::new(der))
        .map_err(|e| {
            TlsParkError::CertificateConstructionError(format!("Failed to encode extension: {}", e))
        })?;

    Ok(Extension {
        extn_id: T::OID,
        critical,
        extn_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::policy::RootExtendedKeyUsage;
    use crate::crypto::testing::DrainingRng;
    use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
    use der::Decode;
    use rand::rngs::{OsRng, StdRng};
    use rand::SeedableRng;
    use std::time::Duration;

    fn build(policy: &IssuancePolicy, descriptor: &RoleDescriptor<'_>) -> RawCertificate {
        CertificateBuilder::new(policy)
            .build(descriptor, &mut OsRng)
            .unwrap()
    }

    #[test]
    fn test_root_is_self_signed_ca() {
        let policy = IssuancePolicy::default();
        let root = build(&policy, &RoleDescriptor::root("widgets"));

        assert!(root.is_ca());
        assert_eq!(
            root.certificate().tbs_certificate.issuer,
            root.certificate().tbs_certificate.subject
        );
        assert!(verify_signed_by(root.certificate(), root.certificate()).is_ok());
    }

    #[test]
    fn test_leaf_is_signed_by_root_and_not_ca() {
        let policy = IssuancePolicy::default();
        let root = build(&policy, &RoleDescriptor::root("widgets"));
        let server = build(&policy, &RoleDescriptor::server("widgets", &root));

        assert!(!server.is_ca());
        assert_eq!(
            server.certificate().tbs_certificate.issuer,
            root.certificate().tbs_certificate.subject
        );
        assert!(verify_signed_by(server.certificate(), root.certificate()).is_ok());
        assert_ne!(server.key_pair(), root.key_pair());
    }

    #[test]
    fn test_certificate_fields() {
        let policy = IssuancePolicy::default();
        let root = build(&policy, &RoleDescriptor::root("widgets"));
        let tbs = &root.certificate().tbs_certificate;

        assert_eq!(tbs.version, Version::V3);
        assert_eq!(tbs.signature.oid, ECDSA_WITH_SHA_256);
        assert_eq!(root.certificate().signature_algorithm.oid, ECDSA_WITH_SHA_256);
        assert_eq!(tbs.subject_public_key_info.algorithm.oid, ID_EC_PUBLIC_KEY);
        assert_eq!(
            tbs.subject_public_key_info.subject_public_key.raw_bytes(),
            root.key_pair().public_key_bytes().as_slice()
        );
    }

    #[test]
    fn test_critical_flags() {
        let policy = IssuancePolicy::default();
        let root = build(&policy, &RoleDescriptor::root("widgets"));
        let client = build(&policy, &RoleDescriptor::client(0, &root));

        let extensions = client
            .certificate()
            .tbs_certificate
            .extensions
            .clone()
            .unwrap();
        let critical = |oid| {
            extensions
                .iter()
                .find(|extension| extension.extn_id == oid)
                .map(|extension| extension.critical)
        };

        assert_eq!(critical(BasicConstraints::OID), Some(true));
        assert_eq!(critical(x509_cert::ext::pkix::KeyUsage::OID), Some(true));
        assert_eq!(critical(ExtendedKeyUsage::OID), Some(false));
        assert_eq!(critical(SubjectAltName::OID), None);
    }

    #[test]
    fn test_validity_window_follows_policy() {
        let policy = IssuancePolicy::default().with_validity_days(30);
        let root = build(&policy, &RoleDescriptor::root("widgets"));

        let window = root.not_after().duration_since(root.not_before()).unwrap();
        assert_eq!(window, Duration::from_secs(30 * 24 * 60 * 60));
        assert!(root.not_before() <= std::time::SystemTime::now());
    }

    #[test]
    fn test_root_extended_key_usage_policy() {
        let policy = IssuancePolicy::default();
        let root = build(&policy, &RoleDescriptor::root("widgets"));
        assert!(root.extended_key_usage().is_empty());

        let policy = policy.with_root_extended_key_usage(RootExtendedKeyUsage::ServerAuth);
        let root = build(&policy, &RoleDescriptor::root("widgets"));
        assert_eq!(root.extended_key_usage(), vec![ID_KP_SERVER_AUTH]);
    }

    #[test]
    fn test_client_extended_key_usage() {
        let policy = IssuancePolicy::default();
        let root = build(&policy, &RoleDescriptor::root("widgets"));
        let client = build(&policy, &RoleDescriptor::client(5, &root));

        assert_eq!(client.extended_key_usage(), vec![ID_KP_CLIENT_AUTH]);
        assert!(client.dns_names().is_empty());
    }

    #[test]
    fn test_short_common_name_is_accepted_by_builder() {
        let policy = IssuancePolicy::default();
        let root = build(
            &policy,
            &RoleDescriptor::Root {
                common_name: "ab".to_string(),
            },
        );

        assert_eq!(root.common_name().as_deref(), Some("ab"));
    }

    #[test]
    fn test_der_roundtrip_is_exact() {
        let policy = IssuancePolicy::default();
        let root = build(&policy, &RoleDescriptor::root("widgets"));
        let reparsed = Certificate::from_der(root.der()).unwrap();

        assert_eq!(&reparsed, root.certificate());
        assert_eq!(reparsed.to_der().unwrap(), root.der());
    }

    #[test]
    fn test_seeded_rng_is_deterministic() {
        let policy = IssuancePolicy::default();
        let builder = CertificateBuilder::new(&policy);
        let descriptor = RoleDescriptor::root("widgets");

        let first = builder
            .build(&descriptor, &mut StdRng::seed_from_u64(1))
            .unwrap();
        let second = builder
            .build(&descriptor, &mut StdRng::seed_from_u64(1))
            .unwrap();

        assert_eq!(first.key_pair(), second.key_pair());
        assert_eq!(first.serial_number(), second.serial_number());
    }

    #[test]
    fn test_entropy_failure_during_key_generation() {
        let policy = IssuancePolicy::default();
        let result = CertificateBuilder::new(&policy)
            .build(&RoleDescriptor::root("widgets"), &mut DrainingRng::new(0));

        assert!(matches!(result, Err(TlsParkError::KeyGenerationError(_))));
    }

    #[test]
    fn test_entropy_failure_during_serial_allocation() {
        let policy = IssuancePolicy::default();
        let result = CertificateBuilder::new(&policy)
            .build(&RoleDescriptor::root("widgets"), &mut DrainingRng::new(1));

        assert!(matches!(result, Err(TlsParkError::RandomSourceError(_))));
    }
}
