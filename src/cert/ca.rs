//! Root certificate authority.
//!
//! A [`CertificateAuthority`] owns the self-signed root and the service name
//! leaf subjects are derived from. It is read-only after construction, so
//! concurrent issuance needs no locking: every call draws its own key and
//! serial from the RNG it is given.

use crate::cert::builder::CertificateBuilder;
use crate::cert::pem;
use crate::cert::policy::IssuancePolicy;
use crate::cert::raw::RawCertificate;
use crate::cert::role::RoleDescriptor;
use crate::cert::verify::{public_key, verify_signed_by};
use crate::error::{Result, TlsParkError};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

/// Longest accepted service name, in characters.
pub const MAX_SERVICE_NAME_LEN: usize = 140;

/// A self-signed root plus the service it vouches for.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    root: RawCertificate,
    service: String,
    policy: IssuancePolicy,
}

impl CertificateAuthority {
    /// Create a fresh CA for `service` with the default policy and `OsRng`.
    ///
    /// # Arguments
    ///
    /// * `service` - Service name, 1 to 140 characters; the root is named `"<service> CA"`
    ///
    /// # Example
    ///
    /// ```
    /// use tlspark::cert::ca::CertificateAuthority;
    ///
    /// # fn example() -> tlspark::error::Result<()> {
    /// let ca = CertificateAuthority::new("widgets")?;
    /// assert_eq!(ca.root().common_name().as_deref(), Some("widgets CA"));
    ///
    /// let server = ca.create_server_cert()?;
    /// assert_eq!(server.common_name().as_deref(), Some("widgets"));
    ///
    /// let client = ca.create_client_cert(3)?;
    /// assert_eq!(client.common_name().as_deref(), Some("Client3"));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    pub fn new(service: &str) -> Result<Self> {
        Self::with_rng(service, IssuancePolicy::default(), &mut OsRng)
    }

    /// Create a fresh CA under `policy`, drawing randomness from `rng`.
    ///
    /// # Arguments
    ///
    /// * `service` - Service name, 1 to 140 characters
    /// * `policy` - Subject organization, validity and extension choices
    /// * `rng` - Source of the root key and serial number
    pub fn with_rng<R: RngCore + CryptoRng>(
        service: &str,
        policy: IssuancePolicy,
        rng: &mut R,
    ) -> Result<Self> {
        validate_service_name(service)?;

        let root = CertificateBuilder::new(&policy).build(&RoleDescriptor::root(service), rng)?;

        Ok(Self {
            root,
            service: service.to_string(),
            policy,
        })
    }

    /// Rebuild a CA from PEM produced by [`RawCertificate::marshal_certificate`]
    /// and [`RawCertificate::marshal_private_key`].
    ///
    /// See [`pem::reconstruct_ca`]; the self-signature is not re-verified.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        pem::reconstruct_ca(cert_pem, key_pem)
    }

    pub(crate) fn from_parts(root: RawCertificate, service: String) -> Self {
        Self {
            root,
            service,
            policy: IssuancePolicy::default(),
        }
    }

    /// Replace the policy applied to subsequently issued leaves.
    pub fn with_policy(mut self, policy: IssuancePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service
    }

    pub fn root(&self) -> &RawCertificate {
        &self.root
    }

    pub fn policy(&self) -> &IssuancePolicy {
        &self.policy
    }

    /// Issue the server leaf: common name = service name, serverAuth.
    pub fn create_server_cert(&self) -> Result<RawCertificate> {
        self.create_server_cert_with_rng(&mut OsRng)
    }

    pub fn create_server_cert_with_rng<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<RawCertificate> {
        self.issue(&RoleDescriptor::server(&self.service, &self.root), rng)
    }

    /// Issue client leaf `index`: common name `"Client<index>"`, clientAuth.
    ///
    /// Repeating an index is allowed and yields another certificate with the
    /// same common name and a fresh serial.
    ///
    /// # Arguments
    ///
    /// * `index` - Client number embedded in the common name; may be negative
    pub fn create_client_cert(&self, index: i64) -> Result<RawCertificate> {
        self.create_client_cert_with_rng(index, &mut OsRng)
    }

    pub fn create_client_cert_with_rng<R: RngCore + CryptoRng>(
        &self,
        index: i64,
        rng: &mut R,
    ) -> Result<RawCertificate> {
        self.issue(&RoleDescriptor::client(index, &self.root), rng)
    }

    /// Check that the root is CA-flagged, that its private key matches the
    /// certified public key, and that its self-signature holds.
    ///
    /// Use this before trusting a CA rebuilt from untrusted PEM.
    pub fn verify_self_signature(&self) -> Result<()> {
        if !self.root.is_ca() {
            return Err(TlsParkError::SignatureVerificationError(
                "Root certificate is not marked as a CA".to_string(),
            ));
        }

        if &public_key(self.root.certificate())? != self.root.key_pair().verifying_key() {
            return Err(TlsParkError::SignatureVerificationError(
                "Private key does not match the root certificate".to_string(),
            ));
        }

        verify_signed_by(self.root.certificate(), self.root.certificate())
    }

    fn issue<R: RngCore + CryptoRng>(
        &self,
        descriptor: &RoleDescriptor<'_>,
        rng: &mut R,
    ) -> Result<RawCertificate> {
        CertificateBuilder::new(&self.policy).build(descriptor, rng)
    }
}

impl PartialEq for CertificateAuthority {
    fn eq(&self, other: &Self) -> bool {
        self.service == other.service && self.root == other.root
    }
}

impl Eq for CertificateAuthority {}

/// Accept service names of 1 to [`MAX_SERVICE_NAME_LEN`] characters.
pub fn validate_service_name(service: &str) -> Result<()> {
    let length = service.chars().count();
    if length == 0 || length > MAX_SERVICE_NAME_LEN {
        return Err(TlsParkError::InvalidServiceName(format!(
            "length {} is outside 1..={}",
            length, MAX_SERVICE_NAME_LEN
        )));
    }

    Ok(())
}
