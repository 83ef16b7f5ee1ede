//! PEM export and CA reconstruction.
//!
//! Certificates travel as `CERTIFICATE` blocks around their DER encoding and
//! private keys as `EC PRIVATE KEY` blocks around their SEC1 encoding. On the
//! way back in, each input must hold exactly one block of the expected type
//! and nothing after it but an optional line ending.

use crate::cert::ca::CertificateAuthority;
use crate::cert::raw::RawCertificate;
use crate::cert::role::CA_SUFFIX;
use crate::crypto::keypair::KeyPair;
use crate::error::{Result, TlsParkError};
use log::{debug, warn};

/// Label of a PEM-wrapped X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Label of a PEM-wrapped SEC1 private key.
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";

/// Wrap the certificate's signed DER in a `CERTIFICATE` block.
///
/// Infallible: the DER was already produced and parsed during issuance.
pub fn marshal_certificate(raw: &RawCertificate) -> Vec<u8> {
    encode_block(CERTIFICATE_LABEL, raw.der().to_vec())
}

/// Wrap the SEC1-encoded private key in an `EC PRIVATE KEY` block.
pub fn marshal_private_key(raw: &RawCertificate) -> Result<Vec<u8>> {
    let der = raw.key_pair().to_sec1_der()?;
    Ok(encode_block(EC_PRIVATE_KEY_LABEL, der))
}

/// Rebuild a [`CertificateAuthority`] from previously marshaled PEM.
///
/// The service name is the certificate's common name minus the trailing
/// `" CA"`. The self-signature is **not** re-verified; callers loading
/// untrusted material should follow up with
/// [`CertificateAuthority::verify_self_signature`].
///
/// # Arguments
///
/// * `cert_pem` - A single `CERTIFICATE` block holding the root
/// * `key_pem` - A single `EC PRIVATE KEY` block holding the root's key
///
/// # Example
///
/// ```
/// use tlspark::cert::ca::CertificateAuthority;
/// use tlspark::cert::pem::reconstruct_ca;
///
/// # fn example() -> tlspark::error::Result<()> {
/// let ca = CertificateAuthority::new("widgets")?;
/// let cert_pem = ca.root().marshal_certificate();
/// let key_pem = ca.root().marshal_private_key()?;
///
/// let restored = reconstruct_ca(&cert_pem, &key_pem)?;
/// assert_eq!(restored.service_name(), "widgets");
/// assert_eq!(restored, ca);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn reconstruct_ca(cert_pem: &[u8], key_pem: &[u8]) -> Result<CertificateAuthority> {
    let cert_der = decode_single_block(cert_pem, CERTIFICATE_LABEL)?;
    let key_der = decode_single_block(key_pem, EC_PRIVATE_KEY_LABEL)?;

    let key_pair = KeyPair::from_sec1_der(&key_der)?;
    let root = RawCertificate::from_der(key_pair, cert_der)?;
    let service = service_name(&root)?;

    if !root.is_ca() {
        warn!("Reconstructed certificate for {:?} is not marked as a CA", service);
    }
    debug!("Reconstructed CA for service {:?}", service);

    Ok(CertificateAuthority::from_parts(root, service))
}

/// Service name encoded in a root's common name.
pub fn service_name(root: &RawCertificate) -> Result<String> {
    let common_name = root
        .common_name()
        .ok_or_else(|| TlsParkError::ParseError("Certificate has no common name".to_string()))?;

    match common_name.strip_suffix(CA_SUFFIX) {
        Some(service) if !service.is_empty() => Ok(service.to_string()),
        _ => Err(TlsParkError::ParseError(format!(
            "Common name {:?} does not end in {:?}",
            common_name, CA_SUFFIX
        ))),
    }
}

/// Decode exactly one PEM block labelled `label` and return its body.
pub fn decode_single_block(input: &[u8], label: &str) -> Result<Vec<u8>> {
    let block = ::pem::parse(input)
        .map_err(|e| TlsParkError::PemError(format!("Malformed {} PEM: {}", label, e)))?;

    if block.tag() != label {
        return Err(TlsParkError::PemError(format!(
            "Expected {} PEM block, got {}",
            label,
            block.tag()
        )));
    }

    let footer = format!("-----END {}-----", label);
    let end = input
        .windows(footer.len())
        .position(|window| window == footer.as_bytes())
        .map(|start| start + footer.len())
        .ok_or_else(|| TlsParkError::PemError(format!("Missing {} footer", label)))?;

    let rest = strip_line_ending(&input[end..]);
    if !rest.is_empty() {
        return Err(TlsParkError::PemError(format!(
            "{} trailing bytes after {} PEM block",
            rest.len(),
            label
        )));
    }

    Ok(block.contents().to_vec())
}

fn strip_line_ending(rest: &[u8]) -> &[u8] {
    rest.strip_prefix(b"\r\n")
        .or_else(|| rest.strip_prefix(b"\n"))
        .unwrap_or(rest)
}

fn encode_block(label: &str, der: Vec<u8>) -> Vec<u8> {
    let block = ::pem::Pem::new(label, der);
    let config = ::pem::EncodeConfig::new().set_line_ending(::pem::LineEnding::LF);
    ::pem::encode_config(&block, config).into_bytes()
}
