//! Certificate signature verification.

use crate::error::{Result, TlsParkError};
use const_oid::db::rfc5912::{ECDSA_WITH_SHA_256, ID_EC_PUBLIC_KEY};
use der::Encode;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use x509_cert::Certificate;

/// Check that `certificate` was signed by the key certified in `issuer`.
///
/// For a self-signed root pass the same certificate twice. Besides the
/// ECDSA check this requires ecdsa-with-SHA256 in both algorithm fields and
/// an issuer name equal to the issuer's subject.
pub fn verify_signed_by(certificate: &Certificate, issuer: &Certificate) -> Result<()> {
    let tbs = &certificate.tbs_certificate;

    if certificate.signature_algorithm.oid != ECDSA_WITH_SHA_256
        || tbs.signature.oid != ECDSA_WITH_SHA_256
    {
        return Err(TlsParkError::SignatureVerificationError(format!(
            "Unsupported signature algorithm: {}",
            certificate.signature_algorithm.oid
        )));
    }

    if tbs.issuer != issuer.tbs_certificate.subject {
        return Err(TlsParkError::SignatureVerificationError(
            "Issuer name does not match the signer's subject".to_string(),
        ));
    }

    let verifying_key = public_key(issuer)?;

    let tbs_der = tbs.to_der().map_err(|e| {
        TlsParkError::SignatureVerificationError(format!("Failed to re-encode TBS: {}", e))
    })?;

    let signature_bytes = certificate.signature.as_bytes().ok_or_else(|| {
        TlsParkError::SignatureVerificationError("Signature has unused bits".to_string())
    })?;

    let signature = Signature::from_der(signature_bytes).map_err(|e| {
        TlsParkError::SignatureVerificationError(format!("Malformed ECDSA signature: {}", e))
    })?;

    verifying_key
        .verify(&tbs_der, &signature)
        .map_err(|e| TlsParkError::SignatureVerificationError(format!("{}", e)))
}

/// The P-256 public key certified by `certificate`.
pub fn public_key(certificate: &Certificate) -> Result<VerifyingKey> {
    let spki = &certificate.tbs_certificate.subject_public_key_info;

    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(TlsParkError::SignatureVerificationError(format!(
            "Not an EC public key: {}",
            spki.algorithm.oid
        )));
    }

    VerifyingKey::from_sec1_bytes(spki.subject_public_key.raw_bytes()).map_err(|e| {
        TlsParkError::SignatureVerificationError(format!("Invalid P-256 public key: {}", e))
    })
}
