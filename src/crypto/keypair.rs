//! P-256 key pair operations.
//!
//! This module generates and serializes the ECDSA key pairs that back every
//! certificate in the hierarchy.

use crate::error::{Result, TlsParkError};
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::EncodePrivateKey;
use p256::{FieldBytes, SecretKey};
use rand::{CryptoRng, RngCore};
use std::fmt;

/// An ECDSA key pair on the NIST P-256 curve.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyPair {
    secret: SigningKey,
}

impl KeyPair {
    /// Create a key pair from a signing key.
    pub fn from_secret(secret: SigningKey) -> Self {
        Self { secret }
    }

    /// Import a key pair from a SEC1 `ECPrivateKey` DER body.
    pub fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let secret = SecretKey::from_sec1_der(der)
            .map_err(|e| TlsParkError::ParseError(format!("Invalid EC private key: {}", e)))?;
        let signing_key = SigningKey::from_bytes(&secret.to_bytes())
            .map_err(|e| TlsParkError::ParseError(format!("Invalid EC private key: {}", e)))?;

        Ok(Self::from_secret(signing_key))
    }

    /// The private half, used to sign certificates.
    pub fn signing_key(&self) -> &SigningKey {
        &self.secret
    }

    /// The public half.
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.secret.verifying_key()
    }

    /// The public key as an uncompressed SEC1 point (65 bytes).
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec()
    }

    /// Encode the private key as a SEC1 `ECPrivateKey` DER body.
    pub fn to_sec1_der(&self) -> Result<Vec<u8>> {
        let der = self
            .secret_key()?
            .to_sec1_der()
            .map_err(|e| TlsParkError::KeyEncodingError(format!("SEC1 encoding failed: {}", e)))?;

        Ok(der.to_vec())
    }

    /// Encode the private key as a PKCS#8 DER document.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>> {
        let document = self
            .secret_key()?
            .to_pkcs8_der()
            .map_err(|e| TlsParkError::KeyEncodingError(format!("PKCS#8 encoding failed: {}", e)))?;

        Ok(document.as_bytes().to_vec())
    }

    fn secret_key(&self) -> Result<SecretKey> {
        SecretKey::from_bytes(&self.secret.to_bytes())
            .map_err(|e| TlsParkError::KeyEncodingError(format!("Invalid scalar: {}", e)))
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", self.verifying_key())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh P-256 key pair from `rng`.
///
/// The secret scalar is drawn directly from the generator. Draws of zero or
/// at or above the curve order are discarded and drawn again, which keeps the
/// scalar uniform. An unavailable entropy source fails with
/// [`TlsParkError::KeyGenerationError`] and is not retried.
///
/// # Arguments
///
/// * `rng` - Cryptographically secure generator supplying the scalar
///
/// # Example
///
/// ```
/// use rand::rngs::OsRng;
/// use tlspark::crypto::keypair::generate_key_pair;
///
/// let key_pair = generate_key_pair(&mut OsRng).unwrap();
/// assert_eq!(key_pair.public_key_bytes()[0], 0x04);
/// ```
pub fn generate_key_pair<R: RngCore + CryptoRng>(rng: &mut R) -> Result<KeyPair> {
    let mut candidate = FieldBytes::default();
    loop {
        rng.try_fill_bytes(&mut candidate).map_err(|e| {
            TlsParkError::KeyGenerationError(format!("Entropy source unavailable: {}", e))
        })?;

        // Rejection sampling: out-of-range scalars are redrawn.
        if let Ok(secret) = SigningKey::from_bytes(&candidate) {
            return Ok(KeyPair::from_secret(secret));
        }
    }
}
