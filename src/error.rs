//! Error types for the tlspark library.
//!
//! Every failure in key generation, issuance, verification or PEM handling
//! surfaces as a [`TlsParkError`] value returned to the immediate caller.
//! Nothing is retried and no partially built certificate escapes.

use thiserror::Error;

/// The main error type for tlspark operations.
#[derive(Error, Debug)]
pub enum TlsParkError {
    /// The secure random source could not supply bytes
    #[error("Random source error: {0}")]
    RandomSourceError(String),

    /// Elliptic-curve key generation failed
    #[error("Key generation error: {0}")]
    KeyGenerationError(String),

    /// The certificate template could not be encoded or signed
    #[error("Certificate construction error: {0}")]
    CertificateConstructionError(String),

    /// A freshly signed certificate failed its own signature check
    #[error("Signature verification failed: {0}")]
    SignatureVerificationError(String),

    /// Malformed certificate or key body, or an unusable subject
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Malformed PEM framing
    #[error("PEM error: {0}")]
    PemError(String),

    /// A private key could not be serialized
    #[error("Key encoding error: {0}")]
    KeyEncodingError(String),

    /// Service name outside the accepted length range
    #[error("Invalid service name: {0}")]
    InvalidServiceName(String),

    /// TLS configuration rejected the issued material
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Storage I/O error
    #[error("Storage I/O error: {0}")]
    StorageError(#[from] std::io::Error),
}

impl TlsParkError {
    /// True for errors caused by malformed input during reconstruction.
    ///
    /// These are the only recoverable failures: the caller can retry with
    /// corrected PEM material.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, TlsParkError::ParseError(_) | TlsParkError::PemError(_))
    }
}

/// A specialized Result type for tlspark operations.
pub type Result<T> = std::result::Result<T, TlsParkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TlsParkError::SignatureVerificationError("bad signature".to_string());
        assert_eq!(err.to_string(), "Signature verification failed: bad signature");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TlsParkError>();
    }

    #[test]
    fn test_parse_errors_are_recoverable() {
        assert!(TlsParkError::PemError("trailing bytes".to_string()).is_parse_error());
        assert!(TlsParkError::ParseError("short name".to_string()).is_parse_error());
        assert!(!TlsParkError::RandomSourceError("empty".to_string()).is_parse_error());
        assert!(!TlsParkError::SignatureVerificationError("x".to_string()).is_parse_error());
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: TlsParkError = io.into();
        assert!(matches!(err, TlsParkError::StorageError(_)));
    }
}
