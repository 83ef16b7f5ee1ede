//! TLS configuration for mTLS connections.
//!
//! This module provides configuration builders for rustls-based mTLS
//! connections. Both sides trust only the service's root; the server demands
//! a client certificate.

use crate::cert::ca::CertificateAuthority;
use crate::cert::raw::RawCertificate;
use crate::error::{Result, TlsParkError};
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use std::sync::Arc;

/// Build a server configuration presenting `server` and requiring a client
/// certificate issued by `ca`.
///
/// # Example
///
/// ```rust
/// use tlspark::cert::ca::CertificateAuthority;
/// use tlspark::net::config::build_server_config;
///
/// # fn example() -> tlspark::error::Result<()> {
/// let ca = CertificateAuthority::new("widgets")?;
/// let server = ca.create_server_cert()?;
/// let config = build_server_config(&server, &ca)?;
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub fn build_server_config(
    server: &RawCertificate,
    ca: &CertificateAuthority,
) -> Result<Arc<ServerConfig>> {
    let provider = provider();
    let roots = Arc::new(root_store(ca)?);

    let verifier = WebPkiClientVerifier::builder_with_provider(roots, provider.clone())
        .build()
        .map_err(|e| {
            TlsParkError::NetworkError(format!("Failed to build client verifier: {}", e))
        })?;

    let config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsParkError::NetworkError(format!("Unsupported protocol versions: {}", e)))?
        .with_client_cert_verifier(verifier)
        .with_single_cert(certificate_chain(server), private_key(server)?)
        .map_err(|e| TlsParkError::NetworkError(format!("Failed to build server config: {}", e)))?;

    Ok(Arc::new(config))
}

/// Build a client configuration presenting `client` and trusting only the
/// root of `ca`.
pub fn build_client_config(
    client: &RawCertificate,
    ca: &CertificateAuthority,
) -> Result<Arc<ClientConfig>> {
    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| TlsParkError::NetworkError(format!("Unsupported protocol versions: {}", e)))?
        .with_root_certificates(root_store(ca)?)
        .with_client_auth_cert(certificate_chain(client), private_key(client)?)
        .map_err(|e| TlsParkError::NetworkError(format!("Failed to build client config: {}", e)))?;

    Ok(Arc::new(config))
}

/// The name a client should expect the server to present.
pub fn server_name(ca: &CertificateAuthority) -> Result<ServerName<'static>> {
    ServerName::try_from(ca.service_name().to_string()).map_err(|e| {
        TlsParkError::NetworkError(format!(
            "Service name '{}' is not a valid server name: {}",
            ca.service_name(),
            e
        ))
    })
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

fn root_store(ca: &CertificateAuthority) -> Result<RootCertStore> {
    let mut store = RootCertStore::empty();
    store
        .add(CertificateDer::from(ca.root().der().to_vec()))
        .map_err(|e| TlsParkError::NetworkError(format!("Failed to add CA cert: {}", e)))?;

    Ok(store)
}

fn certificate_chain(leaf: &RawCertificate) -> Vec<CertificateDer<'static>> {
    vec![CertificateDer::from(leaf.der().to_vec())]
}

fn private_key(leaf: &RawCertificate) -> Result<PrivateKeyDer<'static>> {
    let pkcs8 = leaf.key_pair().to_pkcs8_der()?;
    Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(pkcs8)))
}
