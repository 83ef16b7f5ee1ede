//! Writing issued certificate/key pairs to disk.
//!
//! Each pair is stored as `<stub>_cert.pem` and `<stub>_key.pem`. Key files
//! are owner read/write only on Unix.

use crate::cert::ca::CertificateAuthority;
use crate::cert::raw::RawCertificate;
use crate::error::Result;
use log::debug;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Permission bits applied to private key files.
pub const KEY_FILE_MODE: u32 = 0o600;

/// Path of the certificate file for `stub` inside `dir`.
pub fn cert_path(dir: &Path, stub: &str) -> PathBuf {
    dir.join(format!("{}_cert.pem", stub))
}

/// Path of the private key file for `stub` inside `dir`.
pub fn key_path(dir: &Path, stub: &str) -> PathBuf {
    dir.join(format!("{}_key.pem", stub))
}

/// Write the PEM certificate and private key of `raw` under `dir`.
///
/// Existing files are overwritten. Returns the certificate and key paths.
///
/// # Arguments
///
/// * `dir` - Output directory, created if missing
/// * `stub` - File name prefix, e.g. `"ca"` or `"client3"`
/// * `raw` - Certificate and key pair to write
///
/// # Example
///
/// ```rust,no_run
/// use tlspark::cert::ca::CertificateAuthority;
/// use tlspark::storage::output::write_pair;
/// use std::path::Path;
///
/// # fn example() -> tlspark::error::Result<()> {
/// let ca = CertificateAuthority::new("widgets")?;
/// let (cert, key) = write_pair(Path::new("."), "ca", ca.root())?;
/// println!("{} {}", cert.display(), key.display());
/// # Ok(())
/// # }
/// ```
pub fn write_pair(dir: &Path, stub: &str, raw: &RawCertificate) -> Result<(PathBuf, PathBuf)> {
    let key_pem = raw.marshal_private_key()?;
    fs::create_dir_all(dir)?;

    let cert_file = cert_path(dir, stub);
    fs::write(&cert_file, raw.marshal_certificate())?;

    let key_file = key_path(dir, stub);
    write_private(&key_file, &key_pem)?;

    debug!(
        "Wrote {} and {}",
        cert_file.display(),
        key_file.display()
    );

    Ok((cert_file, key_file))
}

/// Read a CA previously written with [`write_pair`].
pub fn read_authority(cert_file: &Path, key_file: &Path) -> Result<CertificateAuthority> {
    let cert_pem = fs::read(cert_file)?;
    let key_pem = fs::read(key_file)?;

    CertificateAuthority::from_pem(&cert_pem, &key_pem)
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(KEY_FILE_MODE)
        .open(path)?;
    // mode() only applies on creation
    fs::set_permissions(path, fs::Permissions::from_mode(KEY_FILE_MODE))?;
    file.write_all(contents)?;

    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(contents)?;

    Ok(())
}
