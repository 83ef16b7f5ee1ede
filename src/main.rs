//! tlspark CLI application.
//!
//! This binary creates (or reloads) a service CA and writes the server and
//! client certificate/key pairs it issues as PEM files.

use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tlspark::cert::ca::CertificateAuthority;
use tlspark::cert::raw::RawCertificate;
use tlspark::error::{Result, TlsParkError};
use tlspark::storage::output::{read_authority, write_pair};

#[derive(Parser)]
#[command(name = "tlspark")]
#[command(about = "Just enough PKI for mutual TLS", long_about = None)]
struct Cli {
    /// Service name for a new CA (the server certificate's common name)
    #[arg(long, required_unless_present_all = ["ca_cert", "ca_key"], conflicts_with_all = ["ca_cert", "ca_key"])]
    name: Option<String>,

    /// Existing CA certificate (PEM) to issue client certificates from
    #[arg(long, requires = "ca_key")]
    ca_cert: Option<PathBuf>,

    /// Existing CA private key (PEM)
    #[arg(long, requires = "ca_cert")]
    ca_key: Option<PathBuf>,

    /// Number of client certificates to issue
    #[arg(long, default_value_t = 1)]
    clients: u32,

    /// Index of the first client certificate
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    client_offset: i64,

    /// Output directory
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Reject an overflowing range before anything is written.
    let indices = client_indices(cli.client_offset, cli.clients)?;

    let ca = match (&cli.name, &cli.ca_cert, &cli.ca_key) {
        (Some(name), _, _) => create_authority(name, &cli.out_dir)?,
        (None, Some(cert), Some(key)) => {
            let ca = read_authority(cert, key)?;
            info!("Loaded CA for service '{}'", ca.service_name());
            ca
        }
        _ => {
            return Err(TlsParkError::ParseError(
                "either --name or both --ca-cert and --ca-key are required".to_string(),
            ))
        }
    };

    for index in indices {
        let client = ca.create_client_cert(index)?;
        write(&cli.out_dir, &format!("client{}", index), &client)?;
    }

    Ok(())
}

/// Client indices `offset..offset + count`, or an error if the last one
/// does not fit in an `i64`.
fn client_indices(offset: i64, count: u32) -> Result<impl Iterator<Item = i64>> {
    if count > 0 && offset.checked_add(i64::from(count - 1)).is_none() {
        return Err(TlsParkError::ParseError(format!(
            "{} clients starting at index {} overflow the index range",
            count, offset
        )));
    }

    Ok((0..count).map(move |n| offset + i64::from(n)))
}

fn create_authority(name: &str, out_dir: &Path) -> Result<CertificateAuthority> {
    let ca = CertificateAuthority::new(name)?;
    write(out_dir, "ca", ca.root())?;

    let server = ca.create_server_cert()?;
    write(out_dir, "server", &server)?;

    Ok(ca)
}

fn write(out_dir: &Path, stub: &str, raw: &RawCertificate) -> Result<()> {
    let (cert, key) = write_pair(out_dir, stub, raw)?;
    info!(
        "Wrote {} certificate to {} and key to {}",
        raw.common_name().unwrap_or_default(),
        cert.display(),
        key.display()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_name_conflicts_with_existing_ca() {
        let result = Cli::try_parse_from([
            "tlspark", "--name", "widgets", "--ca-cert", "c.pem", "--ca-key", "k.pem",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_ca_cert_requires_key() {
        assert!(Cli::try_parse_from(["tlspark", "--ca-cert", "c.pem"]).is_err());
        assert!(Cli::try_parse_from(["tlspark"]).is_err());
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["tlspark", "--name", "widgets"]).unwrap();

        assert_eq!(cli.clients, 1);
        assert_eq!(cli.client_offset, 0);
        assert_eq!(cli.out_dir, PathBuf::from("."));
    }

    #[test]
    fn test_client_indices() {
        assert_eq!(client_indices(5, 3).unwrap().collect::<Vec<_>>(), vec![5, 6, 7]);
        assert_eq!(client_indices(-2, 2).unwrap().collect::<Vec<_>>(), vec![-2, -1]);
        assert_eq!(client_indices(i64::MAX, 0).unwrap().count(), 0);
        assert_eq!(
            client_indices(i64::MAX, 1).unwrap().collect::<Vec<_>>(),
            vec![i64::MAX]
        );
    }

    #[test]
    fn test_overflowing_client_range_is_rejected() {
        assert!(matches!(
            client_indices(i64::MAX, 2),
            Err(TlsParkError::ParseError(_))
        ));
        assert!(client_indices(i64::MAX - 1, 3).is_err());
    }

    #[test]
    fn test_overflowing_range_writes_nothing() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let out_dir = temp_dir.path().to_str().unwrap();
        let cli = Cli::try_parse_from([
            "tlspark",
            "--name",
            "w",
            "--clients",
            "2",
            "--client-offset",
            "9223372036854775807",
            "--out-dir",
            out_dir,
        ])
        .unwrap();

        assert!(run(&cli).is_err());
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_existing_ca_form() {
        let cli = Cli::try_parse_from([
            "tlspark", "--ca-cert", "c.pem", "--ca-key", "k.pem", "--clients", "3",
            "--client-offset", "-2",
        ])
        .unwrap();

        assert!(cli.name.is_none());
        assert_eq!(cli.clients, 3);
        assert_eq!(cli.client_offset, -2);
    }
}
