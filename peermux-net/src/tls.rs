//! TLS setup for peer links.
//!
//! A node can play either role on a link: the dialing side verifies the
//! listener's certificate (against a CA file or the bundled webpki
//! roots), and the listening side presents a certificate and key. Peer
//! certificate verification on the listening side is not supported.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::{NetError, Result};

/// Builds a TLS connector for dialing a remote peer.
///
/// When `ca_file` is given, only certificates signed by that CA are
/// accepted. Otherwise the bundled webpki root store is used.
pub fn create_tls_connector(
    ca_file: Option<&Path>,
    server_name: &str,
) -> Result<(TlsConnector, ServerName<'static>)> {
    let mut root_store = RootCertStore::empty();

    if let Some(path) = ca_file {
        let certs = load_certs(path)?;
        for cert in certs {
            root_store
                .add(cert)
                .map_err(|e| NetError::TlsConfig(format!("invalid CA certificate: {e}")))?;
        }
    } else {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    let server_name = ServerName::try_from(server_name.to_string())
        .map_err(|_| NetError::TlsConfig(format!("invalid server name: {server_name}")))?;

    Ok((TlsConnector::from(Arc::new(config)), server_name))
}

/// Builds a TLS connector that skips certificate verification.
///
/// Only suitable for development against self-signed listeners.
pub fn create_insecure_tls_connector(server_name: &str) -> Result<(TlsConnector, ServerName<'static>)> {
    let config = ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
        .with_no_client_auth();

    let server_name = ServerName::try_from(server_name.to_string())
        .map_err(|_| NetError::TlsConfig(format!("invalid server name: {server_name}")))?;

    Ok((TlsConnector::from(Arc::new(config)), server_name))
}

/// Builds a TLS acceptor for the listening side of a link.
pub fn create_tls_acceptor(cert_file: &Path, key_file: &Path) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_file)?;
    let key = load_private_key(key_file)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| NetError::TlsConfig(format!("invalid certificate or key: {e}")))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|e| {
        NetError::TlsConfig(format!("cannot open certificate file {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            NetError::TlsConfig(format!("cannot parse certificates in {}: {e}", path.display()))
        })
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = File::open(path).map_err(|e| {
        NetError::TlsConfig(format!("cannot open key file {}: {e}", path.display()))
    })?;
    let mut reader = BufReader::new(file);

    loop {
        let item = rustls_pemfile::read_one(&mut reader).map_err(|e| {
            NetError::TlsConfig(format!("cannot parse key file {}: {e}", path.display()))
        })?;
        match item {
            Some(rustls_pemfile::Item::Pkcs1Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Pkcs8Key(key)) => return Ok(key.into()),
            Some(rustls_pemfile::Item::Sec1Key(key)) => return Ok(key.into()),
            Some(_) => continue,
            None => {
                return Err(NetError::TlsConfig(format!(
                    "no private key found in {}",
                    path.display()
                )))
            }
        }
    }
}

#[derive(Debug)]
struct InsecureVerifier;

impl ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn connector_with_system_roots() {
        let result = create_tls_connector(None, "example.com");
        assert!(result.is_ok());
    }

    #[test]
    fn insecure_connector_builds() {
        let result = create_insecure_tls_connector("localhost");
        assert!(result.is_ok());
    }

    #[test]
    fn empty_server_name_is_rejected() {
        let result = create_tls_connector(None, "");
        assert!(matches!(result, Err(NetError::TlsConfig(_))));
    }

    #[test]
    fn missing_ca_file_is_reported() {
        let result = create_tls_connector(Some(Path::new("/nonexistent/ca.pem")), "example.com");
        match result {
            Err(NetError::TlsConfig(msg)) => assert!(msg.contains("/nonexistent/ca.pem")),
            other => panic!("expected TlsConfig error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_cert_file_is_reported() {
        let result = create_tls_acceptor(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        );
        assert!(matches!(result, Err(NetError::TlsConfig(_))));
    }

    #[test]
    fn key_file_without_a_key_is_reported() {
        let mut cert = NamedTempFile::new().unwrap();
        writeln!(cert, "not a certificate").unwrap();
        let mut key = NamedTempFile::new().unwrap();
        writeln!(key, "not a key").unwrap();

        let result = create_tls_acceptor(cert.path(), key.path());
        match result {
            Err(NetError::TlsConfig(msg)) => {
                assert!(msg.contains("no private key found") || msg.contains("invalid"))
            }
            other => panic!("expected TlsConfig error, got {:?}", other.map(|_| ())),
        }
    }
}
