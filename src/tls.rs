//! TLS client configuration for secure TN3270 connections
//!
//! Builds a rustls `ClientConfig` with TLS 1.2 as the minimum protocol
//! version and hostname verification on by default. The trust store is
//! the platform's native roots plus the bundled webpki roots, optionally
//! extended with a CA bundle file or directory. `verify = false` is
//! supported for test environments and always logs a warning.
//!
//! rustls only ships strong cipher suites, which covers the
//! `HIGH:!aNULL:!MD5` policy of the original OpenSSL-style configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::errors::{SslError, SslResult};

/// TLS wrapper holding the verification policy and trust overrides
#[derive(Debug, Clone, Default)]
pub struct TlsWrapper {
    verify: bool,
    cafile: Option<PathBuf>,
    capath: Option<PathBuf>,
    config: Option<Arc<ClientConfig>>,
}

impl TlsWrapper {
    /// Create a wrapper; `verify = false` warns immediately.
    pub fn new(verify: bool, cafile: Option<PathBuf>, capath: Option<PathBuf>) -> Self {
        if !verify {
            log::warn!(
                "TLS certificate verification is DISABLED; connections are open to \
                 man-in-the-middle attacks. Use verify=false only for testing."
            );
        }
        Self {
            verify,
            cafile,
            capath,
            config: None,
        }
    }

    /// Verifying wrapper with the default trust store
    pub fn verified() -> Self {
        Self::new(true, None, None)
    }

    pub fn verify_enabled(&self) -> bool {
        self.verify
    }

    /// Build (or return the cached) rustls client configuration.
    pub fn get_config(&mut self) -> SslResult<Arc<ClientConfig>> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }
        let config = self.create_config()?;
        self.config = Some(config.clone());
        Ok(config)
    }

    /// Build a fresh rustls client configuration from the policy.
    pub fn create_config(&self) -> SslResult<Arc<ClientConfig>> {
        let builder = ClientConfig::builder_with_protocol_versions(&[
            &rustls::version::TLS12,
            &rustls::version::TLS13,
        ]);

        let config = if self.verify {
            let root_store = self.build_root_store()?;
            builder
                .with_root_certificates(root_store)
                .with_no_client_auth()
        } else {
            log::warn!(
                "building TLS context without certificate verification; \
                 this must never reach production"
            );
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
                .with_no_client_auth()
        };

        log::debug!("TLS client config created (verify={})", self.verify);
        Ok(Arc::new(config))
    }

    fn build_root_store(&self) -> SslResult<RootCertStore> {
        let mut root_store = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        match rustls_native_certs::load_native_certs() {
            Ok(certs) => {
                for cert in certs {
                    if let Err(err) = root_store.add(cert) {
                        log::debug!("skipping unusable native certificate: {err}");
                    }
                }
            }
            Err(err) => {
                log::warn!("failed to load native root certificates: {err}");
            }
        }

        if let Some(path) = &self.cafile {
            let certs = load_pem_bundle(path)?;
            let count = certs.len();
            for cert in certs {
                root_store.add(cert).map_err(|e| SslError::CertificateLoad {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
            log::info!("added {count} CA certificates from {}", path.display());
        }

        if let Some(dir) = &self.capath {
            let entries = fs::read_dir(dir).map_err(|e| SslError::CertificateLoad {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                match load_pem_bundle(&path) {
                    Ok(certs) => {
                        for cert in certs {
                            if let Err(err) = root_store.add(cert) {
                                log::debug!(
                                    "skipping certificate from {}: {err}",
                                    path.display()
                                );
                            }
                        }
                    }
                    Err(err) => {
                        log::warn!("ignoring {}: {err}", path.display());
                    }
                }
            }
        }

        Ok(root_store)
    }
}

/// Parse a PEM bundle into DER certificates.
///
/// The bundle size is capped and the base64 alphabet checked before
/// decoding so a hostile file cannot exhaust memory.
pub fn load_pem_bundle(path: &Path) -> SslResult<Vec<CertificateDer<'static>>> {
    let display = path.display().to_string();
    let bytes = fs::read(path).map_err(|e| SslError::CertificateLoad {
        path: display.clone(),
        reason: e.to_string(),
    })?;

    if bytes.len() > 10_000_000 {
        return Err(SslError::CertificateLoad {
            path: display,
            reason: "certificate bundle larger than 10MB".into(),
        });
    }

    let text = String::from_utf8(bytes).map_err(|_| SslError::CertificateLoad {
        path: display.clone(),
        reason: "bundle contains invalid UTF-8".into(),
    })?;

    const MARKER_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const MARKER_END: &str = "-----END CERTIFICATE-----";

    let mut certificates = Vec::new();
    let mut start = 0;
    while let Some(b) = text[start..].find(MARKER_BEGIN) {
        let bpos = start + b + MARKER_BEGIN.len();
        let Some(e) = text[bpos..].find(MARKER_END) else {
            break;
        };
        let epos = bpos + e;
        let b64: String = text[bpos..epos]
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("");

        if b64
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '+' && c != '/' && c != '=')
        {
            return Err(SslError::CertificateLoad {
                path: display,
                reason: "invalid base64 characters in certificate".into(),
            });
        }

        match base64::engine::general_purpose::STANDARD.decode(&b64) {
            Ok(der) => certificates.push(CertificateDer::from(der)),
            Err(err) => {
                log::warn!("failed to decode certificate in {display}: {err}");
            }
        }
        start = epos + MARKER_END.len();
    }

    if certificates.is_empty() {
        return Err(SslError::CertificateLoad {
            path: display,
            reason: "no valid certificates found in PEM bundle".into(),
        });
    }
    Ok(certificates)
}

/// Resolve a host string into a rustls server name.
pub fn server_name(host: &str) -> SslResult<ServerName<'static>> {
    ServerName::try_from(host.to_string()).map_err(|e| SslError::ContextCreation {
        reason: format!("invalid server name '{host}': {e}"),
    })
}

/// Verifier that accepts every certificate (verify=false test mode only)
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
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
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}
