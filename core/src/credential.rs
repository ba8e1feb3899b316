//! Client certificate loading.
//!
//! The certificate is validated once, when the client is built, so a bad
//! path, a file that is not PEM, or PEM armor around something other than an
//! X.509 certificate fails before any request is attempted.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rustls_pki_types::pem::PemObject;
use rustls_pki_types::CertificateDer;
use webpki::EndEntityCert;

use crate::error::ApiError;

/// A validated PEM client credential.
///
/// Keeps the raw PEM text; transports hand it to their TLS stack.
#[derive(Debug, Clone)]
pub struct Credential {
    path: PathBuf,
    pem: Vec<u8>,
    certificates: Vec<CertificateDer<'static>>,
}

impl Credential {
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ApiError::CredentialNotFound {
                path: path.to_path_buf(),
            },
            _ => ApiError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_pem(path, pem)
    }

    /// Validate in-memory PEM text. `path` is only used in error messages.
    pub fn from_pem(path: impl Into<PathBuf>, pem: Vec<u8>) -> Result<Self, ApiError> {
        let path = path.into();
        let certificates = CertificateDer::pem_slice_iter(&pem)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ApiError::InvalidCredential {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        if certificates.is_empty() {
            return Err(ApiError::InvalidCredential {
                path,
                reason: "no CERTIFICATE section".to_string(),
            });
        }
        for cert in &certificates {
            EndEntityCert::try_from(cert).map_err(|e| ApiError::InvalidCredential {
                path: path.clone(),
                reason: format!("not an X.509 certificate: {e}"),
            })?;
        }
        tracing::debug!(path = %path.display(), certificates = certificates.len(), "loaded client credential");
        Ok(Self {
            path,
            pem,
            certificates,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pem(&self) -> &[u8] {
        &self.pem
    }

    pub fn certificates(&self) -> &[CertificateDer<'static>] {
        &self.certificates
    }
}
