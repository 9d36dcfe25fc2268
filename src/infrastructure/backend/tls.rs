//! Selectable-mode TLS credentials for outbound backend channels.
//!
//! The channel factory turns a [`TlsMode`] into one pooled [`reqwest::Client`]
//! built once at startup. Misconfiguration (a missing or unparseable custom CA
//! bundle, an unloadable trust store) fails construction, never the first
//! request: a wrong security posture must abort the process rather than
//! silently degrade.

use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Transport security posture for outbound backend connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// Plain HTTP, no encryption. Legacy/demo default.
    Insecure,
    /// TLS verified against the OS trust store, minimum TLS 1.2.
    System,
    /// TLS without server identity verification. Test environments only.
    SkipVerify,
    /// TLS verified against a custom CA bundle loaded from a PEM file.
    Custom,
}

impl TlsMode {
    /// Parses the `BACKEND_TLS_MODE` value.
    ///
    /// Unknown values fall back to [`TlsMode::Insecure`] with a warning, which
    /// matches the historical behavior of the insecure-by-default demo flag.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "insecure" => Self::Insecure,
            "true" | "system" => Self::System,
            "skip-verify" => Self::SkipVerify,
            "custom" => Self::Custom,
            other => {
                tracing::warn!(mode = other, "unknown BACKEND_TLS_MODE, using insecure");
                Self::Insecure
            }
        }
    }

    /// URL scheme matching this posture.
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Insecure => "http",
            _ => "https",
        }
    }
}

/// Construction-time failure of the channel factory.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("BACKEND_TLS_CA_CERT must be set when BACKEND_TLS_MODE=custom")]
    MissingCaPath,

    #[error("failed to read CA certificate from {path}")]
    CaRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CA certificate bundle at {path}")]
    CaInvalid {
        path: PathBuf,
        #[source]
        source: reqwest::Error,
    },

    #[error("no certificates found in {path}")]
    CaEmpty { path: PathBuf },

    #[error("failed to build backend HTTP client")]
    Build(#[source] reqwest::Error),
}

/// Builds and owns the pooled outbound client for one TLS posture.
pub struct ChannelFactory {
    mode: TlsMode,
    client: reqwest::Client,
}

impl ChannelFactory {
    /// Builds credentials for `mode`, reading the CA bundle from `ca_path`
    /// when the mode is [`TlsMode::Custom`].
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when the CA file is missing, unreadable, or
    /// contains no valid certificate, or when the TLS backend cannot be
    /// initialized (e.g. the system trust store is unavailable).
    pub fn new(
        mode: TlsMode,
        ca_path: Option<&Path>,
        connect_timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let mut builder = reqwest::Client::builder().connect_timeout(connect_timeout);

        match mode {
            TlsMode::Insecure => {
                tracing::warn!("backend connections are NOT encrypted (BACKEND_TLS_MODE=insecure)");
            }
            TlsMode::System => {
                tracing::info!("backend TLS: system trust store, minimum TLS 1.2");
                builder = builder
                    .use_rustls_tls()
                    .min_tls_version(reqwest::tls::Version::TLS_1_2);
            }
            TlsMode::SkipVerify => {
                tracing::warn!(
                    "backend TLS certificate verification is DISABLED - do not use in production"
                );
                builder = builder
                    .use_rustls_tls()
                    .min_tls_version(reqwest::tls::Version::TLS_1_2)
                    .danger_accept_invalid_certs(true);
            }
            TlsMode::Custom => {
                let path = ca_path.ok_or(ChannelError::MissingCaPath)?;
                let pem = std::fs::read(path).map_err(|source| ChannelError::CaRead {
                    path: path.to_path_buf(),
                    source,
                })?;
                // The bundle is parsed eagerly: `Certificate::from_pem` accepts
                // input with zero certificates, which would defer the failure
                // to the first backend call.
                let certificates = reqwest::Certificate::from_pem_bundle(&pem).map_err(
                    |source| ChannelError::CaInvalid {
                        path: path.to_path_buf(),
                        source,
                    },
                )?;
                if certificates.is_empty() {
                    return Err(ChannelError::CaEmpty {
                        path: path.to_path_buf(),
                    });
                }
                tracing::info!(
                    ca = %path.display(),
                    certificates = certificates.len(),
                    "backend TLS: custom CA bundle"
                );
                builder = builder
                    .use_rustls_tls()
                    .min_tls_version(reqwest::tls::Version::TLS_1_2)
                    .tls_built_in_root_certs(false);
                for certificate in certificates {
                    builder = builder.add_root_certificate(certificate);
                }
            }
        }

        let client = builder.build().map_err(ChannelError::Build)?;
        Ok(Self { mode, client })
    }

    pub fn mode(&self) -> TlsMode {
        self.mode
    }

    /// The pooled client. Cloning is cheap; the connection pool is shared.
    pub fn client(&self) -> reqwest::Client {
        self.client.clone()
    }

    /// URL scheme backends must be addressed with under this posture.
    pub fn scheme(&self) -> &'static str {
        self.mode.scheme()
    }
}
