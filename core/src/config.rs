//! Client configuration.
//!
//! `ClientConfig` deserializes from any serde format, so hosts can embed it
//! in their own config files; every field has a default.

use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "https://api.trackrecordpro.co.uk/";
pub const DEFAULT_VERSION: &str = "3.0";
pub const DEFAULT_ORDER_HEADER: &str = "X-Order-By";
pub const DEFAULT_DESCENDING_MARKER: &str = "-";
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub version: String,
    pub user_agent: String,
    /// PEM file holding the client certificate and its private key.
    pub certificate: PathBuf,
    pub order_header: String,
    pub descending_marker: String,
    /// Larger response bodies fail with a transport error instead of being
    /// classified.
    pub max_response_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            version: DEFAULT_VERSION.to_string(),
            user_agent: concat!("tablerest/", env!("CARGO_PKG_VERSION")).to_string(),
            certificate: PathBuf::new(),
            order_header: DEFAULT_ORDER_HEADER.to_string(),
            descending_marker: DEFAULT_DESCENDING_MARKER.to_string(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

impl ClientConfig {
    pub fn new(certificate: impl Into<PathBuf>) -> Self {
        Self {
            certificate: certificate.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_order_header(mut self, header: impl Into<String>, descending_marker: impl Into<String>) -> Self {
        self.order_header = header.into();
        self.descending_marker = descending_marker.into();
        self
    }

    pub fn with_max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// `{base_url}/{version}/`, with no doubled slashes at the joins.
    pub fn endpoint_base(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let version = self.version.trim_matches('/');
        if version.is_empty() {
            format!("{base}/")
        } else {
            format!("{base}/{version}/")
        }
    }
}
