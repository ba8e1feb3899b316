//! The network seam.
//!
//! # Design
//! A [`Transport`] executes one composed [`HttpRequest`] and hands back
//! whatever the server answered, whatever the status code. It fails only
//! when no response was obtained at all (DNS, TCP, TLS...). Any
//! `FnMut(&HttpRequest) -> Result<HttpResponse, TransportError>` closure is a
//! transport, which lets hosts drive their own I/O and lets tests script the
//! server.

use std::borrow::Cow;

use ureq::tls::{ClientCert, PemItem, TlsConfig};
use ureq::Agent;

use crate::config::DEFAULT_MAX_RESPONSE_BYTES;
use crate::credential::Credential;
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

pub trait Transport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: FnMut(&HttpRequest) -> Result<HttpResponse, TransportError>,
{
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Blocking transport backed by a `ureq` agent presenting the client
/// certificate. Redirects are followed; non-2xx statuses are returned as data.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
    body_limit: u64,
}

impl UreqTransport {
    pub fn new(credential: &Credential) -> Result<Self, ApiError> {
        let invalid = |reason: String| ApiError::InvalidCredential {
            path: credential.path().to_path_buf(),
            reason,
        };

        let mut chain = Vec::new();
        let mut key = None;
        for item in ureq::tls::parse_pem(credential.pem()) {
            match item.map_err(|e| invalid(e.to_string()))? {
                PemItem::Certificate(cert) => chain.push(cert),
                PemItem::PrivateKey(k) => key = Some(k),
                _ => {}
            }
        }

        let tls = match key {
            Some(key) => TlsConfig::builder()
                .client_cert(Some(ClientCert::new_with_certs(&chain, key)))
                .build(),
            None => {
                tracing::warn!(
                    path = %credential.path().display(),
                    "credential has no private key, client certificate will not be presented"
                );
                TlsConfig::builder().build()
            }
        };

        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(tls)
            .build()
            .new_agent();
        Ok(Self {
            agent,
            body_limit: DEFAULT_MAX_RESPONSE_BYTES,
        })
    }

    /// Cap on the response body size; reading past it is a transport error.
    pub fn with_body_limit(mut self, limit: u64) -> Self {
        self.body_limit = limit;
        self
    }
}

impl Transport for UreqTransport {
    fn send(&mut self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = wire_url(&request.url);
        let url = url.as_ref();
        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), request).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), request).call(),
            HttpMethod::Post => {
                let builder = with_headers(self.agent.post(url), request);
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
            HttpMethod::Put => {
                let builder = with_headers(self.agent.put(url), request);
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();
        let body = response.body_mut().with_config().limit(self.body_limit).read_to_string()?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// The `<` and `>` filter operators are not valid URI characters for the
/// `http` crate, so they go out percent-encoded.
fn wire_url(url: &str) -> Cow<'_, str> {
    if url.contains(['<', '>']) {
        Cow::Owned(url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        Cow::Borrowed(url)
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}
