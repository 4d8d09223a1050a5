//! Transport Client: request envelopes, response decoding, and I/O.
//!
//! # Design
//! `TransportClient` does the parts of a round-trip that are the same for
//! every operation. It builds the envelope (absolute url, `Content-Type`,
//! bearer token, JSON body) and decodes the answer (2xx to JSON, anything
//! else to `PortalError::Transport`). It does not cache, retry or dedupe.
//!
//! Executing the request is behind the `Transport` trait so the router and
//! normalizer stay deterministic. `UreqTransport` is the blocking network
//! implementation; it reports 4xx/5xx as data and only fails with
//! `PortalError::Network` when no response was obtained. No timeout is set.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::backend::Target;
use crate::error::PortalError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PortalError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PortalError> {
        (**self).execute(request)
    }
}

#[derive(Debug, Clone)]
pub struct TransportClient {
    target: Target,
    token: Option<String>,
}

impl TransportClient {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        headers
    }

    /// Build the request for `path` (which may carry a query string).
    pub fn request<B: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        extra_headers: &[(String, String)],
    ) -> Result<HttpRequest, PortalError> {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| PortalError::Serialization(e.to_string()))?;

        let mut headers = self.headers();
        headers.extend(extra_headers.iter().cloned());

        let request = HttpRequest {
            method,
            url: self.target.url(path),
            headers,
            body,
        };
        debug!(method = %request.method, url = %request.url, backend = %self.target.variant, "built request");
        Ok(request)
    }

    /// Body-less shorthand for reads.
    pub fn get(&self, path: &str) -> HttpRequest {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: self.target.url(path),
            headers: self.headers(),
            body: None,
        };
        debug!(url = %request.url, backend = %self.target.variant, "built request");
        request
    }

    /// Check the status and parse the body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    pub fn decode(&self, response: HttpResponse) -> Result<Value, PortalError> {
        if !response.is_success() {
            return Err(PortalError::transport(
                self.target.variant,
                response.status,
                response.body,
            ));
        }
        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&response.body).map_err(|e| PortalError::MalformedResponse(e.to_string()))
    }

    /// Build, execute, decode.
    pub fn send<T: Transport + ?Sized, B: Serialize + ?Sized>(
        &self,
        transport: &T,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        extra_headers: &[(String, String)],
    ) -> Result<Value, PortalError> {
        let request = self.request(method, path, body, extra_headers)?;
        let response = transport.execute(&request)?;
        self.decode(response)
    }
}

/// Blocking transport over `ureq`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl Default for UreqTransport {
    fn default() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, PortalError> {
        let network = |e: ureq::Error| PortalError::Network(e.to_string());

        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post | HttpMethod::Put => {
                let mut builder = if request.method == HttpMethod::Post {
                    self.agent.post(&request.url)
                } else {
                    self.agent.put(&request.url)
                };
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };
        let mut response = result.map_err(network)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
            .collect();
        let body = response.body_mut().read_to_string().map_err(network)?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
