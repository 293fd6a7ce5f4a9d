//! ---
//! pvz_section: "02-scenario"
//! pvz_subsection: "module"
//! pvz_type: "source"
//! pvz_scope: "code"
//! pvz_description: "HTTP transport seam between the scenario and the target service."
//! pvz_version: "v0.1.0"
//! pvz_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::error::TransportError;
use crate::model::SessionToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request issued by a scenario step. `path` is relative to the base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
    pub bearer: Option<SessionToken>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: &'static str) -> Self {
        Self {
            method: Method::Get,
            path,
            query: Vec::new(),
            bearer: None,
            body: None,
        }
    }

    pub fn post(path: &'static str, body: &impl Serialize) -> Result<Self, TransportError> {
        Ok(Self {
            method: Method::Post,
            path,
            query: Vec::new(),
            bearer: None,
            body: Some(serde_json::to_value(body).map_err(TransportError::Encode)?),
        })
    }

    pub fn with_bearer(mut self, token: &SessionToken) -> Self {
        self.bearer = Some(token.clone());
        self
    }

    pub fn with_query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Sends scenario requests to the service under test.
#[async_trait]
pub trait HttpTransport: Send + Sync + 'static {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// [`HttpTransport`] backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: &Url) -> Self {
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self
            .base_url
            .join(request.path.trim_start_matches('/'))
            .map_err(|source| TransportError::Url {
                path: request.path.to_owned(),
                source,
            })?;
        let request_error = |source| TransportError::Request {
            url: url.to_string(),
            source,
        };

        let mut builder = match request.method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        }
        .header(CONTENT_TYPE, "application/json");
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(request_error)?;
        Ok(ApiResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_gains_trailing_slash() {
        let base = Url::parse("http://pvz.internal:9000/api").unwrap();
        let transport = ReqwestTransport::with_client(Client::new(), &base);
        assert_eq!(transport.base_url().as_str(), "http://pvz.internal:9000/api/");
        assert_eq!(
            transport.base_url().join("pvz").unwrap().as_str(),
            "http://pvz.internal:9000/api/pvz"
        );
    }

    #[test]
    fn request_builders_accumulate_parts() {
        let request = ApiRequest::get("pvz").with_query("page", 1).with_query("limit", 10);
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.query,
            vec![("page", "1".to_owned()), ("limit", "10".to_owned())]
        );
        assert!(request.bearer.is_none());
    }
}
