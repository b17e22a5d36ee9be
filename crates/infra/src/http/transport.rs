//! Single-attempt HTTP transport
//!
//! `ReqwestTransport` turns a buffered [`TransportRequest`] into one
//! `reqwest` call. Proxy, timeout and multipart encoding are handled here;
//! retries and token handling belong to the session.

use std::time::Duration;

use async_trait::async_trait;
use boxsdk_domain::ClientConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Client as ReqwestClient, Proxy};
use tracing::debug;

use super::envelope::{ResponseEnvelope, TransportBody, TransportRequest};
use crate::errors::TransportError;

/// Performs one HTTP attempt. Retries live in the session.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: TransportRequest) -> Result<ResponseEnvelope, TransportError>;
}

/// [`Transport`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Build a client with the configured timeout and proxy.
    ///
    /// # Errors
    /// Returns `TransportError::InvalidRequest` for a bad proxy setting and
    /// `TransportError::Http` when the client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let mut builder = ReqwestClient::builder().timeout(Duration::from_secs(config.timeout_secs));
        if let Some(proxy) = &config.proxy {
            let proxy_url =
                proxy.proxy_url().map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
            builder = builder.proxy(
                Proxy::all(&proxy_url).map_err(|e| TransportError::InvalidRequest(e.to_string()))?,
            );
        }
        Ok(Self { client: builder.build()? })
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: TransportRequest) -> Result<ResponseEnvelope, TransportError> {
        let TransportRequest { method, url, mut headers, body } = request;
        let mut builder = self.client.request(method, &url);

        builder = match body {
            TransportBody::Empty => builder,
            TransportBody::Bytes { content, content_type } => {
                if let Some(content_type) = content_type {
                    if !headers.contains_key(CONTENT_TYPE) {
                        let value = content_type
                            .parse()
                            .map_err(|_| TransportError::InvalidRequest(content_type.clone()))?;
                        headers.insert(CONTENT_TYPE, value);
                    }
                }
                builder.body(content)
            }
            TransportBody::Multipart(parts) => {
                // reqwest sets the boundary itself
                headers.remove(CONTENT_TYPE);
                let mut form = Form::new();
                for part in parts {
                    let mut field = Part::bytes(part.content);
                    if let Some(file_name) = part.file_name {
                        field = field.file_name(file_name);
                    }
                    if let Some(content_type) = part.content_type {
                        field = field
                            .mime_str(&content_type)
                            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                    }
                    form = form.part(part.name, field);
                }
                builder.multipart(form)
            }
        };

        let response = builder.headers(headers).send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        debug!(%url, status, bytes = body.len(), "received HTTP response");

        Ok(ResponseEnvelope::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;
    use reqwest::Method;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::http::TransportPart;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(&ClientConfig::default()).expect("transport")
    }

    #[tokio::test]
    async fn sends_bytes_with_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2.0/folders"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"name":"a"}"#))
            .respond_with(ResponseTemplate::new(201).set_body_string(r#"{"id":"1"}"#))
            .expect(1)
            .mount(&server)
            .await;

        let response = transport()
            .execute(TransportRequest {
                method: Method::POST,
                url: format!("{}/2.0/folders", server.uri()),
                headers: HeaderMap::new(),
                body: TransportBody::Bytes {
                    content: br#"{"name":"a"}"#.to_vec(),
                    content_type: Some("application/json".to_string()),
                },
            })
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert!(response.ok);
        assert_eq!(response.body, br#"{"id":"1"}"#.to_vec());
    }

    #[tokio::test]
    async fn caller_content_type_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("content-type", "application/json-patch+json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, "application/json-patch+json".parse().unwrap());
        transport()
            .execute(TransportRequest {
                method: Method::PUT,
                url: server.uri(),
                headers,
                body: TransportBody::Bytes {
                    content: b"[]".to_vec(),
                    content_type: Some("application/json".to_string()),
                },
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sends_multipart_form() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/2.0/files/content"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        transport()
            .execute(TransportRequest {
                method: Method::POST,
                url: format!("{}/api/2.0/files/content", server.uri()),
                headers: HeaderMap::new(),
                body: TransportBody::Multipart(vec![
                    TransportPart {
                        name: "attributes".to_string(),
                        file_name: None,
                        content_type: None,
                        content: br#"{"name":"a.txt"}"#.to_vec(),
                    },
                    TransportPart {
                        name: "file".to_string(),
                        file_name: Some("a.txt".to_string()),
                        content_type: Some("text/plain".to_string()),
                        content: b"hello".to_vec(),
                    },
                ]),
            })
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("filename=\"a.txt\""));
        assert!(body.contains("hello"));
    }

    #[test]
    fn rejects_half_configured_proxy() {
        let mut config = ClientConfig::default();
        config.proxy = Some(boxsdk_domain::ProxyConfig {
            url: "http://proxy:3128".to_string(),
            user: Some("u".to_string()),
            password: None,
        });
        assert!(matches!(ReqwestTransport::new(&config), Err(TransportError::InvalidRequest(_))));
    }

    #[test]
    fn accepts_authenticated_proxy() {
        let mut config = ClientConfig::default();
        config.proxy =
            Some(boxsdk_domain::ProxyConfig::new("http://proxy:3128").with_auth("u", "p"));
        assert!(ReqwestTransport::new(&config).is_ok());
    }
}
