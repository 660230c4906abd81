//! HTTP implementation of the platform client.
//!
//! Talks JSON to the platform's REST API with a hand-rolled hyper
//! connection per request. Good enough for a controller that issues a
//! handful of calls per tick; no pooling. Every call runs under a
//! per-request deadline.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use rampline_core::DEFAULT_REQUEST_TIMEOUT;
use tracing::debug;

use crate::client::{ClientError, ClientResult, PlatformClient};
use crate::service::Service;

/// Platform client backed by the platform's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    base_url: String,
    request_timeout: Duration,
}

impl HttpPlatformClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Replace the per-call deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn service_url(&self, namespace: &str, name: &str) -> String {
        format!(
            "{}/v1/namespaces/{}/services/{}",
            self.base_url, namespace, name
        )
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<(StatusCode, Bytes)> {
        match tokio::time::timeout(self.request_timeout, self.exchange(method, url, body)).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout(self.request_timeout)),
        }
    }

    /// One HTTP exchange, without the deadline applied.
    async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> ClientResult<(StatusCode, Bytes)> {
        let uri: Uri = url
            .parse()
            .map_err(|e| ClientError::Http(format!("bad url {url}: {e}")))?;
        let authority = uri
            .authority()
            .ok_or_else(|| ClientError::Http(format!("url {url} has no authority")))?
            .clone();
        let addr = match authority.port_u16() {
            Some(port) => format!("{}:{}", authority.host(), port),
            None => format!("{}:80", authority.host()),
        };

        let stream = tokio::net::TcpStream::connect(&addr)
            .await
            .map_err(|e| ClientError::Http(format!("connect {addr}: {e}")))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ClientError::Http(format!("handshake {addr}: {e}")))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("host", authority.as_str())
            .header("content-type", "application/json")
            .header("user-agent", "rampline/0.1")
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ClientError::Http(format!("request {url}: {e}")))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::Http(format!("read body from {url}: {e}")))?
            .to_bytes();
        debug!(%url, status = status.as_u16(), bytes = bytes.len(), "platform call");
        Ok((status, bytes))
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn get_service(&self, namespace: &str, name: &str) -> ClientResult<Service> {
        let url = self.service_url(namespace, name);
        let (status, body) = self.request(Method::GET, &url, None).await?;
        match status {
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(format!("{namespace}/{name}"))),
            s if s.is_success() => Ok(serde_json::from_slice(&body)?),
            s => Err(ClientError::Status(s.as_u16())),
        }
    }

    async fn replace_service(
        &self,
        namespace: &str,
        name: &str,
        svc: &Service,
    ) -> ClientResult<Service> {
        let url = self.service_url(namespace, name);
        let payload = serde_json::to_vec(svc)?;
        let (status, body) = self.request(Method::PUT, &url, Some(payload)).await?;
        match status {
            StatusCode::CONFLICT => Err(ClientError::Conflict(format!("{namespace}/{name}"))),
            StatusCode::NOT_FOUND => Err(ClientError::NotFound(format!("{namespace}/{name}"))),
            s if s.is_success() => Ok(serde_json::from_slice(&body)?),
            s => Err(ClientError::Status(s.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_urls() {
        let client = HttpPlatformClient::new("http://platform:8443/");
        assert_eq!(
            client.service_url("default", "my-api"),
            "http://platform:8443/v1/namespaces/default/services/my-api"
        );
    }

    #[tokio::test]
    async fn connect_failure_is_an_http_error() {
        // Nothing listens on port 1.
        let client = HttpPlatformClient::new("http://127.0.0.1:1");
        let err = client.get_service("default", "my-api").await.unwrap_err();
        assert!(matches!(err, ClientError::Http(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_platform_hits_the_request_deadline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection open without answering.
            let _sock = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let client = HttpPlatformClient::new(&format!("http://{addr}"))
            .with_request_timeout(Duration::from_millis(100));
        let err = client.get_service("default", "my-api").await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(_)), "got {err:?}");
    }
}
