//! Prometheus-backed metrics provider.
//!
//! Issues instant queries against the Prometheus HTTP API. Each metric has
//! a PromQL template; operators can override the defaults when their metric
//! names differ. Templates may reference `{service}`, `{revision}`,
//! `{window}`, and (for latency) `{percentile}`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Uri};
use http_body_util::{BodyExt, Empty};
use rampline_core::{MetricsConfig, DEFAULT_REQUEST_TIMEOUT};
use tracing::debug;

use crate::provider::{PercentileReducer, Provider, ProviderError};

const DEFAULT_REQUEST_COUNT_QUERY: &str = "sum(increase(request_count_total{service=\"{service}\",revision=\"{revision}\"}[{window}]))";
const DEFAULT_LATENCY_QUERY: &str = "histogram_quantile({percentile}, sum(rate(request_latency_ms_bucket{service=\"{service}\",revision=\"{revision}\"}[{window}])) by (le))";
const DEFAULT_ERROR_RATE_QUERY: &str = "sum(rate(request_errors_total{service=\"{service}\",revision=\"{revision}\"}[{window}])) / sum(rate(request_count_total{service=\"{service}\",revision=\"{revision}\"}[{window}]))";

/// Metrics provider reading from a Prometheus server. Every query runs
/// under a per-request deadline.
pub struct PrometheusProvider {
    base_url: String,
    service: String,
    revision: Mutex<String>,
    request_timeout: Duration,
    request_count_query: String,
    latency_query: String,
    error_rate_query: String,
}

impl PrometheusProvider {
    /// Build a provider for one service from the `[metrics]` config section.
    pub fn new(config: &MetricsConfig, service: &str) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service: service.to_string(),
            revision: Mutex::new(String::new()),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            request_count_query: config
                .request_count_query
                .clone()
                .unwrap_or_else(|| DEFAULT_REQUEST_COUNT_QUERY.to_string()),
            latency_query: config
                .latency_query
                .clone()
                .unwrap_or_else(|| DEFAULT_LATENCY_QUERY.to_string()),
            error_rate_query: config
                .error_rate_query
                .clone()
                .unwrap_or_else(|| DEFAULT_ERROR_RATE_QUERY.to_string()),
        }
    }

    /// Replace the per-query deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn expand(&self, template: &str, offset: Duration, percentile: Option<f64>) -> String {
        let mut query = template
            .replace("{service}", &self.service)
            .replace("{revision}", &self.revision.lock().unwrap())
            .replace("{window}", &format!("{}s", offset.as_secs()));
        if let Some(p) = percentile {
            query = query.replace("{percentile}", &p.to_string());
        }
        query
    }

    /// Run an instant query and return the first sample value.
    ///
    /// An empty result set means no samples in the window and reads as 0.
    async fn query(&self, query: &str) -> Result<f64, ProviderError> {
        let url = format!(
            "{}/api/v1/query?query={}",
            self.base_url,
            percent_encode(query)
        );
        let body = match tokio::time::timeout(self.request_timeout, http_get(&url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(
                    format!("metrics query timed out after {:?}", self.request_timeout).into(),
                )
            }
        };
        let parsed: serde_json::Value = serde_json::from_slice(&body)?;

        if parsed["status"].as_str() != Some("success") {
            return Err(format!(
                "query failed: {}",
                parsed["error"].as_str().unwrap_or("unknown error")
            )
            .into());
        }
        let result = parsed["data"]["result"]
            .as_array()
            .ok_or("malformed query response: missing data.result")?;
        let Some(first) = result.first() else {
            debug!(query, "no samples in window");
            return Ok(0.0);
        };
        let raw = first["value"][1]
            .as_str()
            .ok_or("malformed query response: missing sample value")?;
        let value: f64 = raw.parse().map_err(|_| format!("bad sample value {raw:?}"))?;
        debug!(query, value, "instant query");
        // histogram_quantile over an empty range yields NaN.
        Ok(if value.is_nan() { 0.0 } else { value })
    }
}

#[async_trait]
impl Provider for PrometheusProvider {
    async fn request_count(&self, offset: Duration) -> Result<i64, ProviderError> {
        let query = self.expand(&self.request_count_query, offset, None);
        Ok(self.query(&query).await?.round() as i64)
    }

    async fn latency(
        &self,
        offset: Duration,
        reducer: PercentileReducer,
    ) -> Result<f64, ProviderError> {
        let query = self.expand(&self.latency_query, offset, Some(reducer.quantile()));
        self.query(&query).await
    }

    async fn error_rate(&self, offset: Duration) -> Result<f64, ProviderError> {
        let query = self.expand(&self.error_rate_query, offset, None);
        self.query(&query).await
    }

    fn set_candidate_revision(&self, revision: &str) {
        *self.revision.lock().unwrap() = revision.to_string();
    }
}

/// Minimal GET returning the response body, erroring on non-2xx.
async fn http_get(url: &str) -> Result<Bytes, ProviderError> {
    let uri: Uri = url.parse()?;
    let authority = uri
        .authority()
        .ok_or_else(|| format!("url {url} has no authority"))?
        .clone();
    let addr = match authority.port_u16() {
        Some(port) => format!("{}:{}", authority.host(), port),
        None => format!("{}:80", authority.host()),
    };

    let stream = tokio::net::TcpStream::connect(&addr).await?;
    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let path = uri
        .path_and_query()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .header("host", authority.as_str())
        .header("user-agent", "rampline/0.1")
        .body(Empty::<Bytes>::new())?;

    let resp = sender.send_request(req).await?;
    if !resp.status().is_success() {
        return Err(format!("metrics backend returned status {}", resp.status()).into());
    }
    Ok(resp.into_body().collect().await?.to_bytes())
}

/// Percent-encode a query string value.
fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            other => {
                out.push('%');
                out.push_str(&format!("{other:02X}"));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MetricsConfig {
        MetricsConfig {
            base_url: "http://localhost:9090".to_string(),
            request_timeout: None,
            request_count_query: None,
            latency_query: None,
            error_rate_query: None,
        }
    }

    #[test]
    fn expands_default_request_count_template() {
        let provider = PrometheusProvider::new(&config(), "default/my-api");
        provider.set_candidate_revision("my-api-00042");
        let query = provider.expand(
            &provider.request_count_query,
            Duration::from_secs(300),
            None,
        );
        assert_eq!(
            query,
            "sum(increase(request_count_total{service=\"default/my-api\",revision=\"my-api-00042\"}[300s]))"
        );
    }

    #[test]
    fn expands_latency_template_with_quantile() {
        let provider = PrometheusProvider::new(&config(), "default/my-api");
        provider.set_candidate_revision("my-api-00042");
        let query = provider.expand(&provider.latency_query, Duration::from_secs(300), Some(0.99));
        assert!(query.starts_with("histogram_quantile(0.99, "));
        assert!(query.contains("revision=\"my-api-00042\""));
        assert!(query.contains("[300s]"));
    }

    #[test]
    fn config_overrides_replace_templates() {
        let mut cfg = config();
        cfg.error_rate_query = Some("my_error_fraction{rev=\"{revision}\"}".to_string());
        let provider = PrometheusProvider::new(&cfg, "default/my-api");
        provider.set_candidate_revision("r1");
        let query = provider.expand(&provider.error_rate_query, Duration::from_secs(60), None);
        assert_eq!(query, "my_error_fraction{rev=\"r1\"}");
    }

    #[tokio::test]
    async fn slow_backend_hits_the_query_deadline() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // Accept and hold the connection open without answering.
            let _sock = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut cfg = config();
        cfg.base_url = format!("http://{addr}");
        let provider = PrometheusProvider::new(&cfg, "default/my-api")
            .with_request_timeout(Duration::from_millis(100));

        let err = provider.error_rate(Duration::from_secs(60)).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got {err}");
    }

    #[test]
    fn percent_encoding() {
        assert_eq!(percent_encode("abc-123_.~"), "abc-123_.~");
        assert_eq!(
            percent_encode("sum(rate(x[60s]))"),
            "sum%28rate%28x%5B60s%5D%29%29"
        );
        assert_eq!(percent_encode("a b"), "a%20b");
    }
}
