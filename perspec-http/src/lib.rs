//! Minimal HTTP client with safe logging, retries, and bearer auth.
//!
//! - Request options: `Auth`, query params, timeout, retries
//! - Redacts secret query params and never logs credential values
//! - Retries network errors, 429 and 5xx with exponential backoff and
//!   `Retry-After` support
//! - JSON helpers (`get_json`, `post_json`) and a streaming POST
//!   (`post_stream`) that hands back the response body as a byte stream
//! - Optional *raw* request/response logging via `PERSPEC_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```rust
//! # async fn demo() -> Result<(), perspec_http::HttpError> {
//! let client = perspec_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", perspec_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, Method, Response, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

pub use reqwest::StatusCode;

const RAW_ENV: &str = "PERSPEC_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

static REQUEST_SEQ: AtomicU64 = AtomicU64::new(1);

fn raw_enabled() -> bool {
    matches!(
        std::env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Byte stream of a response body still being received.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, HttpError>> + Send>>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

impl HttpError {
    /// Status code for API errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Authentication strategies supported by the client.
///
/// ```
/// use perspec_http::Auth;
///
/// let bearer = Auth::Bearer("token");
/// assert!(matches!(bearer, Auth::Bearer("token")));
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// Authorization: Bearer <token>
    Bearer(&'a str),
    None,
}

/// Per-request tuning knobs.
///
/// ```
/// use perspec_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     auth: Some(Auth::Bearer("demo")),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// A trailing `/` is added to the base so relative paths append to it.
    ///
    /// ```no_run
    /// use perspec_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com/v1")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(15));
    /// assert_eq!(client.max_retries, 2);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: Duration::from_secs(15),
            max_retries: 2,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        let (req_id, resp) = self.send(Method::GET, path, None, &opts).await?;
        decode_json(&req_id, resp).await
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let (req_id, resp) = self.send(Method::POST, path, Some(bytes), &opts).await?;
        decode_json(&req_id, resp).await
    }

    /// POST a JSON body and return the successful response body as a stream.
    ///
    /// Non-success statuses are reported (and retried) before any byte is
    /// handed out. Dropping the stream closes the connection.
    pub async fn post_stream<B>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<ByteStream, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let bytes = serde_json::to_vec(body).map_err(|e| HttpError::Build(e.to_string()))?;
        let (req_id, resp) = self.send(Method::POST, path, Some(bytes), &opts).await?;
        tracing::debug!(req_id = %req_id, "http.response.stream_open");
        Ok(Box::pin(
            resp.bytes_stream().map(|chunk| chunk.map_err(HttpError::from_reqwest)),
        ))
    }

    fn resolve(&self, path: &str) -> Result<Url, HttpError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    /// Send with retries; returns the first successful response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        opts: &RequestOpts<'_>,
    ) -> Result<(String, Response), HttpError> {
        let url = self.resolve(path)?;
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let req_id = format!("r{:06}", REQUEST_SEQ.fetch_add(1, Ordering::Relaxed));
        let auth_kind = match &opts.auth {
            Some(Auth::Bearer(_)) => "bearer",
            Some(Auth::None) | None => "none",
        };
        let bearer = match &opts.auth {
            Some(Auth::Bearer(tok)) => Some(sanitize_api_key(tok)?),
            _ => None,
        };
        let pairs: Vec<(&str, &str)> = opts
            .query
            .as_ref()
            .map(|q| q.iter().map(|(k, v)| (*k, v.as_ref())).collect())
            .unwrap_or_default();

        let mut attempt = 0usize;
        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if !pairs.is_empty() {
                rb = rb.query(&pairs);
            }
            if let Some(tok) = &bearer {
                rb = rb.bearer_auth(tok);
            }
            if let Some(bytes) = &body {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }

            tracing::debug!(
                req_id = %req_id,
                attempt = attempt + 1,
                max_retries,
                method = %method,
                host_path = %format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                query = ?redact_pairs(&pairs),
                timeout_ms = timeout.as_millis() as u64,
                auth_kind,
                has_body = body.is_some(),
                "http.request.start"
            );
            if raw_enabled() {
                let curl = make_curl(&method, &url, &pairs, body.as_deref());
                tracing::debug!(target: "http.raw", req_id = %req_id, %curl, "request");
            }

            let t0 = Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let error = HttpError::from_reqwest(err);
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id = %req_id,
                            attempt,
                            max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            error = %error,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(req_id = %req_id, attempt, error = %error, "http.network_error");
                    return Err(error);
                }
            };

            let status = resp.status();
            let headers = resp.headers().clone();
            tracing::debug!(
                req_id = %req_id,
                %status,
                duration_ms = t0.elapsed().as_millis() as u64,
                rate_limit.remaining = ?header_str(&headers, "x-rate-limit-remaining"),
                rate_limit.reset = ?header_str(&headers, "x-rate-limit-reset"),
                "http.response.headers"
            );

            if status.is_success() {
                return Ok((req_id, resp));
            }

            let bytes = resp.bytes().await.unwrap_or_default();
            let message = extract_error_message(&bytes);
            let snippet = snip_body(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();

            if retryable && attempt < max_retries {
                attempt += 1;
                let delay = match retry_after_secs(&headers) {
                    Some(secs) => Duration::from_secs(secs),
                    None if status == StatusCode::TOO_MANY_REQUESTS => {
                        backoff(attempt).max(Duration::from_millis(1100))
                    }
                    None => backoff(attempt),
                };
                tracing::warn!(
                    req_id = %req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    message = %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            let request_id = header_str(&headers, "x-request-id")
                .or_else(|| header_str(&headers, "x-transaction-id"))
                .unwrap_or("-")
                .to_string();
            tracing::warn!(
                req_id = %req_id,
                %status,
                message = %message,
                x_request_id = %request_id,
                body_snippet = %snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }
    }
}

async fn decode_json<T: DeserializeOwned>(req_id: &str, resp: Response) -> Result<T, HttpError> {
    let bytes = resp.bytes().await.map_err(HttpError::from_reqwest)?;

    if raw_enabled() {
        let end = bytes.len().min(RAW_MAX_BODY);
        tracing::info!(
            target: "http.raw",
            req_id = %req_id,
            body = %String::from_utf8_lossy(&bytes[..end]),
            truncated = bytes.len() > RAW_MAX_BODY
        );
    }

    serde_json::from_slice::<T>(&bytes).map_err(|e| {
        let snippet = snip_body(&bytes);
        tracing::warn!(
            req_id = %req_id,
            serde_err = %e,
            body_snippet = %snippet,
            "http.response.decode_error"
        );
        HttpError::Decode(e.to_string(), snippet)
    })
}

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(10)))
}

fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn retry_after_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn is_secret_param(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "access_token" | "authorization" | "auth" | "key" | "api_key" | "token" | "secret"
    )
}

fn redact_pairs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(k, v)| {
            let value = if is_secret_param(k) {
                "<redacted>".to_string()
            } else {
                (*v).to_string()
            };
            ((*k).to_string(), value)
        })
        .collect()
}

/// Best-effort curl line for repro/debug. Auth is always redacted.
fn make_curl(method: &Method, url: &Url, pairs: &[(&str, &str)], body: Option<&[u8]>) -> String {
    let mut shown = url.clone();
    if !pairs.is_empty() {
        let mut qp = shown.query_pairs_mut();
        for (k, v) in redact_pairs(pairs) {
            qp.append_pair(&k, &v);
        }
    }
    let mut parts = vec![
        "curl".to_string(),
        format!("-X{method}"),
        "-H 'Authorization: Bearer <redacted>'".to_string(),
    ];
    if let Some(bytes) = body {
        let mut s = String::from_utf8_lossy(bytes).to_string();
        if s.len() > RAW_MAX_BODY {
            s.truncate(floor_char_boundary(&s, RAW_MAX_BODY));
            s.push_str("...");
        }
        parts.push(format!("-d '{}'", s.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", shown.as_str()));
    parts.join(" ")
}

/// Pull a human-readable message out of an error body.
///
/// Understands OpenAI (`{"error":{"message"}}`), Twitter
/// (`{"errors":[{"message"|"detail"|"title"}]}` or `{"detail","title"}`),
/// and falls back to a body snippet.
fn extract_error_message(body: &[u8]) -> String {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return snip_body(body);
    };
    let candidates = [
        value.pointer("/error/message"),
        value.pointer("/errors/0/message"),
        value.pointer("/errors/0/detail"),
        value.pointer("/errors/0/title"),
        value.get("detail"),
        value.get("message"),
        value.get("title"),
        value.get("error"),
    ];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|v| v.as_str())
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| snip_body(body))
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(body).to_string();
    if snip.len() > SNIPPET_MAX {
        snip.truncate(floor_char_boundary(&snip, SNIPPET_MAX));
        snip.push_str("...");
    }
    snip
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn sanitize_api_key(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if s.is_empty() {
        return Err(HttpError::Build("API key is empty".into()));
    }
    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_from_known_shapes() {
        let openai = br#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
        assert_eq!(extract_error_message(openai), "Rate limit reached");

        let twitter = br#"{"errors":[{"detail":"Could not find user"}]}"#;
        assert_eq!(extract_error_message(twitter), "Could not find user");

        let problem = br#"{"title":"Unauthorized","detail":"Unauthorized","status":401}"#;
        assert_eq!(extract_error_message(problem), "Unauthorized");

        assert_eq!(extract_error_message(b"gateway down"), "gateway down");
    }

    #[test]
    fn api_keys_are_cleaned() {
        assert_eq!(sanitize_api_key(" \"sk-abc\n\" ").unwrap(), "sk-abc");
        assert!(sanitize_api_key("   ").is_err());
        assert!(sanitize_api_key("sk-\u{e9}").is_err());
    }

    #[test]
    fn secret_params_are_redacted() {
        let redacted = redact_pairs(&[("query", "from:1"), ("api_key", "hunter2")]);
        assert_eq!(redacted[0].1, "from:1");
        assert_eq!(redacted[1].1, "<redacted>");
    }

    #[test]
    fn snippets_respect_char_boundaries() {
        let body = "é".repeat(400);
        let snip = snip_body(body.as_bytes());
        assert!(snip.ends_with("..."));
        assert!(snip.len() <= SNIPPET_MAX + 3);
    }

    #[test]
    fn base_gets_trailing_slash() {
        let client = HttpClient::new("https://api.openai.com/v1").unwrap();
        let url = client.resolve("chat/completions").unwrap();
        assert_eq!(url.as_str(), "https://api.openai.com/v1/chat/completions");
    }
}
