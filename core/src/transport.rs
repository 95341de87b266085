//! Request construction, network execution and response translation.
//!
//! # Design
//! Three pieces with one job each:
//! - [`build_request`] scopes a path under `/projects/{projectId}`, encodes
//!   the query, and attaches the auth and project headers.
//! - [`Transport::execute`] performs the round-trip. It fails only when no
//!   response was received (`CmsError::Network`) and never retries.
//! - [`parse_response`] turns the status into an error kind and decodes the
//!   body. An empty or non-JSON body on a 2xx decodes to `Value::Null`.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{CmsError, CmsResult};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Executes an `HttpRequest` and returns whatever response arrived.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> CmsResult<HttpResponse>;
}

/// `Transport` backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a caller-configured client, e.g. one with a timeout or proxy.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: HttpRequest) -> CmsResult<HttpResponse> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(send_error)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| CmsError::Network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// A builder error means the request itself was malformed and never left
/// the process, so retrying it cannot help.
fn send_error(e: reqwest::Error) -> CmsError {
    if e.is_builder() {
        CmsError::Config(format!("request could not be built: {e}"))
    } else {
        CmsError::Network(e.to_string())
    }
}

/// Build a request for `<apiUrl>/projects/<projectId>/<segments...>`.
///
/// Segments are percent-encoded individually, so a collection name or id
/// containing `/` stays one segment.
pub fn build_request(
    config: &ClientConfig,
    method: HttpMethod,
    segments: &[&str],
    query: &[(String, String)],
    body: Option<String>,
) -> CmsResult<HttpRequest> {
    let mut url = Url::parse(config.api_url())
        .map_err(|e| CmsError::Config(format!("api_url is not a valid URL: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| CmsError::Config("api_url cannot be a base URL".to_string()))?;
        path.pop_if_empty();
        path.push("projects");
        path.push(config.project_id());
        path.extend(segments);
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }

    let mut headers = vec![
        ("accept".to_string(), "application/json".to_string()),
        ("authorization".to_string(), format!("Bearer {}", config.api_key())),
        ("x-project-id".to_string(), config.project_id().to_string()),
    ];
    if body.is_some() {
        headers.push(("content-type".to_string(), "application/json".to_string()));
    }

    let request = HttpRequest {
        method,
        url: url.into(),
        headers,
        body,
    };
    debug!(method = %request.method, url = %request.url, "built CMS request");
    Ok(request)
}

/// Serialize a request body.
pub fn encode_body<T: serde::Serialize + ?Sized>(value: &T) -> CmsResult<String> {
    serde_json::to_string(value).map_err(|e| CmsError::Serialization(e.to_string()))
}

/// Translate the status and decode the body of `response`.
pub fn parse_response(response: HttpResponse) -> CmsResult<Value> {
    debug!(status = response.status, "received CMS response");
    if !response.is_success() {
        let err = status_error(&response);
        warn!(status = response.status, error = %err, "CMS request failed");
        return Err(err);
    }
    if response.body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&response.body).unwrap_or(Value::Null))
}

/// Map a non-2xx response to its error kind.
fn status_error(response: &HttpResponse) -> CmsError {
    let status = response.status;
    let message = error_message(&response.body);
    match status {
        401 | 403 => CmsError::Auth { status, message },
        400 | 422 => CmsError::Validation {
            field: None,
            status: Some(status),
            message,
        },
        500..=599 => CmsError::Server { status, message },
        _ => CmsError::Request { status, message },
    }
}

/// Prefer the backend's `error` or `message` field over the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
