//! The response object handed back to callers of the intercepted fetch.

use crate::error::{FetchMockError, Result};
use bytes::Bytes;
use http_body_util::Full;
use hyper::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[derive(Debug)]
struct ResponseParts {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    url: String,
    body: Option<Bytes>,
}

/// A synthesized (or natively fetched) response.
///
/// Cloning is cheap: clones share the underlying parts. A redirect view
/// overrides only `url` and `redirected`; reading the body always goes through
/// the shared parts.
#[derive(Debug, Clone)]
pub struct MockResponse {
    parts: Arc<ResponseParts>,
    redirected_to: Option<String>,
}

impl MockResponse {
    /// Construct a response; `status_text` comes from the standard reason
    /// phrase of `status`.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Option<Bytes>, url: impl Into<String>) -> Self {
        Self {
            parts: Arc::new(ResponseParts {
                status,
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                headers,
                url: url.into(),
                body,
            }),
            redirected_to: None,
        }
    }

    /// A view of this response reporting that it was reached via a redirect to
    /// `url`. The body is shared, not copied.
    pub fn redirected_view(&self, url: impl Into<String>) -> Self {
        Self {
            parts: Arc::clone(&self.parts),
            redirected_to: Some(url.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    pub fn status_text(&self) -> &str {
        &self.parts.status_text
    }

    /// Whether the status is in the 2xx range.
    pub fn ok(&self) -> bool {
        self.parts.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// First value of a header, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn url(&self) -> &str {
        self.redirected_to.as_deref().unwrap_or(&self.parts.url)
    }

    pub fn redirected(&self) -> bool {
        self.redirected_to.is_some()
    }

    /// Raw body; `None` for a null body.
    pub fn body(&self) -> Option<&Bytes> {
        self.parts.body.as_ref()
    }

    /// Whether two responses share the same underlying parts.
    pub fn shares_body_with(&self, other: &MockResponse) -> bool {
        Arc::ptr_eq(&self.parts, &other.parts)
    }

    /// Body as text; a null body reads as the empty string.
    pub fn text(&self) -> String {
        self.parts
            .body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Body parsed as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self.parts.body.as_deref().unwrap_or_default();
        serde_json::from_slice(body).map_err(|e| FetchMockError::Rejected(format!("invalid json body: {e}")))
    }

    /// Convert into a `hyper` response.
    pub fn to_http(&self) -> hyper::Response<Full<Bytes>> {
        let payload = self.parts.body.clone().unwrap_or_default();
        let mut response = hyper::Response::new(Full::new(payload));
        *response.status_mut() = self.parts.status;
        response.headers_mut().extend(self.parts.headers.clone());
        response
    }
}
