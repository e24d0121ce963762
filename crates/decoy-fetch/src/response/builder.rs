use super::mock_response::MockResponse;
use super::spec::{ResponseBody, ResponseConfig, ResponseValue};
use crate::config::MockConfig;
use crate::error::{FetchMockError, Result};
use bytes::Bytes;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::http::{HeaderName, HeaderValue};
use hyper::{HeaderMap, StatusCode};
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

/// Validate a declared status. Absent or zero means 200.
pub(crate) fn validate_status(status: Option<u16>) -> Result<StatusCode> {
    match status {
        None | Some(0) => Ok(StatusCode::OK),
        Some(code @ 200..=599) => {
            StatusCode::from_u16(code).map_err(|_| FetchMockError::InvalidStatus(code.into()))
        }
        Some(code) => Err(FetchMockError::InvalidStatus(code.into())),
    }
}

/// Builds a [`MockResponse`] from a terminal response value.
///
/// Shorthands are resolved once, on construction; everything after that works
/// on the structured [`ResponseConfig`].
pub struct ResponseBuilder {
    url: String,
    config: ResponseConfig,
    send_as_json: bool,
    include_content_length: bool,
}

impl ResponseBuilder {
    pub fn new(url: impl Into<String>, config: ResponseConfig, defaults: &MockConfig) -> Self {
        let send_as_json = config.send_as_json.unwrap_or(defaults.send_as_json);
        let include_content_length = config
            .include_content_length
            .unwrap_or(defaults.include_content_length);
        ResponseBuilder {
            url: url.into(),
            config,
            send_as_json,
            include_content_length,
        }
    }

    /// Builder for any terminal value. A pre-built response is not accepted
    /// here; it is returned as is by the resolver.
    pub fn from_value(url: impl Into<String>, value: &ResponseValue, defaults: &MockConfig) -> Result<Self> {
        let config = value.to_config()?.ok_or_else(|| {
            FetchMockError::InvalidRoute("a built response needs no building".to_string())
        })?;
        Ok(Self::new(url, config, defaults))
    }

    pub fn build(self) -> Result<MockResponse> {
        let status = validate_status(self.config.status)?;

        let ResponseBuilder {
            url,
            config,
            send_as_json,
            include_content_length,
        } = self;
        let ResponseConfig {
            body,
            headers: declared,
            redirect_url,
            ..
        } = config;
        let mut headers = HeaderMap::new();
        for (name, value) in &declared {
            append_header(&mut headers, name, value);
        }

        let body = match body {
            Some(ResponseBody::Json(value @ (Value::Object(_) | Value::Array(_)))) if send_as_json => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(SerializedBody::Text(value.to_string()))
            }
            Some(ResponseBody::Json(Value::Object(map))) => {
                if map.is_empty() {
                    None
                } else {
                    Some(SerializedBody::Text(Value::Object(map).to_string()))
                }
            }
            Some(ResponseBody::Json(Value::Null)) => None,
            Some(ResponseBody::Json(Value::String(text))) => Some(SerializedBody::Text(text)),
            Some(ResponseBody::Json(other)) => Some(SerializedBody::Text(other.to_string())),
            Some(ResponseBody::Text(text)) => Some(SerializedBody::Text(text)),
            Some(ResponseBody::Bytes(bytes)) => Some(SerializedBody::Binary(bytes)),
            None => None,
        };

        if include_content_length && !headers.contains_key(CONTENT_LENGTH) {
            if let Some(SerializedBody::Text(text)) = &body {
                headers.insert(CONTENT_LENGTH, HeaderValue::from(text.len()));
            }
        }

        let body = body.map(SerializedBody::into_bytes);
        let response = MockResponse::new(status, headers, body, url);
        Ok(match redirect_url {
            Some(target) => response.redirected_view(target),
            None => response,
        })
    }
}

fn append_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (HeaderName::from_str(name), HeaderValue::from_str(value)) {
        (Ok(name), Ok(value)) => {
            headers.append(name, value);
        }
        _ => debug!("Skipping invalid response header '{}'", name),
    }
}

enum SerializedBody {
    Text(String),
    Binary(Bytes),
}

impl SerializedBody {
    fn into_bytes(self) -> Bytes {
        match self {
            SerializedBody::Text(text) => Bytes::from(text),
            SerializedBody::Binary(bytes) => bytes,
        }
    }
}
