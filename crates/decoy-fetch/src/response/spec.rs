//! Response specifications.
//!
//! A route answers with a [`ResponseSpec`]: a literal [`ResponseValue`], a
//! callback invoked per call, or a deferred value. Callbacks and deferred values
//! may produce further specs; the resolver reduces the chain to a literal.

use super::mock_response::MockResponse;
use crate::error::{FetchMockError, Result};
use crate::request::RequestInit;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Callback producing a response spec from the call's url and options.
pub type ResponseFn = Arc<dyn Fn(&str, &RequestInit) -> ResponseSpec + Send + Sync>;

/// Deferred response. Shared so every call awaiting it sees the same value.
pub type DeferredResponse = Shared<BoxFuture<'static, Result<ResponseSpec>>>;

/// Keys that mark a JSON object as a structured response config.
pub const RESERVED_KEYS: [&str; 7] = [
    "body",
    "headers",
    "throws",
    "status",
    "redirectUrl",
    "includeContentLength",
    "sendAsJson",
];

/// How to answer a matched call.
#[derive(Clone)]
pub enum ResponseSpec {
    Literal(ResponseValue),
    Callback(ResponseFn),
    Deferred(DeferredResponse),
}

impl ResponseSpec {
    /// Answer each call by invoking `func` with the url and options.
    pub fn callback<F>(func: F) -> Self
    where
        F: Fn(&str, &RequestInit) -> ResponseSpec + Send + Sync + 'static,
    {
        ResponseSpec::Callback(Arc::new(func))
    }

    /// Answer with the value a future settles to.
    ///
    /// The future runs once; later calls reuse its output.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = ResponseSpec> + Send + 'static,
    {
        ResponseSpec::Deferred(future.map(Ok).boxed().shared())
    }

    /// Like [`ResponseSpec::deferred`], for futures that can fail.
    pub fn try_deferred<F>(future: F) -> Self
    where
        F: Future<Output = Result<ResponseSpec>> + Send + 'static,
    {
        ResponseSpec::Deferred(future.boxed().shared())
    }

    /// Answer every call with `spec` after waiting `delay`.
    pub fn delayed(delay: Duration, spec: impl Into<ResponseSpec>) -> Self {
        let spec = spec.into();
        ResponseSpec::callback(move |_, _| {
            let spec = spec.clone();
            ResponseSpec::deferred(async move {
                tokio::time::sleep(delay).await;
                spec
            })
        })
    }

    /// Resolve a literal shorthand into its structured config. Callbacks,
    /// deferred values and built responses are left as they are.
    pub(crate) fn classified(self) -> Result<Self> {
        match self {
            ResponseSpec::Literal(value) => {
                let value = match value.to_config()? {
                    Some(config) => ResponseValue::Config(config),
                    None => value,
                };
                Ok(ResponseSpec::Literal(value))
            }
            other => Ok(other),
        }
    }

    /// Error message of a literal marked to throw.
    pub(crate) fn thrown(&self) -> Option<String> {
        match self {
            ResponseSpec::Literal(value) => value.throws(),
            ResponseSpec::Callback(_) | ResponseSpec::Deferred(_) => None,
        }
    }
}

impl fmt::Debug for ResponseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSpec::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            ResponseSpec::Callback(_) => f.write_str("Callback"),
            ResponseSpec::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl From<ResponseValue> for ResponseSpec {
    fn from(value: ResponseValue) -> Self {
        ResponseSpec::Literal(value)
    }
}

macro_rules! literal_spec_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ResponseSpec {
                fn from(value: $ty) -> Self {
                    ResponseSpec::Literal(ResponseValue::from(value))
                }
            }
        )*
    };
}

literal_spec_from!(u16, &str, String, Bytes, Value, ResponseConfig, MockResponse);

/// Terminal response data.
#[derive(Debug, Clone)]
pub enum ResponseValue {
    /// Shorthand for `{status}`
    Status(u16),
    /// Shorthand for `{body}`
    Text(String),
    /// Binary shorthand for `{body}`
    Bytes(Bytes),
    /// Loosely-typed JSON, classified as body or config when built
    Json(Value),
    /// Structured config
    Config(ResponseConfig),
    /// Already-built response, returned as is
    Response(MockResponse),
}

impl ResponseValue {
    /// Resolve the shorthand forms into a structured config.
    ///
    /// Returns `None` for a pre-built response.
    pub fn to_config(&self) -> Result<Option<ResponseConfig>> {
        let config = match self {
            ResponseValue::Status(status) => ResponseConfig::new().status(*status),
            ResponseValue::Text(text) => ResponseConfig::new().body(text.as_str()),
            ResponseValue::Bytes(bytes) => ResponseConfig::new().body(bytes.clone()),
            ResponseValue::Json(value) => ResponseConfig::from_json(value)?,
            ResponseValue::Config(config) => config.clone(),
            ResponseValue::Response(_) => return Ok(None),
        };
        Ok(Some(config))
    }

    fn throws(&self) -> Option<String> {
        match self {
            ResponseValue::Config(config) => config.throws.clone(),
            ResponseValue::Json(Value::Object(_)) => ResponseConfig::from_json_lossy(self)?.throws,
            _ => None,
        }
    }
}

impl From<u16> for ResponseValue {
    fn from(status: u16) -> Self {
        ResponseValue::Status(status)
    }
}

impl From<&str> for ResponseValue {
    fn from(text: &str) -> Self {
        ResponseValue::Text(text.to_string())
    }
}

impl From<String> for ResponseValue {
    fn from(text: String) -> Self {
        ResponseValue::Text(text)
    }
}

impl From<Bytes> for ResponseValue {
    fn from(bytes: Bytes) -> Self {
        ResponseValue::Bytes(bytes)
    }
}

impl From<Value> for ResponseValue {
    fn from(value: Value) -> Self {
        ResponseValue::Json(value)
    }
}

impl From<ResponseConfig> for ResponseValue {
    fn from(config: ResponseConfig) -> Self {
        ResponseValue::Config(config)
    }
}

impl From<MockResponse> for ResponseValue {
    fn from(response: MockResponse) -> Self {
        ResponseValue::Response(response)
    }
}

/// Body of a response config, before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Text(String),
    Bytes(Bytes),
    Json(Value),
}

impl From<&str> for ResponseBody {
    fn from(text: &str) -> Self {
        ResponseBody::Text(text.to_string())
    }
}

impl From<String> for ResponseBody {
    fn from(text: String) -> Self {
        ResponseBody::Text(text)
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        ResponseBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for ResponseBody {
    fn from(bytes: Vec<u8>) -> Self {
        ResponseBody::Bytes(Bytes::from(bytes))
    }
}

impl From<Value> for ResponseBody {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => ResponseBody::Text(text),
            other => ResponseBody::Json(other),
        }
    }
}

/// Structured response config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseConfig {
    pub status: Option<u16>,
    pub body: Option<ResponseBody>,
    pub headers: Vec<(String, String)>,
    /// Fail the call with this message instead of responding
    pub throws: Option<String>,
    pub redirect_url: Option<String>,
    pub include_content_length: Option<bool>,
    pub send_as_json: Option<bool>,
}

impl ResponseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn body(mut self, body: impl Into<ResponseBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(ResponseBody::Json(body));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn throws(mut self, message: impl Into<String>) -> Self {
        self.throws = Some(message.into());
        self
    }

    pub fn redirect_url(mut self, url: impl Into<String>) -> Self {
        self.redirect_url = Some(url.into());
        self
    }

    pub fn include_content_length(mut self, include: bool) -> Self {
        self.include_content_length = Some(include);
        self
    }

    pub fn send_as_json(mut self, send: bool) -> Self {
        self.send_as_json = Some(send);
        self
    }

    /// Classify a JSON value.
    ///
    /// Numbers are statuses and strings are bodies. An object without any
    /// reserved key is the body itself; otherwise its reserved keys are read as
    /// config and other keys are dropped with a warning. Anything else is a body.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Number(number) => Ok(Self::new().status(status_code(number)?)),
            Value::String(text) => Ok(Self::new().body(text.as_str())),
            Value::Object(map) if map.keys().any(|k| RESERVED_KEYS.contains(&k.as_str())) => {
                Self::from_json_object(map)
            }
            other => Ok(Self::new().json(other.clone())),
        }
    }

    fn from_json_lossy(value: &ResponseValue) -> Option<Self> {
        match value {
            ResponseValue::Json(json) => Self::from_json(json).ok(),
            _ => None,
        }
    }

    fn from_json_object(map: &serde_json::Map<String, Value>) -> Result<Self> {
        let mut config = Self::new();
        for (key, value) in map {
            match key.as_str() {
                "status" => match value {
                    Value::Null => {}
                    Value::Number(number) => config.status = Some(status_code(number)?),
                    other => {
                        return Err(FetchMockError::InvalidRoute(format!(
                            "status must be a number, got {other}"
                        )))
                    }
                },
                "body" => {
                    if !value.is_null() {
                        config.body = Some(ResponseBody::from(value.clone()));
                    }
                }
                "headers" => {
                    let Value::Object(headers) = value else {
                        return Err(FetchMockError::InvalidRoute(
                            "headers must be an object".to_string(),
                        ));
                    };
                    for (name, value) in headers {
                        config.headers.push((name.clone(), scalar_text(value)));
                    }
                }
                "throws" => {
                    if !value.is_null() && value != &Value::Bool(false) {
                        config.throws = Some(scalar_text(value));
                    }
                }
                "redirectUrl" => config.redirect_url = value.as_str().map(str::to_string),
                "includeContentLength" => config.include_content_length = value.as_bool(),
                "sendAsJson" => config.send_as_json = value.as_bool(),
                other => warn!("Ignoring unknown response config key '{}'", other),
            }
        }
        Ok(config)
    }
}

/// Status from a JSON number. Range checks beyond `u16` happen when the
/// response is built.
fn status_code(number: &serde_json::Number) -> Result<u16> {
    let code = number
        .as_i64()
        .unwrap_or_else(|| number.as_f64().map_or(i64::MAX, |f| f as i64));
    u16::try_from(code).map_err(|_| FetchMockError::InvalidStatus(code))
}

/// Text of a JSON scalar; strings lose their quotes.
pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_number_is_status() {
        let config = ResponseValue::from(404u16).to_config().unwrap().unwrap();
        assert_eq!(config.status, Some(404));
        assert!(config.body.is_none());

        let config = ResponseConfig::from_json(&json!(201)).unwrap();
        assert_eq!(config.status, Some(201));
    }

    #[test]
    fn test_string_is_body() {
        let config = ResponseValue::from("hello").to_config().unwrap().unwrap();
        assert_eq!(config.body, Some(ResponseBody::Text("hello".to_string())));
        assert_eq!(config.status, None);
    }

    #[test]
    fn test_object_without_reserved_keys_is_body() {
        let config = ResponseConfig::from_json(&json!({"notify": true})).unwrap();
        assert_eq!(config.body, Some(ResponseBody::Json(json!({"notify": true}))));
        assert_eq!(config.status, None);
    }

    #[test]
    fn test_object_with_reserved_keys_is_config() {
        let config = ResponseConfig::from_json(&json!({
            "status": 201,
            "body": {"id": 1},
            "headers": {"X-Count": 3},
            "redirectUrl": "http://b.com",
            "sendAsJson": false
        }))
        .unwrap();

        assert_eq!(config.status, Some(201));
        assert_eq!(config.body, Some(ResponseBody::Json(json!({"id": 1}))));
        assert_eq!(config.headers, vec![("X-Count".to_string(), "3".to_string())]);
        assert_eq!(config.redirect_url.as_deref(), Some("http://b.com"));
        assert_eq!(config.send_as_json, Some(false));
        assert_eq!(config.include_content_length, None);
    }

    #[test]
    fn test_string_body_in_config_is_text() {
        let config = ResponseConfig::from_json(&json!({"body": "plain"})).unwrap();
        assert_eq!(config.body, Some(ResponseBody::Text("plain".to_string())));
    }

    #[test]
    fn test_invalid_config_types() {
        assert!(ResponseConfig::from_json(&json!({"status": "ok"})).is_err());
        assert!(ResponseConfig::from_json(&json!({"headers": ["a"]})).is_err());
        assert!(matches!(
            ResponseConfig::from_json(&json!({"status": "ok"})),
            Err(FetchMockError::InvalidRoute(_))
        ));
    }

    #[test]
    fn test_out_of_range_numeric_status() {
        assert_eq!(
            ResponseConfig::from_json(&json!(70000)).unwrap_err(),
            FetchMockError::InvalidStatus(70000)
        );
        assert_eq!(
            ResponseConfig::from_json(&json!({"status": 70000})).unwrap_err(),
            FetchMockError::InvalidStatus(70000)
        );
        assert_eq!(
            ResponseConfig::from_json(&json!({"status": -1})).unwrap_err(),
            FetchMockError::InvalidStatus(-1)
        );
        assert_eq!(
            ResponseConfig::from_json(&json!(-404)).unwrap_err(),
            FetchMockError::InvalidStatus(-404)
        );
    }

    #[test]
    fn test_classified_literal_becomes_config() {
        let spec = ResponseSpec::from(json!({"status": 202, "body": "queued"}))
            .classified()
            .unwrap();
        match spec {
            ResponseSpec::Literal(ResponseValue::Config(config)) => {
                assert_eq!(config.status, Some(202));
                assert_eq!(config.body, Some(ResponseBody::Text("queued".to_string())));
            }
            other => panic!("expected a config literal, got {other:?}"),
        }

        let spec = ResponseSpec::callback(|_, _| ResponseSpec::from(200u16))
            .classified()
            .unwrap();
        assert!(matches!(spec, ResponseSpec::Callback(_)));
    }

    #[test]
    fn test_thrown_literals() {
        let spec = ResponseSpec::from(ResponseConfig::new().throws("boom"));
        assert_eq!(spec.thrown().as_deref(), Some("boom"));

        let spec = ResponseSpec::from(json!({"throws": "bad gateway"}));
        assert_eq!(spec.thrown().as_deref(), Some("bad gateway"));

        let spec = ResponseSpec::from(json!({"throws": false, "status": 500}));
        assert_eq!(spec.thrown(), None);

        let spec = ResponseSpec::callback(|_, _| ResponseSpec::from(200u16));
        assert_eq!(spec.thrown(), None);
    }
}
