//! Request-side types: what a caller hands to the intercepted fetch.
//!
//! A call is either a plain url with optional [`RequestInit`] options, or a
//! native `hyper` request. Both shapes are normalized at this boundary so the
//! matchers and the registry only ever see a url, a lowercase method and a
//! [`RequestHeaders`] list.

use bytes::Bytes;
use hyper::HeaderMap;
use std::fmt;
use std::sync::Arc;

/// The native request primitive accepted by the intercepted fetch.
pub type NativeRequest = hyper::Request<Bytes>;

/// Ordered header list: lowercase name -> values in arrival order.
///
/// Repeated names are folded into a single entry, keeping the position of the
/// first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    entries: Vec<(String, Vec<String>)>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, folding it into an existing entry with the same name.
    pub fn append(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let name = name.as_ref().to_lowercase();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, values)) => values.push(value),
            None => self.entries.push((name, vec![value])),
        }
    }

    /// All values for a header, case-insensitive on the name.
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        let name = name.to_lowercase();
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, values)| values.as_slice())
    }

    /// First value for a header.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_all(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for RequestHeaders
where
    K: AsRef<str>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = RequestHeaders::new();
        for (name, value) in iter {
            headers.append(name, value);
        }
        headers
    }
}

impl From<&HeaderMap> for RequestHeaders {
    fn from(map: &HeaderMap) -> Self {
        map.iter()
            .map(|(k, v)| (k.as_str(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect()
    }
}

/// Options passed alongside a url, mirroring the init object of a fetch call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: RequestHeaders,
    pub body: Option<Bytes>,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn headers(mut self, headers: impl Into<RequestHeaders>) -> Self {
        self.headers = headers.into();
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    fn from_native(request: &NativeRequest) -> Self {
        Self {
            method: Some(request.method().as_str().to_string()),
            headers: RequestHeaders::from(request.headers()),
            body: Some(request.body().clone()),
        }
    }
}

/// First argument of a fetch call.
#[derive(Clone)]
pub enum FetchInput {
    Url(String),
    Request(Arc<NativeRequest>),
}

impl FetchInput {
    /// The request target, read off the native request when there is one.
    pub fn url(&self) -> String {
        match self {
            FetchInput::Url(url) => url.clone(),
            FetchInput::Request(request) => request.uri().to_string(),
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, FetchInput::Request(_))
    }
}

impl fmt::Debug for FetchInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchInput::Url(url) => f.debug_tuple("Url").field(url).finish(),
            FetchInput::Request(request) => f
                .debug_struct("Request")
                .field("method", request.method())
                .field("uri", request.uri())
                .finish(),
        }
    }
}

impl From<&str> for FetchInput {
    fn from(url: &str) -> Self {
        FetchInput::Url(url.to_string())
    }
}

impl From<String> for FetchInput {
    fn from(url: String) -> Self {
        FetchInput::Url(url)
    }
}

impl From<&String> for FetchInput {
    fn from(url: &String) -> Self {
        FetchInput::Url(url.clone())
    }
}

impl From<NativeRequest> for FetchInput {
    fn from(request: NativeRequest) -> Self {
        FetchInput::Request(Arc::new(request))
    }
}

impl From<Arc<NativeRequest>> for FetchInput {
    fn from(request: Arc<NativeRequest>) -> Self {
        FetchInput::Request(request)
    }
}

/// One intercepted invocation: the input plus the options it was called with.
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub input: FetchInput,
    pub init: Option<RequestInit>,
}

impl FetchCall {
    pub fn new(input: impl Into<FetchInput>, init: Option<RequestInit>) -> Self {
        Self {
            input: input.into(),
            init,
        }
    }

    pub fn url(&self) -> String {
        self.input.url()
    }

    /// Lowercase method, `get` when the call did not specify one.
    pub fn method(&self) -> String {
        let native = match &self.input {
            FetchInput::Request(request) => Some(request.method().as_str()),
            FetchInput::Url(_) => None,
        };
        native
            .or_else(|| self.init.as_ref().and_then(|init| init.method.as_deref()))
            .unwrap_or("get")
            .to_lowercase()
    }

    /// Headers sent with the call, from the native request if there is one.
    pub fn headers(&self) -> RequestHeaders {
        match &self.input {
            FetchInput::Request(request) => RequestHeaders::from(request.headers()),
            FetchInput::Url(_) => self
                .init
                .as_ref()
                .map(|init| init.headers.clone())
                .unwrap_or_default(),
        }
    }

    /// The options as a (url, options) pair would carry them.
    ///
    /// A native request call is normalized by reading method, headers and body
    /// off the request.
    pub fn options(&self) -> RequestInit {
        match (&self.input, &self.init) {
            (_, Some(init)) => init.clone(),
            (FetchInput::Request(request), None) => RequestInit::from_native(request),
            (FetchInput::Url(_), None) => RequestInit::default(),
        }
    }

    /// Method as the caller spelled it, used in log and error messages.
    pub(crate) fn display_method(&self) -> String {
        match &self.input {
            FetchInput::Request(request) => request.method().as_str().to_string(),
            FetchInput::Url(_) => self
                .init
                .as_ref()
                .and_then(|init| init.method.clone())
                .unwrap_or_else(|| "GET".to_string()),
        }
    }
}

impl FetchCall {
    /// Read url, method, headers and options off the call once.
    pub fn normalize(&self) -> NormalizedRequest {
        NormalizedRequest {
            url: self.url(),
            method: self.method(),
            headers: self.headers(),
            options: self.options(),
        }
    }
}

/// A call reduced to the fields route predicates look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRequest {
    pub url: String,
    /// Lowercase
    pub method: String,
    pub headers: RequestHeaders,
    pub options: RequestInit,
}
