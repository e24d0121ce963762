//! Error taxonomy for route registration and request dispatch.
//!
//! Registration-time variants are returned synchronously from the registrants.
//! Dispatch-time variants come either from `FetchMock::fetch` (before any
//! asynchronous work) or from the returned future.
//!
//! The error is `Clone` because it travels through shared deferred responses,
//! so foreign errors are captured by message.

/// Errors produced by the request-interception engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchMockError {
    #[error("Invalid route: {0}")]
    InvalidRoute(String),

    #[error("Adding route with same name '{name}' as existing route. See `overwrite_routes` option.")]
    RouteNameClash { name: String },

    #[error("Using '^' to denote the start of a url is deprecated. Use 'begin:' instead (matcher: {matcher})")]
    DeprecatedSyntax { matcher: String },

    #[error("Invalid matcher '{matcher}': {reason}")]
    InvalidMatcher { matcher: String, reason: String },

    #[error(
        "Invalid status {0} passed on response object. To respond with a JSON object that has \
         status as a property assign the object to body, e.g. {{\"body\": {{\"status\": \"registered\"}}}}"
    )]
    InvalidStatus(i64),

    #[error("No fallback response defined for {method} to {url}")]
    UnmatchedRequest { method: String, url: String },

    #[error(
        "Falling back to network is only available once a native fetch has been captured by \
         `install()` or supplied with `with_network()`"
    )]
    NoNativeFetchAvailable,

    #[error("Response rejected: {0}")]
    Rejected(String),

    #[error("Response specification did not settle after {0} resolution steps")]
    ResolutionLimit(usize),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FetchMockError {
    /// Whether this error is raised while configuring the mock rather than
    /// while serving a call.
    pub fn is_registration_error(&self) -> bool {
        matches!(
            self,
            FetchMockError::InvalidRoute(_)
                | FetchMockError::RouteNameClash { .. }
                | FetchMockError::DeprecatedSyntax { .. }
                | FetchMockError::InvalidMatcher { .. }
                | FetchMockError::Config(_)
        )
    }
}

impl From<serde_yaml::Error> for FetchMockError {
    fn from(err: serde_yaml::Error) -> Self {
        FetchMockError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for FetchMockError {
    fn from(err: serde_json::Error) -> Self {
        FetchMockError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for FetchMockError {
    fn from(err: reqwest::Error) -> Self {
        FetchMockError::Network(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FetchMockError>;
