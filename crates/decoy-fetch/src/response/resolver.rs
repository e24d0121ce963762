//! Reduces a response spec to a terminal value and builds the response.

use super::builder::ResponseBuilder;
use super::mock_response::MockResponse;
use super::spec::{ResponseSpec, ResponseValue};
use crate::config::MockConfig;
use crate::error::{FetchMockError, Result};
use crate::request::RequestInit;
use tracing::debug;

/// Upper bound on callback/deferred steps before giving up.
pub const MAX_RESOLUTION_STEPS: usize = 64;

/// Reduce `spec` until it is neither a callback nor a deferred value.
pub async fn resolve(spec: ResponseSpec, url: &str, options: &RequestInit) -> Result<ResponseValue> {
    let mut current = spec;
    for step in 0..MAX_RESOLUTION_STEPS {
        current = match current {
            ResponseSpec::Literal(value) => return Ok(value),
            ResponseSpec::Callback(func) => {
                debug!("Resolving response callback for {} (step {})", url, step);
                func(url, options)
            }
            ResponseSpec::Deferred(deferred) => {
                debug!("Awaiting deferred response for {} (step {})", url, step);
                deferred.await?
            }
        };
    }
    Err(FetchMockError::ResolutionLimit(MAX_RESOLUTION_STEPS))
}

/// Resolve `spec` and build the final response.
///
/// A pre-built response is returned unchanged.
pub async fn resolve_response(
    spec: ResponseSpec,
    url: &str,
    options: &RequestInit,
    defaults: &MockConfig,
) -> Result<MockResponse> {
    match resolve(spec, url, options).await? {
        ResponseValue::Response(response) => Ok(response),
        value => ResponseBuilder::from_value(url, &value, defaults)?.build(),
    }
}
