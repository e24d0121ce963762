//! Dispatch of intercepted calls.
//!
//! Routing, call recording and `throws` checks happen synchronously when a call
//! is dispatched; only response resolution is deferred to the returned
//! [`PendingFetch`].

use super::core::FetchMock;
use crate::error::{FetchMockError, Result};
use crate::network::FetchHandler;
use crate::request::{FetchCall, FetchInput, NormalizedRequest, RequestInit};
use crate::response::{resolve_response, MockResponse, ResponseSpec};
use crate::route::route_call;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::warn;

/// A dispatched call whose response is still being resolved.
///
/// The call stays pending (for [`FetchMock::flush`]) until this future
/// completes or is dropped.
#[must_use = "a pending fetch does nothing unless awaited"]
pub struct PendingFetch {
    inner: BoxFuture<'static, Result<MockResponse>>,
}

impl Future for PendingFetch {
    type Output = Result<MockResponse>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for PendingFetch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PendingFetch")
    }
}

impl FetchMock {
    /// Intercept a call.
    ///
    /// Fails immediately when nothing can answer the call or when the chosen
    /// response is marked to throw; otherwise returns the pending response.
    pub fn dispatch(&self, input: impl Into<FetchInput>, init: Option<RequestInit>) -> Result<PendingFetch> {
        self.dispatch_call(FetchCall::new(input, init))
    }

    /// Intercept a call and wait for its response.
    pub async fn send(&self, input: impl Into<FetchInput>, init: Option<RequestInit>) -> Result<MockResponse> {
        self.dispatch(input, init)?.await
    }

    pub(crate) fn dispatch_call(&self, call: FetchCall) -> Result<PendingFetch> {
        let request = call.normalize();
        let spec = self.execute_router(call, &request)?;

        if let Some(message) = spec.thrown() {
            return Err(FetchMockError::Rejected(message));
        }

        let guard = self.inner.registry.begin_pending();
        let config = self.config();
        let future = async move {
            let _pending = guard;
            resolve_response(spec, &request.url, &request.options, &config).await
        };
        Ok(PendingFetch {
            inner: future.boxed(),
        })
    }

    /// Pick the spec answering `call`: a matching route, else the fallback,
    /// else the network when allowed.
    fn execute_router(&self, call: FetchCall, request: &NormalizedRequest) -> Result<ResponseSpec> {
        let routes = self.inner.routes.read().snapshot();
        if let Some(spec) = route_call(&routes, &call, request, &self.inner.registry) {
            return Ok(spec);
        }

        let config = self.config();
        let method = call.display_method();
        if config.warn_on_fallback {
            warn!("Unmatched {} to {}", method, request.url);
        }
        self.inner.registry.record(None, call.clone());

        if let Some(fallback) = self.inner.fallback.read().as_ref() {
            return Ok(fallback.clone());
        }

        if !config.fallback_to_network {
            return Err(FetchMockError::UnmatchedRequest {
                method,
                url: request.url.clone(),
            });
        }

        let native = self.native_fetch()?;
        Ok(forward_call(native, call))
    }
}

/// Spec forwarding the original call, native request included.
fn forward_call(handler: Arc<dyn FetchHandler>, call: FetchCall) -> ResponseSpec {
    ResponseSpec::try_deferred(async move {
        let response = handler.fetch(call).await?;
        Ok(ResponseSpec::from(response))
    })
}

#[async_trait]
impl FetchHandler for FetchMock {
    async fn fetch(&self, call: FetchCall) -> Result<MockResponse> {
        self.dispatch_call(call)?.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CallSelector;
    use crate::response::ResponseConfig;
    use crate::MockConfig;
    use hyper::StatusCode;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn test_matched_call_is_recorded_before_resolution() {
        let mock = FetchMock::new();
        mock.mock(
            "/slow",
            ResponseSpec::deferred(async { ResponseSpec::from("done") }),
        )
        .unwrap();

        let pending = mock.dispatch("/slow", None).unwrap();
        assert_eq!(mock.calls(true).len(), 1);
        assert_eq!(mock.pending_count(), 1);

        let response = pending.await.unwrap();
        assert_eq!(response.text(), "done");
        assert_eq!(mock.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_throws_fails_synchronously() {
        let mock = FetchMock::new();
        mock.mock("/boom", ResponseConfig::new().throws("connection reset"))
            .unwrap();

        let err = mock.dispatch("/boom", None).unwrap_err();
        assert_eq!(err, FetchMockError::Rejected("connection reset".to_string()));
        assert_eq!(mock.calls("/boom").len(), 1);
        assert_eq!(mock.pending_count(), 0);
    }

    #[test]
    #[traced_test]
    fn test_unmatched_without_fallback() {
        let mock = FetchMock::new();
        let init = RequestInit::new().method("POST");
        let err = mock.dispatch("http://a.com/x", Some(init)).unwrap_err();

        assert_eq!(
            err.to_string(),
            "No fallback response defined for POST to http://a.com/x"
        );
        assert!(logs_contain("Unmatched POST to http://a.com/x"));
        assert_eq!(mock.calls(false).len(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_unknown_config_key_warns_once() {
        let mock = FetchMock::new();
        mock.mock("/a", serde_json::json!({"status": 201, "colour": "red"}))
            .unwrap();

        for _ in 0..3 {
            let response = mock.send("/a", None).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        logs_assert(|lines: &[&str]| {
            match lines
                .iter()
                .filter(|line| line.contains("Ignoring unknown response config key 'colour'"))
                .count()
            {
                1 => Ok(()),
                n => Err(format!("expected one warning, got {n}")),
            }
        });
    }

    #[tokio::test]
    async fn test_unmatched_uses_fallback() {
        let mock = FetchMock::with_config(MockConfig {
            warn_on_fallback: false,
            ..MockConfig::default()
        });
        mock.catch(ResponseConfig::new().status(404).body("missing"));

        let response = mock.send("/anything", None).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.text(), "missing");
        assert_eq!(mock.calls(CallSelector::Unmatched).len(), 1);
    }

    #[test]
    fn test_network_fallback_needs_native_fetch() {
        let mock = FetchMock::with_config(MockConfig {
            fallback_to_network: true,
            ..MockConfig::default()
        });
        let err = mock.dispatch("/x", None).unwrap_err();
        assert_eq!(err, FetchMockError::NoNativeFetchAvailable);
    }

    #[tokio::test]
    async fn test_dropped_pending_fetch_clears_marker() {
        let mock = FetchMock::new();
        mock.mock("/a", 200u16).unwrap();

        let pending = mock.dispatch("/a", None).unwrap();
        assert_eq!(mock.pending_count(), 1);
        drop(pending);
        assert_eq!(mock.pending_count(), 0);
        mock.flush().await;
    }
}
