//! Process-wide fetch entry point.
//!
//! Code under test calls [`fetch`]; by default it goes to the network.
//! [`FetchMock::install`](crate::FetchMock::install) swaps in the mock and
//! [`FetchMock::restore`](crate::FetchMock::restore) swaps the original back.

use crate::error::Result;
use crate::network::{FetchHandler, NetworkFetch};
use crate::request::{FetchCall, FetchInput, RequestInit};
use crate::response::MockResponse;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::sync::Arc;

static ENTRY_POINT: Lazy<RwLock<Arc<dyn FetchHandler>>> =
    Lazy::new(|| RwLock::new(Arc::new(NetworkFetch::new())));

/// The handler currently behind the global entry point.
pub fn current() -> Arc<dyn FetchHandler> {
    Arc::clone(&ENTRY_POINT.read())
}

/// Replace the global handler, returning the previous one.
pub(crate) fn swap(handler: Arc<dyn FetchHandler>) -> Arc<dyn FetchHandler> {
    std::mem::replace(&mut *ENTRY_POINT.write(), handler)
}

/// Fetch through the global entry point.
pub async fn fetch(input: impl Into<FetchInput>, init: Option<RequestInit>) -> Result<MockResponse> {
    let call = FetchCall::new(input, init);
    current().fetch(call).await
}
