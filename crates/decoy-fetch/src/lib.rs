//! Decoy: a request-interception engine standing in for an HTTP fetch entry point.
//!
//! Routes are declared against url matchers (exact, `begin:`, `end:`, `glob:`,
//! `express:`, regex, `*` or a custom function) plus optional method, header
//! and query expectations. Intercepted calls are matched in registration order,
//! answered with synthesized responses and recorded for later assertions.
//!
//! ```no_run
//! use decoy_fetch::{FetchMock, ResponseConfig};
//! use serde_json::json;
//!
//! # async fn demo() -> decoy_fetch::Result<()> {
//! let mock = FetchMock::new();
//! mock.get(
//!     "begin:http://api.test/users",
//!     ResponseConfig::new().status(200).json(json!({"id": 1})),
//! )?;
//!
//! let response = mock.send("http://api.test/users/1", None).await?;
//! assert_eq!(response.text(), r#"{"id":1}"#);
//! assert!(mock.done(None, None));
//! # Ok(())
//! # }
//! ```

// ===== Core engine =====
pub mod predicate;
pub mod registry;
pub mod response;
pub mod route;

// ===== Controller and collaborators =====
pub mod config;
pub mod error;
pub mod mock;
pub mod network;
pub mod request;

pub use config::{FixtureFile, MockConfig, RouteFixture};
pub use error::{FetchMockError, Result};
pub use mock::global::fetch;
pub use mock::{FetchMock, PendingFetch};
pub use network::{FetchHandler, NetworkFetch};
pub use predicate::{Matcher, MatcherKind};
pub use registry::{CallRecord, CallSelector};
pub use request::{FetchCall, FetchInput, NativeRequest, RequestHeaders, RequestInit};
pub use response::{MockResponse, ResponseBody, ResponseConfig, ResponseSpec, ResponseValue};
pub use route::{RouteDef, RouteInfo};
