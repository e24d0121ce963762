//! Response side of the fetch double.
//!
//! # Module Structure
//!
//! - `spec` - What a route answers with: literal values, callbacks, deferred values
//! - `resolver` - Reduces a spec to a terminal value
//! - `builder` - Turns a terminal value into a [`MockResponse`]
//! - `mock_response` - The response object returned to callers

mod builder;
mod mock_response;
mod resolver;
mod spec;

pub(crate) use builder::validate_status;
pub(crate) use spec::scalar_text;
pub use builder::ResponseBuilder;
pub use mock_response::MockResponse;
pub use resolver::{resolve, resolve_response, MAX_RESOLUTION_STEPS};
pub use spec::{
    DeferredResponse, ResponseBody, ResponseConfig, ResponseFn, ResponseSpec, ResponseValue,
    RESERVED_KEYS,
};
