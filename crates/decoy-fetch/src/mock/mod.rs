//! Mock controller: registration, dispatch and the global entry point.
//!
//! # Module Structure
//!
//! - `core` - [`FetchMock`] state, registrants, lifecycle and history queries
//! - `handler` - Call dispatch and [`PendingFetch`]
//! - `global` - The process-wide fetch entry point

mod core;
pub mod global;
mod handler;

pub use self::core::FetchMock;
pub use handler::PendingFetch;
