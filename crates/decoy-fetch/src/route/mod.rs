//! Routes: declarations, compilation and the ordered route table.
//!
//! # Module Structure
//!
//! - `types` - Uncompiled [`RouteDef`] declarations and [`RouteInfo`] snapshots
//! - `compile` - [`CompiledRoute`]: the conjunctive predicate and repeat counter
//! - `table` - [`RouteTable`] with clash policies, and the match router

mod compile;
mod table;
mod types;

pub use compile::CompiledRoute;
pub use table::{route_call, RouteAddition, RouteTable};
pub use types::{RouteDef, RouteInfo};
