//! Request predicates used by compiled routes.
//!
//! # Module Structure
//!
//! - `url_matcher` - Url matcher declarations (text shorthands, regex, function)
//!   and their compiled form
//! - `field_matcher` - Header and query expectations

mod field_matcher;
mod url_matcher;

pub use field_matcher::{
    compile_header_matcher, compile_query_matcher, parse_query_string, CompiledFieldMatcher,
    CompiledHeaderMatcher, CompiledQueryMatcher,
};
pub use url_matcher::{
    glob_to_regex, path_template_to_regex, CompiledUrlMatch, CompiledUrlMatcher, MatchFn, Matcher,
    MatcherKind,
};
