//! Route compilation: declaration -> executable predicate plus bookkeeping.

use super::types::{RouteDef, RouteInfo};
use crate::error::{FetchMockError, Result};
use crate::predicate::{
    compile_header_matcher, compile_query_matcher, parse_query_string, CompiledHeaderMatcher,
    CompiledQueryMatcher, CompiledUrlMatch, MatchFn, Matcher, MatcherKind,
};
use crate::request::NormalizedRequest;
use crate::response::{validate_status, ResponseSpec, ResponseValue};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// A compiled route. Immutable apart from its repeat counter.
pub struct CompiledRoute {
    pub name: String,
    pub synthetic_name: bool,
    /// Lowercase; `None` matches any method
    pub method: Option<String>,
    pub kind: MatcherKind,
    url: CompiledUrlMatch,
    function: Option<MatchFn>,
    headers: Vec<CompiledHeaderMatcher>,
    query: Vec<CompiledQueryMatcher>,
    pub response: ResponseSpec,
    pub repeat: Option<usize>,
    remaining: AtomicUsize,
    pub overwrite_routes: Option<bool>,
}

impl CompiledRoute {
    /// Compile a declaration, failing on missing or invalid parts.
    pub fn compile(def: RouteDef) -> Result<Self> {
        let RouteDef {
            matcher,
            response,
            name,
            method,
            headers,
            query,
            repeat,
            overwrite_routes,
        } = def;

        let response = response
            .ok_or_else(|| FetchMockError::InvalidRoute("each route must define a response".to_string()))?;
        let matcher = matcher.filter(|m| !m.is_empty()).ok_or_else(|| {
            FetchMockError::InvalidRoute(
                "each route must specify a string, regex or function to match calls".to_string(),
            )
        })?;
        if repeat == Some(0) {
            return Err(FetchMockError::InvalidRoute(
                "repeat must be a positive number of calls".to_string(),
            ));
        }
        let response = response.classified()?;
        check_literal_response(&response)?;

        let url = CompiledUrlMatch::compile(&matcher, !query.is_empty())?;
        let function = match &matcher {
            Matcher::Function { func, .. } => Some(func.clone()),
            Matcher::Text(_) | Matcher::Regex(_) => None,
        };

        let (name, synthetic_name) = match name {
            Some(name) => (name, false),
            None => (matcher.to_string(), true),
        };

        let route = CompiledRoute {
            name,
            synthetic_name,
            method: method.map(|m| m.to_lowercase()),
            kind: url.kind,
            url,
            function,
            headers: headers
                .iter()
                .map(|(name, values)| compile_header_matcher(name, values.clone()))
                .collect(),
            query: query
                .iter()
                .map(|(key, value)| compile_query_matcher(key, value))
                .collect(),
            response,
            repeat,
            remaining: AtomicUsize::new(repeat.unwrap_or(0)),
            overwrite_routes,
        };
        debug!(
            "Compiled route '{}' ({:?}, method: {})",
            route.name,
            route.kind,
            route.method.as_deref().unwrap_or("any")
        );
        Ok(route)
    }

    /// Evaluate the route against a request, consuming one use of a
    /// repeat-limited route on success.
    pub fn matches(&self, request: &NormalizedRequest) -> bool {
        if self.repeat.is_some() && self.remaining.load(Ordering::Acquire) == 0 {
            return false;
        }
        if !self.predicate(request) {
            return false;
        }
        match self.repeat {
            Some(_) => self
                .remaining
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
                .is_ok(),
            None => true,
        }
    }

    fn predicate(&self, request: &NormalizedRequest) -> bool {
        self.query_matches(&request.url)
            && self.method_matches(&request.method)
            && self.headers_match(request)
            && self.url.matches(&request.url)
            && self
                .function
                .as_ref()
                .map_or(true, |func| func(&request.url, &request.options))
    }

    fn query_matches(&self, url: &str) -> bool {
        if self.query.is_empty() {
            return true;
        }
        let params = parse_query_string(url);
        self.query.iter().all(|expected| {
            // A repeated key never equals a single expected value
            expected.matches(params.get(&expected.name).map(|v| v.as_slice()))
        })
    }

    fn method_matches(&self, method: &str) -> bool {
        self.method.as_deref().map_or(true, |expected| expected == method)
    }

    fn headers_match(&self, request: &NormalizedRequest) -> bool {
        self.headers
            .iter()
            .all(|expected| expected.matches(request.headers.get_all(&expected.name)))
    }

    /// Restore the repeat counter to its declared limit.
    pub fn reset(&self) {
        if let Some(limit) = self.repeat {
            self.remaining.store(limit, Ordering::Release);
        }
    }

    /// Uses left for a repeat-limited route.
    pub fn remaining(&self) -> Option<usize> {
        self.repeat.map(|_| self.remaining.load(Ordering::Acquire))
    }

    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            name: self.name.clone(),
            synthetic_name: self.synthetic_name,
            method: self.method.clone(),
            repeat: self.repeat,
            remaining: self.remaining(),
        }
    }
}

impl fmt::Debug for CompiledRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledRoute")
            .field("name", &self.name)
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("repeat", &self.repeat)
            .field("remaining", &self.remaining())
            .finish_non_exhaustive()
    }
}

/// Reject literal responses whose status can never be built.
fn check_literal_response(response: &ResponseSpec) -> Result<()> {
    if let ResponseSpec::Literal(ResponseValue::Config(config)) = response {
        validate_status(config.status)?;
    }
    Ok(())
}
