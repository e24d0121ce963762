//! Ordered route list with name-clash policies, and the match router.

use super::compile::CompiledRoute;
use crate::error::{FetchMockError, Result};
use crate::registry::CallRegistry;
use crate::request::{FetchCall, NormalizedRequest};
use crate::response::ResponseSpec;
use std::sync::Arc;
use tracing::debug;

/// Where a registration landed in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAddition {
    Appended(usize),
    Replaced(usize),
}

/// Routes in matching priority order.
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: Vec<Arc<CompiledRoute>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, resolving name clashes with the route's own policy or,
    /// when it has none, `default_policy`.
    ///
    /// - `Some(false)`: duplicates are kept; the first registered wins.
    /// - `Some(true)`: a clash with the same method is replaced in place.
    /// - `None`: a clash with the same method, or any clash when the new route
    ///   has no method, is an error.
    pub fn add(&mut self, route: CompiledRoute, default_policy: Option<bool>) -> Result<RouteAddition> {
        let policy = route.overwrite_routes.or(default_policy);
        let has_clash = self.routes.iter().any(|r| r.name == route.name);

        if policy == Some(false) || !has_clash {
            return Ok(self.append(route));
        }

        let same_method = self
            .routes
            .iter()
            .position(|r| r.name == route.name && r.method == route.method);

        match (policy, same_method) {
            (Some(true), Some(index)) => {
                debug!("Replacing route '{}' at position {}", route.name, index);
                self.routes[index] = Arc::new(route);
                Ok(RouteAddition::Replaced(index))
            }
            (Some(true), None) => Ok(self.append(route)),
            (_, Some(_)) => Err(FetchMockError::RouteNameClash { name: route.name }),
            (_, None) if route.method.is_none() => {
                Err(FetchMockError::RouteNameClash { name: route.name })
            }
            (_, None) => Ok(self.append(route)),
        }
    }

    fn append(&mut self, route: CompiledRoute) -> RouteAddition {
        debug!("Registered route '{}' at position {}", route.name, self.routes.len());
        self.routes.push(Arc::new(route));
        RouteAddition::Appended(self.routes.len() - 1)
    }

    /// Cheap copy of the current list for matching outside the lock.
    pub fn snapshot(&self) -> Vec<Arc<CompiledRoute>> {
        self.routes.clone()
    }

    /// Restore every route's repeat counter.
    pub fn reset(&self) {
        for route in &self.routes {
            route.reset();
        }
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CompiledRoute>> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Find the first route accepting `request` and record the call against it.
///
/// Returns `None` without recording when nothing matches; the caller decides
/// what an unmatched call does.
pub fn route_call(
    routes: &[Arc<CompiledRoute>],
    call: &FetchCall,
    request: &NormalizedRequest,
    registry: &CallRegistry,
) -> Option<ResponseSpec> {
    let route = routes.iter().find(|route| route.matches(request))?;
    debug!("Matched {} {} to route '{}'", request.method, request.url, route.name);
    registry.record(Some(&route.name), call.clone());
    Some(route.response.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CallSelector;
    use crate::request::RequestInit;
    use crate::route::RouteDef;

    fn compiled(def: RouteDef) -> CompiledRoute {
        CompiledRoute::compile(def).unwrap()
    }

    fn status_of(spec: &ResponseSpec) -> Option<u16> {
        match spec {
            ResponseSpec::Literal(crate::response::ResponseValue::Config(config)) => config.status,
            _ => None,
        }
    }

    #[test]
    fn test_overwrite_true_replaces_in_place() {
        let mut table = RouteTable::new();
        table.add(compiled(RouteDef::new("/a", 200u16).name("a")), Some(true)).unwrap();
        table.add(compiled(RouteDef::new("/b", 200u16).name("b")), Some(true)).unwrap();

        let added = table
            .add(compiled(RouteDef::new("/a2", 201u16).name("a")), Some(true))
            .unwrap();
        assert_eq!(added, RouteAddition::Replaced(0));
        assert_eq!(table.len(), 2);

        let first = &table.snapshot()[0];
        assert_eq!(first.name, "a");
        assert_eq!(status_of(&first.response), Some(201));
    }

    #[test]
    fn test_overwrite_true_different_method_appends() {
        let mut table = RouteTable::new();
        table
            .add(compiled(RouteDef::new("/a", 200u16).name("a").method("GET")), Some(true))
            .unwrap();
        let added = table
            .add(compiled(RouteDef::new("/a", 200u16).name("a").method("POST")), Some(true))
            .unwrap();
        assert_eq!(added, RouteAddition::Appended(1));
    }

    #[test]
    fn test_overwrite_false_keeps_both() {
        let mut table = RouteTable::new();
        table.add(compiled(RouteDef::new("/a", 200u16)), Some(false)).unwrap();
        let added = table.add(compiled(RouteDef::new("/a", 404u16)), Some(false)).unwrap();
        assert_eq!(added, RouteAddition::Appended(1));

        let registry = CallRegistry::new();
        let call = FetchCall::new("/a", None);
        let spec = route_call(&table.snapshot(), &call, &call.normalize(), &registry).unwrap();
        assert_eq!(status_of(&spec), Some(200));
    }

    #[test]
    fn test_unset_policy_rejects_clash() {
        let mut table = RouteTable::new();
        table
            .add(compiled(RouteDef::new("/a", 200u16).method("GET")), None)
            .unwrap();

        let err = table
            .add(compiled(RouteDef::new("/a", 200u16).method("get")), None)
            .unwrap_err();
        assert_eq!(err, FetchMockError::RouteNameClash { name: "/a".to_string() });

        let err = table.add(compiled(RouteDef::new("/a", 200u16)), None).unwrap_err();
        assert!(matches!(err, FetchMockError::RouteNameClash { .. }));

        let added = table
            .add(compiled(RouteDef::new("/a", 200u16).method("POST")), None)
            .unwrap();
        assert_eq!(added, RouteAddition::Appended(1));
    }

    #[test]
    fn test_route_policy_overrides_default() {
        let mut table = RouteTable::new();
        table.add(compiled(RouteDef::new("/a", 200u16)), None).unwrap();
        let added = table
            .add(compiled(RouteDef::new("/a", 200u16).overwrite_routes(false)), None)
            .unwrap();
        assert_eq!(added, RouteAddition::Appended(1));
    }

    #[test]
    fn test_router_falls_through_exhausted_route() {
        let mut table = RouteTable::new();
        table
            .add(compiled(RouteDef::new("/a", 201u16).name("first").repeat(1)), Some(true))
            .unwrap();
        table
            .add(compiled(RouteDef::new("/a", 202u16).name("second")), Some(true))
            .unwrap();

        let registry = CallRegistry::new();
        let routes = table.snapshot();
        let call = FetchCall::new("/a", Some(RequestInit::new()));
        let request = call.normalize();

        let first = route_call(&routes, &call, &request, &registry).unwrap();
        let second = route_call(&routes, &call, &request, &registry).unwrap();
        assert_eq!(status_of(&first), Some(201));
        assert_eq!(status_of(&second), Some(202));

        assert_eq!(registry.calls(&CallSelector::from("first"), None).len(), 1);
        assert_eq!(registry.calls(&CallSelector::from("second"), None).len(), 1);
    }

    #[test]
    fn test_router_does_not_record_misses() {
        let mut table = RouteTable::new();
        table.add(compiled(RouteDef::new("/a", 200u16)), Some(true)).unwrap();

        let registry = CallRegistry::new();
        let call = FetchCall::new("/b", None);
        assert!(route_call(&table.snapshot(), &call, &call.normalize(), &registry).is_none());
        assert!(registry.calls(&CallSelector::All, None).is_empty());
    }
}
