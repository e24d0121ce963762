//! The mock controller: route registration, fallbacks, lifecycle and call
//! history queries.

use super::global;
use crate::config::{FixtureFile, MockConfig};
use crate::error::{FetchMockError, Result};
use crate::network::{forward_to, FetchHandler};
use crate::predicate::Matcher;
use crate::registry::{CallRecord, CallRegistry, CallSelector};
use crate::request::RequestInit;
use crate::response::{ResponseSpec, ResponseValue};
use crate::route::{CompiledRoute, RouteDef, RouteInfo, RouteTable};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared state behind a [`FetchMock`] handle.
pub(crate) struct MockState {
    pub(crate) config: RwLock<MockConfig>,
    pub(crate) routes: RwLock<RouteTable>,
    pub(crate) fallback: RwLock<Option<ResponseSpec>>,
    pub(crate) registry: CallRegistry,
    /// Native fetch supplied explicitly
    pub(crate) network: RwLock<Option<Arc<dyn FetchHandler>>>,
    /// Global handler captured by `install()`
    pub(crate) real_fetch: Mutex<Option<Arc<dyn FetchHandler>>>,
}

/// A controllable stand-in for the fetch entry point.
///
/// Handles are cheap to clone and share state. A mock works in sandbox mode
/// through [`FetchMock::dispatch`] / [`FetchMock::send`]; [`FetchMock::install`]
/// additionally routes the global [`fetch`](crate::fetch) through it.
#[derive(Clone)]
pub struct FetchMock {
    pub(crate) inner: Arc<MockState>,
}

impl fmt::Debug for FetchMock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchMock")
            .field("routes", &self.inner.routes.read().len())
            .field("calls", &self.inner.registry.calls(&CallSelector::All, None).len())
            .field("pending", &self.inner.registry.pending_count())
            .field("installed", &self.is_installed())
            .finish_non_exhaustive()
    }
}

impl Default for FetchMock {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! method_registrants {
    ($(($method:literal, $mock:ident, $once:ident)),* $(,)?) => {
        $(
            #[doc = concat!("Register a route for `", $method, "` calls.")]
            pub fn $mock(
                &self,
                matcher: impl Into<Matcher>,
                response: impl Into<ResponseSpec>,
            ) -> Result<&Self> {
                self.mock_route(RouteDef::new(matcher, response).method($method))
            }

            #[doc = concat!("Register a route answering a single `", $method, "` call.")]
            pub fn $once(
                &self,
                matcher: impl Into<Matcher>,
                response: impl Into<ResponseSpec>,
            ) -> Result<&Self> {
                self.mock_route(RouteDef::new(matcher, response).method($method).repeat(1))
            }
        )*
    };
}

impl FetchMock {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        FetchMock {
            inner: Arc::new(MockState {
                config: RwLock::new(config),
                routes: RwLock::new(RouteTable::new()),
                fallback: RwLock::new(None),
                registry: CallRegistry::new(),
                network: RwLock::new(None),
                real_fetch: Mutex::new(None),
            }),
        }
    }

    /// Supply the native fetch used for network fallback and `spy()`.
    pub fn with_network(self, handler: Arc<dyn FetchHandler>) -> Self {
        *self.inner.network.write() = Some(handler);
        self
    }

    pub fn config(&self) -> MockConfig {
        self.inner.config.read().clone()
    }

    pub fn set_config(&self, config: MockConfig) -> &Self {
        *self.inner.config.write() = config;
        self
    }

    // ===== Registration =====

    /// Register a route answering calls that match `matcher`.
    pub fn mock(&self, matcher: impl Into<Matcher>, response: impl Into<ResponseSpec>) -> Result<&Self> {
        let response = response.into();
        if is_empty_response(&response) {
            return Err(FetchMockError::InvalidRoute(
                "invalid parameters: the response must not be empty".to_string(),
            ));
        }
        self.mock_route(RouteDef::new(matcher, response))
    }

    /// Register a fully described route.
    pub fn mock_route(&self, route: RouteDef) -> Result<&Self> {
        let compiled = CompiledRoute::compile(route)?;
        let policy = self.inner.config.read().overwrite_routes;
        self.inner.routes.write().add(compiled, policy)?;
        Ok(self)
    }

    /// Register a route that answers a single call.
    pub fn once(&self, matcher: impl Into<Matcher>, response: impl Into<ResponseSpec>) -> Result<&Self> {
        self.mock_route(RouteDef::new(matcher, response).repeat(1))
    }

    method_registrants!(
        ("GET", get, get_once),
        ("POST", post, post_once),
        ("PUT", put, put_once),
        ("DELETE", delete, delete_once),
        ("HEAD", head, head_once),
        ("PATCH", patch, patch_once),
    );

    /// Answer unmatched calls with `response`.
    pub fn catch(&self, response: impl Into<ResponseSpec>) -> &Self {
        let response: ResponseSpec = response.into();
        // A literal that cannot be classified is kept; serving it reports the error.
        let response = response.clone().classified().unwrap_or(response);
        let mut fallback = self.inner.fallback.write();
        if fallback.is_some() {
            warn!(
                "calling catch() twice - are you sure you want to overwrite the previous fallback response"
            );
        }
        *fallback = Some(response);
        self
    }

    /// Answer unmatched calls with a plain `ok` body.
    pub fn catch_default(&self) -> &Self {
        self.catch("ok")
    }

    /// Forward unmatched calls to the native fetch.
    pub fn spy(&self) -> Result<&Self> {
        let native = self.native_fetch()?;
        Ok(self.catch(forward_to(native)))
    }

    /// Load a fixture document (YAML or JSON) and register its routes.
    ///
    /// A `config` section replaces the current config, and its overwrite
    /// policy applies to the fixture's routes. Nothing changes unless every
    /// route compiles and registers. Returns the number of routes registered.
    pub fn load_routes_yaml(&self, contents: &str) -> Result<usize> {
        let fixture: FixtureFile = serde_yaml::from_str(contents)?;
        let compiled = fixture
            .routes
            .into_iter()
            .map(|route| route.into_route_def().and_then(CompiledRoute::compile))
            .collect::<Result<Vec<_>>>()?;
        let count = compiled.len();

        let policy = match &fixture.config {
            Some(config) => config.overwrite_routes,
            None => self.inner.config.read().overwrite_routes,
        };
        {
            let mut routes = self.inner.routes.write();
            let mut staged = routes.clone();
            for route in compiled {
                staged.add(route, policy)?;
            }
            *routes = staged;
        }
        if let Some(config) = fixture.config {
            self.set_config(config);
        }

        info!("Loaded {} routes from fixture", count);
        Ok(count)
    }

    pub fn load_routes_file<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FetchMockError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        self.load_routes_yaml(&contents)
    }

    // ===== Lifecycle =====

    /// Route the global entry point through this mock. The handler it
    /// replaces is captured once and kept until `restore()`.
    pub fn install(&self) -> &Self {
        let handler: Arc<dyn FetchHandler> = Arc::new(self.clone());
        let previous = global::swap(handler);
        let mut real_fetch = self.inner.real_fetch.lock();
        if real_fetch.is_none() {
            *real_fetch = Some(previous);
            info!("Installed fetch mock on the global entry point");
        }
        self
    }

    pub fn is_installed(&self) -> bool {
        self.inner.real_fetch.lock().is_some()
    }

    /// Put the captured entry point back and drop every route, the fallback
    /// and the call history.
    pub fn restore(&self) -> &Self {
        if let Some(original) = self.inner.real_fetch.lock().take() {
            global::swap(original);
            info!("Restored the original fetch entry point");
        }
        *self.inner.fallback.write() = None;
        self.inner.routes.write().clear();
        self.reset()
    }

    /// Clear the call history and restore repeat counters. Routes are kept.
    pub fn reset(&self) -> &Self {
        self.inner.registry.reset();
        self.inner.routes.read().reset();
        self
    }

    /// The native fetch: the explicitly supplied one, else the one captured
    /// by `install()`.
    pub(crate) fn native_fetch(&self) -> Result<Arc<dyn FetchHandler>> {
        if let Some(network) = self.inner.network.read().as_ref() {
            return Ok(Arc::clone(network));
        }
        self.inner
            .real_fetch
            .lock()
            .as_ref()
            .map(Arc::clone)
            .ok_or(FetchMockError::NoNativeFetchAvailable)
    }

    // ===== Queries =====

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.inner.routes.read().iter().map(|route| route.info()).collect()
    }

    /// Recorded calls picked by `selector`.
    pub fn calls(&self, selector: impl Into<CallSelector>) -> Vec<CallRecord> {
        self.inner.registry.calls(&selector.into(), None)
    }

    /// Every recorded call, matched or not.
    pub fn all_calls(&self) -> Vec<CallRecord> {
        self.inner.registry.calls(&CallSelector::All, None)
    }

    pub fn calls_with_method(&self, selector: impl Into<CallSelector>, method: &str) -> Vec<CallRecord> {
        self.inner.registry.calls(&selector.into(), Some(method))
    }

    pub fn last_call(&self, selector: impl Into<CallSelector>) -> Option<CallRecord> {
        self.inner.registry.last_call(&selector.into(), None)
    }

    /// Last call picked by `selector` that used `method` (case-insensitive).
    pub fn last_call_with_method(&self, selector: impl Into<CallSelector>, method: &str) -> Option<CallRecord> {
        self.inner.registry.last_call(&selector.into(), Some(method))
    }

    /// Url of the last call picked by `selector`; a native request reports
    /// its own url.
    pub fn last_url(&self, selector: impl Into<CallSelector>) -> Option<String> {
        self.last_call(selector).map(|record| record.url())
    }

    pub fn last_url_with_method(&self, selector: impl Into<CallSelector>, method: &str) -> Option<String> {
        self.last_call_with_method(selector, method).map(|record| record.url())
    }

    /// Options of the last call picked by `selector`.
    pub fn last_options(&self, selector: impl Into<CallSelector>) -> Option<RequestInit> {
        self.last_call(selector).map(|record| record.options())
    }

    pub fn last_options_with_method(&self, selector: impl Into<CallSelector>, method: &str) -> Option<RequestInit> {
        self.last_call_with_method(selector, method).map(|record| record.options())
    }

    pub fn called(&self, selector: impl Into<CallSelector>) -> bool {
        self.inner.registry.called(&selector.into(), None)
    }

    pub fn called_with_method(&self, selector: impl Into<CallSelector>, method: &str) -> bool {
        self.inner.registry.called(&selector.into(), Some(method))
    }

    /// Whether every checked route has been called (and at least as often as
    /// its repeat count). With no `name`, every registered route is checked.
    /// Each failing route is logged as a warning.
    pub fn done(&self, name: Option<&str>, method: Option<&str>) -> bool {
        let routes = self.routes();
        let targets: Vec<(String, Option<String>)> = match name {
            Some(name) => vec![(name.to_string(), method.map(str::to_lowercase))],
            None => routes
                .iter()
                .map(|route| {
                    let method = method.map(str::to_lowercase).or_else(|| route.method.clone());
                    (route.name.clone(), method)
                })
                .collect(),
        };

        let results: Vec<bool> = targets
            .iter()
            .map(|(name, method)| {
                let expected = routes
                    .iter()
                    .find(|route| {
                        &route.name == name && (method.is_none() || &route.method == method)
                    })
                    .and_then(|route| route.repeat);
                self.inner
                    .registry
                    .was_called(name, method.as_deref(), expected)
            })
            .collect();
        debug!("done() checked {} routes", results.len());
        results.iter().all(|ok| *ok)
    }

    /// Resolves once every call dispatched before this point has settled.
    pub fn flush(&self) -> impl Future<Output = ()> + Send + 'static {
        self.inner.registry.flush()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.registry.pending_count()
    }
}

/// An empty text body or empty object is not a usable response.
fn is_empty_response(response: &ResponseSpec) -> bool {
    match response {
        ResponseSpec::Literal(ResponseValue::Text(text)) => text.is_empty(),
        ResponseSpec::Literal(ResponseValue::Json(Value::Null)) => true,
        ResponseSpec::Literal(ResponseValue::Json(Value::Object(map))) => map.is_empty(),
        _ => false,
    }
}
