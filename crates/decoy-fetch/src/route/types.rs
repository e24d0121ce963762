use crate::predicate::Matcher;
use crate::response::ResponseSpec;

/// An uncompiled route declaration.
///
/// Every field is optional so declarations can be assembled piecemeal (from
/// the per-method registrants or from fixtures); missing required fields are
/// reported when the route is compiled.
#[derive(Debug, Clone, Default)]
pub struct RouteDef {
    pub matcher: Option<Matcher>,
    pub response: Option<ResponseSpec>,
    pub name: Option<String>,
    pub method: Option<String>,
    /// Header name -> expected values, in order
    pub headers: Vec<(String, Vec<String>)>,
    /// Query key -> expected value
    pub query: Vec<(String, String)>,
    pub repeat: Option<usize>,
    /// Overrides the config-level clash policy for this route
    pub overwrite_routes: Option<bool>,
}

impl RouteDef {
    pub fn new(matcher: impl Into<Matcher>, response: impl Into<ResponseSpec>) -> Self {
        Self {
            matcher: Some(matcher.into()),
            response: Some(response.into()),
            ..Default::default()
        }
    }

    pub fn matcher(mut self, matcher: impl Into<Matcher>) -> Self {
        self.matcher = Some(matcher.into());
        self
    }

    pub fn response(mut self, response: impl Into<ResponseSpec>) -> Self {
        self.response = Some(response.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Expect a single header value.
    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.header_values(name, vec![value.into()])
    }

    /// Expect an ordered list of values for one header.
    pub fn header_values(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.headers.push((name.into(), values));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn repeat(mut self, times: usize) -> Self {
        self.repeat = Some(times);
        self
    }

    pub fn overwrite_routes(mut self, overwrite: bool) -> Self {
        self.overwrite_routes = Some(overwrite);
        self
    }
}

/// Snapshot of a registered route, for introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub name: String,
    /// Name derived from the matcher rather than given explicitly
    pub synthetic_name: bool,
    pub method: Option<String>,
    pub repeat: Option<usize>,
    pub remaining: Option<usize>,
}
