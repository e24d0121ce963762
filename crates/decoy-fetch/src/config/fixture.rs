//! Declarative route fixtures loaded from YAML or JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::MockConfig;
use crate::error::{FetchMockError, Result};
use crate::predicate::Matcher;
use crate::response::{ResponseSpec, ResponseValue};
use crate::route::RouteDef;

/// A fixture document: optional config plus routes in priority order.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FixtureFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<MockConfig>,
    #[serde(default)]
    pub routes: Vec<RouteFixture>,
}

/// One route as written in a fixture.
///
/// `response` is any JSON value and is classified by the same rules as
/// programmatic responses: numbers are statuses, strings are bodies, objects
/// with reserved keys are response configs and other objects are bodies.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteFixture {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// String matcher, shorthand prefixes included
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    /// Regular expression matcher, instead of `matcher`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Header name -> a value or a list of values
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    #[serde(default)]
    pub query: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_routes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl RouteFixture {
    /// Convert into a route declaration. Compilation errors (missing
    /// response, bad matcher syntax) surface when the route is registered.
    pub fn into_route_def(self) -> Result<RouteDef> {
        let matcher = match (self.matcher, self.regex) {
            (Some(_), Some(_)) => {
                return Err(FetchMockError::InvalidRoute(
                    "a fixture route takes either `matcher` or `regex`, not both".to_string(),
                ))
            }
            (Some(text), None) => Some(Matcher::Text(text)),
            (None, Some(pattern)) => {
                let regex = regex::Regex::new(&pattern).map_err(|e| FetchMockError::InvalidMatcher {
                    matcher: pattern.clone(),
                    reason: e.to_string(),
                })?;
                Some(Matcher::Regex(regex))
            }
            (None, None) => None,
        };

        let headers = self
            .headers
            .into_iter()
            .map(|(name, value)| (name, value_list(&value)))
            .collect();
        let query = self
            .query
            .into_iter()
            .map(|(key, value)| (key, text_of(&value)))
            .collect();

        Ok(RouteDef {
            matcher,
            response: self
                .response
                .map(|value| ResponseSpec::Literal(ResponseValue::Json(value))),
            name: self.name,
            method: self.method,
            headers,
            query,
            repeat: self.repeat,
            overwrite_routes: self.overwrite_routes,
        })
    }
}

fn value_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(text_of).collect(),
        other => vec![text_of(other)],
    }
}

fn text_of(value: &Value) -> String {
    crate::response::scalar_text(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fixture_file() {
        let yaml = r#"
config:
  sendAsJson: false
routes:
  - name: users
    matcher: "begin:http://api.test/users"
    method: GET
    headers:
      X-Api-Key: secret
      Accept: [a, b]
    query:
      page: 2
    repeat: 3
    response:
      status: 200
      body: { id: 1 }
  - regex: "/items/\\d+$"
    response: 404
"#;
        let fixture: FixtureFile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(fixture.config.map(|c| c.send_as_json), Some(false));
        assert_eq!(fixture.routes.len(), 2);

        let mut routes = fixture.routes.into_iter();
        let users = routes.next().unwrap().into_route_def().unwrap();
        assert_eq!(users.name.as_deref(), Some("users"));
        assert_eq!(users.repeat, Some(3));
        assert_eq!(
            users.headers,
            vec![
                ("Accept".to_string(), vec!["a".to_string(), "b".to_string()]),
                ("X-Api-Key".to_string(), vec!["secret".to_string()]),
            ]
        );
        assert_eq!(users.query, vec![("page".to_string(), "2".to_string())]);

        let items = routes.next().unwrap().into_route_def().unwrap();
        assert!(matches!(items.matcher, Some(Matcher::Regex(_))));
        assert!(items.name.is_none());
    }

    #[test]
    fn test_fixture_matcher_conflicts() {
        let fixture = RouteFixture {
            matcher: Some("/a".to_string()),
            regex: Some("/a".to_string()),
            response: Some(Value::from(200)),
            ..Default::default()
        };
        assert!(matches!(
            fixture.into_route_def(),
            Err(FetchMockError::InvalidRoute(_))
        ));

        let fixture = RouteFixture {
            regex: Some("(".to_string()),
            response: Some(Value::from(200)),
            ..Default::default()
        };
        assert!(matches!(
            fixture.into_route_def(),
            Err(FetchMockError::InvalidMatcher { .. })
        ));
    }
}
