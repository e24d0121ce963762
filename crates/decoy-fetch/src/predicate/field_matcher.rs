//! Generic field matcher for headers and query parameters.
//!
//! Both kinds compare the ordered list of actual values with the ordered list of
//! expected values: same length, equal position by position. Header names are
//! lowercased at compile time; query keys are kept as declared.

use std::collections::HashMap;

/// Compiled field expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFieldMatcher {
    /// Field name (lowercased for headers)
    pub name: String,
    /// Expected values in order
    pub expected: Vec<String>,
}

impl CompiledFieldMatcher {
    /// Compile a field expectation.
    ///
    /// # Arguments
    /// * `name` - The header name or query key
    /// * `expected` - Expected values, a scalar being a one-element list
    /// * `lowercase_name` - Whether to lowercase the field name (true for headers)
    pub fn compile(name: &str, expected: Vec<String>, lowercase_name: bool) -> Self {
        let name = if lowercase_name {
            name.to_lowercase()
        } else {
            name.to_string()
        };
        Self { name, expected }
    }

    /// Check the actual values of the field (None if absent).
    pub fn matches(&self, actual: Option<&[String]>) -> bool {
        match actual {
            Some(values) => values == self.expected.as_slice(),
            None => false,
        }
    }
}

pub type CompiledHeaderMatcher = CompiledFieldMatcher;
pub type CompiledQueryMatcher = CompiledFieldMatcher;

/// Compile a header expectation (lowercases the header name).
pub fn compile_header_matcher(name: &str, expected: Vec<String>) -> CompiledHeaderMatcher {
    CompiledFieldMatcher::compile(name, expected, true)
}

/// Compile a query expectation (preserves the key).
pub fn compile_query_matcher(key: &str, expected: &str) -> CompiledQueryMatcher {
    CompiledFieldMatcher::compile(key, vec![expected.to_string()], false)
}

/// Parse the query string of a url into key -> values.
///
/// The query is everything between the first `?` and an optional `#`. Keys and
/// values are percent-decoded and `+` reads as a space. Repeated keys collect
/// every value in order.
pub fn parse_query_string(url: &str) -> HashMap<String, Vec<String>> {
    let mut params: HashMap<String, Vec<String>> = HashMap::new();
    let Some((_, rest)) = url.split_once('?') else {
        return params;
    };
    let query = rest.split('#').next().unwrap_or_default();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        params
            .entry(decode_component(key))
            .or_default()
            .push(decode_component(value));
    }
    params
}

fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|s| s.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_header_matcher_scalar() {
        let compiled = compile_header_matcher("X-Api-Key", values(&["secret"]));

        assert_eq!(compiled.name, "x-api-key"); // Lowercased
        assert!(compiled.matches(Some(values(&["secret"]).as_slice())));
        assert!(!compiled.matches(Some(values(&["other"]).as_slice())));
        assert!(!compiled.matches(None));
    }

    #[test]
    fn test_header_matcher_sequence_is_ordered() {
        let compiled = compile_header_matcher("Accept", values(&["a", "b"]));

        assert!(compiled.matches(Some(values(&["a", "b"]).as_slice())));
        assert!(!compiled.matches(Some(values(&["b", "a"]).as_slice())));
        assert!(!compiled.matches(Some(values(&["a"]).as_slice())));
        assert!(!compiled.matches(Some(values(&["a", "b", "c"]).as_slice())));
    }

    #[test]
    fn test_query_matcher_preserves_key() {
        let compiled = compile_query_matcher("Page", "1");

        assert_eq!(compiled.name, "Page"); // Not lowercased
        assert!(compiled.matches(Some(values(&["1"]).as_slice())));
        assert!(!compiled.matches(Some(values(&["2"]).as_slice())));
        assert!(!compiled.matches(Some(values(&["1", "1"]).as_slice())));
    }

    #[test]
    fn test_parse_query_string() {
        let params = parse_query_string("http://a.com/s?q=hello+world&tag=a&tag=b&e=%2Fx&flag#frag");

        assert_eq!(params.get("q"), Some(&values(&["hello world"])));
        assert_eq!(params.get("tag"), Some(&values(&["a", "b"])));
        assert_eq!(params.get("e"), Some(&values(&["/x"])));
        assert_eq!(params.get("flag"), Some(&values(&[""])));
        assert!(params.get("frag").is_none());
    }

    #[test]
    fn test_parse_query_string_without_query() {
        assert!(parse_query_string("http://a.com/s").is_empty());
        assert!(parse_query_string("http://a.com/s?").is_empty());
    }
}
