//! Url matching: matcher declarations and their compiled form.
//!
//! Text matchers support the shorthand prefixes `begin:`, `end:`, `glob:` and
//! `express:`, the wildcard `*`, and plain exact strings. Regular expressions
//! and custom functions are declared with their own variants.

use crate::error::{FetchMockError, Result};
use crate::request::RequestInit;
use regex::Regex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Custom matcher: receives the normalized url and the call options.
pub type MatchFn = Arc<dyn Fn(&str, &RequestInit) -> bool + Send + Sync>;

static NEXT_FUNCTION_ID: AtomicU64 = AtomicU64::new(1);

/// Declared url matcher.
#[derive(Clone)]
pub enum Matcher {
    /// String syntax, including the shorthand prefixes
    Text(String),
    /// Regular expression, tested anywhere in the url
    Regex(Regex),
    /// Custom predicate; replaces url matching entirely
    Function { id: u64, func: MatchFn },
}

impl Matcher {
    /// Wrap a closure as a custom matcher.
    pub fn function<F>(func: F) -> Self
    where
        F: Fn(&str, &RequestInit) -> bool + Send + Sync + 'static,
    {
        Matcher::Function {
            id: NEXT_FUNCTION_ID.fetch_add(1, Ordering::Relaxed),
            func: Arc::new(func),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Matcher::Text(text) => text.is_empty(),
            Matcher::Regex(_) | Matcher::Function { .. } => false,
        }
    }
}

/// Textual form, used to derive route names.
impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Text(text) => f.write_str(text),
            Matcher::Regex(regex) => write!(f, "/{}/", regex.as_str()),
            Matcher::Function { id, .. } => write!(f, "<function #{id}>"),
        }
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Matcher::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Matcher::Function { id, .. } => f.debug_struct("Function").field("id", id).finish(),
        }
    }
}

impl From<&str> for Matcher {
    fn from(text: &str) -> Self {
        Matcher::Text(text.to_string())
    }
}

impl From<String> for Matcher {
    fn from(text: String) -> Self {
        Matcher::Text(text)
    }
}

impl From<Regex> for Matcher {
    fn from(regex: Regex) -> Self {
        Matcher::Regex(regex)
    }
}

/// Kind of url matching a route performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherKind {
    Exact,
    Begin,
    End,
    Glob,
    Express,
    Regex,
    Wildcard,
    Function,
}

/// Compiled url matcher for efficient runtime evaluation.
#[derive(Debug, Clone)]
pub enum CompiledUrlMatcher {
    Any,
    Exact(String),
    Begin(String),
    End(String),
    Regex(Arc<Regex>),
}

/// Compiled url match: the matcher plus the kind it was declared as.
#[derive(Debug, Clone)]
pub struct CompiledUrlMatch {
    pub matcher: CompiledUrlMatcher,
    pub kind: MatcherKind,
}

impl CompiledUrlMatch {
    /// Compile a matcher declaration.
    ///
    /// `has_query` is set when the route also declares query expectations; an
    /// exact matcher containing `?` then compares as a prefix.
    pub fn compile(matcher: &Matcher, has_query: bool) -> Result<Self> {
        match matcher {
            Matcher::Function { .. } => Ok(Self::new(CompiledUrlMatcher::Any, MatcherKind::Function)),
            Matcher::Regex(regex) => Ok(Self::new(
                CompiledUrlMatcher::Regex(Arc::new(regex.clone())),
                MatcherKind::Regex,
            )),
            Matcher::Text(text) => Self::compile_text(text, has_query),
        }
    }

    fn new(matcher: CompiledUrlMatcher, kind: MatcherKind) -> Self {
        Self { matcher, kind }
    }

    fn compile_text(text: &str, has_query: bool) -> Result<Self> {
        if text == "*" {
            return Ok(Self::new(CompiledUrlMatcher::Any, MatcherKind::Wildcard));
        }

        if text.starts_with('^') {
            return Err(FetchMockError::DeprecatedSyntax {
                matcher: text.to_string(),
            });
        }

        if let Some(prefix) = text.strip_prefix("begin:") {
            return Ok(Self::new(
                CompiledUrlMatcher::Begin(prefix.to_string()),
                MatcherKind::Begin,
            ));
        }

        if let Some(suffix) = text.strip_prefix("end:") {
            return Ok(Self::new(
                CompiledUrlMatcher::End(suffix.to_string()),
                MatcherKind::End,
            ));
        }

        if let Some(pattern) = text.strip_prefix("glob:") {
            let regex = compile_pattern(text, &glob_to_regex(pattern))?;
            return Ok(Self::new(CompiledUrlMatcher::Regex(regex), MatcherKind::Glob));
        }

        if let Some(template) = text.strip_prefix("express:") {
            let regex = compile_pattern(text, &path_template_to_regex(template)?)?;
            return Ok(Self::new(
                CompiledUrlMatcher::Regex(regex),
                MatcherKind::Express,
            ));
        }

        // Quirk kept for fixture compatibility: with query expectations, a
        // matcher carrying its own query string compares as a prefix.
        if has_query && text.contains('?') {
            return Ok(Self::new(
                CompiledUrlMatcher::Begin(text.to_string()),
                MatcherKind::Exact,
            ));
        }

        Ok(Self::new(
            CompiledUrlMatcher::Exact(text.to_string()),
            MatcherKind::Exact,
        ))
    }

    /// Check if a url matches this matcher.
    pub fn matches(&self, url: &str) -> bool {
        match &self.matcher {
            CompiledUrlMatcher::Any => true,
            CompiledUrlMatcher::Exact(expected) => url == expected,
            CompiledUrlMatcher::Begin(prefix) => url.starts_with(prefix.as_str()),
            CompiledUrlMatcher::End(suffix) => url.ends_with(suffix.as_str()),
            CompiledUrlMatcher::Regex(regex) => regex.is_match(url),
        }
    }
}

fn compile_pattern(source: &str, pattern: &str) -> Result<Arc<Regex>> {
    Regex::new(pattern)
        .map(Arc::new)
        .map_err(|e| FetchMockError::InvalidMatcher {
            matcher: source.to_string(),
            reason: e.to_string(),
        })
}

/// Translate a glob into an anchored regex: `*` matches any run of
/// characters, everything else is literal.
pub fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for (i, part) in glob.split('*').enumerate() {
        if i > 0 {
            pattern.push_str(".*");
        }
        pattern.push_str(&regex::escape(part));
    }
    pattern.push('$');
    pattern
}

/// Translate an express-style path template into an anchored, case-insensitive
/// regex.
///
/// Supports named segments (`:id`), optional segments (`:id?`), custom segment
/// patterns (`:id(\d+)`) and bare `*` wildcards. A single trailing slash is
/// tolerated.
pub fn path_template_to_regex(template: &str) -> Result<String> {
    let mut pattern = String::from("(?i)^");
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek().is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_') => {
                let mut name = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' {
                        name.push(n);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let mut segment = String::from("[^/]+?");
                if chars.peek() == Some(&'(') {
                    chars.next();
                    segment = take_group(&mut chars).ok_or_else(|| FetchMockError::InvalidMatcher {
                        matcher: format!("express:{template}"),
                        reason: format!("unterminated pattern for parameter ':{name}'"),
                    })?;
                }

                let optional = chars.peek() == Some(&'?');
                if optional {
                    chars.next();
                }

                // A slash right before the parameter belongs to the parameter.
                let prefix = if literal.ends_with('/') {
                    literal.pop();
                    "/"
                } else {
                    ""
                };
                pattern.push_str(&regex::escape(&literal));
                literal.clear();

                if optional {
                    pattern.push_str(&format!("(?:{}({}))?", regex::escape(prefix), segment));
                } else {
                    pattern.push_str(&format!("{}({})", regex::escape(prefix), segment));
                }
            }
            '*' => {
                pattern.push_str(&regex::escape(&literal));
                literal.clear();
                pattern.push_str("(.*)");
            }
            _ => literal.push(c),
        }
    }

    let trimmed = literal.strip_suffix('/').unwrap_or(&literal);
    pattern.push_str(&regex::escape(trimmed));
    pattern.push_str("/?$");
    Ok(pattern)
}

/// Read a balanced `( ... )` group; the opening paren is already consumed.
fn take_group(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut depth = 1;
    let mut group = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                group.push(c);
                group.push(chars.next()?);
                continue;
            }
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(group);
                }
            }
            _ => {}
        }
        group.push(c);
    }
    None
}
