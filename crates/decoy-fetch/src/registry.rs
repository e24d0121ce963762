//! Call registry: the ordered history of intercepted calls and the set of
//! calls still being resolved.

use crate::request::{FetchCall, RequestInit};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::warn;

/// One recorded call and the route it matched, if any.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub call: FetchCall,
    pub route: Option<String>,
}

impl CallRecord {
    pub fn url(&self) -> String {
        self.call.url()
    }

    pub fn options(&self) -> RequestInit {
        self.call.options()
    }

    /// Lowercase method, `get` when unspecified.
    pub fn method(&self) -> String {
        self.call.method()
    }

    pub fn is_matched(&self) -> bool {
        self.route.is_some()
    }
}

/// Which calls a query looks at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CallSelector {
    /// Every call, matched or not
    #[default]
    All,
    Matched,
    Unmatched,
    /// Calls of a named route, or calls to this literal url when no route has
    /// the name
    Name(String),
}

impl From<bool> for CallSelector {
    fn from(matched: bool) -> Self {
        if matched {
            CallSelector::Matched
        } else {
            CallSelector::Unmatched
        }
    }
}

impl From<&str> for CallSelector {
    fn from(name: &str) -> Self {
        CallSelector::Name(name.to_string())
    }
}

impl From<String> for CallSelector {
    fn from(name: String) -> Self {
        CallSelector::Name(name)
    }
}

#[derive(Debug, Default)]
struct CallLog {
    all: Vec<CallRecord>,
    by_route: HashMap<String, Vec<CallRecord>>,
}

type Marker = Shared<BoxFuture<'static, ()>>;

#[derive(Default)]
struct PendingSet {
    next_id: u64,
    markers: HashMap<u64, Marker>,
}

/// Ordered call history plus in-flight tracking.
#[derive(Default)]
pub struct CallRegistry {
    log: RwLock<CallLog>,
    pending: Arc<Mutex<PendingSet>>,
}

impl CallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a call; `route` is `None` for an unmatched call.
    pub fn record(&self, route: Option<&str>, call: FetchCall) {
        let record = CallRecord {
            call,
            route: route.map(str::to_string),
        };
        let mut log = self.log.write();
        if let Some(name) = route {
            log.by_route.entry(name.to_string()).or_default().push(record.clone());
        }
        log.all.push(record);
    }

    /// Calls picked by `selector`, optionally restricted to one method
    /// (case-insensitive). Insertion order is preserved.
    pub fn calls(&self, selector: &CallSelector, method: Option<&str>) -> Vec<CallRecord> {
        let log = self.log.read();
        let selected: Vec<CallRecord> = match selector {
            CallSelector::All => log.all.clone(),
            CallSelector::Matched => log.all.iter().filter(|c| c.is_matched()).cloned().collect(),
            CallSelector::Unmatched => log.all.iter().filter(|c| !c.is_matched()).cloned().collect(),
            CallSelector::Name(name) => match log.by_route.get(name) {
                Some(calls) => calls.clone(),
                None => log.all.iter().filter(|c| c.url() == *name).cloned().collect(),
            },
        };
        drop(log);

        match method {
            Some(method) => {
                let method = method.to_lowercase();
                selected.into_iter().filter(|c| c.method() == method).collect()
            }
            None => selected,
        }
    }

    pub fn last_call(&self, selector: &CallSelector, method: Option<&str>) -> Option<CallRecord> {
        self.calls(selector, method).pop()
    }

    /// Whether any call was recorded for the selector.
    pub fn called(&self, selector: &CallSelector, method: Option<&str>) -> bool {
        !self.calls(selector, method).is_empty()
    }

    /// Check that `name` was called, and at least `expected_times` times when
    /// given. Failures are logged as warnings.
    pub fn was_called(&self, name: &str, method: Option<&str>, expected_times: Option<usize>) -> bool {
        let actual = self.calls(&CallSelector::from(name), method).len();
        if actual == 0 {
            warn!("Warning: {} not called", name);
            return false;
        }
        match expected_times {
            Some(expected) if expected > actual => {
                warn!(
                    "Warning: {} only called {} times, but {} expected",
                    name, actual, expected
                );
                false
            }
            _ => true,
        }
    }

    /// Clear the history and forget in-flight markers.
    pub fn reset(&self) {
        let mut log = self.log.write();
        log.all.clear();
        log.by_route.clear();
        self.pending.lock().markers.clear();
    }

    /// Register an in-flight call. The marker clears when the guard drops.
    pub fn begin_pending(&self) -> PendingGuard {
        let (sender, receiver) = oneshot::channel::<()>();
        let marker = receiver.map(|_| ()).boxed().shared();
        let mut pending = self.pending.lock();
        let id = pending.next_id;
        pending.next_id += 1;
        pending.markers.insert(id, marker);
        PendingGuard {
            id,
            _sender: sender,
            pending: Arc::clone(&self.pending),
        }
    }

    /// Number of calls still being resolved.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().markers.len()
    }

    /// Resolves once every call in flight at the time of this call has settled.
    /// Calls started afterwards are not waited for.
    pub fn flush(&self) -> impl Future<Output = ()> + Send + 'static {
        let markers: Vec<Marker> = self.pending.lock().markers.values().cloned().collect();
        join_all(markers).map(|_| ())
    }
}

/// Keeps a call marked in flight until dropped.
pub struct PendingGuard {
    id: u64,
    // Dropping the sender wakes the marker.
    _sender: oneshot::Sender<()>,
    pending: Arc<Mutex<PendingSet>>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.lock().markers.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tracing_test::traced_test;

    fn call(url: &str, method: Option<&str>) -> FetchCall {
        let init = method.map(|m| RequestInit::new().method(m));
        FetchCall::new(url, init)
    }

    fn urls(records: &[CallRecord]) -> Vec<String> {
        records.iter().map(CallRecord::url).collect()
    }

    fn sample() -> CallRegistry {
        let registry = CallRegistry::new();
        registry.record(Some("users"), call("/users/1", None));
        registry.record(None, call("/unknown", Some("POST")));
        registry.record(Some("users"), call("/users/2", Some("DELETE")));
        registry.record(Some("posts"), call("/posts", None));
        registry
    }

    #[test]
    fn test_selectors() {
        let registry = sample();

        assert_eq!(
            urls(&registry.calls(&CallSelector::All, None)),
            vec!["/users/1", "/unknown", "/users/2", "/posts"]
        );
        assert_eq!(
            urls(&registry.calls(&CallSelector::from(true), None)),
            vec!["/users/1", "/users/2", "/posts"]
        );
        assert_eq!(
            urls(&registry.calls(&CallSelector::from(false), None)),
            vec!["/unknown"]
        );
        assert_eq!(
            urls(&registry.calls(&CallSelector::from("users"), None)),
            vec!["/users/1", "/users/2"]
        );
        // Unknown name falls back to literal url comparison
        assert_eq!(
            urls(&registry.calls(&CallSelector::from("/unknown"), None)),
            vec!["/unknown"]
        );
        assert!(registry.calls(&CallSelector::from("/nope"), None).is_empty());
    }

    #[test]
    fn test_method_filter() {
        let registry = sample();

        assert_eq!(
            urls(&registry.calls(&CallSelector::from("users"), Some("get"))),
            vec!["/users/1"]
        );
        assert_eq!(
            urls(&registry.calls(&CallSelector::All, Some("delete"))),
            vec!["/users/2"]
        );
        assert_eq!(
            urls(&registry.calls(&CallSelector::All, Some("Post"))),
            vec!["/unknown"]
        );
    }

    #[test]
    fn test_last_call_and_called() {
        let registry = sample();

        let last = registry.last_call(&CallSelector::from("users"), None).unwrap();
        assert_eq!(last.url(), "/users/2");
        assert_eq!(last.route.as_deref(), Some("users"));
        assert_eq!(last.options().method.as_deref(), Some("DELETE"));

        assert!(registry.called(&CallSelector::from("posts"), None));
        assert!(!registry.called(&CallSelector::from("posts"), Some("post")));
        assert!(registry.last_call(&CallSelector::from("nothing"), None).is_none());
    }

    #[test]
    #[traced_test]
    fn test_was_called() {
        let registry = sample();

        assert!(registry.was_called("users", None, None));
        assert!(registry.was_called("users", None, Some(2)));
        assert!(!registry.was_called("users", None, Some(3)));
        assert!(logs_contain("users only called 2 times, but 3 expected"));

        assert!(!registry.was_called("comments", None, None));
        assert!(logs_contain("comments not called"));
    }

    #[test]
    fn test_reset_clears_history() {
        let registry = sample();
        let _guard = registry.begin_pending();
        registry.reset();

        assert!(registry.calls(&CallSelector::All, None).is_empty());
        assert!(registry.calls(&CallSelector::from("users"), None).is_empty());
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_waits_for_pending() {
        let registry = Arc::new(CallRegistry::new());
        let guard = registry.begin_pending();
        assert_eq!(registry.pending_count(), 1);

        let flushed = registry.flush();
        let release = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(guard);
        });

        flushed.await;
        release.await.unwrap();
        assert_eq!(registry.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_flush_ignores_later_calls() {
        let registry = CallRegistry::new();
        let flushed = registry.flush();
        let _late = registry.begin_pending();

        tokio::time::timeout(Duration::from_secs(1), flushed)
            .await
            .expect("flush should not wait for calls started after it");
        assert_eq!(registry.pending_count(), 1);
    }
}
