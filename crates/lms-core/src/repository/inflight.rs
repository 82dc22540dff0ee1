//! Single-flight for concurrent cache misses

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use lms_http::HttpError;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

type Flight = Shared<BoxFuture<'static, Result<Value, HttpError>>>;

/// Collapses concurrent fetches of the same key into one.
///
/// The first caller for a key starts the fetch; callers arriving while it
/// runs await the same result. Whichever caller finishes first clears the
/// slot, so a later miss starts a fresh fetch. Forgotten flights keep
/// running for the callers already awaiting them but take no new joiners.
#[derive(Default)]
pub struct InFlight {
    flights: Mutex<HashMap<String, Flight>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F>(&self, key: &str, fetch: F) -> Result<Value, HttpError>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Value, HttpError>>,
    {
        let flight = {
            let mut flights = self.flights.lock();
            flights
                .entry(key.to_string())
                .or_insert_with(|| fetch().shared())
                .clone()
        };

        let result = flight.clone().await;

        let mut flights = self.flights.lock();
        if flights.get(key).is_some_and(|current| current.ptr_eq(&flight)) {
            flights.remove(key);
        }
        result
    }

    /// Stop handing out flights whose key matches `pattern`
    pub fn forget_matching(&self, pattern: &Regex) -> usize {
        let mut flights = self.flights.lock();
        let before = flights.len();
        flights.retain(|key, _| !pattern.is_match(key));
        before - flights.len()
    }

    /// Number of fetches currently in flight
    pub fn len(&self) -> usize {
        self.flights.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn slow_fetch(calls: Arc<AtomicUsize>) -> BoxFuture<'static, Result<Value, HttpError>> {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json!({"id": 1}))
        }
        .boxed()
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_fetch() {
        let inflight = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b, c) = tokio::join!(
            inflight.run("course:byId:1", || slow_fetch(calls.clone())),
            inflight.run("course:byId:1", || slow_fetch(calls.clone())),
            inflight.run("course:byId:2", || slow_fetch(calls.clone())),
        );

        assert_eq!(a.unwrap(), json!({"id": 1}));
        assert_eq!(b.unwrap(), json!({"id": 1}));
        assert!(c.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(inflight.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_forgotten_key_starts_a_new_fetch() {
        let inflight = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let pattern = Regex::new("^course:byId:1$").unwrap();

        let early = inflight.run("course:byId:1", || slow_fetch(calls.clone()));
        let late = async {
            tokio::task::yield_now().await;
            assert_eq!(inflight.forget_matching(&pattern), 1);
            inflight.run("course:byId:1", || slow_fetch(calls.clone())).await
        };
        let (early, late) = tokio::join!(early, late);

        assert!(early.is_ok() && late.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_sequential_calls_fetch_again() {
        let inflight = InFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            inflight
                .run("k", move || {
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(HttpError::Network("down".into()))
                    }
                    .boxed()
                })
                .await
                .unwrap_err();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
