//! Single-flight registry for coalescing concurrent refreshes of one key.
//!
//! The first caller for a key becomes the leader and registers a shared
//! future; callers arriving while it is pending await the same future.
//! Whoever observes completion removes the entry, so the next miss after a
//! finished refresh starts a new one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anacache_core::Error;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::debug;

use crate::fetch::ApiResponse;

type SharedRefresh = Shared<BoxFuture<'static, Result<ApiResponse, Arc<Error>>>>;

#[derive(Default)]
pub(super) struct InflightRegistry {
    pending: Mutex<HashMap<String, SharedRefresh>>,
}

impl InflightRegistry {
    /// Run `start` for `key` unless a refresh for it is already in flight, in
    /// which case wait for that one instead.
    pub(super) async fn run<F>(&self, key: String, start: F) -> Result<ApiResponse, Error>
    where
        F: FnOnce() -> BoxFuture<'static, Result<ApiResponse, Error>>,
    {
        let shared = {
            let mut pending = self.lock();
            match pending.get(&key) {
                Some(existing) if existing.peek().is_none() => {
                    debug!(key = %key, "joining in-flight refresh");
                    existing.clone()
                }
                _ => {
                    let shared = start().map(|result| result.map_err(Arc::new)).boxed().shared();
                    pending.insert(key.clone(), shared.clone());
                    shared
                }
            }
        };

        let result = shared.clone().await;

        let mut pending = self.lock();
        if pending.get(&key).is_some_and(|current| current.ptr_eq(&shared)) {
            pending.remove(&key);
        }

        result.map_err(Error::Refresh)
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SharedRefresh>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;

    fn counted(calls: Arc<AtomicUsize>, outcome: Result<u64, &'static str>) -> BoxFuture<'static, Result<ApiResponse, Error>> {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            match outcome {
                Ok(v) => Ok(ApiResponse::json(StatusCode::OK, &json!({ "v": v }))),
                Err(msg) => Err(Error::HttpError(msg.into())),
            }
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let registry = InflightRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            registry.run("k".into(), || counted(calls.clone(), Ok(1))),
            registry.run("k".into(), || counted(calls.clone(), Ok(2)))
        );

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap().json_body().unwrap(), json!({ "v": 1 }));
        assert_eq!(b.unwrap().json_body().unwrap(), json!({ "v": 1 }));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_run_independently() {
        let registry = InflightRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            registry.run("a".into(), || counted(calls.clone(), Ok(1))),
            registry.run("b".into(), || counted(calls.clone(), Ok(2)))
        );

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(b.unwrap().json_body().unwrap(), json!({ "v": 2 }));
        assert!(a.is_ok());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_not_retained() {
        let registry = InflightRegistry::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            registry.run("k".into(), || counted(calls.clone(), Err("offline"))),
            registry.run("k".into(), || counted(calls.clone(), Err("offline")))
        );
        assert!(matches!(a, Err(Error::Refresh(_))));
        assert_eq!(b.unwrap_err().to_string(), "HTTP_ERROR: offline");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let after = registry.run("k".into(), || counted(calls.clone(), Ok(3))).await;
        assert!(after.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
