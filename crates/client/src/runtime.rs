//! Background task hosting an active layer generation.
//!
//! Callers never touch the [`Interceptor`] directly once it controls the
//! container. Fetches and control messages are posted to the layer task over
//! a bounded channel and answered on per-request oneshot channels; each event
//! is served on its own spawned task so a slow refresh does not hold up
//! other requests.

use std::sync::Arc;

use anacache_core::Error;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::fetch::{ApiRequest, ApiResponse};
use crate::interceptor::Interceptor;

const EVENT_BUFFER: usize = 64;

/// Work posted to the layer task.
pub enum LayerEvent {
    Fetch { request: ApiRequest, reply: oneshot::Sender<Result<ApiResponse, Error>> },
    Message { payload: Value, reply: oneshot::Sender<Value> },
}

/// Cloneable sender side of a running layer.
#[derive(Clone)]
pub struct LayerHandle {
    events: mpsc::Sender<LayerEvent>,
    cache_name: String,
}

impl LayerHandle {
    /// Route a request through the layer and wait for its response.
    pub async fn fetch(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(LayerEvent::Fetch { request, reply })
            .await
            .map_err(|_| Error::ControlClosed)?;
        rx.await.map_err(|_| Error::ControlClosed)?
    }

    /// Post a control message. The reply arrives on the returned receiver;
    /// the caller decides how long to wait for it.
    pub async fn post_message(&self, payload: Value) -> Result<oneshot::Receiver<Value>, Error> {
        let (reply, rx) = oneshot::channel();
        self.events
            .send(LayerEvent::Message { payload, reply })
            .await
            .map_err(|_| Error::ControlClosed)?;
        Ok(rx)
    }

    /// Store name of the generation behind this handle.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// Owner side of a running layer; retiring it stops the event loop.
pub struct LayerTask {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl LayerTask {
    /// Stop accepting events and wait for the loop to exit. Events already
    /// dispatched finish on their own tasks.
    pub async fn retire(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = self.join.await;
    }
}

/// Start the event loop for an activated layer.
pub fn spawn_layer(interceptor: Arc<Interceptor>) -> (LayerHandle, LayerTask) {
    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let handle = LayerHandle { events: events_tx, cache_name: interceptor.cache_name().to_string() };

    let join = tokio::spawn(run_loop(interceptor, events_rx, shutdown_rx));

    (handle, LayerTask { shutdown: Some(shutdown_tx), join })
}

async fn run_loop(interceptor: Arc<Interceptor>, mut events: mpsc::Receiver<LayerEvent>, mut shutdown: oneshot::Receiver<()>) {
    info!(cache = %interceptor.cache_name(), "layer event loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = events.recv() => match event {
                Some(event) => dispatch(interceptor.clone(), event),
                None => break,
            },
        }
    }

    interceptor.retire();
    info!(cache = %interceptor.cache_name(), "layer event loop stopped");
}

fn dispatch(interceptor: Arc<Interceptor>, event: LayerEvent) {
    tokio::spawn(async move {
        match event {
            LayerEvent::Fetch { request, reply } => {
                let result = interceptor.handle_fetch(request).await;
                if reply.send(result).is_err() {
                    debug!("fetch caller went away before the response");
                }
            }
            LayerEvent::Message { payload, reply } => {
                let answer = interceptor.handle_message(&payload).await;
                if reply.send(answer.to_message()).is_err() {
                    debug!("control caller went away before the reply");
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use anacache_core::{CacheDb, ManualClock};
    use serde_json::json;

    use super::*;
    use crate::interceptor::{InterceptorConfig, LayerState};
    use crate::testing::{ScriptedNetwork, api};

    async fn running() -> (Arc<ScriptedNetwork>, Arc<Interceptor>, LayerHandle, LayerTask) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(ScriptedNetwork::new());
        let interceptor = Arc::new(Interceptor::new(
            InterceptorConfig::default(),
            db,
            network.clone(),
            Arc::new(ManualClock::new(0)),
        ));
        interceptor.install().await.unwrap();
        interceptor.activate().await.unwrap();
        let (handle, task) = spawn_layer(interceptor.clone());
        (network, interceptor, handle, task)
    }

    #[tokio::test]
    async fn test_fetch_through_handle() {
        let (network, _, handle, _task) = running().await;
        network.respond_json("/lite/v1/analytics", json!({ "v": 1 }));

        handle.fetch(ApiRequest::get(api("/lite/v1/analytics"))).await.unwrap();
        let hit = handle.fetch(ApiRequest::get(api("/lite/v1/analytics"))).await.unwrap();

        assert_eq!(hit.cache_status(), Some("HIT"));
        assert_eq!(handle.cache_name(), "analytics-cache-v1");
    }

    #[tokio::test]
    async fn test_message_reply_arrives_on_receiver() {
        let (_, _, handle, _task) = running().await;
        let rx = handle.post_message(json!({ "action": "GET_CACHE_STATUS" })).await.unwrap();
        assert_eq!(rx.await.unwrap(), json!({ "status": [] }));
    }

    #[tokio::test]
    async fn test_retire_closes_handle() {
        let (_, interceptor, handle, task) = running().await;
        task.retire().await;

        assert_eq!(interceptor.state(), LayerState::Redundant);
        assert!(handle.is_closed());
        let result = handle.fetch(ApiRequest::get(api("/lite/v1/analytics"))).await;
        assert!(matches!(result, Err(Error::ControlClosed)));
    }
}
