//! Control messages answered by the layer.

use anacache_core::{CacheStatusEntry, ControlReply, ControlRequest, Error};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::Interceptor;

impl Interceptor {
    /// Answer one posted control message. Never fails: faults are reported
    /// in the reply.
    pub async fn handle_message(&self, message: &Value) -> ControlReply {
        let Some(request) = ControlRequest::from_message(message) else {
            warn!(message = %message, "unknown control action");
            return ControlReply::unknown_action();
        };
        debug!(action = request.action(), "control message");

        match request {
            ControlRequest::ClearCache => ControlReply::Ack { success: self.clear_all().await },
            ControlRequest::ClearEndpointCache { data } => {
                let success = match self.storage.delete_endpoint(&self.config.cache_name, &data.endpoint).await {
                    Ok(removed) => {
                        info!(endpoint = %data.endpoint, removed, "cleared endpoint entries");
                        true
                    }
                    Err(err) => {
                        warn!(endpoint = %data.endpoint, error = %err, "endpoint clear failed");
                        false
                    }
                };
                ControlReply::Ack { success }
            }
            ControlRequest::GetCacheStatus => match self.cache_status().await {
                Ok(status) => ControlReply::Status { status },
                Err(err) => {
                    warn!(error = %err, "status report failed");
                    ControlReply::Error { error: err.to_string() }
                }
            },
        }
    }

    /// Delete every named store. False if listing or any deletion failed.
    async fn clear_all(&self) -> bool {
        let names = match self.storage.cache_names().await {
            Ok(names) => names,
            Err(err) => {
                warn!(error = %err, "could not list caches");
                return false;
            }
        };

        let mut success = true;
        for name in names {
            if let Err(err) = self.storage.delete_cache(&name).await {
                warn!(cache = %name, error = %err, "cache deletion failed");
                success = false;
            }
        }
        info!(success, "cleared all caches");
        success
    }

    /// Freshness of every metadata-carrying entry in the current store.
    pub async fn cache_status(&self) -> Result<Vec<CacheStatusEntry>, Error> {
        let now = self.clock.now_ms();
        let entries = self.storage.entries(&self.config.cache_name).await?;

        Ok(entries
            .iter()
            .filter_map(|entry| entry.metadata())
            .map(|metadata| {
                let age = now - metadata.timestamp;
                let policy = self.config.policies.lookup(&metadata.endpoint);
                CacheStatusEntry { endpoint: metadata.endpoint, timestamp: metadata.timestamp, age, expired: policy.is_expired(age) }
            })
            .collect())
    }
}
