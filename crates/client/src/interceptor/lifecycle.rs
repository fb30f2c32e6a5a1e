//! Install / activate lifecycle of a layer generation.

use anacache_core::{Error, StoredEntry};
use tracing::{debug, info, warn};

use super::Interceptor;
use crate::fetch::ApiRequest;

/// Lifecycle state of one layer generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    Installing,
    /// Installed and ready; does not wait for the previous generation.
    Installed,
    Activating,
    /// Controlling the container.
    Active,
    /// Replaced or unregistered.
    Redundant,
}

impl Interceptor {
    /// Open this generation's store and fill it with the precache list.
    ///
    /// Any precache failure fails the install.
    pub async fn install(&self) -> Result<(), Error> {
        self.set_state(LayerState::Installing);
        self.storage.open_cache(&self.config.cache_name).await?;

        for url in &self.config.precache {
            let request = ApiRequest::get(url.clone());
            let response = self
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed(format!("precache {url}: {e}")))?;

            if !response.is_success() {
                return Err(Error::InstallFailed(format!("precache {url}: status {}", response.status.as_u16())));
            }

            let entry = StoredEntry::raw(request.method.as_str(), url.as_str(), url.path(), response.body.to_vec());
            self.storage.put_entry(&self.config.cache_name, &entry).await?;
            debug!(url = %url, "precached");
        }

        self.set_state(LayerState::Installed);
        info!(cache = %self.config.cache_name, precached = self.config.precache.len(), "interception layer installed");
        Ok(())
    }

    /// Delete every store generation other than this one, then take control.
    ///
    /// Returns the names of the swept stores.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.set_state(LayerState::Activating);

        let mut swept = Vec::new();
        for name in self.storage.cache_names().await? {
            if name == self.config.cache_name {
                continue;
            }
            if self.storage.delete_cache(&name).await? {
                info!(cache = %name, "deleted stale cache generation");
                swept.push(name);
            } else {
                warn!(cache = %name, "cache generation vanished before it could be swept");
            }
        }

        self.set_state(LayerState::Active);
        info!(cache = %self.config.cache_name, swept = swept.len(), "interception layer active");
        Ok(swept)
    }

    /// Mark this generation as no longer controlling anything.
    pub fn retire(&self) {
        self.set_state(LayerState::Redundant);
        debug!(cache = %self.config.cache_name, "interception layer retired");
    }
}
