//! Create-or-replace access to namespaced config maps consumed by the
//! deployed application.

use tracing::debug;

use crate::cluster::{ClusterError, ResourceClient};
use crate::model::ConfigEntry;

/// What [`ConfigDataStore::create_or_replace`] ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreAction {
    Created,
    Replaced,
}

pub struct ConfigDataStore<'a> {
    client: &'a dyn ResourceClient,
}

impl<'a> ConfigDataStore<'a> {
    pub fn new(client: &'a dyn ResourceClient) -> Self {
        Self { client }
    }

    /// Create the entry, or overwrite the data of an existing one with a
    /// single update. Keys missing from `entry.data` are dropped, not merged.
    pub async fn create_or_replace(&self, entry: &ConfigEntry) -> Result<StoreAction, ClusterError> {
        let existing = self.client.get_config_map(&entry.name).await?;
        let action = match existing {
            None => {
                self.client
                    .create_config_map(&entry.name, &entry.data)
                    .await?;
                StoreAction::Created
            }
            Some(_) => {
                self.client
                    .replace_config_map(&entry.name, &entry.data)
                    .await?;
                StoreAction::Replaced
            }
        };
        debug!(
            "Config map {}/{} {:?} with {} key(s)",
            self.client.namespace(),
            entry.name,
            action,
            entry.data.len()
        );
        Ok(action)
    }

    pub async fn read(&self, name: &str) -> Result<Option<ConfigEntry>, ClusterError> {
        Ok(self
            .client
            .get_config_map(name)
            .await?
            .map(|data| ConfigEntry {
                name: name.to_string(),
                data,
            }))
    }

    pub async fn delete(&self, name: &str) -> Result<bool, ClusterError> {
        self.client.delete_config_map(name).await
    }
}
