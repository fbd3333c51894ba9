//! Channel registry.
//!
//! Maps channel ids to live channels. The map sits behind a registry-level
//! `RwLock`; each channel sits behind its own async `Mutex`, so operations on
//! one channel are serialized while different channels proceed in parallel.
//! The map lock is never held across device I/O.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::connection::{Connection, LinkSettings};
use crate::error::{BridgeError, BridgeResult};
use crate::params::{parse_channel_config, ChannelConfig, TransportKind};
use crate::reconnect::{ConnectionState, ReconnectPolicy};
use crate::transport::TransportStats;

#[cfg(test)]
use crate::transport::mock::MockDevice;

/// A live channel: its connection and reconnection state.
pub struct Channel {
    id: String,
    pub(crate) connection: Connection,
    pub(crate) policy: ReconnectPolicy,
    /// Set once the channel has left the registry
    deleted: bool,
}

impl Channel {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &ChannelConfig {
        self.connection.config()
    }

    pub fn state(&self) -> ConnectionState {
        self.policy.state()
    }

    /// Whether the channel was deleted while a caller still held its handle.
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    async fn retire(&mut self) {
        self.deleted = true;
        self.connection.close().await;
    }

    fn status(&self) -> ChannelStatus {
        let stats = self.connection.stats();
        ChannelStatus {
            id: self.id.clone(),
            kind: self.config().kind(),
            endpoint: self.connection.endpoint(),
            state: self.state(),
            consecutive_failures: self.policy.consecutive_failures(),
            reconnect_attempts: self.policy.reconnect_attempts(),
            requests_sent: stats.requests_sent,
            errors: stats.errors,
        }
    }

    pub fn stats(&self) -> TransportStats {
        self.connection.stats()
    }
}

pub type ChannelHandle = Arc<Mutex<Channel>>;

/// Diagnostic view of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub id: String,
    #[serde(serialize_with = "serialize_display")]
    pub kind: TransportKind,
    pub endpoint: String,
    #[serde(serialize_with = "serialize_display")]
    pub state: ConnectionState,
    pub consecutive_failures: u32,
    pub reconnect_attempts: u64,
    pub requests_sent: u64,
    pub errors: u64,
}

fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(value: &T, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(value)
}

/// Owner of every live channel.
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, ChannelHandle>>,
    settings: LinkSettings,
    #[cfg(test)]
    mock: Option<MockDevice>,
}

impl ChannelRegistry {
    pub fn new(settings: LinkSettings) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            settings,
            #[cfg(test)]
            mock: None,
        }
    }

    /// Registry whose channels all connect to `device`.
    #[cfg(test)]
    pub(crate) fn with_mock(device: MockDevice) -> Self {
        Self {
            mock: Some(device),
            ..Self::new(LinkSettings::default())
        }
    }

    async fn open(&self, config: ChannelConfig) -> BridgeResult<Connection> {
        #[cfg(test)]
        if let Some(device) = &self.mock {
            return Connection::open_mock(config, device.clone()).await;
        }
        Connection::open(config, &self.settings).await
    }

    /// Create channel `id` from its JSON descriptor and connect it.
    pub async fn create(&self, id: &str, params: &str) -> BridgeResult<()> {
        if self.channels.read().await.contains_key(id) {
            return Err(BridgeError::Conflict(id.to_string()));
        }

        let config = parse_channel_config(params)?;
        debug!(channel_id = id, transport = %config.kind(), "Opening channel");
        let mut connection = self.open(config).await?;

        let mut channels = self.channels.write().await;
        if channels.contains_key(id) {
            // lost a race against a concurrent create of the same id
            drop(channels);
            connection.close().await;
            return Err(BridgeError::Conflict(id.to_string()));
        }

        info!(channel_id = id, endpoint = %connection.endpoint(), "Channel created");
        channels.insert(
            id.to_string(),
            Arc::new(Mutex::new(Channel {
                id: id.to_string(),
                connection,
                policy: ReconnectPolicy::connected(),
                deleted: false,
            })),
        );
        Ok(())
    }

    /// Remove channel `id` and close its transport. Unknown ids are ignored.
    pub async fn delete(&self, id: &str) {
        let removed = self.channels.write().await.remove(id);
        match removed {
            Some(handle) => {
                // waits for an in-flight operation on this channel
                handle.lock().await.retire().await;
                info!(channel_id = id, "Channel deleted");
            }
            None => debug!(channel_id = id, "Delete of unknown channel ignored"),
        }
    }

    pub async fn lookup(&self, id: &str) -> BridgeResult<ChannelHandle> {
        self.channels
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(id.to_string()))
    }

    pub async fn len(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.channels.read().await.is_empty()
    }

    /// Live channel ids, sorted.
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.channels.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Status of every channel, sorted by id.
    pub async fn snapshot(&self) -> Vec<ChannelStatus> {
        let handles: Vec<ChannelHandle> = self.channels.read().await.values().cloned().collect();
        let mut statuses = Vec::with_capacity(handles.len());
        for handle in handles {
            statuses.push(handle.lock().await.status());
        }
        statuses.sort_by(|a, b| a.id.cmp(&b.id));
        statuses
    }

    /// Remove and close every channel.
    pub async fn close_all(&self) {
        let drained: Vec<(String, ChannelHandle)> = self.channels.write().await.drain().collect();
        for (id, handle) in drained {
            handle.lock().await.retire().await;
            debug!(channel_id = %id, "Channel closed on shutdown");
        }
    }
}
