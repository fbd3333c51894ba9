//! Host boundary.
//!
//! The host drives the bridge through [`BridgeOperations`]: describe the
//! parameter schema, create and delete channels, read and write points.
//! Every call is self-contained; identifiers are opaque strings and all
//! parameters arrive as JSON text.

use std::future::Future;

use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::error::BridgeResult;
use crate::metadata::BridgeMetadata;
use crate::pipeline;
use crate::reconnect::ConnectionState;
use crate::registry::ChannelRegistry;

/// Operations a host invokes on a bridge.
pub trait BridgeOperations: Send + Sync {
    /// Channel and point parameter schema.
    fn describe(&self) -> &BridgeMetadata;

    /// Create channel `id` and connect it.
    fn create_channel(&self, id: &str, params: &str) -> impl Future<Output = BridgeResult<()>> + Send;

    /// Delete channel `id`. Unknown ids succeed.
    fn delete_channel(&self, id: &str) -> impl Future<Output = BridgeResult<()>> + Send;

    /// Read one point; the result is `{"ts": .., "value": ..}`.
    fn read_point(&self, id: &str, params: &str) -> impl Future<Output = BridgeResult<String>> + Send;

    /// Accept a write; the result is the number of payload bytes taken.
    fn write_point(
        &self,
        id: &str,
        params: &str,
        payload: &[u8],
    ) -> impl Future<Output = BridgeResult<usize>> + Send;

    /// Called on every runtime tick.
    fn housekeeping(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// Called once when the runtime stops.
    fn shutdown(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// The Modbus implementation of [`BridgeOperations`].
pub struct ModbusBridge {
    config: BridgeConfig,
    registry: ChannelRegistry,
    metadata: BridgeMetadata,
}

impl ModbusBridge {
    pub fn new(config: BridgeConfig) -> Self {
        let registry = ChannelRegistry::new(config.link_settings());
        Self {
            config,
            registry,
            metadata: BridgeMetadata::modbus(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_registry(config: BridgeConfig, registry: ChannelRegistry) -> Self {
        Self {
            config,
            registry,
            metadata: BridgeMetadata::modbus(),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }
}

impl Default for ModbusBridge {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

impl BridgeOperations for ModbusBridge {
    fn describe(&self) -> &BridgeMetadata {
        &self.metadata
    }

    async fn create_channel(&self, id: &str, params: &str) -> BridgeResult<()> {
        self.registry.create(id, params).await.inspect_err(|e| {
            warn!(channel_id = id, code = e.code(), "Channel create failed: {}", e);
        })
    }

    async fn delete_channel(&self, id: &str) -> BridgeResult<()> {
        self.registry.delete(id).await;
        Ok(())
    }

    async fn read_point(&self, id: &str, params: &str) -> BridgeResult<String> {
        let reading = pipeline::read_point(&self.registry, &self.config.limits, id, params).await?;
        Ok(reading.to_json())
    }

    async fn write_point(&self, id: &str, params: &str, payload: &[u8]) -> BridgeResult<usize> {
        pipeline::write_point(&self.registry, id, params, payload).await
    }

    async fn housekeeping(&self) {
        for status in self.registry.snapshot().await {
            if status.state == ConnectionState::Disconnected {
                warn!(
                    channel_id = %status.id,
                    endpoint = %status.endpoint,
                    failures = status.consecutive_failures,
                    "Channel disconnected"
                );
            } else {
                debug!(channel_id = %status.id, requests = status.requests_sent, "Channel healthy");
            }
        }
    }

    async fn shutdown(&self) {
        let count = self.registry.len().await;
        self.registry.close_all().await;
        info!(channels = count, "Bridge shut down");
    }
}
