//! Ingestion configuration.

use serde::{Deserialize, Serialize};

use crate::types::Network;

/// Configuration for an ingestion pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Network the node follows; decides PoX address versions and the
    /// notifier's `network` field.
    pub network: Network,
    /// Durable queue the reorg notifier publishes to.
    pub queue_name: String,
    /// SQLite database path (`":memory:"` for ephemeral runs).
    pub db_path: String,
    /// Transport retry attempts before a publish is abandoned.
    pub publish_max_attempts: u32,
    /// Initial publish backoff in milliseconds (doubles per attempt).
    pub publish_backoff_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub publish_backoff_max_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            queue_name: "stacks-chain-events".into(),
            db_path: "./stacksindex.db".into(),
            publish_max_attempts: 8,
            publish_backoff_ms: 250,
            publish_backoff_max_ms: 30_000,
        }
    }
}

/// Fluent builder for [`IngestConfig`].
#[derive(Default)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: IngestConfig::default(),
        }
    }

    pub fn network(mut self, network: Network) -> Self {
        self.config.network = network;
        self
    }

    pub fn queue_name(mut self, name: impl Into<String>) -> Self {
        self.config.queue_name = name.into();
        self
    }

    pub fn db_path(mut self, path: impl Into<String>) -> Self {
        self.config.db_path = path.into();
        self
    }

    pub fn publish_retry(mut self, max_attempts: u32, backoff_ms: u64, backoff_max_ms: u64) -> Self {
        self.config.publish_max_attempts = max_attempts;
        self.config.publish_backoff_ms = backoff_ms;
        self.config.publish_backoff_max_ms = backoff_max_ms;
        self
    }

    pub fn build(self) -> IngestConfig {
        self.config
    }
}

impl IngestConfig {
    /// Construct a [`ReorgNotifier`](crate::notify::ReorgNotifier) wired to
    /// this configuration.
    pub fn notifier(
        &self,
        queue: std::sync::Arc<dyn crate::notify::MessageQueue>,
    ) -> crate::notify::ReorgNotifier {
        crate::notify::ReorgNotifier::new(queue, self.queue_name.clone(), self.network).with_retry(
            self.publish_max_attempts,
            self.publish_backoff_ms,
            self.publish_backoff_max_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = IngestConfigBuilder::new().build();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.queue_name, "stacks-chain-events");
        assert_eq!(config.publish_max_attempts, 8);
    }

    #[test]
    fn builder_custom() {
        let config = IngestConfigBuilder::new()
            .network(Network::Testnet)
            .queue_name("events-test")
            .db_path(":memory:")
            .publish_retry(3, 50, 500)
            .build();

        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.queue_name, "events-test");
        assert_eq!(config.db_path, ":memory:");
        assert_eq!(config.publish_backoff_max_ms, 500);
    }
}
