//! Aggregator configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::PublishPolicy;

/// Aggregator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Whether repeated complete evaluations republish
    #[serde(rename = "publish-policy", default)]
    pub publish_policy: PublishPolicy,

    /// Channel buffer size for service requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    256
}

impl AggregatorConfig {
    /// A zero-capacity request queue cannot exist
    pub fn validate(&self) -> eyre::Result<()> {
        if self.channel_buffer == 0 {
            eyre::bail!("channel-buffer must be at least 1");
        }
        Ok(())
    }
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        debug!("AggregatorConfig::default: called");
        Self {
            publish_policy: PublishPolicy::Always,
            channel_buffer: 256,
        }
    }
}
