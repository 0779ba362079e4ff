//! Replay scenarios for the `ag` binary
//!
//! A scenario is a YAML list of deliveries from two streams, `local` and
//! `remote`, plus the merge strategy each stream uses. Values are integers;
//! `null` (or a missing value) is an absent delivery.
//!
//! ```yaml
//! merge:
//!   local: sum
//!   remote: overwrite
//! deliveries:
//!   - { tag: local, value: 5 }
//!   - { tag: remote, value: 3 }
//!   - { tag: remote, value: null }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::PublishPolicy;
use crate::rules::{AggregationRules, Max, MergeStrategy, Overwrite, Sum, all_present};
use crate::store::HoldStore;
use crate::tag::TagDomain;

/// Where a scenario delivery came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Local,
    Remote,
}

impl TagDomain for Stream {
    const ALL: &'static [Self] = &[Stream::Local, Stream::Remote];
}

/// Per-stream merge strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeKind {
    Sum,
    #[default]
    Overwrite,
    Max,
}

/// One delivery in a scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub tag: Stream,
    #[serde(default)]
    pub value: Option<i64>,
}

/// A replayable delivery sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scenario {
    /// Merge strategy per stream; unlisted streams overwrite
    #[serde(default)]
    pub merge: HashMap<Stream, MergeKind>,

    /// Overrides the configured publish policy
    #[serde(rename = "publish-policy", default)]
    pub publish_policy: Option<PublishPolicy>,

    pub deliveries: Vec<Delivery>,
}

/// What `ag check` reports about a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioSummary {
    pub deliveries: usize,
    pub absent: usize,
    /// Streams with no present delivery; a scenario with any never publishes
    #[serde(rename = "never-delivered")]
    pub never_delivered: Vec<Stream>,
}

impl Scenario {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        debug!(path = %path.as_ref().display(), "Scenario::load: called");
        let content = fs::read_to_string(&path)
            .context(format!("Failed to read scenario {}", path.as_ref().display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse scenario")
    }

    pub fn merge_kind(&self, tag: Stream) -> MergeKind {
        self.merge.get(&tag).copied().unwrap_or_default()
    }

    pub fn rules(&self) -> ScenarioRules {
        let merge = Stream::ALL.iter().map(|tag| (*tag, self.merge_kind(*tag))).collect();
        ScenarioRules { merge }
    }

    pub fn summary(&self) -> ScenarioSummary {
        let absent = self.deliveries.iter().filter(|d| d.value.is_none()).count();
        let never_delivered = Stream::ALL
            .iter()
            .copied()
            .filter(|tag| !self.deliveries.iter().any(|d| d.tag == *tag && d.value.is_some()))
            .collect();
        ScenarioSummary {
            deliveries: self.deliveries.len(),
            absent,
            never_delivered,
        }
    }
}

/// Rules for scenario replay: per-stream merge, publish once every stream
/// has delivered, publish the total of the held values
#[derive(Debug, Clone)]
pub struct ScenarioRules {
    merge: HashMap<Stream, MergeKind>,
}

impl AggregationRules for ScenarioRules {
    type Tag = Stream;
    type Value = i64;
    type Output = i64;

    fn merge(&self, tag: Stream, old: &i64, new: i64) -> Result<i64> {
        match self.merge.get(&tag).copied().unwrap_or_default() {
            MergeKind::Sum => Sum.merge(tag, old, new),
            MergeKind::Overwrite => Overwrite.merge(tag, old, new),
            MergeKind::Max => Max.merge(tag, old, new),
        }
    }

    fn is_complete(&self, held: &HoldStore<Stream, i64>) -> Result<bool> {
        Ok(all_present(held))
    }

    fn aggregate(&self, held: &HoldStore<Stream, i64>) -> Result<i64> {
        held.iter()
            .try_fold(0i64, |acc, (_, v)| acc.checked_add(*v))
            .ok_or_else(|| eyre::eyre!("total overflows"))
    }
}
