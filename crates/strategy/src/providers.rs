use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smirk_trade_core::{FeatureProvider, OptionsChainSnapshot};
use smirk_trade_signals::{smirk_features, SkewEngine};
use std::collections::BTreeMap;
use std::path::Path;

/// IV-moment and skew features computed from the cycle's snapshots.
#[derive(Debug, Clone)]
pub struct SmirkFeatures {
    snapshots: Vec<OptionsChainSnapshot>,
    engine: SkewEngine,
}

impl SmirkFeatures {
    #[must_use]
    pub fn new(snapshots: Vec<OptionsChainSnapshot>, engine: SkewEngine) -> Self {
        Self { snapshots, engine }
    }
}

/// Externally supplied alpha, such as a news or macro score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticFeatures {
    pub name: String,
    pub values: BTreeMap<String, f64>,
}

impl StaticFeatures {
    #[must_use]
    pub fn new(name: impl Into<String>, values: BTreeMap<String, f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Loads a list of named feature sets, e.g.
    /// `[{"name": "news", "values": {"sentiment": 0.4}}]`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: &Path) -> Result<Vec<Self>> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read alpha file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse alpha file {}", path.display()))
    }
}

/// The closed set of feature providers the strategy engine can combine.
#[derive(Debug, Clone)]
pub enum FeatureSource {
    Smirk(SmirkFeatures),
    Static(StaticFeatures),
}

impl FeatureProvider for FeatureSource {
    fn name(&self) -> &str {
        match self {
            Self::Smirk(_) => "smirk",
            Self::Static(features) => &features.name,
        }
    }

    fn compute(&self) -> Result<BTreeMap<String, f64>> {
        match self {
            Self::Smirk(features) => {
                if features.snapshots.is_empty() {
                    anyhow::bail!("no options chain snapshots to derive smirk features from");
                }
                Ok(smirk_features(&features.snapshots, &features.engine))
            }
            Self::Static(features) => {
                if let Some((key, _)) = features.values.iter().find(|(_, v)| !v.is_finite()) {
                    anyhow::bail!("feature {key} from {} is not finite", features.name);
                }
                Ok(features.values.clone())
            }
        }
    }
}
