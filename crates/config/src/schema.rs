use serde::{Deserialize, Serialize};

/// Top-level skillery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SkilleryConfig {
    pub aggregator: AggregatorConfig,
    pub install: InstallConfig,
}

/// Tuning knobs for the catalog aggregation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Similarity at or above which a record is annotated as a mirror.
    pub mirror_threshold: f64,
    /// Similarity at or above which a record is annotated as a probable duplicate.
    pub duplicate_threshold: f64,
    /// Lowest similarity still reported in the similar-skills cross-reference.
    /// 0.0 includes every other member of a name-group.
    pub similar_floor: f64,
    /// Attempts per HTTP request before an item is skipped.
    pub fetch_retries: u32,
    /// Per-request timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Providers whose skills get the full trust contribution in scoring
    /// and the trust boost in name-matched similarity.
    pub trusted_providers: Vec<String>,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            mirror_threshold: 0.95,
            duplicate_threshold: 0.80,
            similar_floor: 0.0,
            fetch_retries: 3,
            fetch_timeout_secs: 30,
            trusted_providers: vec!["anthropics".into(), "openai".into(), "github".into()],
        }
    }
}

/// Settings for installing skills locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallConfig {
    /// Target agent layout: "auto" detects from the project, otherwise one of
    /// the known agent ids (claude, copilot, cursor, generic).
    pub default_agent: String,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            default_agent: "auto".into(),
        }
    }
}
