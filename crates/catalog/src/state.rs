use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use {
    anyhow::{Context, Result},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    tracing::debug,
};

/// Persisted between aggregator runs so incremental mode can skip providers
/// whose head commit has not moved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregatorState {
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Head commit SHA recorded per provider id at the last check.
    #[serde(default)]
    pub provider_commits: BTreeMap<String, String>,
    #[serde(default)]
    pub skills_count: usize,
    /// Catalog version produced by the last run.
    #[serde(default)]
    pub version: Option<String>,
}

/// Loads and saves the aggregator state file.
///
/// Missing or corrupt state degrades to the default: the next run is simply
/// a full run.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> AggregatorState {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            debug!(path = %self.path.display(), "no state file, starting fresh");
            return AggregatorState::default();
        };
        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "unreadable state file, starting fresh");
                AggregatorState::default()
            },
        }
    }

    /// Write atomically via a temp file in the same directory.
    pub fn save(&self, state: &AggregatorState) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating state directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(state).context("serializing aggregator state")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert_eq!(store.load(), AggregatorState::default());
    }

    #[test]
    fn corrupt_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(StateStore::new(path).load(), AggregatorState::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested").join("state.json"));

        let mut state = AggregatorState {
            last_run: Some(Utc::now()),
            skills_count: 42,
            version: Some("2026.08.23".into()),
            ..Default::default()
        };
        state
            .provider_commits
            .insert("anthropics".into(), "abc123".into());

        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn save_replaces_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        store.save(&AggregatorState::default()).unwrap();
        let mut updated = AggregatorState::default();
        updated.provider_commits.insert("openai".into(), "def".into());
        store.save(&updated).unwrap();

        assert_eq!(store.load(), updated);
        // No temp file left behind.
        assert!(!store.path().with_extension("json.tmp").exists());
    }
}
