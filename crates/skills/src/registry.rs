use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use {
    anyhow::{Context, Result},
    skillery_catalog::types::{Catalog, CatalogSkill},
    tracing::{debug, warn},
};

/// How long a cached catalog stays fresh.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

/// Loads the published catalog for search/info/install, caching remote
/// fetches on disk. A stale cache is still used when the refresh fails;
/// no catalog at all is a hard error for catalog-backed commands.
pub struct CatalogClient {
    url: String,
    cache_path: PathBuf,
    ttl: Duration,
}

impl CatalogClient {
    pub fn new(url: impl Into<String>, cache_path: PathBuf) -> Self {
        Self {
            url: url.into(),
            cache_path,
            ttl: CACHE_TTL,
        }
    }

    /// Default cache location under the skillery data dir.
    pub fn default_cache_path() -> PathBuf {
        skillery_config::data_dir().join("cache").join("catalog.json")
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Read a catalog straight from a local file.
    pub fn load_file(path: &Path) -> Result<Catalog> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading catalog {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid catalog JSON in {}", path.display()))
    }

    /// Fetch the catalog, preferring a fresh cache.
    pub async fn load(&self) -> Result<Catalog> {
        if self.cache_is_fresh() {
            match Self::load_file(&self.cache_path) {
                Ok(catalog) => {
                    debug!(path = %self.cache_path.display(), "using cached catalog");
                    return Ok(catalog);
                },
                Err(e) => debug!(error = %e, "cached catalog unreadable, refetching"),
            }
        }

        match self.fetch().await {
            Ok(catalog) => Ok(catalog),
            Err(e) if self.cache_path.exists() => {
                warn!(error = %e, "catalog fetch failed, falling back to stale cache");
                Self::load_file(&self.cache_path)
            },
            Err(e) => Err(e),
        }
    }

    fn cache_is_fresh(&self) -> bool {
        let Ok(meta) = std::fs::metadata(&self.cache_path) else {
            return false;
        };
        meta.modified()
            .ok()
            .and_then(|m| SystemTime::now().duration_since(m).ok())
            .is_some_and(|age| age < self.ttl)
    }

    async fn fetch(&self) -> Result<Catalog> {
        let resp = reqwest::Client::new()
            .get(&self.url)
            .header("User-Agent", concat!("skillery/", env!("CARGO_PKG_VERSION")))
            .send()
            .await
            .with_context(|| format!("fetching catalog from {}", self.url))?;
        if !resp.status().is_success() {
            anyhow::bail!("catalog fetch failed: HTTP {}", resp.status());
        }
        let raw = resp.text().await?;
        let catalog: Catalog = serde_json::from_str(&raw).context("invalid catalog JSON")?;

        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.cache_path, &raw)
            .with_context(|| format!("caching catalog at {}", self.cache_path.display()))?;
        Ok(catalog)
    }
}

/// Find a skill by its `provider/name` id.
pub fn find_skill<'a>(catalog: &'a Catalog, id: &str) -> Option<&'a CatalogSkill> {
    catalog.skills.iter().find(|s| s.record.id == id)
}

/// Search skills by query. Scoring: exact name 100, name-contains 50,
/// description-contains 20, tag match 30, plus per-word name 10 / desc 5 /
/// tag 8. Results sort by score, ties by quality score.
pub fn search_skills<'a>(catalog: &'a Catalog, query: &str) -> Vec<&'a CatalogSkill> {
    let query = query.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();

    let mut results: Vec<(u32, &CatalogSkill)> = catalog
        .skills
        .iter()
        .filter_map(|skill| {
            let name = skill.record.name.to_lowercase();
            let desc = skill.record.description.to_lowercase();
            let tags: Vec<String> =
                skill.record.tags.iter().map(|t| t.to_lowercase()).collect();

            let mut score = 0u32;
            if query == name {
                score += 100;
            } else if name.contains(&query) {
                score += 50;
            }
            if desc.contains(&query) {
                score += 20;
            }
            if tags.iter().any(|t| t == &query) {
                score += 30;
            }
            for word in &words {
                if name.contains(word) {
                    score += 10;
                }
                if desc.contains(word) {
                    score += 5;
                }
                if tags.iter().any(|t| t == word) {
                    score += 8;
                }
            }

            (score > 0).then_some((score, skill))
        })
        .collect();

    results.sort_by(|a, b| {
        b.0.cmp(&a.0)
            .then_with(|| b.1.record.quality_score.cmp(&a.1.record.quality_score))
    });
    results.into_iter().map(|(_, skill)| skill).collect()
}
