use std::{
    collections::{BTreeMap, HashSet},
    time::Duration,
};

use {
    anyhow::{Result, bail},
    chrono::Utc,
    skillery_config::AggregatorConfig,
    tracing::{debug, info, warn},
};

use crate::{
    build,
    dedup::{self, DedupConfig},
    enrich,
    fetch::Fetcher,
    parse,
    providers::{ProviderConfig, ProviderRegistry},
    state::{AggregatorState, StateStore},
    taxonomy,
    types::{Catalog, CatalogSkill, ProviderStats, SkillRecord, SkillSource},
};

/// Drives a full or incremental catalog run: fetch every provider, parse and
/// enrich the discovered skills, annotate duplicates, and compose the output
/// document. Any single provider failing yields zero skills from it and the
/// run continues; only a run where no provider is reachable fails.
pub struct Aggregator {
    fetcher: Fetcher,
    registry: ProviderRegistry,
    trusted: HashSet<String>,
    dedup_config: DedupConfig,
}

impl Aggregator {
    pub fn new(registry: ProviderRegistry, config: &AggregatorConfig) -> Self {
        let fetcher = Fetcher::new(
            config.fetch_retries,
            Duration::from_secs(config.fetch_timeout_secs),
        );
        Self::with_fetcher(fetcher, registry, config)
    }

    /// Inject a pre-built fetcher (tests point it at a local server).
    pub fn with_fetcher(
        fetcher: Fetcher,
        registry: ProviderRegistry,
        config: &AggregatorConfig,
    ) -> Self {
        Self {
            fetcher,
            registry,
            trusted: config.trusted_providers.iter().cloned().collect(),
            dedup_config: DedupConfig {
                mirror_threshold: config.mirror_threshold,
                duplicate_threshold: config.duplicate_threshold,
                similar_floor: config.similar_floor,
            },
        }
    }

    /// Fetch every provider and build a complete catalog.
    ///
    /// Errors only when no provider could be reached at all; a run that
    /// would overwrite a previous catalog with nothing fetched is
    /// meaningless and must not look like success.
    pub async fn run_full(&self, store: &StateStore) -> Result<Catalog> {
        let mut records = Vec::new();
        let mut stats = BTreeMap::new();
        let mut commits = BTreeMap::new();
        let mut reachable = 0usize;

        for provider in self.registry.iter() {
            if let Some(sha) = self.head_sha(provider).await {
                commits.insert(provider.id.clone(), sha);
            }
            if let Some(fetched) = self.fetch_provider_skills(provider).await {
                info!(provider = %provider.id, skills = fetched.len(), "provider fetched");
                records.extend(fetched);
                reachable += 1;
            }
            stats.insert(provider.id.clone(), self.fetch_provider_stats(provider).await);
        }

        if reachable == 0 {
            bail!("no provider could be reached, leaving any previous catalog untouched");
        }

        let outcome = dedup::annotate(&records, &self.registry, &self.trusted, &self.dedup_config);
        let catalog = build::build_catalog(records, outcome, &self.registry, stats);
        self.save_state(store, commits, &catalog)?;
        Ok(catalog)
    }

    /// Re-fetch only providers whose head commit moved since the last run.
    /// Entries for unchanged providers are carried over from `previous`
    /// verbatim, annotations included. Returns `None` when nothing changed
    /// and the previous catalog is still current.
    pub async fn run_incremental(
        &self,
        store: &StateStore,
        previous: Option<Catalog>,
    ) -> Result<Option<Catalog>> {
        let Some(previous) = previous else {
            debug!("no previous catalog, falling back to a full run");
            return Ok(Some(self.run_full(store).await?));
        };
        let state = store.load();

        let mut commits = BTreeMap::new();
        let mut changed: Vec<&ProviderConfig> = Vec::new();
        for provider in self.registry.iter() {
            match self.head_sha(provider).await {
                Some(sha) => {
                    if state.provider_commits.get(&provider.id) != Some(&sha) {
                        changed.push(provider);
                    }
                    commits.insert(provider.id.clone(), sha);
                },
                // Head unknown: keep the carried entries rather than drop a
                // provider over a transient API failure.
                None => {
                    warn!(provider = %provider.id, "head commit unavailable, treating as unchanged");
                    if let Some(sha) = state.provider_commits.get(&provider.id) {
                        commits.insert(provider.id.clone(), sha.clone());
                    }
                },
            }
        }

        if changed.is_empty() {
            info!("all providers unchanged, catalog is up to date");
            return Ok(None);
        }

        info!(changed = changed.len(), "providers changed since last run");

        let mut records = Vec::new();
        let mut stats = BTreeMap::new();
        let mut changed_ids = HashSet::new();
        for provider in &changed {
            match self.fetch_provider_skills(provider).await {
                Some(fetched) => {
                    info!(provider = %provider.id, skills = fetched.len(), "provider refetched");
                    records.extend(fetched);
                    stats.insert(provider.id.clone(), self.fetch_provider_stats(provider).await);
                    changed_ids.insert(provider.id.clone());
                },
                // Unreachable: keep the carried entries and roll the stored
                // SHA back so the next run retries this provider.
                None => match state.provider_commits.get(&provider.id) {
                    Some(sha) => {
                        commits.insert(provider.id.clone(), sha.clone());
                    },
                    None => {
                        commits.remove(&provider.id);
                    },
                },
            }
        }

        // Bodies are not persisted in the catalog, so similarity can only be
        // recomputed among the freshly fetched records. Carried entries keep
        // their previous annotations.
        let outcome = dedup::annotate(&records, &self.registry, &self.trusted, &self.dedup_config);
        let mut skills: Vec<CatalogSkill> = records
            .into_iter()
            .map(|record| {
                let annotation = outcome.annotations.get(&record.id).cloned();
                let similar = outcome.similar.get(&record.id).cloned().unwrap_or_default();
                CatalogSkill::new(record, annotation, similar)
            })
            .collect();
        for (id, prev_stats) in previous.providers {
            if !changed_ids.contains(&id) {
                stats.entry(id).or_insert(prev_stats);
            }
        }
        skills.extend(
            previous
                .skills
                .into_iter()
                .filter(|s| !changed_ids.contains(&s.record.provider)),
        );

        let catalog = build::finalize_catalog(skills, &self.registry, stats);
        self.save_state(store, commits, &catalog)?;
        Ok(Some(catalog))
    }

    fn save_state(
        &self,
        store: &StateStore,
        provider_commits: BTreeMap<String, String>,
        catalog: &Catalog,
    ) -> Result<()> {
        store.save(&AggregatorState {
            last_run: Some(Utc::now()),
            provider_commits,
            skills_count: catalog.total_skills,
            version: Some(catalog.version.clone()),
        })
    }

    // ── Per-provider fetching ─────────────────────────────────────────────────

    /// Head commit SHA of the provider's default branch.
    async fn head_sha(&self, provider: &ProviderConfig) -> Option<String> {
        let (owner, repo) = provider.owner_repo()?;
        let url = format!("{}/repos/{owner}/{repo}/commits?per_page=1", provider.api_base);
        let commits = self.fetcher.fetch_json(&url).await?;
        Some(commits.as_array()?.first()?.get("sha")?.as_str()?.to_string())
    }

    /// Stars and description from the repository endpoint. Failures degrade
    /// to stats without the optional fields.
    async fn fetch_provider_stats(&self, provider: &ProviderConfig) -> ProviderStats {
        let mut stats = ProviderStats {
            name: provider.name.clone(),
            repo: provider.repo.clone(),
            skills_count: 0,
            stars: None,
            description: None,
        };
        let Some((owner, repo)) = provider.owner_repo() else {
            return stats;
        };
        let url = format!("{}/repos/{owner}/{repo}", provider.api_base);
        if let Some(info) = self.fetcher.fetch_json(&url).await {
            stats.stars = info.get("stargazers_count").and_then(|v| v.as_u64());
            stats.description = info
                .get("description")
                .and_then(|v| v.as_str())
                .map(str::to_string);
        }
        stats
    }

    /// Discover and fetch every skill in one provider repository.
    ///
    /// `None` means the tree listing itself failed and the provider was
    /// unreachable this run; individual document failures skip just that
    /// document.
    async fn fetch_provider_skills(&self, provider: &ProviderConfig) -> Option<Vec<SkillRecord>> {
        let Some(tree) = self.fetcher.fetch_json(&provider.api_tree_url).await else {
            warn!(provider = %provider.id, "tree listing failed, skipping provider");
            return None;
        };
        let tree_sha = tree.get("sha").and_then(|v| v.as_str()).map(str::to_string);
        let Some(entries) = tree.get("tree").and_then(|v| v.as_array()) else {
            warn!(provider = %provider.id, "tree listing has no entries, skipping provider");
            return Some(Vec::new());
        };

        let all_paths: Vec<String> = entries
            .iter()
            .filter_map(|e| e.get("path").and_then(|p| p.as_str()))
            .map(str::to_string)
            .collect();
        let doc_paths: Vec<&str> = all_paths
            .iter()
            .map(String::as_str)
            .filter(|p| is_skill_doc(p, &provider.skills_path_prefix))
            .collect();
        debug!(provider = %provider.id, documents = doc_paths.len(), "skill documents discovered");

        let mut records = Vec::new();
        let mut seen_ids = HashSet::new();
        for doc_path in doc_paths {
            let Some(record) = self
                .fetch_one_skill(provider, doc_path, &all_paths, tree_sha.clone())
                .await
            else {
                continue;
            };
            if !seen_ids.insert(record.id.clone()) {
                warn!(id = %record.id, path = %doc_path, "duplicate skill id within provider, skipping");
                continue;
            }
            records.push(record);
        }
        Some(records)
    }

    async fn fetch_one_skill(
        &self,
        provider: &ProviderConfig,
        doc_path: &str,
        all_paths: &[String],
        tree_sha: Option<String>,
    ) -> Option<SkillRecord> {
        let url = format!("{}/{doc_path}", provider.raw_base);
        let content = self.fetcher.fetch_text(&url).await?;
        let doc = parse::parse_skill_doc(&content)?;

        let skill_dir = doc_path.strip_suffix("/SKILL.md").unwrap_or("");
        let (owner, repo) = provider.owner_repo()?;
        let name = parse::resolve_name(&doc.frontmatter, skill_dir, repo)?;
        let description = doc.frontmatter.description.clone().unwrap_or_default();

        let dirs = enrich::directory_flags(all_paths, skill_dir);
        let last_updated_at =
            enrich::fetch_last_updated(&self.fetcher, &provider.api_base, owner, repo, doc_path)
                .await;
        let days_since_update =
            last_updated_at.map(|dt| (Utc::now() - dt).num_days().max(0));
        let maintenance_status = days_since_update.map(enrich::maintenance_status);
        let trusted = self.trusted.contains(&provider.id);

        Some(SkillRecord {
            id: format!("{}/{name}", provider.id),
            category: taxonomy::categorize(&name, &description).to_string(),
            tags: doc
                .frontmatter
                .tags
                .clone()
                .unwrap_or_else(|| taxonomy::extract_tags(&name, &description)),
            license: doc.frontmatter.license.clone(),
            compatibility: doc.frontmatter.compatibility.clone(),
            metadata: doc.frontmatter.metadata.clone().unwrap_or_default(),
            source: SkillSource {
                repo: provider.repo.clone(),
                path: skill_dir.to_string(),
                skill_md_url: url,
                commit_sha: tree_sha,
            },
            has_scripts: dirs.has_scripts,
            has_references: dirs.has_references,
            has_assets: dirs.has_assets,
            quality_score: enrich::quality_score(maintenance_status, dirs, trusted),
            last_updated_at,
            days_since_update,
            maintenance_status,
            provider: provider.id.clone(),
            name,
            description,
            body: doc.body,
        })
    }
}

/// A tree path names a skill document when it is the repo-root SKILL.md or a
/// SKILL.md under the provider's skills prefix.
fn is_skill_doc(path: &str, prefix: &str) -> bool {
    path == "SKILL.md" || (path.starts_with(prefix) && path.ends_with("/SKILL.md"))
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn test_provider(server_url: &str, id: &str, priority: u32) -> ProviderConfig {
        ProviderConfig {
            id: id.into(),
            name: id.into(),
            repo: format!("https://github.com/{id}/skills"),
            api_base: server_url.into(),
            api_tree_url: format!("{server_url}/repos/{id}/skills/git/trees/main?recursive=1"),
            raw_base: format!("{server_url}/raw/{id}"),
            skills_path_prefix: "skills/".into(),
            priority,
        }
    }

    fn test_aggregator(registry: ProviderRegistry) -> Aggregator {
        let fetcher = Fetcher::with_token(1, Duration::from_secs(5), None)
            .with_backoff_base(Duration::from_millis(1));
        Aggregator::with_fetcher(fetcher, registry, &AggregatorConfig::default())
    }

    async fn mock_provider(
        server: &mut mockito::ServerGuard,
        id: &str,
        head_sha: &str,
        skills: &[(&str, &str)],
    ) -> Vec<mockito::Mock> {
        let mut mocks = Vec::new();
        mocks.push(
            server
                .mock("GET", format!("/repos/{id}/skills/commits?per_page=1").as_str())
                .with_status(200)
                .with_body(format!(r#"[{{"sha":"{head_sha}"}}]"#))
                .create_async()
                .await,
        );
        mocks.push(
            server
                .mock("GET", format!("/repos/{id}/skills").as_str())
                .with_status(200)
                .with_body(r#"{"stargazers_count":1200,"description":"Agent skills"}"#)
                .create_async()
                .await,
        );

        let tree: Vec<String> = skills
            .iter()
            .map(|(name, _)| format!(r#"{{"path":"skills/{name}/SKILL.md","type":"blob"}}"#))
            .collect();
        mocks.push(
            server
                .mock(
                    "GET",
                    format!("/repos/{id}/skills/git/trees/main?recursive=1").as_str(),
                )
                .with_status(200)
                .with_body(format!(r#"{{"sha":"{head_sha}","tree":[{}]}}"#, tree.join(",")))
                .create_async()
                .await,
        );
        for (name, body) in skills {
            mocks.push(
                server
                    .mock("GET", format!("/raw/{id}/skills/{name}/SKILL.md").as_str())
                    .with_status(200)
                    .with_body(format!(
                        "---\nname: {name}\ndescription: Skill {name}\n---\n{body}\n"
                    ))
                    .create_async()
                    .await,
            );
            mocks.push(
                server
                    .mock(
                        "GET",
                        mockito::Matcher::Regex(format!(
                            r"^/repos/{id}/skills/commits\?path=.*{name}.*$"
                        )),
                    )
                    .with_status(200)
                    .with_body(
                        r#"[{"sha":"c1","commit":{"author":{"date":"2026-08-20T00:00:00Z"}}}]"#,
                    )
                    .create_async()
                    .await,
            );
        }
        mocks
    }

    #[tokio::test]
    async fn full_run_builds_catalog_and_state() {
        let mut server = mockito::Server::new_async().await;
        let _m1 =
            mock_provider(&mut server, "alpha", "sha-a", &[("pdf-tools", "Extract PDFs.")]).await;
        let _m2 =
            mock_provider(&mut server, "beta", "sha-b", &[("web-search", "Search the web.")]).await;

        let registry = ProviderRegistry::new(vec![
            test_provider(&server.url(), "alpha", 1),
            test_provider(&server.url(), "beta", 2),
        ]);
        let aggregator = test_aggregator(registry);

        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let catalog = aggregator.run_full(&store).await.unwrap();

        assert_eq!(catalog.total_skills, 2);
        assert_eq!(catalog.providers["alpha"].stars, Some(1200));
        let pdf = catalog
            .skills
            .iter()
            .find(|s| s.record.id == "alpha/pdf-tools")
            .unwrap();
        assert_eq!(pdf.record.category, "documents");
        assert!(pdf.record.maintenance_status.is_some());

        let state = store.load();
        assert_eq!(state.provider_commits["alpha"], "sha-a");
        assert_eq!(state.provider_commits["beta"], "sha-b");
        assert_eq!(state.skills_count, 2);
    }

    #[tokio::test]
    async fn failed_provider_yields_zero_skills_not_abort() {
        let mut server = mockito::Server::new_async().await;
        let _ok =
            mock_provider(&mut server, "alpha", "sha-a", &[("pdf-tools", "Extract PDFs.")]).await;
        // beta has no mocks at all: every request 501s.

        let registry = ProviderRegistry::new(vec![
            test_provider(&server.url(), "alpha", 1),
            test_provider(&server.url(), "beta", 2),
        ]);
        let aggregator = test_aggregator(registry);

        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let catalog = aggregator.run_full(&store).await.unwrap();

        assert_eq!(catalog.total_skills, 1);
        assert_eq!(catalog.skills[0].record.provider, "alpha");
        // beta still appears in provider stats, with zero skills.
        assert_eq!(catalog.providers["beta"].skills_count, 0);
    }

    #[tokio::test]
    async fn full_run_errors_when_no_provider_is_reachable() {
        // No mocks at all: every request 501s for both providers.
        let server = mockito::Server::new_async().await;
        let registry = ProviderRegistry::new(vec![
            test_provider(&server.url(), "alpha", 1),
            test_provider(&server.url(), "beta", 2),
        ]);
        let aggregator = test_aggregator(registry);

        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        assert!(aggregator.run_full(&store).await.is_err());
        // No state was persisted for the failed run.
        assert!(store.load().provider_commits.is_empty());
    }

    #[tokio::test]
    async fn incremental_run_short_circuits_when_unchanged() {
        let mut server = mockito::Server::new_async().await;
        let _m =
            mock_provider(&mut server, "alpha", "sha-a", &[("pdf-tools", "Extract PDFs.")]).await;

        let registry = ProviderRegistry::new(vec![test_provider(&server.url(), "alpha", 1)]);
        let aggregator = test_aggregator(registry);

        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let catalog = aggregator.run_full(&store).await.unwrap();

        // Same head SHA on the second pass: up to date.
        let result = aggregator
            .run_incremental(&store, Some(catalog))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn incremental_run_refetches_changed_provider() {
        let mut server = mockito::Server::new_async().await;
        let m1 =
            mock_provider(&mut server, "alpha", "sha-a1", &[("pdf-tools", "Extract PDFs.")]).await;
        let _m2 =
            mock_provider(&mut server, "beta", "sha-b", &[("web-search", "Search the web.")]).await;

        let registry = ProviderRegistry::new(vec![
            test_provider(&server.url(), "alpha", 1),
            test_provider(&server.url(), "beta", 2),
        ]);
        let aggregator = test_aggregator(registry);

        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let catalog = aggregator.run_full(&store).await.unwrap();

        // alpha's head moves and grows a second skill.
        drop(m1);
        let _m1b = mock_provider(
            &mut server,
            "alpha",
            "sha-a2",
            &[("pdf-tools", "Extract PDFs."), ("deck-builder", "Build decks.")],
        )
        .await;

        let updated = aggregator
            .run_incremental(&store, Some(catalog))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.total_skills, 3);
        // beta's entry was carried over untouched.
        assert!(updated.skills.iter().any(|s| s.record.id == "beta/web-search"));
        assert!(updated.skills.iter().any(|s| s.record.id == "alpha/deck-builder"));
        assert_eq!(store.load().provider_commits["alpha"], "sha-a2");
    }

    #[tokio::test]
    async fn incremental_run_keeps_entries_when_changed_provider_is_unreachable() {
        let mut server = mockito::Server::new_async().await;
        let m1 =
            mock_provider(&mut server, "alpha", "sha-a1", &[("pdf-tools", "Extract PDFs.")]).await;

        let registry = ProviderRegistry::new(vec![test_provider(&server.url(), "alpha", 1)]);
        let aggregator = test_aggregator(registry);

        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let catalog = aggregator.run_full(&store).await.unwrap();

        // The head moves, but the tree listing (and everything else) now fails.
        // Dropping a mockito Mock does not unregister it; remove explicitly.
        for mock in &m1 {
            mock.remove_async().await;
        }
        let _head = server
            .mock("GET", "/repos/alpha/skills/commits?per_page=1")
            .with_status(200)
            .with_body(r#"[{"sha":"sha-a2"}]"#)
            .create_async()
            .await;

        let updated = aggregator
            .run_incremental(&store, Some(catalog))
            .await
            .unwrap()
            .unwrap();

        // Previous entries survive the transient failure.
        assert_eq!(updated.total_skills, 1);
        assert!(updated.skills.iter().any(|s| s.record.id == "alpha/pdf-tools"));
        // The stored SHA rolled back so the next run retries the provider.
        assert_eq!(store.load().provider_commits["alpha"], "sha-a1");
    }

    #[test]
    fn skill_doc_discovery_rules() {
        assert!(is_skill_doc("SKILL.md", "skills/"));
        assert!(is_skill_doc("skills/pdf-tools/SKILL.md", "skills/"));
        assert!(!is_skill_doc("docs/SKILL.md", "skills/"));
        assert!(!is_skill_doc("skills/pdf-tools/README.md", "skills/"));
        assert!(!is_skill_doc("skills/x/skill.md", "skills/"));
    }
}
