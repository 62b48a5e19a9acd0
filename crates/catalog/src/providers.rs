use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Priority assigned to providers missing from the registry.
/// Lower numbers win reference selection during deduplication.
pub const DEFAULT_PRIORITY: u32 = 99;

/// One source repository supplying skills. The registry is an immutable
/// configuration table loaded once at startup; incremental runs derive
/// filtered views instead of mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    /// Display name for provider stats.
    pub name: String,
    /// Repository web URL.
    pub repo: String,
    /// GitHub API base, split out so tests can point at a local server.
    pub api_base: String,
    /// Recursive git-tree listing endpoint.
    pub api_tree_url: String,
    /// Raw-content base URL (joined with tree paths).
    pub raw_base: String,
    /// Only tree paths under this prefix are considered skill documents.
    pub skills_path_prefix: String,
    /// Reference-selection priority; lower is more authoritative.
    pub priority: u32,
}

impl ProviderConfig {
    /// Build a config for a GitHub-hosted provider on its `main` branch.
    pub fn github(id: &str, name: &str, owner: &str, repo: &str, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            repo: format!("https://github.com/{owner}/{repo}"),
            api_base: "https://api.github.com".into(),
            api_tree_url: format!(
                "https://api.github.com/repos/{owner}/{repo}/git/trees/main?recursive=1"
            ),
            raw_base: format!("https://raw.githubusercontent.com/{owner}/{repo}/main"),
            skills_path_prefix: "skills/".into(),
            priority,
        }
    }

    /// `(owner, repo)` parsed from the repository URL.
    pub fn owner_repo(&self) -> Option<(&str, &str)> {
        let path = self.repo.strip_prefix("https://github.com/")?;
        let mut parts = path.trim_matches('/').splitn(2, '/');
        match (parts.next(), parts.next()) {
            (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
                Some((owner, repo))
            },
            _ => None,
        }
    }
}

/// The configured provider table.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self { providers }
    }

    /// The built-in provider table, in priority order.
    pub fn builtin() -> Self {
        Self::new(vec![
            ProviderConfig::github("anthropics", "Anthropic", "anthropics", "skills", 1),
            ProviderConfig::github("openai", "OpenAI", "openai", "skills", 2),
            ProviderConfig::github("github", "GitHub", "github", "awesome-copilot", 3),
            ProviderConfig::github("vercel", "Vercel", "vercel-labs", "agent-skills", 4),
            ProviderConfig::github("huggingface", "HuggingFace", "huggingface", "skills", 5),
            ProviderConfig::github(
                "skillcreatorai",
                "SkillCreator.ai",
                "skillcreatorai",
                "Ai-Agent-Skills",
                6,
            ),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Reference-selection priority for a provider id; unlisted providers
    /// fall back to [`DEFAULT_PRIORITY`].
    pub fn priority_of(&self, id: &str) -> u32 {
        self.get(id).map_or(DEFAULT_PRIORITY, |p| p.priority)
    }

    /// A filtered view containing only the given provider ids.
    /// Derives a new list; the registry itself is never mutated.
    pub fn filtered(&self, ids: &HashSet<String>) -> Vec<&ProviderConfig> {
        self.providers.iter().filter(|p| ids.contains(&p.id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_has_expected_providers() {
        let reg = ProviderRegistry::builtin();
        assert_eq!(reg.len(), 6);
        assert_eq!(reg.priority_of("anthropics"), 1);
        assert_eq!(reg.priority_of("skillcreatorai"), 6);
        assert_eq!(reg.priority_of("nobody"), DEFAULT_PRIORITY);
    }

    #[test]
    fn owner_repo_parses_github_urls() {
        let p = ProviderConfig::github("vercel", "Vercel", "vercel-labs", "agent-skills", 4);
        assert_eq!(p.owner_repo(), Some(("vercel-labs", "agent-skills")));

        let mut odd = p.clone();
        odd.repo = "https://example.com/not/github".into();
        assert_eq!(odd.owner_repo(), None);
    }

    #[test]
    fn filtered_view_leaves_registry_intact() {
        let reg = ProviderRegistry::builtin();
        let wanted: HashSet<String> = ["openai".to_string()].into_iter().collect();
        let view = reg.filtered(&wanted);
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].id, "openai");
        assert_eq!(reg.len(), 6);
    }
}
