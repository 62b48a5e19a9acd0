use {serde::Deserialize, tracing::debug};

/// Frontmatter fields recognized in remote SKILL.md documents. Everything is
/// optional here; source repos are wildly inconsistent and missing fields
/// are filled by fallbacks or left absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFrontmatter {
    pub name: Option<String>,
    pub description: Option<String>,
    pub license: Option<String>,
    pub compatibility: Option<String>,
    pub version: Option<String>,
    pub tags: Option<Vec<String>>,
    pub author: Option<String>,
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

/// A successfully split SKILL.md document.
#[derive(Debug, Clone)]
pub struct ParsedSkillDoc {
    pub frontmatter: RawFrontmatter,
    pub body: String,
}

/// Split a SKILL.md document at its `---` delimiters.
///
/// Returns `None` when the delimiter structure is malformed; callers skip
/// the document; a parse failure is never fatal for the run.
pub fn split_frontmatter(content: &str) -> Option<(&str, &str)> {
    let trimmed = content.trim_start();
    let after_open = trimmed.strip_prefix("---")?;
    let close = after_open.find("\n---")?;
    let frontmatter = after_open[..close].trim();
    let body = after_open[close + 4..].trim();
    Some((frontmatter, body))
}

/// Parse a remote SKILL.md document leniently.
pub fn parse_skill_doc(content: &str) -> Option<ParsedSkillDoc> {
    let (frontmatter, body) = split_frontmatter(content)?;
    let frontmatter: RawFrontmatter = match serde_yaml::from_str(frontmatter) {
        Ok(fm) => fm,
        Err(e) => {
            debug!(error = %e, "unparseable frontmatter, skipping document");
            return None;
        },
    };
    Some(ParsedSkillDoc {
        frontmatter,
        body: body.to_string(),
    })
}

/// Resolve a skill's canonical name.
///
/// Precedence: explicit frontmatter name, then the immediate parent
/// directory name, then the repository name for root-level bundles.
/// Returns `None` when every fallback resolves empty.
pub fn resolve_name(frontmatter: &RawFrontmatter, skill_dir: &str, repo_name: &str) -> Option<String> {
    if let Some(name) = frontmatter.name.as_deref() {
        let name = name.trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    let dir_name = skill_dir.rsplit('/').next().unwrap_or(skill_dir).trim();
    if !dir_name.is_empty() && dir_name != "." {
        return Some(dir_name.to_string());
    }

    let repo_name = repo_name.trim();
    if !repo_name.is_empty() {
        return Some(repo_name.to_string());
    }

    None
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frontmatter_and_body() {
        let doc = parse_skill_doc(
            "---\nname: pdf-tools\ndescription: Extract text\nlicense: MIT\n---\nBody text here.\n",
        )
        .unwrap();
        assert_eq!(doc.frontmatter.name.as_deref(), Some("pdf-tools"));
        assert_eq!(doc.frontmatter.license.as_deref(), Some("MIT"));
        assert_eq!(doc.body, "Body text here.");
    }

    #[test]
    fn missing_open_delimiter_is_none() {
        assert!(parse_skill_doc("# Just markdown\nno frontmatter").is_none());
    }

    #[test]
    fn missing_close_delimiter_is_none() {
        assert!(parse_skill_doc("---\nname: x\nno close").is_none());
    }

    #[test]
    fn invalid_yaml_is_none() {
        assert!(parse_skill_doc("---\n[not: valid: yaml\n---\nbody").is_none());
    }

    #[test]
    fn metadata_mapping_passes_through() {
        let doc = parse_skill_doc(
            "---\nname: x\nmetadata:\n  team: docs\n  tier: 2\n---\nbody",
        )
        .unwrap();
        let meta = doc.frontmatter.metadata.unwrap();
        assert_eq!(meta["team"], "docs");
        assert_eq!(meta["tier"], 2);
    }

    #[test]
    fn name_falls_back_to_directory_then_repo() {
        let fm = RawFrontmatter::default();
        assert_eq!(
            resolve_name(&fm, "skills/pdf-tools", "skills").as_deref(),
            Some("pdf-tools")
        );
        // Root-level bundle: directory is empty, repo name wins.
        assert_eq!(resolve_name(&fm, "", "agent-skills").as_deref(), Some("agent-skills"));
        assert_eq!(resolve_name(&fm, ".", "agent-skills").as_deref(), Some("agent-skills"));
        // Everything empty: discarded.
        assert_eq!(resolve_name(&fm, "", ""), None);
    }

    #[test]
    fn explicit_name_wins_over_fallbacks() {
        let fm = RawFrontmatter {
            name: Some("explicit".into()),
            ..Default::default()
        };
        assert_eq!(
            resolve_name(&fm, "skills/other-dir", "repo").as_deref(),
            Some("explicit")
        );
    }
}
