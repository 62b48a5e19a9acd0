use std::path::{Path, PathBuf};

use {
    anyhow::{Context, bail},
    serde::Deserialize,
};

/// Frontmatter of a local SKILL.md, parsed strictly: local skills are under
/// the user's control and malformed ones should fail loudly, unlike the
/// lenient remote parser in the catalog crate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkillMetadata {
    pub name: String,
    pub description: String,
    pub version: Option<String>,
    pub license: Option<String>,
    pub compatibility: Option<String>,
    #[serde(skip)]
    pub path: PathBuf,
}

/// A fully parsed local skill: metadata plus the instruction body.
#[derive(Debug, Clone)]
pub struct SkillContent {
    pub metadata: SkillMetadata,
    pub body: String,
}

/// Validate a skill name: lowercase ASCII alphanumerics and hyphens,
/// 1-64 chars, no leading/trailing/double hyphen.
pub fn validate_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 64
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
}

/// Parse a SKILL.md file into metadata only (frontmatter).
pub fn parse_metadata(content: &str, skill_dir: &Path) -> anyhow::Result<SkillMetadata> {
    let (frontmatter, _body) = split_frontmatter(content)?;
    let mut meta: SkillMetadata =
        serde_yaml::from_str(frontmatter).context("invalid SKILL.md frontmatter")?;

    if !validate_name(&meta.name) {
        bail!(
            "invalid skill name '{}': must be 1-64 lowercase alphanumeric/hyphen chars",
            meta.name
        );
    }

    meta.path = skill_dir.to_path_buf();
    Ok(meta)
}

/// Parse a SKILL.md file into full content (metadata + body).
pub fn parse_skill(content: &str, skill_dir: &Path) -> anyhow::Result<SkillContent> {
    let metadata = parse_metadata(content, skill_dir)?;
    let (_frontmatter, body) = split_frontmatter(content)?;
    Ok(SkillContent {
        metadata,
        body: body.to_string(),
    })
}

/// Split SKILL.md content at `---` delimiters into (frontmatter, body).
pub fn split_frontmatter(content: &str) -> anyhow::Result<(&str, &str)> {
    let trimmed = content.trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        bail!("SKILL.md must start with YAML frontmatter delimited by ---");
    };
    let close = after_open
        .find("\n---")
        .context("SKILL.md missing closing --- for frontmatter")?;
    Ok((after_open[..close].trim(), after_open[close + 4..].trim()))
}
