use std::path::Path;

use anyhow::{Context, Result};

use crate::install::InstalledSkill;

/// Instruction-file formats understood by `export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Claude,
    Copilot,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claude" => Some(Self::Claude),
            "copilot" => Some(Self::Copilot),
            _ => None,
        }
    }
}

/// Render installed skills into one combined instruction document.
pub fn render(skills: &[InstalledSkill], format: ExportFormat) -> Result<String> {
    let mut parts: Vec<String> = Vec::new();
    match format {
        ExportFormat::Claude => {
            parts.push("# Agent Skills".into());
            parts.push(String::new());
            parts.push("The following skills are available for use:".into());
            parts.push(String::new());
            for skill in skills {
                let version = skill
                    .receipt
                    .as_ref()
                    .and_then(|r| r.version.as_deref())
                    .unwrap_or("0.0.0");
                parts.push(format!("## {} (v{version})", skill.name));
                parts.push(String::new());
                if !skill.description.is_empty() {
                    parts.push(format!("> {}", skill.description));
                    parts.push(String::new());
                }
                parts.push(read_body(&skill.path)?);
                parts.push(String::new());
            }
        },
        ExportFormat::Copilot => {
            parts.push("# Loaded Skills".into());
            parts.push(String::new());
            for skill in skills {
                parts.push(format!("## {}", skill.name));
                parts.push(String::new());
                parts.push(read_body(&skill.path)?);
                parts.push(String::new());
                parts.push("---".into());
                parts.push(String::new());
            }
        },
    }
    Ok(parts.join("\n"))
}

/// Render and write to a file.
pub fn export_to_file(
    skills: &[InstalledSkill],
    format: ExportFormat,
    output: &Path,
) -> Result<()> {
    let content = render(skills, format)?;
    std::fs::write(output, content)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn read_body(skill_dir: &Path) -> Result<String> {
    let content = std::fs::read_to_string(skill_dir.join("SKILL.md"))
        .with_context(|| format!("reading {}", skill_dir.join("SKILL.md").display()))?;
    let skill = crate::parse::parse_skill(&content, skill_dir)?;
    Ok(skill.body)
}
