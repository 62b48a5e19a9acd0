use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result, bail},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    skillery_catalog::types::{Catalog, CatalogSkill},
    tracing::info,
};

use crate::parse;

/// Receipt written next to an installed SKILL.md so listings and uninstalls
/// can identify what was installed and from where.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallReceipt {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub version: Option<String>,
    pub skill_md_url: String,
    pub installed_at: DateTime<Utc>,
}

pub const RECEIPT_FILE: &str = "installed.json";

/// Install a catalog skill into `target_dir`: fetch its SKILL.md, write it
/// plus an install receipt. Refuses to overwrite an existing installation.
pub async fn install_skill(skill: &CatalogSkill, target_dir: &Path) -> Result<InstallReceipt> {
    if target_dir.join("SKILL.md").exists() {
        bail!(
            "'{}' is already installed at {}; uninstall it first",
            skill.record.id,
            target_dir.display()
        );
    }

    let url = &skill.record.source.skill_md_url;
    let resp = reqwest::Client::new()
        .get(url)
        .header("User-Agent", concat!("skillery/", env!("CARGO_PKG_VERSION")))
        .send()
        .await
        .with_context(|| format!("fetching {url}"))?;
    if !resp.status().is_success() {
        bail!("failed to fetch {url}: HTTP {}", resp.status());
    }
    let content = resp.text().await?;

    tokio::fs::create_dir_all(target_dir).await?;
    tokio::fs::write(target_dir.join("SKILL.md"), &content).await?;

    let receipt = InstallReceipt {
        id: skill.record.id.clone(),
        name: skill.record.name.clone(),
        provider: skill.record.provider.clone(),
        version: skill
            .record
            .metadata
            .get("version")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        skill_md_url: url.clone(),
        installed_at: Utc::now(),
    };
    let receipt_json = serde_json::to_string_pretty(&receipt)?;
    tokio::fs::write(target_dir.join(RECEIPT_FILE), receipt_json).await?;

    info!(id = %receipt.id, path = %target_dir.display(), "skill installed");
    Ok(receipt)
}

/// Remove an installed skill directory. The directory must actually contain
/// a skill (SKILL.md or a receipt) so an id typo cannot delete arbitrary
/// directories.
pub async fn uninstall_skill(target_dir: &Path) -> Result<()> {
    if !target_dir.exists() {
        bail!("nothing installed at {}", target_dir.display());
    }
    if !target_dir.join("SKILL.md").exists() && !target_dir.join(RECEIPT_FILE).exists() {
        bail!(
            "{} does not look like an installed skill, refusing to remove",
            target_dir.display()
        );
    }
    tokio::fs::remove_dir_all(target_dir).await?;
    info!(path = %target_dir.display(), "skill removed");
    Ok(())
}

/// One installed skill found by a scan.
#[derive(Debug, Clone)]
pub struct InstalledSkill {
    pub name: String,
    pub description: String,
    pub location: String,
    pub path: PathBuf,
    pub receipt: Option<InstallReceipt>,
}

/// Scan the given locations (label, directory) for installed skills. Each
/// immediate subdirectory holding a SKILL.md counts; unparseable documents
/// are skipped with a diagnostic.
pub fn list_installed(locations: &[(String, PathBuf)]) -> Vec<InstalledSkill> {
    let mut installed = Vec::new();
    for (label, dir) in locations {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let skill_dir = entry.path();
            if !skill_dir.is_dir() {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(skill_dir.join("SKILL.md")) else {
                continue;
            };
            match parse::parse_metadata(&content, &skill_dir) {
                Ok(meta) => {
                    let receipt = std::fs::read_to_string(skill_dir.join(RECEIPT_FILE))
                        .ok()
                        .and_then(|raw| serde_json::from_str(&raw).ok());
                    installed.push(InstalledSkill {
                        name: meta.name,
                        description: meta.description,
                        location: label.clone(),
                        path: skill_dir,
                        receipt,
                    });
                },
                Err(e) => {
                    tracing::debug!(path = %skill_dir.display(), error = %e, "skipping unparseable skill");
                },
            }
        }
    }
    installed.sort_by(|a, b| a.name.cmp(&b.name));
    installed
}

/// An installed skill whose catalog entry moved after it was installed.
#[derive(Debug)]
pub struct UpdateCandidate<'a> {
    pub installed: &'a InstalledSkill,
    pub skill: &'a CatalogSkill,
}

/// Installed skills with a newer catalog revision, judged by comparing the
/// catalog's `last_updated_at` against the receipt's install time. Skills
/// without a receipt (installed by hand) are never update candidates.
pub fn find_updates<'a>(
    installed: &'a [InstalledSkill],
    catalog: &'a Catalog,
) -> Vec<UpdateCandidate<'a>> {
    let mut updates = Vec::new();
    for item in installed {
        let Some(receipt) = &item.receipt else {
            continue;
        };
        let Some(skill) = crate::registry::find_skill(catalog, &receipt.id) else {
            continue;
        };
        if let Some(updated) = skill.record.last_updated_at
            && updated > receipt.installed_at
        {
            updates.push(UpdateCandidate {
                installed: item,
                skill,
            });
        }
    }
    updates
}
