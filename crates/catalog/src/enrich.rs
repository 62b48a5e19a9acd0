use chrono::{DateTime, Utc};

use crate::{
    fetch::Fetcher,
    types::MaintenanceStatus,
};

/// Presence flags for the optional documentation directories of a skill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryFlags {
    pub has_scripts: bool,
    pub has_references: bool,
    pub has_assets: bool,
}

impl DirectoryFlags {
    fn present_count(self) -> u32 {
        u32::from(self.has_scripts) + u32::from(self.has_references) + u32::from(self.has_assets)
    }
}

/// Scan the full repository tree listing for recognized subdirectories of a
/// skill directory (`scripts/`, `references/` or `reference/`, `assets/` or
/// `templates/`).
pub fn directory_flags(all_paths: &[String], skill_dir: &str) -> DirectoryFlags {
    let prefix = |sub: &str| format!("{skill_dir}/{sub}/");
    let any = |subs: &[&str]| {
        subs.iter()
            .any(|sub| all_paths.iter().any(|p| p.starts_with(&prefix(sub))))
    };
    DirectoryFlags {
        has_scripts: any(&["scripts"]),
        has_references: any(&["references", "reference"]),
        has_assets: any(&["assets", "templates"]),
    }
}

/// Classify freshness from days since the last commit touching the skill.
/// Unknown timestamps are left unclassified by the caller, never defaulted
/// to abandoned.
pub fn maintenance_status(days_since_update: i64) -> MaintenanceStatus {
    if days_since_update < 30 {
        MaintenanceStatus::Active
    } else if days_since_update < 180 {
        MaintenanceStatus::Maintained
    } else if days_since_update < 365 {
        MaintenanceStatus::Stale
    } else {
        MaintenanceStatus::Abandoned
    }
}

/// Composite 0-100 quality score: maintenance (max 50) + documentation
/// completeness (max 30) + provider trust (max 20), clamped to 100.
pub fn quality_score(
    status: Option<MaintenanceStatus>,
    dirs: DirectoryFlags,
    provider_trusted: bool,
) -> u8 {
    let maintenance = match status {
        Some(MaintenanceStatus::Active) => 50,
        Some(MaintenanceStatus::Maintained) => 40,
        Some(MaintenanceStatus::Stale) => 20,
        Some(MaintenanceStatus::Abandoned) => 5,
        // Neutral default when freshness is unknown.
        None => 25,
    };
    let docs = 10 * dirs.present_count().min(3);
    let trust = if provider_trusted { 20 } else { 10 };

    (maintenance + docs + trust).min(100) as u8
}

/// Most recent commit date touching a specific file path, queried per file
/// so mixed-freshness monorepos are handled correctly.
pub async fn fetch_last_updated(
    fetcher: &Fetcher,
    api_base: &str,
    owner: &str,
    repo: &str,
    file_path: &str,
) -> Option<DateTime<Utc>> {
    let url = format!(
        "{api_base}/repos/{owner}/{repo}/commits?path={}&per_page=1&sha=main",
        urlencoding::encode(file_path)
    );
    let commits = fetcher.fetch_json(&url).await?;
    let commit = commits.as_array()?.first()?.get("commit")?;
    let date = commit
        .pointer("/author/date")
        .or_else(|| commit.pointer("/committer/date"))?
        .as_str()?;
    match DateTime::parse_from_rfc3339(date) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            tracing::debug!(%date, error = %e, "unparseable commit date");
            None
        },
    }
}
