use std::{collections::BTreeMap, fs, path::Path, process::Command};

use {
    anyhow::{Context, Result},
    chrono::Utc,
    tracing::{debug, info, warn},
};

use crate::{
    dedup::DedupOutcome,
    providers::ProviderRegistry,
    types::{
        Catalog, CatalogSkill, DuplicateStatus, DuplicateSummary, MaintenanceStatus,
        MaintenanceSummary, ProviderStats, SkillRecord,
    },
};

/// Compose the final catalog document from records plus the annotator's
/// contribution. Ordering is deterministic: provider id, then skill name.
pub fn build_catalog(
    records: Vec<SkillRecord>,
    mut dedup: DedupOutcome,
    registry: &ProviderRegistry,
    provider_stats: BTreeMap<String, ProviderStats>,
) -> Catalog {
    let skills: Vec<CatalogSkill> = records
        .into_iter()
        .map(|record| {
            let annotation = dedup.annotations.remove(&record.id);
            let similar = dedup.similar.remove(&record.id).unwrap_or_default();
            CatalogSkill::new(record, annotation, similar)
        })
        .collect();
    finalize_catalog(skills, registry, provider_stats)
}

/// Sort, recount, and summarize an already-composed skills list. Incremental
/// runs use this directly to combine fresh entries with ones carried over
/// from the previous catalog.
pub fn finalize_catalog(
    mut skills: Vec<CatalogSkill>,
    registry: &ProviderRegistry,
    provider_stats: BTreeMap<String, ProviderStats>,
) -> Catalog {
    skills.sort_by(|a, b| {
        (&a.record.provider, &a.record.name).cmp(&(&b.record.provider, &b.record.name))
    });

    // Provider counts are recomputed from the final list so carried stats
    // never drift from the skills actually published.
    let mut providers = provider_stats;
    for stats in providers.values_mut() {
        stats.skills_count = 0;
    }
    for skill in &skills {
        let provider = &skill.record.provider;
        providers
            .entry(provider.clone())
            .or_insert_with(|| ProviderStats {
                name: registry
                    .get(provider)
                    .map_or_else(|| provider.clone(), |p| p.name.clone()),
                repo: registry.get(provider).map(|p| p.repo.clone()).unwrap_or_default(),
                skills_count: 0,
                stars: None,
                description: None,
            })
            .skills_count += 1;
    }

    let mut categories: Vec<String> = skills.iter().map(|s| s.record.category.clone()).collect();
    categories.sort();
    categories.dedup();

    let generated_at = Utc::now();
    Catalog {
        version: generated_at.format("%Y.%m.%d").to_string(),
        generated_at,
        total_skills: skills.len(),
        providers,
        categories,
        duplicates: duplicate_summary(&skills),
        maintenance: maintenance_summary(&skills),
        skills,
    }
}

fn duplicate_summary(skills: &[CatalogSkill]) -> DuplicateSummary {
    let mut summary = DuplicateSummary::default();
    for skill in skills {
        match skill.duplicate_status {
            Some(DuplicateStatus::Mirror) => summary.mirrors += 1,
            Some(DuplicateStatus::ProbableDuplicate) => summary.probable_duplicates += 1,
            None => summary.unique += 1,
        }
    }
    summary
}

fn maintenance_summary(skills: &[CatalogSkill]) -> MaintenanceSummary {
    let mut summary = MaintenanceSummary::default();
    for skill in skills {
        match skill.record.maintenance_status {
            Some(MaintenanceStatus::Active) => summary.active += 1,
            Some(MaintenanceStatus::Maintained) => summary.maintained += 1,
            Some(MaintenanceStatus::Stale) => summary.stale += 1,
            Some(MaintenanceStatus::Abandoned) => summary.abandoned += 1,
            None => summary.unknown += 1,
        }
    }
    // Percentages are over dated records only; unknowns would skew them.
    let dated = summary.active + summary.maintained + summary.stale + summary.abandoned;
    if dated > 0 {
        summary.active_pct = 100.0 * summary.active as f64 / dated as f64;
        summary.active_or_maintained_pct =
            100.0 * (summary.active + summary.maintained) as f64 / dated as f64;
    }
    summary
}

/// Write `catalog.json` (pretty) and `catalog.min.json` (minified) into
/// `output_dir`, plus `catalog.toon` when an external `toon` encoder is on
/// PATH. The TOON step is best-effort: a missing or failing encoder is
/// logged and the run still succeeds.
pub fn write_outputs(catalog: &Catalog, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let pretty = serde_json::to_string_pretty(catalog).context("serializing catalog")?;
    let pretty_path = output_dir.join("catalog.json");
    fs::write(&pretty_path, &pretty)
        .with_context(|| format!("writing {}", pretty_path.display()))?;

    let minified = serde_json::to_string(catalog).context("serializing catalog")?;
    let min_path = output_dir.join("catalog.min.json");
    fs::write(&min_path, &minified)
        .with_context(|| format!("writing {}", min_path.display()))?;

    info!(
        path = %pretty_path.display(),
        skills = catalog.total_skills,
        "catalog written"
    );

    write_toon(&min_path, &output_dir.join("catalog.toon"));
    Ok(())
}

fn write_toon(min_json: &Path, toon_path: &Path) {
    let Ok(encoder) = which::which("toon") else {
        debug!("no toon encoder on PATH, skipping catalog.toon");
        return;
    };
    let result = Command::new(&encoder)
        .arg(min_json)
        .arg("-o")
        .arg(toon_path)
        .status();
    match result {
        Ok(status) if status.success() => {
            debug!(path = %toon_path.display(), "toon output written");
        },
        Ok(status) => warn!(%status, "toon encoder failed, skipping catalog.toon"),
        Err(e) => warn!(error = %e, "could not run toon encoder, skipping catalog.toon"),
    }
}
