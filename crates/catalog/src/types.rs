use std::collections::BTreeMap;

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

// ── Skill records ─────────────────────────────────────────────────────────────

/// Provenance of a fetched skill. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSource {
    /// Source repository URL.
    pub repo: String,
    /// Skill directory path within the repository ("" for root-level bundles).
    pub path: String,
    /// Raw-content URL of the SKILL.md document.
    pub skill_md_url: String,
    /// Tree commit SHA at fetch time.
    #[serde(default)]
    pub commit_sha: Option<String>,
}

/// Freshness classification derived from the last commit touching a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenanceStatus {
    Active,
    Maintained,
    Stale,
    Abandoned,
}

/// The canonical unit produced by the fetch → parse → enrich pass.
///
/// Fully populated in a single pass and never mutated afterwards; duplicate
/// annotations live in a separate [`DuplicateAnnotation`] keyed by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    /// `"{provider}/{name}"`, unique within one catalog build.
    pub id: String,
    pub name: String,
    pub description: String,
    pub provider: String,
    pub category: String,
    pub tags: Vec<String>,
    pub license: Option<String>,
    pub compatibility: Option<String>,
    pub last_updated_at: Option<DateTime<Utc>>,
    /// Free-form frontmatter `metadata` mapping, passed through untouched.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub source: SkillSource,
    pub has_scripts: bool,
    pub has_references: bool,
    pub has_assets: bool,
    #[serde(default)]
    pub days_since_update: Option<i64>,
    #[serde(default)]
    pub maintenance_status: Option<MaintenanceStatus>,
    /// Composite 0-100 ranking (maintenance + docs completeness + provider trust).
    pub quality_score: u8,
    /// Full instruction text. Used only for similarity computation,
    /// never serialized into the published catalog.
    #[serde(skip)]
    pub body: String,
}

// ── Duplicate annotations ─────────────────────────────────────────────────────

/// How a non-reference group member relates to its reference record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateStatus {
    /// ≥95% content-similar: the same skill republished.
    Mirror,
    /// 80-95% similar: likely the same skill with edits.
    ProbableDuplicate,
}

/// Annotation attached by the deduplication pass. Records are never dropped;
/// this only marks them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateAnnotation {
    pub status: DuplicateStatus,
    /// Id of the reference record for this name-group.
    pub duplicate_of: String,
    pub similarity: f64,
}

/// Cross-reference to another implementation sharing the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarSkill {
    pub id: String,
    pub provider: String,
    pub similarity: f64,
}

/// A skill record as published in the catalog: the immutable record plus
/// the annotator's contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSkill {
    #[serde(flatten)]
    pub record: SkillRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_status: Option<DuplicateStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_similarity: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub similar_skills: Vec<SimilarSkill>,
}

impl CatalogSkill {
    /// Compose a published entry from a record and an optional annotation.
    pub fn new(
        record: SkillRecord,
        annotation: Option<DuplicateAnnotation>,
        similar_skills: Vec<SimilarSkill>,
    ) -> Self {
        let (duplicate_status, duplicate_of, duplicate_similarity) = match annotation {
            Some(a) => (Some(a.status), Some(a.duplicate_of), Some(a.similarity)),
            None => (None, None, None),
        };
        Self {
            record,
            duplicate_status,
            duplicate_of,
            duplicate_similarity,
            similar_skills,
        }
    }
}

// ── Catalog document ──────────────────────────────────────────────────────────

/// Per-provider statistics, recomputed after annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStats {
    pub name: String,
    pub repo: String,
    pub skills_count: usize,
    #[serde(default)]
    pub stars: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Counts of records by duplicate status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSummary {
    pub mirrors: usize,
    pub probable_duplicates: usize,
    pub unique: usize,
}

/// Counts and percentages by maintenance bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSummary {
    pub active: usize,
    pub maintained: usize,
    pub stale: usize,
    pub abandoned: usize,
    pub unknown: usize,
    /// Percentage of dated records that are active.
    pub active_pct: f64,
    /// Percentage of dated records that are active or maintained.
    pub active_or_maintained_pct: f64,
}

/// The aggregate output document, the sole persisted artifact of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Date-based version string, `YYYY.MM.DD`.
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub total_skills: usize,
    pub providers: BTreeMap<String, ProviderStats>,
    /// Sorted distinct categories present in the skills list.
    pub categories: Vec<String>,
    pub skills: Vec<CatalogSkill>,
    pub duplicates: DuplicateSummary,
    pub maintenance: MaintenanceSummary,
}


#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::{testutil::record, *};

    #[test]
    fn body_is_excluded_from_serialization() {
        let mut r = record("anthropics", "pdf-tools");
        r.body = "secret instructions".into();
        let json = serde_json::to_string(&r).unwrap();
        assert!(!json.contains("secret instructions"));
        assert!(!json.contains("\"body\""));
    }

    #[test]
    fn duplicate_fields_omitted_when_unset() {
        let skill = CatalogSkill::new(record("openai", "pdf-tools"), None, vec![]);
        let json = serde_json::to_string(&skill).unwrap();
        assert!(!json.contains("duplicate_status"));
        assert!(!json.contains("similar_skills"));
    }

    #[test]
    fn duplicate_status_serializes_snake_case() {
        let ann = DuplicateAnnotation {
            status: DuplicateStatus::ProbableDuplicate,
            duplicate_of: "anthropics/pdf-tools".into(),
            similarity: 0.9,
        };
        let skill = CatalogSkill::new(record("openai", "pdf-tools"), Some(ann), vec![]);
        let json = serde_json::to_string(&skill).unwrap();
        assert!(json.contains("\"probable_duplicate\""));
        assert!(json.contains("\"duplicate_of\":\"anthropics/pdf-tools\""));
    }

    #[test]
    fn catalog_skill_round_trips() {
        let skill = CatalogSkill::new(
            record("anthropics", "pdf-tools"),
            None,
            vec![SimilarSkill {
                id: "openai/pdf-tools".into(),
                provider: "openai".into(),
                similarity: 0.5,
            }],
        );
        let json = serde_json::to_string_pretty(&skill).unwrap();
        let back: CatalogSkill = serde_json::from_str(&json).unwrap();
        assert_eq!(back, skill);
    }
}
