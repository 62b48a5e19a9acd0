use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use crate::{
    providers::ProviderRegistry,
    similarity::record_similarity,
    types::{DuplicateAnnotation, DuplicateStatus, SimilarSkill, SkillRecord},
};

/// Thresholds for the annotation pass.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// At or above: annotated as mirror.
    pub mirror_threshold: f64,
    /// At or above (and below mirror): annotated as probable duplicate.
    pub duplicate_threshold: f64,
    /// Lowest similarity still reported in the similar-skills list.
    pub similar_floor: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            mirror_threshold: 0.95,
            duplicate_threshold: 0.80,
            similar_floor: 0.0,
        }
    }
}

/// The annotator's contribution, keyed by record id. Records themselves are
/// never mutated and never dropped.
#[derive(Debug, Default)]
pub struct DedupOutcome {
    pub annotations: HashMap<String, DuplicateAnnotation>,
    pub similar: HashMap<String, Vec<SimilarSkill>>,
}

/// Group records by name, select a reference per group by provider priority,
/// and annotate the other members as mirror / probable duplicate when their
/// enhanced similarity against the reference crosses the thresholds.
///
/// Members below the duplicate threshold stay unannotated: legitimately
/// different skills may share a name. Every other group member is also
/// cross-referenced in the per-record similar-skills list, regardless of
/// annotation status.
pub fn annotate(
    records: &[SkillRecord],
    registry: &ProviderRegistry,
    trusted_providers: &HashSet<String>,
    config: &DedupConfig,
) -> DedupOutcome {
    // BTreeMap keeps group iteration deterministic across runs.
    let mut groups: BTreeMap<String, Vec<&SkillRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.name.to_lowercase()).or_default().push(record);
    }

    let mut outcome = DedupOutcome::default();

    for (name, mut members) in groups {
        if members.len() < 2 {
            continue;
        }

        // Lowest priority number is the most authoritative provider; ties
        // break by id so reruns pick the same reference.
        members.sort_by(|a, b| {
            registry
                .priority_of(&a.provider)
                .cmp(&registry.priority_of(&b.provider))
                .then_with(|| a.id.cmp(&b.id))
        });
        let reference = members[0];
        debug!(group = %name, reference = %reference.id, size = members.len(), "dedup group");

        let trusted = |r: &SkillRecord| trusted_providers.contains(&r.provider);

        for member in &members[1..] {
            let similarity =
                record_similarity(member, reference, trusted(member) || trusted(reference));
            let status = if similarity >= config.mirror_threshold {
                Some(DuplicateStatus::Mirror)
            } else if similarity >= config.duplicate_threshold {
                Some(DuplicateStatus::ProbableDuplicate)
            } else {
                None
            };

            if let Some(status) = status {
                outcome.annotations.insert(
                    member.id.clone(),
                    DuplicateAnnotation {
                        status,
                        duplicate_of: reference.id.clone(),
                        similarity,
                    },
                );
            }
        }

        // Cross-reference every pair in the group so consumers can discover
        // related implementations regardless of formal duplicate status.
        for member in &members {
            let mut related: Vec<SimilarSkill> = Vec::new();
            for other in &members {
                if other.id == member.id {
                    continue;
                }
                let similarity =
                    record_similarity(member, other, trusted(member) || trusted(other));
                if similarity >= config.similar_floor {
                    related.push(SimilarSkill {
                        id: other.id.clone(),
                        provider: other.provider.clone(),
                        similarity,
                    });
                }
            }
            if !related.is_empty() {
                outcome.similar.insert(member.id.clone(), related);
            }
        }
    }

    outcome
}
