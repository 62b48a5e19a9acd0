use std::{cmp::Ordering, collections::BTreeMap};

use crate::manifest::SkillManifest;

/// A parsed semver-ish version. Missing minor/patch default to zero;
/// unparseable strings collapse to `0.0.0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: String,
}

impl Version {
    /// Parse a version string, tolerating a leading constraint operator.
    pub fn parse(version: &str) -> Self {
        let s = version
            .trim()
            .trim_start_matches(['^', '~', '>', '<', '=']);

        let (core, prerelease) = match s.split_once('-') {
            Some((core, pre)) => (core, pre.to_string()),
            None => (s, String::new()),
        };
        let mut parts = core.split('.');
        let mut next = || {
            parts
                .next()
                .and_then(|p| p.parse::<u64>().ok())
                .unwrap_or(0)
        };
        Self {
            major: next(),
            minor: next(),
            patch: next(),
            prerelease,
        }
    }

    fn core(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

/// Semver ordering: numeric core first, then a release outranks any
/// prerelease, then prereleases compare lexically.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a, b) = (Version::parse(a), Version::parse(b));
    a.core().cmp(&b.core()).then_with(|| {
        match (a.prerelease.is_empty(), b.prerelease.is_empty()) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => a.prerelease.cmp(&b.prerelease),
        }
    })
}

/// Does `version` satisfy `constraint`?
///
/// Supported forms: exact (`1.2.3`), caret (`^1.2.3`, major-compatible, with
/// the usual major-0 special case requiring a matching minor), tilde
/// (`~1.2.3`, minor-compatible), `>=`, `<=`, `>`, `<`, and `*`/empty for any.
pub fn satisfies(version: &str, constraint: &str) -> bool {
    let constraint = constraint.trim();

    if constraint.is_empty() || constraint == "*" {
        return true;
    }
    if constraint.starts_with(|c: char| c.is_ascii_digit()) {
        return compare(version, constraint) == Ordering::Equal;
    }

    if let Some(base) = constraint.strip_prefix('^') {
        let (b, v) = (Version::parse(base), Version::parse(version));
        if v.major != b.major {
            return false;
        }
        if v.major == 0 {
            return v.minor == b.minor && v.patch >= b.patch;
        }
        return compare(version, base) != Ordering::Less;
    }
    if let Some(base) = constraint.strip_prefix('~') {
        let (b, v) = (Version::parse(base), Version::parse(version));
        return v.major == b.major && v.minor == b.minor && v.patch >= b.patch;
    }
    if let Some(base) = constraint.strip_prefix(">=") {
        return compare(version, base) != Ordering::Less;
    }
    if let Some(base) = constraint.strip_prefix("<=") {
        return compare(version, base) != Ordering::Greater;
    }
    if let Some(base) = constraint.strip_prefix('>') {
        return compare(version, base) == Ordering::Greater;
    }
    if let Some(base) = constraint.strip_prefix('<') {
        return compare(version, base) == Ordering::Less;
    }

    false
}

/// One transitively resolved dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDependency {
    pub id: String,
    pub version: String,
    pub constraint: String,
    pub required_by: String,
    pub depth: u32,
}

const MAX_DEPTH: u32 = 10;

/// Resolve a skill's dependency tree against a manifest lookup.
///
/// Conflicts, missing dependencies, and over-deep chains are collected as
/// error strings rather than aborting the walk, so one bad edge does not
/// hide the rest of the tree.
pub fn resolve_dependencies(
    skill_id: &str,
    lookup: &dyn Fn(&str) -> Option<SkillManifest>,
) -> (BTreeMap<String, ResolvedDependency>, Vec<String>) {
    let mut resolved = BTreeMap::new();
    let mut errors = Vec::new();
    resolve_into(skill_id, lookup, &mut resolved, &mut errors, 0);
    (resolved, errors)
}

fn resolve_into(
    skill_id: &str,
    lookup: &dyn Fn(&str) -> Option<SkillManifest>,
    resolved: &mut BTreeMap<String, ResolvedDependency>,
    errors: &mut Vec<String>,
    depth: u32,
) {
    if depth > MAX_DEPTH {
        errors.push(format!("maximum dependency depth ({MAX_DEPTH}) exceeded"));
        return;
    }

    let Some(manifest) = lookup(skill_id) else {
        errors.push(format!("skill not found: {skill_id}"));
        return;
    };

    for (dep_id, constraint) in &manifest.dependencies {
        if let Some(existing) = resolved.get(dep_id) {
            if !satisfies(&existing.version, constraint) {
                errors.push(format!(
                    "version conflict: {dep_id} requires {constraint}, but {} is already resolved",
                    existing.version
                ));
            }
            continue;
        }

        let Some(dep_manifest) = lookup(dep_id) else {
            errors.push(format!("dependency not found: {dep_id} (required by {skill_id})"));
            continue;
        };
        if !satisfies(&dep_manifest.version, constraint) {
            errors.push(format!(
                "no compatible version for {dep_id}: requires {constraint}, available: {}",
                dep_manifest.version
            ));
            continue;
        }

        resolved.insert(
            dep_id.clone(),
            ResolvedDependency {
                id: dep_id.clone(),
                version: dep_manifest.version.clone(),
                constraint: constraint.clone(),
                required_by: skill_id.to_string(),
                depth: depth + 1,
            },
        );
        resolve_into(dep_id, lookup, resolved, errors, depth + 1);
    }
}

/// Parse a `skill` or `skill@version` spec into (id, requested version).
pub fn parse_skill_spec(spec: &str) -> (&str, Option<&str>) {
    match spec.rsplit_once('@') {
        Some((id, version)) if !id.is_empty() => (id, Some(version)),
        _ => (spec, None),
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(name: &str, version: &str, deps: &[(&str, &str)]) -> SkillManifest {
        SkillManifest {
            name: name.into(),
            version: version.into(),
            dependencies: deps
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn parse_handles_partial_and_prerelease() {
        assert_eq!(Version::parse("1.2.3").core(), (1, 2, 3));
        assert_eq!(Version::parse("1.2").core(), (1, 2, 0));
        assert_eq!(Version::parse("2").core(), (2, 0, 0));
        assert_eq!(Version::parse("^1.2.3").core(), (1, 2, 3));
        assert_eq!(Version::parse("1.0.0-beta.1").prerelease, "beta.1");
        assert_eq!(Version::parse("garbage").core(), (0, 0, 0));
    }

    #[test]
    fn compare_orders_release_above_prerelease() {
        assert_eq!(compare("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("1.2.0", "1.10.0"), Ordering::Less);
        assert_eq!(compare("1.0.0", "1.0.0-rc.1"), Ordering::Greater);
        assert_eq!(compare("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
    }

    #[test]
    fn caret_constraint() {
        assert!(satisfies("1.5.0", "^1.2.3"));
        assert!(satisfies("1.2.3", "^1.2.3"));
        assert!(!satisfies("2.0.0", "^1.2.3"));
        assert!(!satisfies("1.2.2", "^1.2.3"));
        // Major 0: minor must match.
        assert!(satisfies("0.2.5", "^0.2.3"));
        assert!(!satisfies("0.3.0", "^0.2.3"));
    }

    #[test]
    fn tilde_constraint() {
        assert!(satisfies("1.2.9", "~1.2.3"));
        assert!(!satisfies("1.3.0", "~1.2.3"));
        assert!(!satisfies("1.2.2", "~1.2.3"));
    }

    #[test]
    fn range_exact_and_wildcard_constraints() {
        assert!(satisfies("1.2.3", "1.2.3"));
        assert!(!satisfies("1.2.4", "1.2.3"));
        assert!(satisfies("9.9.9", "*"));
        assert!(satisfies("9.9.9", ""));
        assert!(satisfies("2.0.0", ">=1.0.0"));
        assert!(satisfies("0.9.0", "<1.0.0"));
        assert!(!satisfies("1.0.0", ">1.0.0"));
        assert!(satisfies("1.0.0", "<=1.0.0"));
    }

    #[test]
    fn resolves_transitive_dependencies() {
        let lookup = |id: &str| match id {
            "a/root" => Some(manifest("root", "1.0.0", &[("a/mid", "^1.0.0")])),
            "a/mid" => Some(manifest("mid", "1.1.0", &[("a/leaf", "~2.0.0")])),
            "a/leaf" => Some(manifest("leaf", "2.0.4", &[])),
            _ => None,
        };
        let (resolved, errors) = resolve_dependencies("a/root", &lookup);
        assert!(errors.is_empty());
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved["a/mid"].depth, 1);
        assert_eq!(resolved["a/leaf"].depth, 2);
        assert_eq!(resolved["a/leaf"].required_by, "a/mid");
    }

    #[test]
    fn collects_conflicts_and_missing() {
        let lookup = |id: &str| match id {
            "a/root" => Some(manifest(
                "root",
                "1.0.0",
                &[("a/dep", "^1.0.0"), ("a/gone", "*"), ("a/old", "^2.0.0")],
            )),
            "a/dep" => Some(manifest("dep", "1.2.0", &[])),
            "a/old" => Some(manifest("old", "1.0.0", &[])),
            _ => None,
        };
        let (resolved, errors) = resolve_dependencies("a/root", &lookup);
        assert_eq!(resolved.len(), 1);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("a/gone")));
        assert!(errors.iter().any(|e| e.contains("no compatible version for a/old")));
    }

    #[test]
    fn dependency_cycles_hit_the_depth_cap() {
        let lookup = |id: &str| match id {
            "a/x" => Some(manifest("x", "1.0.0", &[("a/y", "*")])),
            "a/y" => Some(manifest("y", "1.0.0", &[("a/x", "*")])),
            _ => None,
        };
        // The cycle terminates via the resolved set; no depth error expected.
        let (resolved, errors) = resolve_dependencies("a/x", &lookup);
        assert!(errors.is_empty());
        assert!(resolved.contains_key("a/y"));
        assert!(resolved.contains_key("a/x"));
    }

    #[test]
    fn spec_parsing() {
        assert_eq!(parse_skill_spec("anthropics/pdf-tools"), ("anthropics/pdf-tools", None));
        assert_eq!(
            parse_skill_spec("anthropics/pdf-tools@1.2.0"),
            ("anthropics/pdf-tools", Some("1.2.0"))
        );
        assert_eq!(parse_skill_spec("@odd"), ("@odd", None));
    }
}
