use std::io::Write;

use flate2::{Compression, write::ZlibEncoder};

use crate::types::SkillRecord;

/// Flat boost applied when two same-named skills involve a trusted provider.
const TRUST_BOOST: f64 = 0.3;

/// Collapse whitespace runs, lowercase, trim. Formatting-only differences
/// between mirrors must not affect the similarity score.
fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn compressed_len(data: &[u8]) -> usize {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(data).is_err() {
        return data.len();
    }
    encoder.finish().map_or(data.len(), |out| out.len())
}

/// Normalized-compression-distance similarity between two texts, in [0, 1].
///
/// Identical inputs short-circuit to 1.0 and empty inputs to 0.0, since NCD
/// is unstable at very small sizes.
pub fn ncd_similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);

    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let c1 = compressed_len(a.as_bytes());
    let c2 = compressed_len(b.as_bytes());
    // Concatenate in a deterministic order so the score is symmetric.
    let (first, second) = if a <= b { (&a, &b) } else { (&b, &a) };
    let combined = format!("{first}{second}");
    let c12 = compressed_len(combined.as_bytes());

    let (min, max) = (c1.min(c2) as f64, c1.max(c2) as f64);
    let ncd = (c12 as f64 - min) / max;
    (1.0 - ncd).clamp(0.0, 1.0)
}

/// Enhanced similarity over full records, used for deduplication.
///
/// Same-named skills from a trusted provider weight description over body
/// and get a flat boost: trusted republications are near-certainly the same
/// skill even when documentation verbosity differs sharply. The result is
/// symmetric in its arguments.
pub fn record_similarity(a: &SkillRecord, b: &SkillRecord, either_trusted: bool) -> f64 {
    let body = ncd_similarity(&a.body, &b.body);
    let description = ncd_similarity(&a.description, &b.description);

    if a.name.eq_ignore_ascii_case(&b.name) && either_trusted {
        (0.7 * description + 0.3 * body + TRUST_BOOST).min(1.0)
    } else {
        0.8 * body + 0.2 * description
    }
}
