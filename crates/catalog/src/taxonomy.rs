/// Category keyword table, in declaration order. Ties during scoring are
/// broken by this order; no match falls through to "other".
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "documents",
        &["pdf", "docx", "xlsx", "pptx", "document", "spreadsheet", "presentation"],
    ),
    (
        "development",
        &["git", "gh-", "code", "test", "ci", "debug", "lint", "review", "mcp"],
    ),
    (
        "creative",
        &["art", "design", "canvas", "music", "brand", "visual", "image"],
    ),
    (
        "enterprise",
        &["communication", "meeting", "email", "slack", "notion", "knowledge"],
    ),
    ("integrations", &["notion", "github", "slack", "api"]),
    ("data", &["data", "analysis", "extract", "transform", "csv", "json"]),
];

/// Fixed keyword list scanned first during tag extraction.
const TAG_KEYWORDS: &[&str] = &[
    "pdf", "docx", "xlsx", "pptx", "csv", "json", "yaml", "github", "git", "pr", "ci", "cd",
    "test", "lint", "notion", "slack", "api", "mcp", "cli", "design", "art", "music", "brand",
    "visual", "document", "extract", "merge", "convert", "analysis", "meeting", "email",
    "knowledge", "wiki", "faq",
];

const MAX_TAGS: usize = 10;

/// Assign a category by keyword scoring over name + description.
pub fn categorize(name: &str, description: &str) -> &'static str {
    let text = format!("{name} {description}").to_lowercase();

    let mut best: Option<(&'static str, usize)> = None;
    for (category, keywords) in CATEGORY_KEYWORDS {
        let score = keywords.iter().filter(|kw| text.contains(*kw)).count();
        if score > 0 && best.is_none_or(|(_, s)| score > s) {
            best = Some((category, score));
        }
    }

    best.map_or("other", |(category, _)| category)
}

/// Extract up to ten searchable tags: fixed keywords found in the text
/// first, then words derived from the name, duplicates suppressed.
pub fn extract_tags(name: &str, description: &str) -> Vec<String> {
    let text = format!("{name} {description}").to_lowercase();

    let mut tags: Vec<String> = Vec::new();
    for kw in TAG_KEYWORDS {
        if text.contains(kw) {
            tags.push((*kw).to_string());
        }
    }

    for word in name.replace('-', " ").split_whitespace() {
        if word.len() > 2 && !tags.iter().any(|t| t == word) {
            tags.push(word.to_string());
        }
    }

    tags.truncate(MAX_TAGS);
    tags
}
