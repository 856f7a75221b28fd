//! Keyword-based domain classification.

use crate::knowledge::types::Domain;

/// Fixed keyword table. Declaration order is the tie-break order.
pub const DOMAIN_KEYWORDS: [(Domain, &[&str]); 5] = [
    (
        Domain::Frontend,
        &[
            "react", "vue", "angular", "css", "html", "component", "ui", "ux", "tailwind",
            "styled", "dom", "browser", "jsx", "tsx",
        ],
    ),
    (
        Domain::Backend,
        &[
            "api", "endpoint", "database", "sql", "server", "fastapi", "flask", "django",
            "route", "middleware", "orm", "migration",
        ],
    ),
    (
        Domain::Devops,
        &[
            "docker", "kubernetes", "ci/cd", "deploy", "terraform", "ansible", "pipeline",
            "github actions", "cloudflare", "nginx",
        ],
    ),
    (
        Domain::Security,
        &[
            "auth", "jwt", "token", "encrypt", "password", "cors", "csrf", "xss", "injection",
            "vulnerability", "permission",
        ],
    ),
    (
        Domain::Testing,
        &[
            "test", "pytest", "jest", "mock", "fixture", "coverage", "assert", "spec", "e2e",
            "integration",
        ],
    ),
];

/// Number of table keywords that occur in `text` (case-insensitive substring match).
fn keyword_hits(lower: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|kw| lower.contains(*kw)).count()
}

/// Classify text into the domain with the most keyword hits.
///
/// Returns `None` when no keyword matches. Ties go to the domain declared first
/// in [`DOMAIN_KEYWORDS`].
pub fn classify_domain(text: &str) -> Option<Domain> {
    let lower = text.to_lowercase();
    let mut best: Option<(Domain, usize)> = None;
    for (domain, keywords) in DOMAIN_KEYWORDS {
        let hits = keyword_hits(&lower, keywords);
        if hits > 0 && best.map_or(true, |(_, top)| hits > top) {
            best = Some((domain, hits));
        }
    }
    best.map(|(domain, _)| domain)
}
