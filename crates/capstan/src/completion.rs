//! Completion ranking.
//!
//! Candidates are ranked case-insensitively: exact > prefix > substring >
//! fuzzy subsequence. Ties keep their original order. Results are capped at
//! [`MAX_COMPLETIONS`].

use serde::Serialize;

use crate::types::CompletionCandidate;

pub const MAX_COMPLETIONS: usize = 100;

const FUZZY_MATCH_SCORE: u32 = 1;
const FUZZY_CONSECUTIVE_BONUS: u32 = 2;
const FUZZY_BOUNDARY_BONUS: u32 = 3;

/// How a candidate matched the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Fuzzy,
    Substring,
    Prefix,
    Exact,
}

/// Sort key for a matching candidate. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Relevance {
    pub tier: MatchTier,
    pub score: u32,
}

/// Ranked, capped completion results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedCompletions {
    pub candidates: Vec<CompletionCandidate>,
    /// Matches before the cap was applied.
    pub total: usize,
    pub has_more: bool,
}

impl RankedCompletions {
    pub fn values(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.value.clone()).collect()
    }
}

/// Rank candidates against a partial value.
pub fn complete(candidates: &[CompletionCandidate], query: &str) -> RankedCompletions {
    let mut matched: Vec<(Relevance, &CompletionCandidate)> = if query.is_empty() {
        candidates
            .iter()
            .map(|c| {
                (
                    Relevance {
                        tier: MatchTier::Exact,
                        score: 0,
                    },
                    c,
                )
            })
            .collect()
    } else {
        let mut scored: Vec<_> = candidates
            .iter()
            .filter_map(|c| relevance(&c.value, query).map(|r| (r, c)))
            .collect();
        // Stable: equal relevance keeps input order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
    };

    let total = matched.len();
    matched.truncate(MAX_COMPLETIONS);
    let candidates: Vec<CompletionCandidate> =
        matched.into_iter().map(|(_, c)| c.clone()).collect();
    let has_more = candidates.len() == MAX_COMPLETIONS && total > MAX_COMPLETIONS;

    RankedCompletions {
        candidates,
        total,
        has_more,
    }
}

/// Relevance of `candidate` for `query`, or `None` if it does not match.
pub fn relevance(candidate: &str, query: &str) -> Option<Relevance> {
    let candidate = candidate.to_lowercase();
    let query = query.to_lowercase();

    let tier = if candidate == query {
        MatchTier::Exact
    } else if candidate.starts_with(&query) {
        MatchTier::Prefix
    } else if candidate.contains(&query) {
        MatchTier::Substring
    } else {
        let score = fuzzy_score(&candidate, &query);
        if score == 0 {
            return None;
        }
        return Some(Relevance {
            tier: MatchTier::Fuzzy,
            score,
        });
    };

    Some(Relevance { tier, score: 0 })
}

/// Greedy left-to-right subsequence score. Zero means no match.
///
/// Inputs are expected to be lowercased already.
pub fn fuzzy_score(candidate: &str, query: &str) -> u32 {
    let query: Vec<char> = query.chars().collect();
    if query.is_empty() {
        return 0;
    }

    let mut score = 0;
    let mut qi = 0;
    let mut last_match: Option<usize> = None;
    let mut prev: Option<char> = None;

    for (i, c) in candidate.chars().enumerate() {
        if qi == query.len() {
            break;
        }
        if c == query[qi] {
            score += FUZZY_MATCH_SCORE;
            if last_match.is_some_and(|last| last + 1 == i) {
                score += FUZZY_CONSECUTIVE_BONUS;
            }
            if prev.map_or(true, is_word_separator) {
                score += FUZZY_BOUNDARY_BONUS;
            }
            last_match = Some(i);
            qi += 1;
        }
        prev = Some(c);
    }

    if qi == query.len() {
        score
    } else {
        0
    }
}

fn is_word_separator(c: char) -> bool {
    matches!(c, '-' | '_' | ' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(values: &[&str]) -> Vec<CompletionCandidate> {
        values.iter().map(|v| CompletionCandidate::new(*v)).collect()
    }

    #[test]
    fn test_prefix_before_substring() {
        let ranked = complete(&candidates(&["my-web-thing", "web-api", "webhook"]), "web");
        assert_eq!(ranked.values(), vec!["web-api", "webhook", "my-web-thing"]);
        assert_eq!(ranked.total, 3);
        assert!(!ranked.has_more);
    }

    #[test]
    fn test_tier_order() {
        let ranked = complete(
            &candidates(&["a-p-i", "rapid", "apis", "API"]),
            "api",
        );
        assert_eq!(ranked.values(), vec!["API", "apis", "rapid", "a-p-i"]);
    }

    #[test]
    fn test_non_matching_excluded() {
        let ranked = complete(&candidates(&["alpha", "beta"]), "zz");
        assert!(ranked.candidates.is_empty());
        assert_eq!(ranked.total, 0);
    }

    #[test]
    fn test_fuzzy_requires_order() {
        assert!(fuzzy_score("abc", "ca") == 0);
        assert!(fuzzy_score("abc", "ac") > 0);
    }

    #[test]
    fn test_fuzzy_prefers_boundaries_and_runs() {
        let boundary = fuzzy_score("get-user", "gu");
        let buried = fuzzy_score("bigquery", "gu");
        assert!(boundary > buried, "{boundary} <= {buried}");

        let run = fuzzy_score("xabcx", "abc");
        let spread = fuzzy_score("xaxbxc", "abc");
        assert!(run > spread, "{run} <= {spread}");
    }

    #[test]
    fn test_fuzzy_ranked_by_score() {
        let ranked = complete(&candidates(&["xaxbxc", "a_b_c"]), "abc");
        assert_eq!(ranked.values(), vec!["a_b_c", "xaxbxc"]);
    }

    #[test]
    fn test_empty_query_keeps_order() {
        let ranked = complete(&candidates(&["c", "a", "b"]), "");
        assert_eq!(ranked.values(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_cap_and_has_more() {
        let many: Vec<CompletionCandidate> = (0..250)
            .map(|i| CompletionCandidate::new(format!("item-{i}")))
            .collect();
        let ranked = complete(&many, "item");
        assert_eq!(ranked.candidates.len(), MAX_COMPLETIONS);
        assert_eq!(ranked.total, 250);
        assert!(ranked.has_more);

        let exactly: Vec<CompletionCandidate> = many.into_iter().take(100).collect();
        let ranked = complete(&exactly, "");
        assert_eq!(ranked.candidates.len(), 100);
        assert!(!ranked.has_more);
    }

    #[test]
    fn test_descriptions_carried_through() {
        let list = vec![CompletionCandidate::new("brief").with_description("One paragraph")];
        let ranked = complete(&list, "br");
        assert_eq!(ranked.candidates[0].description.as_deref(), Some("One paragraph"));
    }
}
