use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::core::types::{
    TopHeading, TopicImportance, VerifiedKeyword, VerifyKeywordsResponse, VerifyKeywordsSummary,
};
use crate::lang::PolishAnalyzer;

// ─────────────────────────────────────────────────────────────────────────────
// Heading statistics and topic synthesis — small, pure helpers behind their
// own endpoints.
// ─────────────────────────────────────────────────────────────────────────────

/// Top five headings by frequency after trimming and dropping empties.
pub fn analyze_headings(headings: &[String]) -> Vec<TopHeading> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut first_seen: Vec<String> = Vec::new();
    for heading in headings {
        let trimmed = heading.trim();
        if trimmed.is_empty() {
            continue;
        }
        let entry = counts.entry(trimmed.to_string()).or_insert(0);
        if *entry == 0 {
            first_seen.push(trimmed.to_string());
        }
        *entry += 1;
    }

    let mut ranked: Vec<TopHeading> = first_seen
        .into_iter()
        .map(|heading| {
            let count = counts[&heading];
            TopHeading { heading, count }
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(5);
    ranked
}

static THEME_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\d]{3,}").expect("static pattern"));

/// Cross-reference n-gram themes with H2 themes: for every theme word the
/// number of headings and n-grams that mention it.
pub fn synthesize_topics(ngrams: &[String], headings: &[String]) -> Vec<TopicImportance> {
    let mut themes: Vec<String> = top_themes(ngrams);
    for theme in top_themes(headings) {
        if !themes.contains(&theme) {
            themes.push(theme);
        }
    }
    themes.sort();

    themes
        .into_iter()
        .filter_map(|theme| {
            let h2_frequency = headings
                .iter()
                .filter(|h| h.to_lowercase().contains(&theme))
                .count();
            let ngram_frequency = ngrams
                .iter()
                .filter(|n| n.to_lowercase().contains(&theme))
                .count();
            if h2_frequency > 0 || ngram_frequency > 0 {
                Some(TopicImportance {
                    theme,
                    h2_frequency,
                    ngram_frequency,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Ten most frequent words of at least three characters.
fn top_themes(texts: &[String]) -> Vec<String> {
    let joined = texts.join(" ").to_lowercase();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for m in THEME_WORD_RE.find_iter(&joined) {
        *counts.entry(m.as_str().to_string()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(10).map(|(w, _)| w).collect()
}

/// Word-bounded substring inheritance: every longer keyword donates its raw
/// count to each shorter keyword it contains.
pub fn hierarchical_counts(raw_counts: &BTreeMap<String, i64>) -> BTreeMap<String, i64> {
    let mut keywords: Vec<&String> = raw_counts.keys().collect();
    keywords.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then_with(|| a.cmp(b)));

    let mut out = raw_counts.clone();
    for (i, long_kw) in keywords.iter().enumerate() {
        for short_kw in keywords.iter().skip(i + 1) {
            if long_kw.contains(short_kw.as_str()) && word_bounded(long_kw, short_kw) {
                *out.get_mut(short_kw.as_str()).expect("key from same map") +=
                    raw_counts[long_kw.as_str()];
            }
        }
    }
    out
}

fn word_bounded(haystack: &str, needle: &str) -> bool {
    let pattern = format!(r"\b{}\b", regex::escape(needle));
    Regex::new(&pattern)
        .map(|re| re.is_match(haystack))
        .unwrap_or(false)
}

/// Plain substring counts over already-lemmatized input.
pub fn count_lemmatized_keywords(
    lemmatized_text: &str,
    lemmatized_keywords: &[String],
) -> BTreeMap<String, usize> {
    lemmatized_keywords
        .iter()
        .filter(|kw| !kw.trim().is_empty())
        .map(|kw| (kw.clone(), lemmatized_text.matches(kw.as_str()).count()))
        .collect()
}

/// Inflection-aware presence check: each keyword's first-token lemma counted
/// against the lemmas of the text.
pub fn verify_keywords(
    nlp: &PolishAnalyzer,
    text: &str,
    keyword_list: &[String],
) -> VerifyKeywordsResponse {
    let text_lemmas = nlp.alpha_lemmas(&text.to_lowercase());

    let results: Vec<VerifiedKeyword> = keyword_list
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .map(|kw| {
            let lemma = kw
                .split_whitespace()
                .next()
                .map(|first| nlp.lemmatize_word(first))
                .unwrap_or_default();
            let count = text_lemmas.iter().filter(|l| **l == lemma).count();
            VerifiedKeyword {
                keyword: kw,
                status: if count > 0 { "OK" } else { "MISSING" }.to_string(),
                lemma,
                count,
            }
        })
        .collect();

    let found = results.iter().filter(|r| r.status == "OK").count();
    VerifyKeywordsResponse {
        summary: VerifyKeywordsSummary {
            total_keywords: results.len(),
            found,
            missing: results.len() - found,
        },
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_headings_rank_by_frequency() {
        let headings: Vec<String> = [
            "Koszty rozwodu", "Koszty rozwodu", "Koszty rozwodu",
            "Podział majątku", "Podział majątku",
            "Alimenty", "  ", "Mediacja", "Opieka", "Separacja", "Pozew",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let top = analyze_headings(&headings);
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].heading, "Koszty rozwodu");
        assert_eq!(top[0].count, 3);
        assert_eq!(top[1].heading, "Podział majątku");
        assert_eq!(top[1].count, 2);
    }

    #[test]
    fn topics_cross_reference_ngrams_and_headings() {
        let ngrams = vec!["koszty rozwodu".to_string(), "pozew rozwodowy".to_string()];
        let headings = vec!["Ile wynoszą koszty rozwodu?".to_string()];
        let topics = synthesize_topics(&ngrams, &headings);
        let koszty = topics.iter().find(|t| t.theme == "koszty").unwrap();
        assert_eq!(koszty.h2_frequency, 1);
        assert_eq!(koszty.ngram_frequency, 1);
        // output is sorted by theme
        let names: Vec<&str> = topics.iter().map(|t| t.theme.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn hierarchical_counts_inherit_down_word_boundaries() {
        let raw: BTreeMap<String, i64> = [
            ("rozwód".to_string(), 3),
            ("rozwód warszawa".to_string(), 2),
            ("warszawa".to_string(), 5),
        ]
        .into_iter()
        .collect();
        let counts = hierarchical_counts(&raw);
        assert_eq!(counts["rozwód"], 5);
        assert_eq!(counts["rozwód warszawa"], 2);
        assert_eq!(counts["warszawa"], 7);
    }

    #[test]
    fn substring_without_word_boundary_does_not_inherit() {
        let raw: BTreeMap<String, i64> = [
            ("praw".to_string(), 1),
            ("prawnik".to_string(), 4),
        ]
        .into_iter()
        .collect();
        let counts = hierarchical_counts(&raw);
        assert_eq!(counts["praw"], 1);
        assert_eq!(counts["prawnik"], 4);
    }

    #[test]
    fn lemmatized_counts_are_plain_substrings() {
        let counts = count_lemmatized_keywords(
            "rozwód sprawa prawnik rozwód",
            &["rozwód".to_string(), "sąd".to_string()],
        );
        assert_eq!(counts["rozwód"], 2);
        assert_eq!(counts["sąd"], 0);
    }

    #[test]
    fn verify_keywords_reports_missing() {
        let nlp = PolishAnalyzer::new();
        let response = verify_keywords(
            &nlp,
            "Prawnika warto zapytać o koszty.",
            &["prawnik".to_string(), "alimenty".to_string()],
        );
        assert_eq!(response.summary.total_keywords, 2);
        assert_eq!(response.summary.found, 1);
        assert_eq!(response.summary.missing, 1);
        let lawyer = response.results.iter().find(|r| r.keyword == "prawnik").unwrap();
        assert_eq!(lawyer.status, "OK");
        assert!(lawyer.count >= 1);
    }
}
