use std::collections::BTreeMap;

use crate::core::config::ANALYSIS_WINDOW;
use crate::core::text::clamp_bytes;
use crate::core::types::{NamedEntityOut, Source};
use crate::lang::PolishAnalyzer;
use crate::nlp::garbage::{clean_text_for_nlp, is_garbage};

const TOP_ENTITIES: usize = 50;
const MAX_CONTEXTS: usize = 3;
const CONTEXT_RADIUS: usize = 50;

/// Types that carry extra importance weight.
const PRIORITY_TYPES: &[&str] = &["PERSON", "ORGANIZATION", "LOCATION", "DATE"];

fn normalize_label(label: &str) -> String {
    match label {
        "PER" | "persName" => "PERSON",
        "ORG" | "orgName" => "ORGANIZATION",
        "LOC" | "GPE" | "placeName" => "LOCATION",
        "DATE" => "DATE",
        "TIME" => "TIME",
        "MONEY" => "MONEY",
        "PERCENT" => "PERCENT",
        other => other,
    }
    .to_string()
}

struct EntityAgg {
    display: String,
    entity_type: String,
    freq: usize,
    per_source: Vec<usize>,
    contexts: Vec<String>,
}

/// NER pass over every source with garbage filtering and cross-source
/// aggregation into importance-ranked entities.
pub fn extract_named_entities(
    nlp: &PolishAnalyzer,
    sources: &[Source],
) -> Vec<NamedEntityOut> {
    let mut aggregated: BTreeMap<String, EntityAgg> = BTreeMap::new();

    for (source_idx, source) in sources.iter().enumerate() {
        let cleaned = clean_text_for_nlp(clamp_bytes(&source.text, ANALYSIS_WINDOW));
        let doc = nlp.analyze(&cleaned);
        let chars: Vec<char> = cleaned.chars().collect();

        for span in &doc.entities {
            let text = span.text.trim();
            let char_count = text.chars().count();
            if char_count < 2 || char_count > 100 {
                continue;
            }
            if text.chars().all(|c| c.is_ascii_digit() || c.is_whitespace()) {
                continue;
            }
            if is_garbage(text) {
                continue;
            }

            let key = text.to_lowercase();
            let agg = aggregated.entry(key).or_insert_with(|| EntityAgg {
                display: text.to_string(),
                entity_type: normalize_label(span.label),
                freq: 0,
                per_source: vec![0; sources.len()],
                contexts: Vec::new(),
            });
            agg.freq += 1;
            agg.per_source[source_idx] += 1;
            if agg.contexts.len() < MAX_CONTEXTS {
                agg.contexts.push(context_window(&chars, span.start, char_count));
            }
        }
    }

    let mut out: Vec<NamedEntityOut> = aggregated
        .into_iter()
        .map(|(key, agg)| {
            let sources_count = agg.per_source.iter().filter(|c| **c > 0).count();
            let importance = importance_score(
                &agg.entity_type,
                agg.freq,
                sources_count,
                sources.len(),
            );
            NamedEntityOut {
                text: agg.display,
                key,
                entity_type: agg.entity_type,
                freq: agg.freq,
                freq_per_source: agg.per_source,
                sources_count,
                importance,
                contexts: agg.contexts,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.freq.cmp(&a.freq))
            .then_with(|| a.key.cmp(&b.key))
    });
    out.truncate(TOP_ENTITIES);
    out
}

/// Base 0.3, +0.2 for priority types, log-damped frequency up to 0.25,
/// cross-source distribution up to 0.25. Capped at 1.0.
fn importance_score(
    entity_type: &str,
    freq: usize,
    sources_count: usize,
    total_sources: usize,
) -> f64 {
    let mut score = 0.3;
    if PRIORITY_TYPES.contains(&entity_type) {
        score += 0.2;
    }
    score += (((freq + 1) as f64).ln() * 0.08).min(0.25);
    if total_sources > 0 {
        score += 0.25 * sources_count as f64 / total_sources as f64;
    }
    score.min(1.0)
}

fn context_window(chars: &[char], start: usize, entity_len: usize) -> String {
    let from = start.saturating_sub(CONTEXT_RADIUS);
    let to = (start + entity_len + CONTEXT_RADIUS).min(chars.len());
    chars[from..to].iter().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, text: &str) -> Source {
        Source {
            url: url.to_string(),
            title: String::new(),
            text: text.to_string(),
            h2: Vec::new(),
            word_count: text.split_whitespace().count(),
        }
    }

    #[test]
    fn entities_are_aggregated_across_sources() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![
            source("https://a.pl", "Sąd Okręgowy w Warszawie rozpatruje pozwy. Opłata wynosi 600 zł."),
            source("https://b.pl", "Sąd Okręgowy w Warszawie orzeka rozwody od 1990 roku."),
        ];
        let entities = extract_named_entities(&nlp, &sources);
        assert!(!entities.is_empty());

        let court = entities
            .iter()
            .find(|e| e.key.contains("sąd okręgowy"))
            .expect("court entity");
        assert_eq!(court.entity_type, "ORGANIZATION");
        assert_eq!(court.sources_count, 2);
        assert_eq!(court.freq_per_source.iter().sum::<usize>(), court.freq);
        assert!(!court.contexts.is_empty());
    }

    #[test]
    fn importance_is_bounded_and_ordered() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source(
            "https://a.pl",
            "Sąd Najwyższy uchylił wyrok. Sąd Najwyższy wydał uchwałę. W 2023 roku zapadło 100 wyroków.",
        )];
        let entities = extract_named_entities(&nlp, &sources);
        for e in &entities {
            assert!(e.importance > 0.0 && e.importance <= 1.0);
        }
        for pair in entities.windows(2) {
            assert!(pair[0].importance >= pair[1].importance);
        }
    }

    #[test]
    fn garbage_spans_never_surface() {
        assert!(is_garbage("wp-content"));
        let nlp = PolishAnalyzer::new();
        let sources = vec![source("https://a.pl", "2024 2025 2026 — jedynie daty.")];
        let entities = extract_named_entities(&nlp, &sources);
        // bare year spans are numeric-only and must be rejected
        assert!(entities.iter().all(|e| !e.text.chars().all(|c| c.is_ascii_digit())));
    }
}
