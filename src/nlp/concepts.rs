use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::core::config::ANALYSIS_WINDOW;
use crate::core::text::clamp_bytes;
use crate::core::types::{ConceptEntityOut, Source};
use crate::lang::{Pos, PolishAnalyzer};
use crate::nlp::garbage::is_garbage;

const TOP_CONCEPTS: usize = 30;
const MIN_FREQ: usize = 2;
const MIN_SOURCE_CHARS: usize = 100;
const MAX_SPAN_TOKENS: usize = 5;

static CSS_SIG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[{};]|-webkit-|var\(|px\b").expect("static pattern"));

struct ConceptAgg {
    freq: usize,
    per_source: Vec<usize>,
    surfaces: BTreeMap<String, usize>,
    lemma_set: BTreeSet<String>,
    max_words: usize,
}

/// Multi-word noun phrases from POS spans, lemma-grouped across sources.
///
/// Polish has no ready noun-chunk iterator, so chunks are emulated: runs of
/// NOUN/PROPN/ADJ tokens (short function words may bridge two content
/// tokens), two to five tokens long, ending in a noun.
pub fn extract_concept_entities(
    nlp: &PolishAnalyzer,
    sources: &[Source],
    main_keyword: &str,
) -> Vec<ConceptEntityOut> {
    let keyword_lemmas: BTreeSet<String> = nlp.alpha_lemmas(main_keyword).into_iter().collect();
    let mut aggregated: BTreeMap<String, ConceptAgg> = BTreeMap::new();

    for (source_idx, source) in sources.iter().enumerate() {
        if source.text.len() < MIN_SOURCE_CHARS {
            continue;
        }
        let text = clamp_bytes(&source.text, ANALYSIS_WINDOW);
        let doc = nlp.analyze(text);

        for sent in &doc.sentences {
            let tokens = doc.sentence_tokens(sent);
            for (start, end) in chunk_spans(tokens) {
                let span = &tokens[start..end];
                let surface = normalize_surface(span.iter().map(|t| t.text.as_str()));
                if !accept_span(&surface, span.len(), span.iter().map(|t| t.is_stop)) {
                    continue;
                }

                let lemmas: BTreeSet<String> = span
                    .iter()
                    .filter(|t| !t.is_stop && t.pos != Pos::Punct && t.lemma.chars().count() > 2)
                    .map(|t| t.lemma.clone())
                    .collect();
                if lemmas.is_empty() {
                    continue;
                }
                let lemma_key = lemmas.iter().cloned().collect::<Vec<_>>().join(" ");

                let agg = aggregated.entry(lemma_key).or_insert_with(|| ConceptAgg {
                    freq: 0,
                    per_source: vec![0; sources.len()],
                    surfaces: BTreeMap::new(),
                    lemma_set: lemmas.clone(),
                    max_words: 0,
                });
                agg.freq += 1;
                agg.per_source[source_idx] += 1;
                agg.max_words = agg.max_words.max(span.len());
                *agg.surfaces.entry(surface).or_insert(0) += 1;
            }
        }
    }

    let mut out: Vec<ConceptEntityOut> = aggregated
        .into_iter()
        .filter_map(|(lemma_key, agg)| {
            let sources_count = agg.per_source.iter().filter(|c| **c > 0).count();
            if agg.freq < MIN_FREQ || sources_count < 1 {
                return None;
            }

            let display = pick_display(&agg.surfaces);
            let word_count = display.split_whitespace().count();
            let kind = if word_count <= 2 { "CONCEPT" } else { "TOPICAL" };

            let keyword_overlap = if keyword_lemmas.is_empty() {
                0.0
            } else {
                agg.lemma_set.intersection(&keyword_lemmas).count() as f64
                    / keyword_lemmas.len() as f64
            };
            let importance = importance_score(
                sources_count,
                sources.len(),
                agg.freq,
                word_count,
                keyword_overlap,
            );

            let variants: Vec<String> = agg
                .surfaces
                .keys()
                .filter(|s| **s != display)
                .take(5)
                .cloned()
                .collect();

            Some(ConceptEntityOut {
                text: display,
                lemma_key,
                kind: kind.to_string(),
                freq: agg.freq,
                freq_per_source: agg.per_source,
                sources_count,
                variants,
                word_count,
                importance,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.importance
            .partial_cmp(&a.importance)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.freq.cmp(&a.freq))
            .then_with(|| a.lemma_key.cmp(&b.lemma_key))
    });
    out.truncate(TOP_CONCEPTS);
    out
}

/// Noun-chunk emulation: content tokens are NOUN/PROPN/ADJ; an alphabetic
/// stop word may sit between two content tokens ("rozwód w Warszawie").
/// Spans end on NOUN or PROPN.
fn chunk_spans(tokens: &[crate::lang::Token]) -> Vec<(usize, usize)> {
    let is_content =
        |t: &crate::lang::Token| matches!(t.pos, Pos::Noun | Pos::Propn | Pos::Adj);
    let mut spans = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if !is_content(&tokens[i]) {
            i += 1;
            continue;
        }
        let start = i;
        let mut last_content = i;
        let mut j = i + 1;
        while j < tokens.len() && j - start < MAX_SPAN_TOKENS {
            if is_content(&tokens[j]) {
                last_content = j;
                j += 1;
            } else if tokens[j].pos == Pos::Adp
                && tokens[j].is_stop
                && j + 1 < tokens.len()
                && is_content(&tokens[j + 1])
                && j + 1 - start < MAX_SPAN_TOKENS
            {
                j += 2;
                last_content = j - 1;
            } else {
                break;
            }
        }
        let end = last_content + 1;
        let len = end - start;
        if (2..=MAX_SPAN_TOKENS).contains(&len)
            && matches!(tokens[last_content].pos, Pos::Noun | Pos::Propn)
        {
            spans.push((start, end));
        }
        i = end.max(i + 1);
    }
    spans
}

fn normalize_surface<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let joined = parts.collect::<Vec<_>>().join(" ").to_lowercase();
    joined
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn accept_span(
    surface: &str,
    token_count: usize,
    stop_flags: impl Iterator<Item = bool>,
) -> bool {
    let char_count = surface.chars().count();
    if char_count < 3 || char_count > 80 {
        return false;
    }
    if token_count > MAX_SPAN_TOKENS {
        return false;
    }
    if is_garbage(surface) || CSS_SIG_RE.is_match(surface) {
        return false;
    }
    let alpha = surface
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace())
        .count();
    if (alpha as f64 / char_count as f64) < 0.6 {
        return false;
    }
    let flags: Vec<bool> = stop_flags.collect();
    if flags.iter().all(|f| *f) {
        return false;
    }
    if token_count == 2 && flags.first().copied().unwrap_or(false) {
        return false;
    }
    true
}

/// Prefer the most frequent surface form that does not look like a scraping
/// typo: after the first vowel, a mid-word run of four or more consonants.
fn pick_display(surfaces: &BTreeMap<String, usize>) -> String {
    let mut ranked: Vec<(&String, &usize)> = surfaces.iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    for (surface, _) in &ranked {
        if !surface.split_whitespace().any(looks_like_typo) {
            return (*surface).clone();
        }
    }
    ranked
        .first()
        .map(|(s, _)| (*s).clone())
        .unwrap_or_default()
}

fn looks_like_typo(word: &str) -> bool {
    let chars: Vec<char> = word.chars().collect();
    let Some(first_vowel) = chars.iter().position(|c| is_vowel(*c)) else {
        return false;
    };
    let mut run = 0usize;
    for (idx, c) in chars.iter().enumerate().skip(first_vowel + 1) {
        if is_vowel(*c) {
            run = 0;
        } else {
            run += 1;
            // A long consonant cluster strictly inside the word marks a typo;
            // clusters reaching the final letters are normal Polish morphology.
            if run >= 4 && idx + 2 < chars.len() {
                return true;
            }
        }
    }
    false
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y' | 'ą' | 'ę' | 'ó')
}

fn importance_score(
    sources_count: usize,
    total_sources: usize,
    freq: usize,
    word_count: usize,
    keyword_overlap: f64,
) -> f64 {
    let distribution = if total_sources > 0 {
        sources_count as f64 / total_sources as f64
    } else {
        0.0
    };
    let specificity = match word_count {
        2 => 0.20,
        3 => 0.18,
        1 => 0.10,
        _ => 0.08,
    };
    let score = distribution * 0.35
        + (((freq + 1) as f64).ln() * 0.06).min(0.25)
        + specificity
        + keyword_overlap * 0.20;
    score.min(1.0)
}

/// Writer-facing split of the concept list.
pub struct ConceptSummary {
    pub must_cover: Vec<String>,
    pub should_cover: Vec<String>,
    pub instruction: String,
}

pub fn summarize_concepts(concepts: &[ConceptEntityOut]) -> ConceptSummary {
    let must_cover: Vec<String> = concepts
        .iter()
        .filter(|c| c.sources_count >= 2 && c.importance >= 0.3)
        .map(|c| c.text.clone())
        .collect();
    let should_cover: Vec<String> = concepts
        .iter()
        .filter(|c| c.importance >= 0.2 && !must_cover.contains(&c.text))
        .map(|c| c.text.clone())
        .collect();

    let mut instruction = String::new();
    if !must_cover.is_empty() {
        instruction.push_str(&format!(
            "Omów obowiązkowo: {}. ",
            must_cover.join(", ")
        ));
    }
    if !should_cover.is_empty() {
        instruction.push_str(&format!(
            "Warto również poruszyć: {}.",
            should_cover.join(", ")
        ));
    }

    ConceptSummary {
        must_cover,
        should_cover,
        instruction: instruction.trim().to_string(),
    }
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
    fn repeated_noun_phrase_becomes_a_concept() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source(
            "https://a.pl",
            "Rozwód w Warszawie jest skomplikowany. Prawnik od rozwodów pomoże. \
             Rozwód w Warszawie trwa długo. To wszystko wymaga cierpliwości i spokoju.",
        )];
        let concepts = extract_concept_entities(&nlp, &sources, "rozwód w warszawie");
        let hit = concepts
            .iter()
            .find(|c| c.text.contains("rozwód"))
            .expect("concept containing the keyword");
        assert!(hit.importance > 0.0);
        assert!(hit.freq >= 2);
        assert_eq!(hit.kind, "TOPICAL"); // three-word phrase
    }

    #[test]
    fn short_sources_are_ignored() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source("https://a.pl", "Krótki tekst.")];
        assert!(extract_concept_entities(&nlp, &sources, "rozwód").is_empty());
    }

    #[test]
    fn singleton_phrases_fall_below_floor() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source(
            "https://a.pl",
            "Umowa przedwstępna zabezpiecza kupującego przed wycofaniem się sprzedawcy. \
             Notariusz sporządza akt notarialny przy sprzedaży mieszkania w stolicy.",
        )];
        let concepts = extract_concept_entities(&nlp, &sources, "umowa");
        assert!(concepts.iter().all(|c| c.freq >= 2));
    }

    #[test]
    fn typo_heuristic_flags_consonant_clusters() {
        assert!(looks_like_typo("warszwskie")); // rszwsk mid-word cluster
        assert!(!looks_like_typo("warszawskie"));
        assert!(!looks_like_typo("pierwszy"));
        assert!(!looks_like_typo("rozwód"));
    }

    #[test]
    fn summary_partitions_by_importance() {
        let concepts = vec![
            ConceptEntityOut {
                text: "rozwód w warszawie".into(),
                lemma_key: "rozwód warszawa".into(),
                kind: "TOPICAL".into(),
                freq: 5,
                freq_per_source: vec![3, 2],
                sources_count: 2,
                variants: vec![],
                word_count: 3,
                importance: 0.8,
            },
            ConceptEntityOut {
                text: "opłata sądowa".into(),
                lemma_key: "opłata sądowy".into(),
                kind: "CONCEPT".into(),
                freq: 2,
                freq_per_source: vec![2, 0],
                sources_count: 1,
                variants: vec![],
                word_count: 2,
                importance: 0.25,
            },
        ];
        let summary = summarize_concepts(&concepts);
        assert_eq!(summary.must_cover, vec!["rozwód w warszawie"]);
        assert_eq!(summary.should_cover, vec!["opłata sądowa"]);
        assert!(summary.instruction.contains("Omów obowiązkowo"));
    }
}
