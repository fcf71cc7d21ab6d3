use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use crate::core::text::split_paragraphs;
use crate::core::types::SemanticKeyphrase;
use crate::lang::is_stop_word;

const MAX_FEATURES: usize = 500;
const MAX_DF_RATIO: f64 = 0.95;
const MIN_SEGMENT_CHARS: usize = 30;
const CHUNK_WORDS: usize = 200;

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-ząćęłńóśźż]+").expect("static pattern"));
static SENTENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("static pattern"));

/// TF-IDF key-phrases over paragraph pseudo-documents.
///
/// The corpus is cut into paragraph-like segments so that phrase weights
/// reflect how consistently a phrase recurs across the text, not raw volume.
pub fn extract_keyphrases(corpus: &str, top_n: usize) -> Vec<SemanticKeyphrase> {
    let docs = build_pseudo_docs(corpus);
    if docs.is_empty() {
        return Vec::new();
    }

    // Per-document phrase counts over stop-filtered alpha tokens.
    let doc_counts: Vec<HashMap<String, usize>> = docs
        .iter()
        .map(|doc| {
            let tokens: Vec<String> = WORD_RE
                .find_iter(&doc.to_lowercase())
                .map(|m| m.as_str().to_string())
                .filter(|t| !is_stop_word(t))
                .collect();
            let mut counts = HashMap::new();
            for n in 2..=4 {
                if tokens.len() < n {
                    continue;
                }
                for window in tokens.windows(n) {
                    *counts.entry(window.join(" ")).or_insert(0) += 1;
                }
            }
            counts
        })
        .collect();

    let n_docs = doc_counts.len();
    let mut df: BTreeMap<&str, usize> = BTreeMap::new();
    let mut total_tf: BTreeMap<&str, usize> = BTreeMap::new();
    for counts in &doc_counts {
        for (term, tf) in counts {
            *df.entry(term).or_insert(0) += 1;
            *total_tf.entry(term).or_insert(0) += tf;
        }
    }

    // Vocabulary pruning: near-ubiquitous terms out, then cap the feature
    // count by collection frequency.
    let mut vocab: Vec<&str> = df
        .iter()
        .filter(|(_, d)| n_docs == 1 || (**d as f64 / n_docs as f64) <= MAX_DF_RATIO)
        .map(|(term, _)| *term)
        .collect();
    vocab.sort_by(|a, b| total_tf[b].cmp(&total_tf[a]).then_with(|| a.cmp(b)));
    vocab.truncate(MAX_FEATURES);

    // Smoothed IDF, L2-normalized per doc, averaged across docs.
    let mut avg: HashMap<&str, f64> = HashMap::new();
    for counts in &doc_counts {
        let mut weights: Vec<(&str, f64)> = Vec::new();
        for &term in &vocab {
            if let Some(tf) = counts.get(term) {
                let idf = ((1.0 + n_docs as f64) / (1.0 + df[term] as f64)).ln() + 1.0;
                weights.push((term, *tf as f64 * idf));
            }
        }
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (term, w) in weights {
                *avg.entry(term).or_insert(0.0) += w / norm / n_docs as f64;
            }
        }
    }

    let mut ranked: Vec<(&str, f64)> = avg.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    // Substring de-duplication against already selected phrases.
    let mut selected: Vec<SemanticKeyphrase> = Vec::new();
    for (phrase, score) in ranked {
        if selected.len() >= top_n {
            break;
        }
        let overlaps = selected
            .iter()
            .any(|s| s.phrase.contains(phrase) || phrase.contains(&s.phrase));
        if overlaps {
            continue;
        }
        selected.push(SemanticKeyphrase {
            phrase: phrase.to_string(),
            score: (score * 3.0).clamp(0.0, 0.95),
        });
    }
    selected
}

fn build_pseudo_docs(corpus: &str) -> Vec<String> {
    let mut segments: Vec<String> = split_paragraphs(corpus)
        .into_iter()
        .filter(|s| s.chars().count() >= MIN_SEGMENT_CHARS)
        .map(str::to_string)
        .collect();

    if segments.len() < 2 {
        segments = SENTENCE_RE
            .split(corpus)
            .map(str::trim)
            .filter(|s| s.chars().count() >= MIN_SEGMENT_CHARS)
            .map(str::to_string)
            .collect();
    }

    if segments.len() < 2 {
        let words: Vec<&str> = corpus.split_whitespace().collect();
        segments = words
            .chunks(CHUNK_WORDS)
            .map(|chunk| chunk.join(" "))
            .filter(|s| !s.is_empty())
            .collect();
    }

    segments
}
