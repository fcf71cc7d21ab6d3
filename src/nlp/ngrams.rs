use std::collections::BTreeMap;

use crate::core::config::{ANALYSIS_WINDOW, HIGH_SIGNAL_WINDOW};
use crate::core::text::clamp_bytes;
use crate::core::types::{NgramEntry, Source};
use crate::lang::PolishAnalyzer;

/// Label of the virtual source holding PAA questions, refinement chips,
/// related searches, SERP titles and snippets. It occupies index
/// `sources.len()` in the per-source counters and is excluded from every
/// distribution statistic.
pub const HIGH_SIGNAL_LABEL: &str = "__google_signals__";

const NGRAM_SIZES: [usize; 3] = [2, 3, 4];
const MIN_PAGE_FREQ: usize = 2;

#[derive(Default)]
struct NgramAgg {
    per_source: Vec<usize>,
    surfaces: BTreeMap<String, usize>,
}

/// Build the lemma-grouped 2–4-gram index over the competitor corpus plus
/// the high-signal pseudo-source.
pub fn build_ngram_index(
    nlp: &PolishAnalyzer,
    sources: &[Source],
    high_signal_text: &str,
    main_keyword: &str,
    top_n: usize,
) -> Vec<NgramEntry> {
    let slots = sources.len() + 1;
    let high_signal_idx = sources.len();
    let mut index: BTreeMap<String, NgramAgg> = BTreeMap::new();

    for (idx, source) in sources.iter().enumerate() {
        index_document(nlp, &mut index, slots, idx, &source.text, ANALYSIS_WINDOW);
    }
    if !high_signal_text.trim().is_empty() {
        index_document(
            nlp,
            &mut index,
            slots,
            high_signal_idx,
            high_signal_text,
            HIGH_SIGNAL_WINDOW,
        );
    }

    let max_page_freq = index
        .values()
        .map(|agg| agg.per_source[..sources.len()].iter().sum::<usize>())
        .max()
        .unwrap_or(0);

    let keyword_lower = main_keyword.to_lowercase();
    let mut entries: Vec<NgramEntry> = Vec::new();

    for (lemma_key, agg) in &index {
        let page_counts = &agg.per_source[..sources.len()];
        let page_freq: usize = page_counts.iter().sum();
        let high_signal_freq = agg.per_source[high_signal_idx];
        let page_presence = page_counts.iter().filter(|c| **c > 0).count();
        let is_high_signal_only = page_freq == 0 && high_signal_freq > 0;

        // Google-selected phrases clear the floor even at one page hit each;
        // everything else needs repetition across the corpus.
        if page_freq < MIN_PAGE_FREQ && !is_high_signal_only {
            continue;
        }

        let freq_norm = if max_page_freq > 0 {
            page_freq as f64 / max_page_freq as f64
        } else {
            0.0
        };
        let site_score = if sources.is_empty() {
            0.0
        } else {
            page_presence as f64 / sources.len() as f64
        };

        let display = agg
            .surfaces
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(surface, _)| surface.clone())
            .unwrap_or_else(|| lemma_key.clone());

        let mut weight = 0.5 * freq_norm + 0.5 * site_score;
        if !keyword_lower.is_empty() && display.contains(&keyword_lower) {
            weight += 0.1;
        }
        if high_signal_freq > 0 {
            weight += 0.08;
        }

        let mut non_zero: Vec<usize> = page_counts.iter().copied().filter(|c| *c > 0).collect();
        non_zero.sort_unstable();
        let freq_min = non_zero.first().copied().unwrap_or(0);
        let freq_max = non_zero.last().copied().unwrap_or(0);
        let freq_median = median(&non_zero);

        entries.push(NgramEntry {
            ngram: display,
            ngram_lemma: lemma_key.clone(),
            freq: page_freq,
            freq_total: page_freq + high_signal_freq,
            is_high_signal: high_signal_freq > 0,
            weight,
            site_distribution: format!("{}/{}", page_presence, sources.len()),
            freq_per_source: page_counts.to_vec(),
            freq_min,
            freq_median,
            freq_max,
        });
    }

    entries.sort_by(|a, b| {
        b.weight
            .partial_cmp(&a.weight)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.freq.cmp(&a.freq))
            .then_with(|| a.ngram_lemma.cmp(&b.ngram_lemma))
    });
    entries.truncate(top_n);
    entries
}

fn index_document(
    nlp: &PolishAnalyzer,
    index: &mut BTreeMap<String, NgramAgg>,
    slots: usize,
    doc_idx: usize,
    text: &str,
    window: usize,
) {
    let text = clamp_bytes(text, window);
    let (raw, lemmas) = nlp.alpha_tokens(text);
    for n in NGRAM_SIZES {
        if lemmas.len() < n {
            continue;
        }
        for start in 0..=(lemmas.len() - n) {
            let lemma_key = lemmas[start..start + n].join(" ");
            let surface = raw[start..start + n].join(" ");
            let agg = index.entry(lemma_key).or_insert_with(|| NgramAgg {
                per_source: vec![0; slots],
                surfaces: BTreeMap::new(),
            });
            agg.per_source[doc_idx] += 1;
            *agg.surfaces.entry(surface).or_insert(0) += 1;
        }
    }
}

fn median(sorted: &[usize]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        (sorted[mid - 1] + sorted[mid]) as f64 / 2.0
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
    fn repeated_phrase_clears_floor_with_aligned_counters() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source(
            "https://a.pl",
            "Rozwód w Warszawie jest skomplikowany. Prawnik od rozwodów pomoże. Rozwód w Warszawie trwa długo.",
        )];
        let entries = build_ngram_index(&nlp, &sources, "", "rozwód w warszawie", 30);

        let hit = entries
            .iter()
            .find(|e| e.ngram == "rozwód w warszawie")
            .expect("expected the repeated trigram");
        assert!(hit.freq >= 2);
        assert_eq!(hit.site_distribution, "1/1");
        assert_eq!(hit.freq_per_source.len(), sources.len());
        assert_eq!(hit.freq_per_source.iter().sum::<usize>(), hit.freq);
        assert!(hit.weight > 0.5); // keyword-substring bonus applies
    }

    #[test]
    fn singletons_are_dropped_unless_high_signal() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source("https://a.pl", "Adwokat rozwodowy przyjmuje klientów.")];
        let entries = build_ngram_index(&nlp, &sources, "", "adwokat", 30);
        assert!(entries.iter().all(|e| e.freq >= 2 || e.is_high_signal));
        assert!(entries.is_empty());
    }

    #[test]
    fn high_signal_only_phrases_survive() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source("https://a.pl", "Treść strony konkurencji bez fraz z Google.")];
        let entries = build_ngram_index(
            &nlp,
            &sources,
            "rozwód bez orzekania o winie",
            "rozwód",
            30,
        );
        let hit = entries.iter().find(|e| e.is_high_signal);
        let hit = hit.expect("high-signal phrase should survive the floor");
        assert_eq!(hit.freq, 0);
        assert!(hit.freq_total > 0);
        assert_eq!(hit.freq_per_source.iter().sum::<usize>(), 0);
    }

    #[test]
    fn empty_corpus_yields_empty_index() {
        let nlp = PolishAnalyzer::new();
        assert!(build_ngram_index(&nlp, &[], "", "rozwód", 30).is_empty());
    }

    #[test]
    fn weights_stay_in_documented_range() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![
            source("https://a.pl", "Rozwód w Warszawie kosztuje 600 zł. Rozwód w Warszawie trwa."),
            source("https://b.pl", "Rozwód w Warszawie wymaga pozwu. Rozwód w Warszawie boli."),
        ];
        let entries = build_ngram_index(&nlp, &sources, "rozwód w Warszawie", "rozwód w warszawie", 30);
        assert!(!entries.is_empty());
        for e in &entries {
            assert!(e.weight >= 0.0 && e.weight <= 1.18 + 0.08);
        }
    }
}
