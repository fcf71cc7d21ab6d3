use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::warn;

use crate::core::types::{ContentGaps, GapOut, PaaEntry, Source};
use crate::lang::{is_stop_word, PolishAnalyzer};

/// Depth signals a thorough article is expected to carry. A signal absent
/// from the whole competitor corpus becomes a differentiation opportunity.
static DEPTH_SIGNALS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    vec![
        (
            "dane liczbowe i statystyki",
            Regex::new(r"\d+(?:[.,]\d+)?\s*(?:%|zł|km|kg|osób|procent)").expect("static"),
        ),
        (
            "odniesienia do dat i aktualności",
            Regex::new(r"\b20\d{2}\b|\broku\b").expect("static"),
        ),
        (
            "cytowania instytucji",
            Regex::new(r"(?i)ministerstw|urząd|urzęd|\bzus\b|\bnfz\b|\bgus\b|sąd").expect("static"),
        ),
        (
            "odwołania do badań",
            Regex::new(r"(?i)badani|badań|raport|analiz|według danych").expect("static"),
        ),
        (
            "podstawy prawne",
            Regex::new(r"(?i)\bart\.|\bust\.|ustaw|kodeks|rozporządzen|§").expect("static"),
        ),
        (
            "wyjątki i przypadki szczególne",
            Regex::new(r"(?i)wyjąt|chyba że|z wyłączeniem|oprócz|poza przypadk").expect("static"),
        ),
        (
            "porównania wariantów",
            Regex::new(r"(?i)w porównaniu|versus|\bvs\b|lepszy niż|różnic|zamiast").expect("static"),
        ),
        (
            "proces krok po kroku",
            Regex::new(r"(?i)krok po kroku|etap|po pierwsze|instrukcj|procedur").expect("static"),
        ),
    ]
});

/// Share of competitor pages an H2 cluster must reach to count as a strong,
/// commonly covered subtopic.
const STRONG_CLUSTER_RATIO: f64 = 0.30;

/// Diff what the top pages cover against what users ask. Never fatal: a
/// panic anywhere inside the analysis is caught at this boundary and comes
/// back as `status: "FAILED"` with empty gap lists.
pub fn analyze_gaps(
    nlp: &PolishAnalyzer,
    sources: &[Source],
    paa: &[PaaEntry],
    related_searches: &[String],
    refinement_chips: &[String],
    main_keyword: &str,
) -> ContentGaps {
    run_guarded(|| {
        analyze_gaps_inner(
            nlp,
            sources,
            paa,
            related_searches,
            refinement_chips,
            main_keyword,
        )
    })
}

/// Catch-unwind boundary: the gap block must always have a valid shape, so
/// downstream consumers branch on `status` instead of losing the brief.
fn run_guarded(analysis: impl FnOnce() -> ContentGaps) -> ContentGaps {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(analysis)) {
        Ok(gaps) => gaps,
        Err(_) => {
            warn!("gap analysis panicked, emitting FAILED gap block");
            ContentGaps {
                status: "FAILED".to_string(),
                ..Default::default()
            }
        }
    }
}

fn analyze_gaps_inner(
    nlp: &PolishAnalyzer,
    sources: &[Source],
    paa: &[PaaEntry],
    related_searches: &[String],
    refinement_chips: &[String],
    main_keyword: &str,
) -> ContentGaps {
    let corpus: String = sources
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let corpus_lemmas: BTreeSet<String> = nlp.alpha_lemmas(&corpus).into_iter().collect();

    let mut seen_topics: BTreeSet<String> = BTreeSet::new();
    let mut paa_unanswered = Vec::new();
    let mut subtopic_missing = Vec::new();
    let mut depth_missing = Vec::new();
    let mut priority = 0usize;

    // ── PAA coverage ─────────────────────────────────────────────────────
    for entry in paa {
        let tokens = content_lemmas(nlp, &entry.question);
        if tokens.is_empty() {
            continue;
        }
        let required = required_hits(tokens.len());
        let covered = tokens.iter().filter(|t| corpus_lemmas.contains(*t)).count();
        if covered < required && seen_topics.insert(entry.question.to_lowercase()) {
            priority += 1;
            paa_unanswered.push(GapOut {
                topic: entry.question.clone(),
                kind: "paa_unanswered".to_string(),
                priority,
                suggest_as_h2: true,
            });
        }
    }

    // ── Subtopic coverage from related searches and chips ────────────────
    let strong_clusters = strong_h2_clusters(nlp, sources);
    for candidate in related_searches.iter().chain(refinement_chips.iter()) {
        let tokens = content_lemmas(nlp, candidate);
        if tokens.is_empty() {
            continue;
        }
        let required = required_hits(tokens.len());
        let covered = tokens.iter().filter(|t| corpus_lemmas.contains(*t)).count();
        let in_strong_cluster = strong_clusters
            .iter()
            .any(|cluster| tokens.iter().any(|t| cluster.contains(t)));
        if covered < required
            && !in_strong_cluster
            && seen_topics.insert(candidate.to_lowercase())
        {
            priority += 1;
            subtopic_missing.push(GapOut {
                topic: candidate.clone(),
                kind: "subtopic_missing".to_string(),
                priority,
                suggest_as_h2: true,
            });
        }
    }

    // ── Depth signals ────────────────────────────────────────────────────
    if !corpus.is_empty() {
        for (name, re) in DEPTH_SIGNALS.iter() {
            if !re.is_match(&corpus) && seen_topics.insert((*name).to_lowercase()) {
                priority += 1;
                depth_missing.push(GapOut {
                    topic: (*name).to_string(),
                    kind: "depth_missing".to_string(),
                    priority,
                    suggest_as_h2: false,
                });
            }
        }
    }

    let suggested_new_h2s: Vec<String> = paa_unanswered
        .iter()
        .chain(subtopic_missing.iter())
        .filter(|g| g.suggest_as_h2)
        .take(10)
        .map(|g| capitalize(&g.topic))
        .collect();

    let mut all_gaps: Vec<GapOut> = Vec::new();
    all_gaps.extend(paa_unanswered.iter().cloned());
    all_gaps.extend(subtopic_missing.iter().cloned());
    all_gaps.extend(depth_missing.iter().cloned());

    let instruction = build_instruction(
        main_keyword,
        &paa_unanswered,
        &subtopic_missing,
        &depth_missing,
    );

    ContentGaps {
        total_gaps: all_gaps.len(),
        suggested_new_h2s,
        paa_unanswered,
        subtopic_missing,
        depth_missing,
        instruction,
        all_gaps,
        status: "OK".to_string(),
    }
}

fn content_lemmas(nlp: &PolishAnalyzer, text: &str) -> Vec<String> {
    nlp.alpha_lemmas(text)
        .into_iter()
        .filter(|l| l.chars().count() > 3 && !is_stop_word(l))
        .collect()
}

/// How many distinctive tokens must appear in the corpus for a question or
/// subtopic to count as covered; scales with question length.
fn required_hits(token_count: usize) -> usize {
    match token_count {
        0 => 0,
        1 | 2 => token_count,
        3 | 4 => 2,
        _ => 3,
    }
}

/// Cluster competitor H2s by their first three content lemmas and keep the
/// clusters present on at least 30% of pages.
fn strong_h2_clusters(nlp: &PolishAnalyzer, sources: &[Source]) -> Vec<BTreeSet<String>> {
    let mut clusters: BTreeMap<String, (BTreeSet<usize>, BTreeSet<String>)> = BTreeMap::new();
    for (idx, source) in sources.iter().enumerate() {
        for h2 in &source.h2 {
            let tokens = content_lemmas(nlp, h2);
            if tokens.is_empty() {
                continue;
            }
            let key = tokens.iter().take(3).cloned().collect::<Vec<_>>().join(" ");
            let entry = clusters.entry(key).or_default();
            entry.0.insert(idx);
            entry.1.extend(tokens);
        }
    }

    let total = sources.len().max(1) as f64;
    clusters
        .into_values()
        .filter(|(pages, _)| pages.len() as f64 / total >= STRONG_CLUSTER_RATIO)
        .map(|(_, tokens)| tokens)
        .collect()
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn build_instruction(
    main_keyword: &str,
    paa: &[GapOut],
    subtopics: &[GapOut],
    depth: &[GapOut],
) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !paa.is_empty() {
        parts.push(format!(
            "Odpowiedz na pytania pomijane przez konkurencję: {}",
            paa.iter().map(|g| g.topic.as_str()).collect::<Vec<_>>().join("; ")
        ));
    }
    if !subtopics.is_empty() {
        parts.push(format!(
            "Dodaj sekcje o tematach: {}",
            subtopics
                .iter()
                .map(|g| g.topic.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        ));
    }
    if !depth.is_empty() {
        parts.push(format!(
            "Pogłęb treść o: {}",
            depth.iter().map(|g| g.topic.as_str()).collect::<Vec<_>>().join("; ")
        ));
    }
    if parts.is_empty() {
        format!(
            "Konkurencja pokrywa temat \"{}\" kompletnie — wyróżnij się jakością i strukturą.",
            main_keyword
        )
    } else {
        parts.join(". ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, text: &str, h2: &[&str]) -> Source {
        Source {
            url: url.to_string(),
            title: String::new(),
            text: text.to_string(),
            h2: h2.iter().map(|s| s.to_string()).collect(),
            word_count: text.split_whitespace().count(),
        }
    }

    fn paa(question: &str) -> PaaEntry {
        PaaEntry {
            question: question.to_string(),
            answer: None,
            source: None,
            generated: false,
        }
    }

    #[test]
    fn unanswered_paa_becomes_a_gap() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source(
            "https://a.pl",
            "Rozwód w Warszawie wymaga pozwu. Według danych GUS liczba rozwodów rośnie o 5% rocznie \
             od 2020 roku. Art. 56 kodeksu określa wyjątki, chyba że sąd orzeknie inaczej. \
             W porównaniu z separacją procedura trwa dłużej i przebiega krok po kroku.",
            &[],
        )];
        let questions = vec![
            paa("Ile kosztuje mediacja przedrozwodowa u specjalisty?"),
            paa("Czy rozwód wymaga pozwu?"),
        ];
        let gaps = analyze_gaps(&nlp, &sources, &questions, &[], &[], "rozwód w warszawie");
        assert_eq!(gaps.status, "OK");
        assert_eq!(gaps.paa_unanswered.len(), 1);
        assert!(gaps.paa_unanswered[0].topic.contains("mediacja"));
        assert!(gaps.suggested_new_h2s.iter().any(|h| h.contains("mediacja")));
        assert_eq!(gaps.total_gaps, gaps.all_gaps.len());
    }

    #[test]
    fn depth_signals_missing_from_thin_corpus() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source(
            "https://a.pl",
            "Opinie klientów o naszej kancelarii są wspaniałe i zachęcające.",
            &[],
        )];
        let gaps = analyze_gaps(&nlp, &sources, &[], &[], &[], "kancelaria");
        assert!(!gaps.depth_missing.is_empty());
        assert!(gaps.depth_missing.iter().all(|g| g.kind == "depth_missing"));
        assert!(gaps.depth_missing.iter().all(|g| !g.suggest_as_h2));
    }

    #[test]
    fn covered_subtopics_are_not_gaps() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![
            source(
                "https://a.pl",
                "Alimenty na dziecko ustala sąd według potrzeb.",
                &["Alimenty na dziecko po rozwodzie"],
            ),
            source(
                "https://b.pl",
                "Wysokość alimentów zależy od dochodów rodzica.",
                &["Alimenty na dziecko — wysokość"],
            ),
        ];
        let related = vec!["alimenty na dziecko".to_string()];
        let gaps = analyze_gaps(&nlp, &sources, &[], &related, &[], "rozwód");
        assert!(gaps.subtopic_missing.is_empty());
    }

    #[test]
    fn panics_inside_the_analysis_degrade_to_failed_status() {
        let gaps = run_guarded(|| panic!("malformed intermediate state"));
        assert_eq!(gaps.status, "FAILED");
        assert_eq!(gaps.total_gaps, 0);
        assert!(gaps.all_gaps.is_empty());
        assert!(gaps.paa_unanswered.is_empty());
        assert!(gaps.subtopic_missing.is_empty());
        assert!(gaps.depth_missing.is_empty());
    }

    #[test]
    fn priorities_are_strictly_ordered() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source("https://a.pl", "Krótki tekst o niczym istotnym.", &[])];
        let questions = vec![paa("Jak wygląda procedura odwoławcza przed sądem?")];
        let related = vec!["terminy składania dokumentów".to_string()];
        let gaps = analyze_gaps(&nlp, &sources, &questions, &related, &[], "procedura");
        let priorities: Vec<usize> = gaps.all_gaps.iter().map(|g| g.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
        assert!(!gaps.instruction.is_empty());
    }
}
