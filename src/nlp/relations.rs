use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::core::config::ANALYSIS_WINDOW;
use crate::core::text::clamp_bytes;
use crate::core::types::{RelationOut, Source};
use crate::lang::{is_stop_word, Dep, Pos, PolishAnalyzer};

const TOP_RELATIONS: usize = 20;
const MAX_ARG_CHARS: usize = 50;
const FALLBACK_VOCAB_SIZE: usize = 50;

/// Verb stems mapped into the closed relation-type set.
const VERB_TYPES: &[(&str, &str)] = &[
    ("oferuj", "offers"),
    ("wymaga", "requires"),
    ("wpływ", "affects"),
    ("reguluj", "regulates"),
    ("wspiera", "supports"),
    ("chroni", "protects"),
    ("poprawia", "improves"),
    ("zawiera", "contains"),
    ("zmniejsz", "reduces"),
    ("redukuj", "reduces"),
    ("powoduj", "causes"),
    ("leczy", "treats"),
    ("kosztuj", "costs"),
    ("trwa", "duration"),
];

fn relation_type(verb_lower: &str) -> &'static str {
    for (stem, rel) in VERB_TYPES {
        if verb_lower.starts_with(stem) {
            return rel;
        }
    }
    "relates_to"
}

/// Subject–verb–object triples. The dependency path runs first; when it
/// yields nothing (fragmented or listing-style corpora) the surface-pattern
/// fallback takes over, constrained to the known entity vocabulary.
pub fn extract_relations(
    nlp: &PolishAnalyzer,
    sources: &[Source],
    entity_vocab: &[String],
) -> Vec<RelationOut> {
    let mut counted: BTreeMap<(String, String, String), usize> = BTreeMap::new();

    for source in sources {
        let text = clamp_bytes(&source.text, ANALYSIS_WINDOW);
        let doc = nlp.analyze(text);

        for sent in &doc.sentences {
            let tokens = doc.sentence_tokens(sent);
            let Some(verb_rel) = tokens.iter().position(|t| t.dep == Dep::Root) else {
                continue;
            };
            let Some(subj_rel) = tokens.iter().position(|t| t.dep == Dep::Nsubj) else {
                continue;
            };
            let obj_rel = tokens
                .iter()
                .position(|t| t.dep == Dep::Obj)
                .or_else(|| tokens.iter().position(|t| t.dep == Dep::Obl));
            let Some(obj_rel) = obj_rel else {
                continue;
            };

            let subject = nominal_phrase(tokens, subj_rel);
            let object = nominal_phrase(tokens, obj_rel);
            let verb = tokens[verb_rel].lower.clone();
            if subject.is_empty()
                || object.is_empty()
                || subject.chars().count() > MAX_ARG_CHARS
                || object.chars().count() > MAX_ARG_CHARS
            {
                continue;
            }
            *counted.entry((subject, verb, object)).or_insert(0) += 1;
        }
    }

    if counted.is_empty() {
        return fallback_relations(nlp, sources, entity_vocab);
    }

    rank(counted)
}

/// The head noun with its adjacent adjectival modifiers on either side.
fn nominal_phrase(tokens: &[crate::lang::Token], head: usize) -> String {
    let mut start = head;
    while start > 0 && tokens[start - 1].pos == Pos::Adj {
        start -= 1;
    }
    let mut end = head + 1;
    while end < tokens.len() && tokens[end].pos == Pos::Adj {
        end += 1;
    }
    tokens[start..end]
        .iter()
        .map(|t| t.lower.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn rank(counted: BTreeMap<(String, String, String), usize>) -> Vec<RelationOut> {
    let mut out: Vec<RelationOut> = counted
        .into_iter()
        .map(|((subject, verb, object), freq)| RelationOut {
            relation_type: relation_type(&verb).to_string(),
            subject,
            verb,
            object,
            freq,
        })
        .collect();
    out.sort_by(|a, b| {
        b.freq
            .cmp(&a.freq)
            .then_with(|| a.subject.cmp(&b.subject))
            .then_with(|| a.verb.cmp(&b.verb))
    });
    out.truncate(TOP_RELATIONS);
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Surface-pattern fallback
// ─────────────────────────────────────────────────────────────────────────────

static FALLBACK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)([\p{L} ]{3,50}?)\s+(oferuje|wymaga|wpływa na|reguluje|wspiera|chroni|poprawia|zawiera|zmniejsza|powoduje|leczy|kosztuje|trwa)\s+([\p{L}0-9 ]{3,50}?)[.,;!?]",
    )
    .expect("static pattern")
});

fn fallback_relations(
    nlp: &PolishAnalyzer,
    sources: &[Source],
    entity_vocab: &[String],
) -> Vec<RelationOut> {
    let corpus: String = sources
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    // Entity/concept tokens plus the most frequent content words act as the
    // relevance filter for pattern hits.
    let mut vocab: BTreeSet<String> = entity_vocab
        .iter()
        .flat_map(|e| e.to_lowercase().split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .collect();
    vocab.extend(top_content_words(nlp, &corpus));

    let mut counted: BTreeMap<(String, String, String), usize> = BTreeMap::new();
    for cap in FALLBACK_RE.captures_iter(&corpus) {
        let subject = cap[1].trim().to_lowercase();
        let verb = cap[2].trim().to_lowercase();
        let object = cap[3].trim().to_lowercase();
        if subject.is_empty() || object.is_empty() {
            continue;
        }
        let known = subject
            .split_whitespace()
            .chain(object.split_whitespace())
            .any(|w| vocab.contains(w));
        if !known {
            continue;
        }
        *counted.entry((subject, verb, object)).or_insert(0) += 1;
    }

    rank(counted)
}

fn top_content_words(nlp: &PolishAnalyzer, corpus: &str) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for word in corpus
        .to_lowercase()
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() > 3 && !is_stop_word(w))
    {
        *counts.entry(nlp.lemmatize_word(word)).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(FALLBACK_VOCAB_SIZE)
        .map(|(w, _)| w)
        .collect()
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
    fn dependency_path_builds_svo_triples() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![source(
            "https://a.pl",
            "Sąd rejonowy rozpatruje sprawy. Adwokat wymaga dokumentów.",
        )];
        let relations = extract_relations(&nlp, &sources, &[]);
        assert!(!relations.is_empty());

        let court = relations
            .iter()
            .find(|r| r.subject.contains("sąd"))
            .expect("court relation");
        assert!(court.subject.contains("rejonowy"));
        assert_eq!(court.object, "sprawy");

        let lawyer = relations.iter().find(|r| r.verb == "wymaga").unwrap();
        assert_eq!(lawyer.relation_type, "requires");
    }

    #[test]
    fn verb_type_mapping_is_closed() {
        assert_eq!(relation_type("powoduje"), "causes");
        assert_eq!(relation_type("kosztuje"), "costs");
        assert_eq!(relation_type("trwa"), "duration");
        assert_eq!(relation_type("rozpatruje"), "relates_to");
    }

    #[test]
    fn arguments_are_length_bounded() {
        let nlp = PolishAnalyzer::new();
        let long_text = format!(
            "{} wymaga dokumentów.",
            "bardzo długi podmiot zdania ".repeat(5)
        );
        let sources = vec![source("https://a.pl", &long_text)];
        let relations = extract_relations(&nlp, &sources, &[]);
        for r in &relations {
            assert!(r.subject.chars().count() <= 50);
            assert!(r.object.chars().count() <= 50);
        }
    }
}
