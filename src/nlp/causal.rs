use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::core::config::{CAUSAL_CORPUS_WINDOW, CAUSAL_TIMEOUT};
use crate::core::text::clamp_bytes;
use crate::core::types::{CausalTripletOut, CausalTriplets, Source};
use crate::llm::LlmClient;

pub const DEFAULT_TRIPLETS: usize = 15;
const MAX_ARG_CHARS: usize = 80;
const MIN_ARG_CHARS: usize = 5;
const DEDUP_PREFIX: usize = 25;

const RELATION_TYPES: &[&str] = &[
    "causes",
    "may_cause",
    "prevents",
    "requires",
    "enables",
    "leads_to",
    "results_from",
    "initiates",
    "treats",
    "deficiency_causes",
    "omission_causes",
    "untreated_causes",
    "required_for",
];

/// Mine cause→effect triples from the competitor corpus with the LLM.
/// Regex mining was abandoned — Polish legal and medical prose rarely uses
/// literal "X powoduje Y" phrasing, so the model reads the text instead.
/// No keys or both models failing → empty result, never an error.
pub async fn extract_causal_triplets(
    llm: &LlmClient,
    sources: &[Source],
    main_keyword: &str,
    top_n: usize,
) -> CausalTriplets {
    if !llm.is_configured() || sources.is_empty() {
        return CausalTriplets::default();
    }

    let mut corpus = String::new();
    for source in sources {
        if corpus.len() >= CAUSAL_CORPUS_WINDOW {
            break;
        }
        corpus.push_str(clamp_bytes(
            &source.text,
            CAUSAL_CORPUS_WINDOW - corpus.len(),
        ));
        corpus.push('\n');
    }

    let prompt = format!(
        "Przeanalizuj poniższy tekst i wypisz maksymalnie {top_n} relacji przyczynowo-skutkowych \
ściśle związanych z tematem \"{main_keyword}\". Zwróć WYŁĄCZNIE tablicę JSON obiektów \
{{\"cause\": \"...\", \"effect\": \"...\", \"type\": \"...\", \"confidence\": 0.6-0.95}}. \
Dozwolone typy: {}. Przyczyny i skutki po polsku, zwięzłe (5-80 znaków).\n\nTekst:\n{corpus}",
        RELATION_TYPES.join(", ")
    );

    let raw = match llm.complete(&prompt, 1024, CAUSAL_TIMEOUT).await {
        Ok(text) => text,
        Err(e) => {
            warn!("causal extraction degraded to empty: {}", e);
            return CausalTriplets::default();
        }
    };

    let mut triplets = parse_causal_response(&raw);
    detect_chains(&mut triplets);
    triplets.sort_by(|a, b| {
        b.is_chain.cmp(&a.is_chain).then_with(|| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });
    triplets.truncate(top_n);

    assemble(triplets)
}

fn assemble(triplets: Vec<CausalTripletOut>) -> CausalTriplets {
    let (chains, singles): (Vec<_>, Vec<_>) = triplets.into_iter().partition(|t| t.is_chain);
    let count = chains.len() + singles.len();

    let agent_instruction = if count == 0 {
        String::new()
    } else {
        let mut parts = vec![format!(
            "W artykule wyjaśnij {} relacji przyczynowo-skutkowych.",
            count
        )];
        if !chains.is_empty() {
            parts.push(format!(
                "Łańcuchy przyczynowe ({}) opisz w kolejności: przyczyna, mechanizm, skutek.",
                chains.len()
            ));
        }
        parts.join(" ")
    };

    CausalTriplets {
        count,
        chains,
        singles,
        agent_instruction,
    }
}

/// Parse the model output: markdown fences stripped, the first JSON array
/// found is decoded, items validated and normalized.
pub fn parse_causal_response(raw: &str) -> Vec<CausalTripletOut> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let Some(start) = cleaned.find('[') else {
        return Vec::new();
    };
    let Some(end) = cleaned.rfind(']') else {
        return Vec::new();
    };
    if end <= start {
        return Vec::new();
    }
    let items: Vec<Value> = match serde_json::from_str(&cleaned[start..=end]) {
        Ok(v) => v,
        Err(e) => {
            warn!("causal JSON did not parse: {}", e);
            return Vec::new();
        }
    };

    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let mut out = Vec::new();

    for item in items {
        let cause = normalize_arg(item["cause"].as_str().unwrap_or_default());
        let effect = normalize_arg(item["effect"].as_str().unwrap_or_default());
        if cause.chars().count() < MIN_ARG_CHARS || effect.chars().count() < MIN_ARG_CHARS {
            continue;
        }

        let dedup_key = (prefix(&cause), prefix(&effect));
        if !seen.insert(dedup_key) {
            continue;
        }

        let raw_type = item["type"].as_str().unwrap_or_default();
        let relation_type = if RELATION_TYPES.contains(&raw_type) {
            raw_type.to_string()
        } else {
            "causes".to_string()
        };
        let confidence = item["confidence"].as_f64().unwrap_or(0.6).clamp(0.3, 0.95);

        out.push(CausalTripletOut {
            cause,
            effect,
            relation_type,
            confidence,
            source_sentence: item["source_sentence"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            is_chain: false,
        });
    }
    out
}

fn normalize_arg(text: &str) -> String {
    let trimmed = text.trim();
    trimmed.chars().take(MAX_ARG_CHARS).collect()
}

fn prefix(text: &str) -> String {
    text.to_lowercase().chars().take(DEDUP_PREFIX).collect()
}

fn first_three_words(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A→B and B→C where B matches by its first three words marks both triples
/// as a causal chain.
pub fn detect_chains(triplets: &mut [CausalTripletOut]) {
    let mut by_effect: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, t) in triplets.iter().enumerate() {
        by_effect
            .entry(first_three_words(&t.effect))
            .or_default()
            .push(idx);
    }

    let mut chain_members: BTreeSet<usize> = BTreeSet::new();
    for (idx, t) in triplets.iter().enumerate() {
        let cause_key = first_three_words(&t.cause);
        if let Some(upstream) = by_effect.get(&cause_key) {
            for &up in upstream {
                if up != idx {
                    chain_members.insert(up);
                    chain_members.insert(idx);
                }
            }
        }
    }
    for idx in chain_members {
        triplets[idx].is_chain = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json_and_clamps_fields() {
        let raw = r#"Oto wynik:
```json
[
  {"cause": "brak porozumienia małżonków", "effect": "rozwód z orzekaniem o winie",
   "type": "leads_to", "confidence": 0.9},
  {"cause": "brak porozumienia małżonków", "effect": "rozwód z orzekaniem o winie",
   "type": "leads_to", "confidence": 0.9},
  {"cause": "za krótkie", "effect": "x", "type": "causes", "confidence": 0.8},
  {"cause": "nieznany typ relacji tutaj", "effect": "skutek nieznanego typu",
   "type": "wymyślony", "confidence": 2.0}
]
```"#;
        let parsed = parse_causal_response(raw);
        assert_eq!(parsed.len(), 2); // duplicate and too-short entries dropped
        assert_eq!(parsed[0].relation_type, "leads_to");
        assert_eq!(parsed[1].relation_type, "causes"); // unknown type coerced
        assert!((parsed[1].confidence - 0.95).abs() < 1e-9); // clamped
    }

    #[test]
    fn garbage_output_degrades_to_empty() {
        assert!(parse_causal_response("przepraszam, nie mogę").is_empty());
        assert!(parse_causal_response("[{broken json").is_empty());
        assert!(parse_causal_response("").is_empty());
    }

    #[test]
    fn chains_are_detected_through_matching_endpoints() {
        let mut triplets = vec![
            CausalTripletOut {
                cause: "długotrwały stres małżeński".into(),
                effect: "rozkład pożycia stron".into(),
                relation_type: "causes".into(),
                confidence: 0.8,
                source_sentence: String::new(),
                is_chain: false,
            },
            CausalTripletOut {
                cause: "rozkład pożycia stron".into(),
                effect: "orzeczenie rozwodu przez sąd".into(),
                relation_type: "leads_to".into(),
                confidence: 0.85,
                source_sentence: String::new(),
                is_chain: false,
            },
            CausalTripletOut {
                cause: "wysokie koszty sądowe".into(),
                effect: "rezygnacja z pozwu".into(),
                relation_type: "causes".into(),
                confidence: 0.7,
                source_sentence: String::new(),
                is_chain: false,
            },
        ];
        detect_chains(&mut triplets);
        assert!(triplets[0].is_chain);
        assert!(triplets[1].is_chain);
        assert!(!triplets[2].is_chain);
    }
}
