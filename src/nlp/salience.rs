use std::collections::{BTreeMap, BTreeSet};

use crate::core::config::ANALYSIS_WINDOW;
use crate::core::text::{clamp_bytes, split_paragraphs, split_sentences};
use crate::core::types::{
    CoOccurrenceOut, ConceptEntityOut, PlacementPlanOut, RelationOut, SalienceOut, Source,
};
use crate::lang::{Dep, PolishAnalyzer};

const EARLY_MENTION_CUTOFF: usize = 1_500;
const TOP_PAIRS: usize = 20;
const MAX_PAIR_CONTEXTS: usize = 3;

/// Slim view of an entity for salience scoring; built from the named-entity
/// extractor output.
pub struct SalienceTarget {
    pub key: String,
    pub display: String,
    pub entity_type: String,
    pub freq: usize,
    pub sources_count: usize,
}

/// Position / heading / grammatical-role salience per entity.
pub fn compute_salience(
    nlp: &PolishAnalyzer,
    targets: &[SalienceTarget],
    sources: &[Source],
    h1_list: &[String],
    h2_list: &[String],
    main_keyword: &str,
) -> Vec<SalienceOut> {
    let docs: Vec<_> = sources
        .iter()
        .map(|s| nlp.analyze(clamp_bytes(&s.text, ANALYSIS_WINDOW)))
        .collect();
    let lowered_texts: Vec<String> = sources.iter().map(|s| s.text.to_lowercase()).collect();
    let keyword_tokens: BTreeSet<String> = main_keyword
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let mut out: Vec<SalienceOut> = targets
        .iter()
        .map(|target| {
            let mut position_sum = 0.0;
            let mut docs_with = 0usize;
            let mut early_mentions = 0usize;
            let mut subject_count = 0usize;
            let mut object_count = 0usize;

            for (text, doc) in lowered_texts.iter().zip(&docs) {
                if let Some(pos) = text.find(&target.key) {
                    docs_with += 1;
                    position_sum += pos as f64 / text.len().max(1) as f64;
                    if pos < EARLY_MENTION_CUTOFF {
                        early_mentions += 1;
                    }
                }

                // The span root is approximated by the first token of the key.
                let head = target.key.split_whitespace().next().unwrap_or_default();
                if head.is_empty() {
                    continue;
                }
                for token in &doc.tokens {
                    if token.lower == head || token.lemma == head {
                        match token.dep {
                            Dep::Nsubj => subject_count += 1,
                            Dep::Obj | Dep::Obl => object_count += 1,
                            _ => {}
                        }
                    }
                }
            }

            let avg_first_position = if docs_with > 0 {
                position_sum / docs_with as f64
            } else {
                1.0
            };
            let h1_count = count_heading_hits(&target.key, h1_list);
            let h2_count = count_heading_hits(&target.key, h2_list);
            let subject_ratio = if subject_count + object_count > 0 {
                subject_count as f64 / (subject_count + object_count) as f64
            } else {
                0.0
            };
            let distribution = if sources.is_empty() {
                0.0
            } else {
                target.sources_count as f64 / sources.len() as f64
            };
            let idf_bonus = if target.sources_count > 0 && sources.len() > target.sources_count {
                ((sources.len() as f64 / target.sources_count as f64).ln() * 0.02).min(0.05)
            } else {
                0.0
            };
            let early_ratio = if docs_with > 0 {
                early_mentions as f64 / docs_with as f64
            } else {
                0.0
            };
            let keyword_overlap = if keyword_tokens.is_empty() {
                0.0
            } else {
                let entity_tokens: BTreeSet<String> = target
                    .key
                    .split_whitespace()
                    .map(str::to_string)
                    .collect();
                entity_tokens.intersection(&keyword_tokens).count() as f64
                    / keyword_tokens.len() as f64
            };

            let salience = ((1.0 - avg_first_position) * 0.25
                + if h1_count > 0 { 0.15 } else { 0.0 }
                + (h2_count as f64 * 0.02).min(0.05)
                + subject_ratio * 0.15
                + distribution * 0.20
                + idf_bonus
                + early_ratio * 0.10
                + keyword_overlap * 0.05)
                .min(1.0);

            SalienceOut {
                entity: target.display.clone(),
                entity_type: target.entity_type.clone(),
                avg_first_position,
                early_mentions,
                h1_count,
                h2_count,
                subject_count,
                object_count,
                subject_ratio,
                freq: target.freq,
                sources_count: target.sources_count,
                salience,
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.salience
            .partial_cmp(&a.salience)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    out
}

/// Substring or inflection-stem heading match. The stem (last three chars
/// dropped past six) absorbs Polish case endings.
fn count_heading_hits(key: &str, headings: &[String]) -> usize {
    let stem: String = if key.chars().count() > 6 {
        let chars: Vec<char> = key.chars().collect();
        chars[..chars.len() - 3].iter().collect()
    } else {
        key.to_string()
    };
    headings
        .iter()
        .filter(|h| {
            let lower = h.to_lowercase();
            lower.contains(key) || lower.contains(&stem)
        })
        .count()
}

// ─────────────────────────────────────────────────────────────────────────────
// Co-occurrence
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PairAgg {
    sentence_count: usize,
    paragraph_count: usize,
    source_indices: BTreeSet<usize>,
    contexts: Vec<String>,
}

/// Sentence- and paragraph-level pair counting over the entity key list.
pub fn compute_cooccurrence(entity_keys: &[String], sources: &[Source]) -> Vec<CoOccurrenceOut> {
    let keys: Vec<String> = entity_keys.iter().map(|k| k.to_lowercase()).collect();
    let mut pairs: BTreeMap<(String, String), PairAgg> = BTreeMap::new();

    for (source_idx, source) in sources.iter().enumerate() {
        for sentence in split_sentences(&source.text) {
            let lower = sentence.to_lowercase();
            let present: Vec<&String> = keys.iter().filter(|k| lower.contains(*k)).collect();
            for (i, a) in present.iter().enumerate() {
                for b in present.iter().skip(i + 1) {
                    let pair = ordered_pair(a, b);
                    let agg = pairs.entry(pair).or_default();
                    agg.sentence_count += 1;
                    agg.source_indices.insert(source_idx);
                    if agg.contexts.len() < MAX_PAIR_CONTEXTS {
                        agg.contexts.push(sentence.trim().to_string());
                    }
                }
            }
        }

        for paragraph in split_paragraphs(&source.text) {
            let lower = paragraph.to_lowercase();
            let present: Vec<&String> = keys.iter().filter(|k| lower.contains(*k)).collect();
            for (i, a) in present.iter().enumerate() {
                for b in present.iter().skip(i + 1) {
                    let pair = ordered_pair(a, b);
                    let agg = pairs.entry(pair).or_default();
                    agg.paragraph_count += 1;
                    agg.source_indices.insert(source_idx);
                }
            }
        }
    }

    let mut out: Vec<CoOccurrenceOut> = pairs
        .into_iter()
        .filter(|(_, agg)| agg.sentence_count + agg.paragraph_count >= 2)
        .map(|((a, b), agg)| {
            let sources_count = agg.source_indices.len();
            let strength = ((3.0 * agg.sentence_count as f64 + agg.paragraph_count as f64)
                * (1.0 + 0.2 * sources_count as f64)
                / 50.0)
                .clamp(0.0, 1.0);
            CoOccurrenceOut {
                entity_a: a,
                entity_b: b,
                sentence_count: agg.sentence_count,
                paragraph_count: agg.paragraph_count,
                sources_count,
                strength,
                sample_context: agg.contexts.first().cloned(),
            }
        })
        .collect();

    out.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity_a.cmp(&b.entity_a))
            .then_with(|| a.entity_b.cmp(&b.entity_b))
    });
    out.truncate(TOP_PAIRS);
    out
}

fn ordered_pair(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Placement plan
// ─────────────────────────────────────────────────────────────────────────────

pub fn build_placement_plan(
    salience: &[SalienceOut],
    pairs: &[CoOccurrenceOut],
    relations: &[RelationOut],
    concepts: &[ConceptEntityOut],
) -> PlacementPlanOut {
    let primary_entity = salience.first().map(|s| s.entity.clone());
    let secondary_entities: Vec<String> =
        salience.iter().skip(1).take(3).map(|s| s.entity.clone()).collect();
    let supporting_entities: Vec<String> =
        salience.iter().skip(4).take(6).map(|s| s.entity.clone()).collect();

    let strong_pairs: Vec<[String; 2]> = pairs
        .iter()
        .filter(|p| p.strength >= 0.2)
        .take(5)
        .map(|p| [p.entity_a.clone(), p.entity_b.clone()])
        .collect();

    let key_relations: Vec<RelationOut> = relations.iter().take(5).cloned().collect();

    let must_cover_concepts: Vec<String> = concepts
        .iter()
        .filter(|c| c.sources_count >= 2)
        .take(8)
        .map(|c| c.text.clone())
        .collect();

    let mut parts: Vec<String> = Vec::new();
    if let Some(primary) = &primary_entity {
        parts.push(format!(
            "Umieść encję główną \"{}\" w H1 i w pierwszym zdaniu artykułu",
            primary
        ));
    }
    if !secondary_entities.is_empty() {
        parts.push(format!(
            "Encje drugorzędne ({}) wykorzystaj w nagłówkach H2",
            secondary_entities.join(", ")
        ));
    }
    if !supporting_entities.is_empty() {
        parts.push(format!(
            "Encje wspierające ({}) wpleć naturalnie w treść akapitów",
            supporting_entities.join(", ")
        ));
    }
    for pair in &strong_pairs {
        parts.push(format!(
            "Utrzymaj parę \"{}\" + \"{}\" w tym samym akapicie",
            pair[0], pair[1]
        ));
    }
    for relation in &key_relations {
        parts.push(format!(
            "Wyraź wprost relację: {} {} {}",
            relation.subject, relation.verb, relation.object
        ));
    }
    if !must_cover_concepts.is_empty() {
        parts.push(format!(
            "Pokryj pojęcia: {}",
            must_cover_concepts.join(", ")
        ));
    }

    PlacementPlanOut {
        primary_entity,
        secondary_entities,
        supporting_entities,
        must_cover_concepts,
        cooccurrence_pairs: strong_pairs,
        key_relations,
        instruction: parts.join(". "),
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
    fn cooccurrence_strength_matches_formula() {
        // Two sources, each a single sentence mentioning both entities:
        // sentence_count = 2, paragraph_count = 2, sources = 2
        // strength = (3*2 + 2) * (1 + 0.2*2) / 50 = 8 * 1.4 / 50 = 0.224
        let sources = vec![
            source("https://a.pl", "Sąd rejonowy w Warszawie rozpatruje sprawy o rozwód"),
            source("https://b.pl", "Sąd rejonowy w Warszawie rozpatruje sprawy o rozwód"),
        ];
        let keys = vec!["rozwód".to_string(), "sąd rejonowy".to_string()];
        let pairs = compute_cooccurrence(&keys, &sources);
        assert_eq!(pairs.len(), 1);

        let pair = &pairs[0];
        assert_eq!(pair.entity_a, "rozwód");
        assert_eq!(pair.entity_b, "sąd rejonowy");
        assert_eq!(pair.sentence_count, 2);
        assert_eq!(pair.paragraph_count, 2);
        assert_eq!(pair.sources_count, 2);
        assert!((pair.strength - 0.224).abs() < 1e-9);
    }

    #[test]
    fn pairs_below_two_hits_are_dropped() {
        let sources = vec![source("https://a.pl", "Adwokat spotkał sędziego")];
        let keys = vec!["adwokat".to_string(), "sędziego".to_string()];
        // one sentence + one paragraph hit = 2 → kept; single mention of one
        // entity alone would be dropped
        let pairs = compute_cooccurrence(&keys, &sources);
        assert_eq!(pairs.len(), 1);

        let solo = compute_cooccurrence(&["adwokat".to_string()], &sources);
        assert!(solo.is_empty());
    }

    #[test]
    fn pair_keys_are_lexicographically_ordered() {
        let sources = vec![
            source("https://a.pl", "Zus wypłaca świadczenie. Zus wypłaca świadczenie."),
        ];
        let keys = vec!["zus".to_string(), "świadczenie".to_string()];
        let pairs = compute_cooccurrence(&keys, &sources);
        for p in &pairs {
            assert!(p.entity_a <= p.entity_b);
        }
    }

    #[test]
    fn salience_is_bounded_and_favours_early_subjects() {
        let nlp = PolishAnalyzer::new();
        let sources = vec![
            source(
                "https://a.pl",
                "Rozwód wymaga pozwu. Dalsza część tekstu opisuje procedury sądowe i koszty.",
            ),
            source("https://b.pl", "Rozwód kosztuje 600 zł. Sprawy ciągną się miesiącami."),
        ];
        let targets = vec![
            SalienceTarget {
                key: "rozwód".into(),
                display: "rozwód".into(),
                entity_type: "CONCEPT".into(),
                freq: 2,
                sources_count: 2,
            },
            SalienceTarget {
                key: "koszty".into(),
                display: "koszty".into(),
                entity_type: "CONCEPT".into(),
                freq: 1,
                sources_count: 1,
            },
        ];
        let scored = compute_salience(&nlp, &targets, &sources, &[], &[], "rozwód");
        assert_eq!(scored.len(), 2);
        for s in &scored {
            assert!(s.salience >= 0.0 && s.salience <= 1.0);
            assert!(s.subject_ratio >= 0.0 && s.subject_ratio <= 1.0);
        }
        assert_eq!(scored[0].entity, "rozwód");
        assert!(scored[0].subject_count >= 1);
    }

    #[test]
    fn heading_stem_match_absorbs_inflection() {
        let headings = vec!["Koszty rozwodu w stolicy".to_string()];
        // "rozwodzie" (7+ chars) stems to "rozwod" which the heading contains
        assert_eq!(count_heading_hits("rozwodzie", &headings), 1);
        assert_eq!(count_heading_hits("alimenty", &headings), 0);
    }

    #[test]
    fn placement_plan_slices_salience_ranks() {
        let mk = |name: &str, score: f64| SalienceOut {
            entity: name.to_string(),
            entity_type: "CONCEPT".to_string(),
            avg_first_position: 0.1,
            early_mentions: 1,
            h1_count: 0,
            h2_count: 0,
            subject_count: 1,
            object_count: 0,
            subject_ratio: 1.0,
            freq: 3,
            sources_count: 2,
            salience: score,
        };
        let salience: Vec<SalienceOut> = (0..12)
            .map(|i| mk(&format!("encja{:02}", i), 1.0 - i as f64 * 0.05))
            .collect();
        let plan = build_placement_plan(&salience, &[], &[], &[]);
        assert_eq!(plan.primary_entity.as_deref(), Some("encja00"));
        assert_eq!(plan.secondary_entities.len(), 3);
        assert_eq!(plan.supporting_entities.len(), 6);
        assert!(plan.instruction.contains("encja00"));
    }
}
