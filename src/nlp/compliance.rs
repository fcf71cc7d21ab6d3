use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use crate::core::types::{ComplianceEntry, ComplianceResponse, KeywordRange};
use crate::lang::PolishAnalyzer;

const FUZZY_SIMILARITY_THRESHOLD: u32 = 90;
const MAX_FUZZY_WINDOW_EXPANSION: usize = 2;

static RANGE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?):\s*(\d+)\s*(?:-|–|—)\s*(\d+)\s*x?$").expect("static pattern")
});
static MAX_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.*?):\s*(\d+)\s*x?$").expect("static pattern"));

/// Parse the opaque keyword state: either the mapping returned by a previous
/// batch, or the free-form brief string of `NAME: MIN-MAX` lines.
pub fn parse_keyword_state(input: &Value) -> Result<BTreeMap<String, KeywordRange>, String> {
    match input {
        Value::Object(map) => {
            let mut out = BTreeMap::new();
            for (keyword, value) in map {
                let (Some(min), Some(max)) = (
                    value.get("min").and_then(Value::as_u64),
                    value.get("max").and_then(Value::as_u64),
                ) else {
                    return Err(format!(
                        "Niepoprawny format obiektu 'keyword_state' dla frazy '{}'. \
                         Oczekiwano {{\"min\": x, \"max\": y}}.",
                        keyword
                    ));
                };
                out.insert(
                    keyword.clone(),
                    KeywordRange {
                        min: min as u32,
                        max: max as u32,
                    },
                );
            }
            Ok(out)
        }
        Value::String(brief) => {
            let mut out = BTreeMap::new();
            for line in brief.lines() {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(cap) = RANGE_LINE_RE.captures(line) {
                    let (min, max) = (parse_u32(&cap[2]), parse_u32(&cap[3]));
                    out.insert(cap[1].trim().to_string(), KeywordRange { min, max });
                } else if let Some(cap) = MAX_LINE_RE.captures(line) {
                    out.insert(
                        cap[1].trim().to_string(),
                        KeywordRange {
                            min: 1,
                            max: parse_u32(&cap[2]),
                        },
                    );
                } else if !line.contains(':') {
                    out.insert(line.to_string(), KeywordRange { min: 1, max: 99 });
                }
            }
            Ok(out)
        }
        _ => Err("Niepoprawny typ 'keyword_state'. Oczekiwano stringa lub obiektu.".to_string()),
    }
}

fn parse_u32(digits: &str) -> u32 {
    digits.parse().unwrap_or(0)
}

/// Count keyword occurrences in one batch of text and derive the state for
/// the next batch. Exact lemma-window matches come first; a fuzzy pass tops
/// the count up to the remaining room. The caller owns the returned state.
pub fn generate_compliance_report(
    nlp: &PolishAnalyzer,
    text: &str,
    state_input: &Value,
) -> Result<ComplianceResponse, String> {
    let current_state = parse_keyword_state(state_input)?;

    if text.trim().is_empty() {
        let report = current_state
            .iter()
            .map(|(keyword, range)| ComplianceEntry {
                keyword: keyword.clone(),
                range_remaining: format!("{}-{}", range.min, range.max),
                actual_in_batch: 0,
                status: "OK".to_string(),
            })
            .collect();
        return Ok(ComplianceResponse {
            compliance_report: report,
            new_keyword_state: current_state,
        });
    }

    let text_lemmas = nlp.alpha_lemmas(text);

    let mut report = Vec::new();
    let mut new_state = BTreeMap::new();

    for (keyword, range) in &current_state {
        let keyword_lemmas = nlp.alpha_lemmas(keyword);
        let mut actual = 0u32;

        if !keyword_lemmas.is_empty() {
            let (exact, exact_spans) = count_exact(&text_lemmas, &keyword_lemmas);
            actual = exact;

            let room = range.max.saturating_sub(actual);
            if room > 0 {
                actual += count_fuzzy(&text_lemmas, &keyword_lemmas, &exact_spans, room);
            }
        }

        let status = if actual > range.max { "OVER" } else { "OK" };
        report.push(ComplianceEntry {
            keyword: keyword.clone(),
            range_remaining: format!("{}-{}", range.min, range.max),
            actual_in_batch: actual,
            status: status.to_string(),
        });

        let new_min = range.min.saturating_sub(actual);
        let mut new_max = range.max.saturating_sub(actual);
        if new_min > new_max {
            new_max = new_min;
        }
        new_state.insert(
            keyword.clone(),
            KeywordRange {
                min: new_min,
                max: new_max,
            },
        );
    }

    Ok(ComplianceResponse {
        compliance_report: report,
        new_keyword_state: new_state,
    })
}

fn count_exact(text_lemmas: &[String], keyword_lemmas: &[String]) -> (u32, Vec<(usize, usize)>) {
    let kw_len = keyword_lemmas.len();
    let mut count = 0u32;
    let mut spans = Vec::new();
    if kw_len == 0 || text_lemmas.len() < kw_len {
        return (0, spans);
    }
    for start in 0..=(text_lemmas.len() - kw_len) {
        if text_lemmas[start..start + kw_len] == *keyword_lemmas {
            count += 1;
            spans.push((start, start + kw_len));
        }
    }
    (count, spans)
}

/// Fuzzy pass over windows of the keyword length up to two extra lemmas,
/// skipping positions already consumed by exact matches. Hits are capped at
/// the remaining room so the fuzzy pass can never push a keyword over max
/// by itself.
fn count_fuzzy(
    text_lemmas: &[String],
    keyword_lemmas: &[String],
    exact_spans: &[(usize, usize)],
    max_hits: u32,
) -> u32 {
    let kw_len = keyword_lemmas.len();
    let text_len = text_lemmas.len();
    if max_hits == 0 || kw_len == 0 || text_len == 0 {
        return 0;
    }

    let mut used: BTreeSet<usize> = BTreeSet::new();
    for (start, end) in exact_spans {
        used.extend(*start..*end);
    }

    let mut hits = 0u32;
    for start in 0..text_len {
        for extra in 0..=MAX_FUZZY_WINDOW_EXPANSION {
            let end = start + kw_len + extra;
            if end > text_len {
                break;
            }
            if (start..end).any(|pos| used.contains(&pos)) {
                continue;
            }
            let score = token_set_ratio(keyword_lemmas, &text_lemmas[start..end]);
            if score >= FUZZY_SIMILARITY_THRESHOLD {
                hits += 1;
                used.extend(start..end);
                if hits >= max_hits {
                    return hits;
                }
                break;
            }
        }
    }
    hits
}

/// Similarity of two token multisets: both are deduplicated, sorted and
/// joined, then compared with a normalized Levenshtein ratio. Requiring both
/// sides to cover each other keeps a window of repeated single lemmas from
/// matching a longer phrase.
fn token_set_ratio(a: &[String], b: &[String]) -> u32 {
    let set_a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    let joined_a = set_a.into_iter().collect::<Vec<_>>().join(" ");
    let joined_b = set_b.into_iter().collect::<Vec<_>>().join(" ");
    if joined_a.is_empty() && joined_b.is_empty() {
        return 100;
    }
    let distance = edit_distance::edit_distance(&joined_a, &joined_b);
    let longest = joined_a.chars().count().max(joined_b.chars().count());
    if longest == 0 {
        return 100;
    }
    (100.0 * (1.0 - distance as f64 / longest as f64)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nlp() -> PolishAnalyzer {
        PolishAnalyzer::new()
    }

    #[test]
    fn brief_string_parses_all_three_line_shapes() {
        let state = parse_keyword_state(&Value::String(
            "rozwód w warszawie: 1-2x\nprawnik: 1x\nrozwód: 1-5\nadwokat".to_string(),
        ))
        .unwrap();
        assert_eq!(state["rozwód w warszawie"], KeywordRange { min: 1, max: 2 });
        assert_eq!(state["prawnik"], KeywordRange { min: 1, max: 1 });
        assert_eq!(state["rozwód"], KeywordRange { min: 1, max: 5 });
        assert_eq!(state["adwokat"], KeywordRange { min: 1, max: 99 });
    }

    #[test]
    fn mapping_round_trips_identically() {
        let json = serde_json::json!({
            "rozwód": {"min": 0, "max": 3},
            "prawnik": {"min": 1, "max": 2}
        });
        let state = parse_keyword_state(&json).unwrap();
        assert_eq!(serde_json::to_value(&state).unwrap(), json);
    }

    #[test]
    fn malformed_state_is_rejected() {
        assert!(parse_keyword_state(&serde_json::json!(42)).is_err());
        assert!(parse_keyword_state(&serde_json::json!({"kw": {"min": 1}})).is_err());
    }

    #[test]
    fn first_batch_counts_and_derives_state() {
        let response = generate_compliance_report(
            &nlp(),
            "Rozwód w Warszawie to sprawa dla prawnika. Rozwód kosztuje.",
            &Value::String("rozwód w warszawie: 1-2x\nprawnik: 1x\nrozwód: 1-5".to_string()),
        )
        .unwrap();

        let by_kw: BTreeMap<&str, &ComplianceEntry> = response
            .compliance_report
            .iter()
            .map(|e| (e.keyword.as_str(), e))
            .collect();

        let phrase = by_kw["rozwód w warszawie"];
        assert_eq!(phrase.actual_in_batch, 1);
        assert_eq!(phrase.status, "OK");
        assert_eq!(phrase.range_remaining, "1-2");

        assert_eq!(by_kw["prawnik"].actual_in_batch, 1);
        assert_eq!(by_kw["prawnik"].status, "OK");
        assert_eq!(by_kw["rozwód"].actual_in_batch, 2);
        assert_eq!(by_kw["rozwód"].status, "OK");

        let new = &response.new_keyword_state;
        assert_eq!(new["rozwód w warszawie"], KeywordRange { min: 0, max: 1 });
        assert_eq!(new["prawnik"], KeywordRange { min: 0, max: 0 });
        assert_eq!(new["rozwód"], KeywordRange { min: 0, max: 3 });
    }

    #[test]
    fn second_batch_flags_overuse() {
        let state = serde_json::json!({
            "rozwód w warszawie": {"min": 0, "max": 1},
            "prawnik": {"min": 0, "max": 0},
            "rozwód": {"min": 0, "max": 3}
        });
        let response =
            generate_compliance_report(&nlp(), "Rozwód rozwód rozwód rozwód.", &state).unwrap();

        let by_kw: BTreeMap<&str, &ComplianceEntry> = response
            .compliance_report
            .iter()
            .map(|e| (e.keyword.as_str(), e))
            .collect();

        assert_eq!(by_kw["rozwód"].actual_in_batch, 4);
        assert_eq!(by_kw["rozwód"].status, "OVER");
        assert_eq!(by_kw["prawnik"].actual_in_batch, 0);
        assert_eq!(by_kw["prawnik"].status, "OK");
        assert_eq!(by_kw["prawnik"].range_remaining, "0-0");
        assert_eq!(by_kw["rozwód w warszawie"].actual_in_batch, 0);
        assert_eq!(by_kw["rozwód w warszawie"].status, "OK");

        assert_eq!(response.new_keyword_state["rozwód"], KeywordRange { min: 0, max: 0 });
    }

    #[test]
    fn empty_text_leaves_state_unchanged() {
        let state = serde_json::json!({"rozwód": {"min": 2, "max": 5}});
        let response = generate_compliance_report(&nlp(), "", &state).unwrap();
        assert_eq!(response.compliance_report.len(), 1);
        assert_eq!(response.compliance_report[0].actual_in_batch, 0);
        assert_eq!(response.compliance_report[0].status, "OK");
        assert_eq!(response.new_keyword_state["rozwód"], KeywordRange { min: 2, max: 5 });
    }

    #[test]
    fn fuzzy_pass_absorbs_inflection_but_not_repetition() {
        // The fuzzy window accepts a one-lemma expansion of the phrase.
        let response = generate_compliance_report(
            &nlp(),
            "Dobry adwokat rozwodowy z Warszawy pomaga klientom.",
            &serde_json::json!({"adwokat rozwodowy warszawa": {"min": 1, "max": 2}}),
        )
        .unwrap();
        assert!(response.compliance_report[0].actual_in_batch >= 1);

        // A window of one repeated lemma must not match a three-lemma phrase.
        let response = generate_compliance_report(
            &nlp(),
            "Rozwód rozwód rozwód.",
            &serde_json::json!({"rozwód w warszawie": {"min": 0, "max": 5}}),
        )
        .unwrap();
        assert_eq!(response.compliance_report[0].actual_in_batch, 0);
    }

    #[test]
    fn new_bounds_respect_invariants() {
        let response = generate_compliance_report(
            &nlp(),
            "Prawnik prawnik prawnik.",
            &serde_json::json!({"prawnik": {"min": 2, "max": 2}}),
        )
        .unwrap();
        let range = &response.new_keyword_state["prawnik"];
        assert!(range.min <= range.max);
        assert_eq!(response.compliance_report[0].status, "OVER");
    }
}
