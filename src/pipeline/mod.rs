use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::config::{
    self, clamp_depth, KEYPHRASE_WINDOW, MAX_PER_PAGE, TOTAL_CONTENT_BUDGET,
};
use crate::core::text::clamp_bytes;
use crate::core::types::*;
use crate::core::AppState;
use crate::nlp::salience::SalienceTarget;
use crate::nlp::{causal, concepts, entities, gaps, keyphrases, ngrams, relations, salience};
use crate::scraping;

// ─────────────────────────────────────────────────────────────────────────────
// Brief persistence hook
// ─────────────────────────────────────────────────────────────────────────────

/// Document-store upsert hook. The engine itself is stateless; a concrete
/// sink is an external collaborator wired in at startup.
#[async_trait]
pub trait BriefSink: Send + Sync {
    async fn persist(&self, project_id: &str, brief: &Brief) -> anyhow::Result<()>;
}

/// Default sink: records the intent and drops the payload.
pub struct LoggingSink;

#[async_trait]
impl BriefSink for LoggingSink {
    async fn persist(&self, project_id: &str, brief: &Brief) -> anyhow::Result<()> {
        info!(
            "brief for '{}' ready for project '{}' (no document store configured)",
            brief.main_keyword, project_id
        );
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Orchestrator
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Both providers unreachable and no caller-supplied sources.
    #[error("Nie udało się pobrać źródeł z SERP")]
    NoSources,
}

/// Run the full SERP-to-brief pipeline for one keyword.
pub async fn analyze(state: &Arc<AppState>, request: AnalyzeRequest) -> Result<Brief, AnalyzeError> {
    let main_keyword = request.main_keyword.trim().to_lowercase();
    let top_n = request.top_n.unwrap_or(30);
    let depth = clamp_depth(None);

    let provided = request
        .sources
        .filter(|sources| !sources.is_empty());
    let auto_fetch = provided.is_none();

    // ── D: SERP metadata + organic list ──────────────────────────────────
    let (serp, sources) = if let Some(inputs) = provided {
        (SerpResponse::default(), materialize_sources(inputs))
    } else {
        let cache_key = format!("{}|{}", main_keyword, depth);
        let serp = match state.serp_cache.get(&cache_key).await {
            Some(cached) => cached,
            None => {
                let fetched = state.serp.fetch(&main_keyword, depth).await;
                state.serp_cache.insert(cache_key, fetched.clone()).await;
                fetched
            }
        };
        if serp.organic.is_empty() {
            return Err(AnalyzeError::NoSources);
        }
        let sources = scrape_organic(state, &serp.organic).await;
        (serp, sources)
    };

    info!(
        "analyzing '{}' with {} sources ({} requested)",
        main_keyword,
        sources.len(),
        serp.organic.len()
    );

    // ── Rank-enriched competitor list ────────────────────────────────────
    let mut competitors = serp.organic.clone();
    for item in competitors.iter_mut() {
        item.word_count = sources
            .iter()
            .find(|s| s.url == item.url)
            .map(|s| s.word_count);
    }

    // ── High-signal pseudo-source ────────────────────────────────────────
    let metadata = &serp.metadata;
    let high_signal_text = metadata
        .paa
        .iter()
        .map(|p| p.question.clone())
        .chain(metadata.refinement_chips.iter().cloned())
        .chain(metadata.related_searches.iter().cloned())
        .chain(metadata.serp_titles.iter().cloned())
        .chain(metadata.serp_snippets.iter().cloned())
        .collect::<Vec<_>>()
        .join(" . ");

    // ── E, F, G ──────────────────────────────────────────────────────────
    let ngram_entries = ngrams::build_ngram_index(
        &state.analyzer,
        &sources,
        &high_signal_text,
        &main_keyword,
        top_n,
    );

    let full_content: String = sources
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let semantic_keyphrases =
        keyphrases::extract_keyphrases(clamp_bytes(&full_content, KEYPHRASE_WINDOW), 10);

    let entity_seo_enabled = config::entity_seo_enabled();
    let named_entities = if entity_seo_enabled {
        entities::extract_named_entities(&state.analyzer, &sources)
    } else {
        Vec::new()
    };

    // ── H, I ─────────────────────────────────────────────────────────────
    let concept_entities = if entity_seo_enabled {
        concepts::extract_concept_entities(&state.analyzer, &sources, &main_keyword)
    } else {
        Vec::new()
    };

    let entity_vocab: Vec<String> = named_entities
        .iter()
        .map(|e| e.key.clone())
        .chain(concept_entities.iter().map(|c| c.text.clone()))
        .collect();
    let entity_relationships = if entity_seo_enabled {
        relations::extract_relations(&state.analyzer, &sources, &entity_vocab)
    } else {
        Vec::new()
    };

    // ── J, K: independent, non-fatal ─────────────────────────────────────
    let causal_triplets = causal::extract_causal_triplets(
        &state.llm,
        &sources,
        &main_keyword,
        causal::DEFAULT_TRIPLETS,
    )
    .await;

    let content_gaps = gaps::analyze_gaps(
        &state.analyzer,
        &sources,
        &metadata.paa,
        &metadata.related_searches,
        &metadata.refinement_chips,
        &main_keyword,
    );

    // ── L: salience, co-occurrence, placement ────────────────────────────
    let h1_list: Vec<String> = sources.iter().map(|s| s.title.clone()).collect();
    let h2_union: Vec<String> = sources.iter().flat_map(|s| s.h2.iter().cloned()).collect();

    let entity_seo = if entity_seo_enabled {
        build_entity_seo(
            state,
            &main_keyword,
            &sources,
            named_entities,
            concept_entities,
            entity_relationships,
            &content_gaps,
            &h1_list,
            &h2_union,
        )
    } else {
        EntitySeo::default()
    };

    // ── Assembly ─────────────────────────────────────────────────────────
    let competitor_h2_patterns = aggregate_h2_patterns(&sources);
    let length_analysis = compute_length_analysis(&sources);
    let full_text_sample = clamp_bytes(&full_content, 2_000).to_string();

    let serp_analysis = SerpAnalysis {
        paa_questions: metadata.paa.clone(),
        featured_snippet: metadata.featured_snippet.clone(),
        ai_overview: metadata.ai_overview.clone(),
        related_searches: metadata.related_searches.clone(),
        refinement_chips: metadata.refinement_chips.clone(),
        competitor_titles: metadata.serp_titles.clone(),
        competitor_snippets: metadata.serp_snippets.clone(),
        competitor_h2_patterns: competitor_h2_patterns.clone(),
        competitors,
    };

    let summary = BriefSummary {
        sources_requested: if auto_fetch {
            serp.organic.len()
        } else {
            sources.len()
        },
        sources_scraped: sources.len(),
        sources_auto_fetched: auto_fetch,
        paa_found: !metadata.paa.is_empty(),
        paa_generated: metadata.paa.iter().any(|p| p.generated),
        ai_overview_found: metadata.ai_overview.is_some(),
        featured_snippet_found: metadata.featured_snippet.is_some(),
        entity_seo_enabled,
        causal_enabled: state.llm.is_configured(),
        gaps_status: content_gaps.status.clone(),
        provider: metadata.provider.clone(),
    };

    let brief = Brief {
        main_keyword,
        generated_at: chrono::Utc::now().to_rfc3339(),
        ngrams: ngram_entries,
        semantic_keyphrases,
        serp_content: full_text_sample.clone(),
        full_text_sample,
        paa: serp_analysis.paa_questions.clone(),
        serp_analysis,
        recommended_length: length_analysis.recommended,
        length_analysis,
        competitor_h2_patterns,
        entity_seo,
        causal_triplets,
        content_gaps,
        summary,
    };

    if let (Some(project_id), Some(sink)) = (&request.project_id, &state.brief_sink) {
        if let Err(e) = sink.persist(project_id, &brief).await {
            warn!("brief persistence failed for project '{}': {}", project_id, e);
        }
    }

    Ok(brief)
}

/// Caller-supplied documents become sources directly, page budget applied.
fn materialize_sources(inputs: Vec<SourceInput>) -> Vec<Source> {
    let mut total = 0usize;
    let mut out = Vec::new();
    for input in inputs {
        if total >= TOTAL_CONTENT_BUDGET {
            break;
        }
        let text = clamp_bytes(&input.content, MAX_PER_PAGE).to_string();
        total += text.len();
        let word_count = text.split_whitespace().count();
        out.push(Source {
            title: input.title.unwrap_or_else(|| input.url.clone()),
            url: input.url,
            text,
            h2: input.h2_structure,
            word_count,
        });
    }
    out
}

/// Scrape the organic list with a bounded worker pool. Results are collected
/// in completion order but re-ranked before the content budget is applied so
/// downstream per-source vectors align with the organic ranking.
async fn scrape_organic(state: &Arc<AppState>, organic: &[SerpItem]) -> Vec<Source> {
    let concurrency = config::scrape_concurrency();
    let mut scraped: Vec<(usize, Source)> = stream::iter(organic.to_vec())
        .map(|item| {
            let client = state.http_client.clone();
            async move {
                let fetched = scraping::fetch_source(&client, &item.url, &item.title).await;
                (item.rank, fetched)
            }
        })
        .buffer_unordered(concurrency)
        .filter_map(|(rank, fetched)| async move { fetched.map(|s| (rank, s)) })
        .collect()
        .await;

    scraped.sort_by_key(|(rank, _)| *rank);

    let mut total = 0usize;
    let mut sources = Vec::new();
    for (_, source) in scraped {
        if total + source.text.len() > TOTAL_CONTENT_BUDGET {
            info!("content budget reached, discarding remaining scrapes");
            break;
        }
        total += source.text.len();
        sources.push(source);
    }
    sources
}

#[allow(clippy::too_many_arguments)]
fn build_entity_seo(
    state: &Arc<AppState>,
    main_keyword: &str,
    sources: &[Source],
    named_entities: Vec<NamedEntityOut>,
    concept_entities: Vec<ConceptEntityOut>,
    entity_relationships: Vec<RelationOut>,
    content_gaps: &ContentGaps,
    h1_list: &[String],
    h2_list: &[String],
) -> EntitySeo {
    let targets: Vec<SalienceTarget> = named_entities
        .iter()
        .map(|e| SalienceTarget {
            key: e.key.clone(),
            display: e.text.clone(),
            entity_type: e.entity_type.clone(),
            freq: e.freq,
            sources_count: e.sources_count,
        })
        .collect();
    let entity_salience = salience::compute_salience(
        &state.analyzer,
        &targets,
        sources,
        h1_list,
        h2_list,
        main_keyword,
    );

    let cooccurrence_keys: Vec<String> = named_entities
        .iter()
        .map(|e| e.key.clone())
        .chain(concept_entities.iter().map(|c| c.text.clone()))
        .collect();
    let entity_cooccurrence = salience::compute_cooccurrence(&cooccurrence_keys, sources);

    let entity_placement = salience::build_placement_plan(
        &entity_salience,
        &entity_cooccurrence,
        &entity_relationships,
        &concept_entities,
    );

    let concept_summary = concepts::summarize_concepts(&concept_entities);
    let covered_topics: Vec<String> = concept_summary.must_cover.clone();
    let coverage_score = if content_gaps.total_gaps + covered_topics.len() > 0 {
        covered_topics.len() as f64 / (content_gaps.total_gaps + covered_topics.len()) as f64
    } else {
        0.0
    };

    let entity_seo_summary = format!(
        "Encje nazwane: {}. Encje pojęciowe: {}. Relacje: {}. {}",
        named_entities.len(),
        concept_entities.len(),
        entity_relationships.len(),
        entity_placement.instruction
    );

    EntitySeo {
        entities: named_entities,
        concept_entities,
        topical_summary: concept_summary.instruction,
        entity_relationships,
        topical_coverage: TopicalCoverage {
            covered_topics,
            coverage_score,
        },
        entity_salience,
        entity_cooccurrence,
        entity_placement,
        entity_seo_summary,
    }
}

fn aggregate_h2_patterns(sources: &[Source]) -> Vec<H2Pattern> {
    let mut counts: BTreeMap<String, (usize, BTreeMap<usize, ()>)> = BTreeMap::new();
    for (idx, source) in sources.iter().enumerate() {
        for h2 in &source.h2 {
            let key = h2.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            let entry = counts.entry(key).or_default();
            entry.0 += 1;
            entry.1.insert(idx, ());
        }
    }
    let mut out: Vec<H2Pattern> = counts
        .into_iter()
        .map(|(text, (count, sources))| H2Pattern {
            text,
            count,
            sources: sources.len(),
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));
    out.truncate(20);
    out
}

fn compute_length_analysis(sources: &[Source]) -> LengthAnalysis {
    let mut counts: Vec<usize> = sources.iter().map(|s| s.word_count).collect();
    if counts.is_empty() {
        return LengthAnalysis::default();
    }
    counts.sort_unstable();

    let sum: usize = counts.iter().sum();
    let avg = sum as f64 / counts.len() as f64;
    let median = if counts.len() % 2 == 1 {
        counts[counts.len() / 2] as f64
    } else {
        (counts[counts.len() / 2 - 1] + counts[counts.len() / 2]) as f64 / 2.0
    };
    let recommended = if avg > 0.0 {
        (avg * 1.10).ceil() as usize
    } else {
        0
    };

    LengthAnalysis {
        recommended,
        avg_competitor: avg,
        median_competitor: median,
        min_competitor: *counts.first().unwrap_or(&0),
        max_competitor: *counts.last().unwrap_or(&0),
        competitors_count: counts.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(url: &str, words: usize) -> Source {
        Source {
            url: url.to_string(),
            title: String::new(),
            text: "słowo ".repeat(words),
            h2: Vec::new(),
            word_count: words,
        }
    }

    #[test]
    fn length_analysis_follows_the_formula() {
        let sources = vec![source("a", 1000), source("b", 1500), source("c", 2000)];
        let analysis = compute_length_analysis(&sources);
        assert_eq!(analysis.avg_competitor, 1500.0);
        assert_eq!(analysis.median_competitor, 1500.0);
        assert_eq!(analysis.recommended, 1650); // ceil(1500 * 1.10)
        assert_eq!(analysis.min_competitor, 1000);
        assert_eq!(analysis.max_competitor, 2000);
    }

    #[test]
    fn empty_sources_give_zero_recommendation() {
        let analysis = compute_length_analysis(&[]);
        assert_eq!(analysis.recommended, 0);
        assert_eq!(analysis.competitors_count, 0);
    }

    #[test]
    fn h2_patterns_count_across_sources() {
        let mut a = source("a", 10);
        a.h2 = vec!["Koszty rozwodu".to_string(), "Pozew".to_string()];
        let mut b = source("b", 10);
        b.h2 = vec!["Koszty rozwodu".to_string()];
        let patterns = aggregate_h2_patterns(&[a, b]);
        assert_eq!(patterns[0].text, "koszty rozwodu");
        assert_eq!(patterns[0].count, 2);
        assert_eq!(patterns[0].sources, 2);
    }

    #[test]
    fn provided_sources_respect_budgets() {
        let inputs = vec![SourceInput {
            url: "https://a.pl".to_string(),
            title: None,
            content: "x".repeat(MAX_PER_PAGE * 2),
            h2_structure: vec![],
        }];
        let sources = materialize_sources(inputs);
        assert_eq!(sources.len(), 1);
        assert!(sources[0].text.len() <= MAX_PER_PAGE);
        assert_eq!(sources[0].title, "https://a.pl");
    }
}
