use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub main_keyword: String,
    #[serde(default)]
    pub top_n: Option<usize>,
    /// When present, the SERP fetch is skipped and these documents become the
    /// competitor corpus directly.
    #[serde(default)]
    pub sources: Option<Vec<SourceInput>>,
    #[serde(default)]
    pub project_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInput {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub h2_structure: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SynthesizeTopicsRequest {
    pub ngrams: Vec<NgramInput>,
    pub headings: Vec<String>,
}

/// `/synthesize_topics` accepts either plain strings or `{ngram: "..."}` dicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NgramInput {
    Text(String),
    Entry { ngram: String },
}

impl NgramInput {
    pub fn as_str(&self) -> &str {
        match self {
            NgramInput::Text(s) => s,
            NgramInput::Entry { ngram } => ngram,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComplianceRequest {
    pub text: String,
    /// Free-form brief string on the first call, or the mapping returned by
    /// the previous call. The server keeps no state between calls.
    pub keyword_state: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HierarchicalCountsRequest {
    pub raw_counts: BTreeMap<String, i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HeadingsRequest {
    pub headings: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateKeywordsRequest {
    pub lemmatized_text: String,
    pub lemmatized_keywords: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyKeywordsRequest {
    pub text: String,
    pub keyword_list: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SERP shapes (shared by both providers)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SerpItem {
    pub rank: usize,
    pub url: String,
    pub title: String,
    pub snippet: String,
    /// Filled in after the scrape succeeds for this URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaaEntry {
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// True when the question came from the LLM fallback, not the SERP.
    #[serde(default)]
    pub generated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturedSnippet {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AiOverview {
    pub text: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub blocks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SerpMetadata {
    pub paa: Vec<PaaEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_snippet: Option<FeaturedSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_overview: Option<AiOverview>,
    pub related_searches: Vec<String>,
    pub refinement_chips: Vec<String>,
    pub serp_titles: Vec<String>,
    pub serp_snippets: Vec<String>,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SerpResponse {
    pub organic: Vec<SerpItem>,
    pub metadata: SerpMetadata,
}

// ─────────────────────────────────────────────────────────────────────────────
// Scraped competitor document
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    /// Cleaned body text, clamped to the per-page budget.
    pub text: String,
    pub h2: Vec<String>,
    pub word_count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Brief building blocks
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NgramEntry {
    /// Display surface form (most common raw variant).
    pub ngram: String,
    pub ngram_lemma: String,
    /// Frequency across competitor pages (high-signal slot excluded).
    pub freq: usize,
    /// Frequency including the high-signal pseudo-source.
    pub freq_total: usize,
    pub is_high_signal: bool,
    pub weight: f64,
    /// "x/y" — pages containing the n-gram out of pages scraped.
    pub site_distribution: String,
    pub freq_per_source: Vec<usize>,
    pub freq_min: usize,
    pub freq_median: f64,
    pub freq_max: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticKeyphrase {
    pub phrase: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedEntityOut {
    pub text: String,
    /// Lowercased canonical key, unique within the list.
    pub key: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub freq: usize,
    pub freq_per_source: Vec<usize>,
    pub sources_count: usize,
    pub importance: f64,
    pub contexts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptEntityOut {
    /// Best surface form (most frequent variant passing the typo heuristic).
    pub text: String,
    pub lemma_key: String,
    /// CONCEPT for phrases of up to two words, TOPICAL for longer ones.
    pub kind: String,
    pub freq: usize,
    pub freq_per_source: Vec<usize>,
    pub sources_count: usize,
    pub variants: Vec<String>,
    pub word_count: usize,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationOut {
    pub subject: String,
    pub verb: String,
    pub object: String,
    pub relation_type: String,
    pub freq: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CausalTripletOut {
    pub cause: String,
    pub effect: String,
    pub relation_type: String,
    pub confidence: f64,
    pub source_sentence: String,
    pub is_chain: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CausalTriplets {
    pub count: usize,
    pub chains: Vec<CausalTripletOut>,
    pub singles: Vec<CausalTripletOut>,
    pub agent_instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapOut {
    pub topic: String,
    pub kind: String,
    pub priority: usize,
    pub suggest_as_h2: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContentGaps {
    pub total_gaps: usize,
    pub suggested_new_h2s: Vec<String>,
    pub paa_unanswered: Vec<GapOut>,
    pub subtopic_missing: Vec<GapOut>,
    pub depth_missing: Vec<GapOut>,
    pub instruction: String,
    pub all_gaps: Vec<GapOut>,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalienceOut {
    pub entity: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub avg_first_position: f64,
    pub early_mentions: usize,
    pub h1_count: usize,
    pub h2_count: usize,
    pub subject_count: usize,
    pub object_count: usize,
    pub subject_ratio: f64,
    pub freq: usize,
    pub sources_count: usize,
    pub salience: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoOccurrenceOut {
    pub entity_a: String,
    pub entity_b: String,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub sources_count: usize,
    pub strength: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlacementPlanOut {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_entity: Option<String>,
    pub secondary_entities: Vec<String>,
    pub supporting_entities: Vec<String>,
    pub must_cover_concepts: Vec<String>,
    pub cooccurrence_pairs: Vec<[String; 2]>,
    pub key_relations: Vec<RelationOut>,
    pub instruction: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopicalCoverage {
    pub covered_topics: Vec<String>,
    pub coverage_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EntitySeo {
    pub entities: Vec<NamedEntityOut>,
    pub concept_entities: Vec<ConceptEntityOut>,
    pub topical_summary: String,
    pub entity_relationships: Vec<RelationOut>,
    pub topical_coverage: TopicalCoverage,
    pub entity_salience: Vec<SalienceOut>,
    pub entity_cooccurrence: Vec<CoOccurrenceOut>,
    pub entity_placement: PlacementPlanOut,
    pub entity_seo_summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct H2Pattern {
    pub text: String,
    pub count: usize,
    pub sources: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LengthAnalysis {
    pub recommended: usize,
    pub avg_competitor: f64,
    pub median_competitor: f64,
    pub min_competitor: usize,
    pub max_competitor: usize,
    pub competitors_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SerpAnalysis {
    pub paa_questions: Vec<PaaEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured_snippet: Option<FeaturedSnippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_overview: Option<AiOverview>,
    pub related_searches: Vec<String>,
    pub refinement_chips: Vec<String>,
    pub competitor_titles: Vec<String>,
    pub competitor_snippets: Vec<String>,
    pub competitor_h2_patterns: Vec<H2Pattern>,
    pub competitors: Vec<SerpItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BriefSummary {
    pub sources_requested: usize,
    pub sources_scraped: usize,
    pub sources_auto_fetched: bool,
    pub paa_found: bool,
    pub paa_generated: bool,
    pub ai_overview_found: bool,
    pub featured_snippet_found: bool,
    pub entity_seo_enabled: bool,
    pub causal_enabled: bool,
    pub gaps_status: String,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brief {
    pub main_keyword: String,
    pub generated_at: String,
    pub ngrams: Vec<NgramEntry>,
    pub semantic_keyphrases: Vec<SemanticKeyphrase>,
    pub full_text_sample: String,
    /// Alias of `full_text_sample` kept for older consumers.
    pub serp_content: String,
    pub serp_analysis: SerpAnalysis,
    /// Alias of `serp_analysis.paa_questions`.
    pub paa: Vec<PaaEntry>,
    pub length_analysis: LengthAnalysis,
    pub recommended_length: usize,
    pub competitor_h2_patterns: Vec<H2Pattern>,
    pub entity_seo: EntitySeo,
    pub causal_triplets: CausalTriplets,
    pub content_gaps: ContentGaps,
    pub summary: BriefSummary,
}

// ─────────────────────────────────────────────────────────────────────────────
// Compliance counter
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRange {
    pub min: u32,
    pub max: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceEntry {
    pub keyword: String,
    /// "min-max" room at the start of the batch.
    pub range_remaining: String,
    pub actual_in_batch: u32,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceResponse {
    pub compliance_report: Vec<ComplianceEntry>,
    pub new_keyword_state: BTreeMap<String, KeywordRange>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Small endpoint responses
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicImportance {
    pub theme: String,
    pub h2_frequency: usize,
    pub ngram_frequency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizeTopicsResponse {
    pub topic_importance: Vec<TopicImportance>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopHeading {
    pub heading: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopHeadingsResponse {
    pub top_headings: Vec<TopHeading>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchicalCountsResponse {
    pub hierarchical_counts: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordCountsResponse {
    pub keyword_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedKeyword {
    pub keyword: String,
    pub lemma: String,
    pub count: usize,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyKeywordsSummary {
    pub total_keywords: usize,
    pub found: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyKeywordsResponse {
    pub summary: VerifyKeywordsSummary,
    pub results: Vec<VerifiedKeyword>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
