//! LLM reranker (C10): batches a working set through an LLM judge, merges
//! the judged scores back with the prior (usually vector) scores, and
//! degrades gracefully rather than aborting when a batch's calls keep
//! failing.

use std::sync::Arc;
use std::time::Duration;

use scopegraph_core::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::provider::LlmProvider;
use crate::schema::{FieldType, OutputSchema, SchemaField};

const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_PARALLEL: usize = 5;
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RerankUse {
    Always,
    PreferSummary,
    Never,
}

#[derive(Debug, Clone)]
pub struct EntityField {
    pub name: String,
    pub label: Option<String>,
    pub max_length: Option<usize>,
    pub required: bool,
    pub rerank_use: RerankUse,
    pub summary: Option<String>,
    pub original: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Enrichment {
    pub field_name: String,
    pub label: String,
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct EntityContext {
    pub entity_type: String,
    pub display_name: String,
    pub fields: Vec<EntityField>,
    pub enrichments: Vec<Enrichment>,
}

impl EntityContext {
    /// Renders the header line plus labelled optional lines, applying the
    /// summary-substitution rules per field.
    pub fn render(&self) -> String {
        let mut lines = vec![format!("{} ({})", self.display_name, self.entity_type)];
        for field in &self.fields {
            let Some(rendered) = render_field(field) else { continue };
            if field.required {
                lines[0] = format!("{} — {}", lines[0], rendered);
            } else {
                let label = field.label.clone().unwrap_or_else(|| field.name.clone());
                lines.push(format!("{label}: {rendered}"));
            }
        }
        for enrichment in &self.enrichments {
            lines.push(format!("{}: (expanded relationship {})", enrichment.label, enrichment.field_name));
        }
        lines.join("\n")
    }
}

fn render_field(field: &EntityField) -> Option<String> {
    let rendered = match field.rerank_use {
        RerankUse::Always => field.summary.clone().or_else(|| field.original.clone()),
        RerankUse::PreferSummary => match (&field.summary, &field.original) {
            (Some(summary), Some(original)) => Some(format!("{summary} ({}...)", truncate(original, Some(200)))),
            (Some(summary), None) => Some(summary.clone()),
            (None, original) => original.clone(),
        },
        RerankUse::Never => field.original.clone(),
    }?;
    Some(truncate(&rendered, field.max_length))
}

fn truncate(text: &str, max_length: Option<usize>) -> String {
    match max_length {
        Some(max) if text.len() > max => format!("{}...", &text[..floor_char_boundary(text, max)]),
        _ => text.to_string(),
    }
}

/// The largest byte index `<= index` that lands on a `char` boundary of
/// `text`. Source content is frequently non-ASCII; slicing at a raw byte
/// offset can land mid-character and panic.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0)
}

#[derive(Debug, Clone)]
pub struct WorkingEntry {
    pub uuid: String,
    pub vector_score: f32,
    pub context: EntityContext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Weighted { vector_weight_pct: u32, llm_weight_pct: u32 },
    Multiplicative,
    LlmOverride,
}

impl Default for MergeStrategy {
    fn default() -> Self {
        MergeStrategy::Weighted { vector_weight_pct: 30, llm_weight_pct: 70 }
    }
}

impl MergeStrategy {
    fn merge(self, vector: f32, llm: f32) -> f32 {
        match self {
            MergeStrategy::Weighted { vector_weight_pct, llm_weight_pct } => {
                let v = vector_weight_pct as f32 / 100.0;
                let l = llm_weight_pct as f32 / 100.0;
                v * vector + l * llm
            }
            MergeStrategy::Multiplicative => vector * llm,
            MergeStrategy::LlmOverride => {
                if llm > 0.9 {
                    llm
                } else {
                    0.5 * vector + 0.5 * llm
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub vector_score: f32,
    pub llm_score: Option<f32>,
    pub reasoning: Option<String>,
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct RerankedEntry {
    pub uuid: String,
    pub final_score: f32,
    pub breakdown: ScoreBreakdown,
}

pub struct RerankConfig {
    pub batch_size: usize,
    pub parallel: usize,
    pub merge_strategy: MergeStrategy,
    pub min_score: Option<f32>,
    pub with_suggestions: bool,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            parallel: DEFAULT_PARALLEL,
            merge_strategy: MergeStrategy::default(),
            min_score: None,
            with_suggestions: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JudgedEntry {
    uuid: String,
    relevant: bool,
    score: f32,
    reasoning: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct QueryFeedback {
    quality: Option<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

pub struct LlmReranker {
    provider: Arc<dyn LlmProvider>,
    config: RerankConfig,
}

impl LlmReranker {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RerankConfig) -> Self {
        Self { provider, config }
    }

    pub async fn rerank(&self, question: &str, entries: Vec<WorkingEntry>) -> Vec<RerankedEntry> {
        let batches: Vec<Vec<WorkingEntry>> = entries
            .chunks(self.config.batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect();

        let mut results = Vec::with_capacity(entries_len(&batches));
        for group in batches.chunks(self.config.parallel.max(1)) {
            let futures = group.iter().enumerate().map(|(i, batch)| self.judge_batch(question, batch, i == 0));
            let judged = futures_util::future::join_all(futures).await;
            for batch_result in judged {
                results.extend(batch_result);
            }
        }
        results
    }

    async fn judge_batch(&self, question: &str, batch: &[WorkingEntry], carry_feedback: bool) -> Vec<RerankedEntry> {
        match self.judge_batch_inner(question, batch, carry_feedback).await {
            Ok(judged) => self.merge_scores(batch, &judged),
            Err(_) => batch
                .iter()
                .map(|entry| RerankedEntry {
                    uuid: entry.uuid.clone(),
                    final_score: entry.vector_score,
                    breakdown: ScoreBreakdown { vector_score: entry.vector_score, llm_score: None, reasoning: None, degraded: true },
                })
                .collect(),
        }
    }

    async fn judge_batch_inner(
        &self,
        question: &str,
        batch: &[WorkingEntry],
        carry_feedback: bool,
    ) -> Result<Vec<JudgedEntry>, CoreError> {
        let prompt = self.render_prompt(question, batch, carry_feedback);
        let mut attempt = 0;
        loop {
            match self.provider.generate(&prompt).await {
                Ok(raw) => return parse_judged_entries(&raw),
                Err(error) if error.is_retryable() && attempt < MAX_RETRIES - 1 => {
                    let delay = (BACKOFF_BASE * 2u32.pow(attempt)).min(BACKOFF_CAP);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    fn render_prompt(&self, question: &str, batch: &[WorkingEntry], carry_feedback: bool) -> String {
        let schema = judging_schema();
        let entries_rendered: Vec<String> = batch
            .iter()
            .map(|entry| format!("<entry uuid=\"{}\">\n{}\n</entry>", entry.uuid, entry.context.render()))
            .collect();
        let feedback_hint = if carry_feedback && self.config.with_suggestions {
            "\nAlso include a top-level <query_feedback> with {quality, suggestions[]}."
        } else {
            ""
        };
        format!(
            "Question: {question}\n\nJudge each entry's relevance.\n{entries}\n\n{instructions}{feedback_hint}",
            entries = entries_rendered.join("\n"),
            instructions = schema.derive_instructions(),
        )
    }

    fn merge_scores(&self, batch: &[WorkingEntry], judged: &[JudgedEntry]) -> Vec<RerankedEntry> {
        batch
            .iter()
            .map(|entry| {
                let match_ = judged.iter().find(|j| j.uuid == entry.uuid);
                match match_ {
                    Some(j) => {
                        let final_score = self.config.merge_strategy.merge(entry.vector_score, j.score);
                        RerankedEntry {
                            uuid: entry.uuid.clone(),
                            final_score,
                            breakdown: ScoreBreakdown {
                                vector_score: entry.vector_score,
                                llm_score: Some(j.score),
                                reasoning: Some(j.reasoning.clone()),
                                degraded: false,
                            },
                        }
                    }
                    None => RerankedEntry {
                        uuid: entry.uuid.clone(),
                        final_score: entry.vector_score,
                        breakdown: ScoreBreakdown { vector_score: entry.vector_score, llm_score: None, reasoning: None, degraded: true },
                    },
                }
            })
            .collect()
    }
}

fn entries_len(batches: &[Vec<WorkingEntry>]) -> usize {
    batches.iter().map(|b| b.len()).sum()
}

fn judging_schema() -> OutputSchema {
    OutputSchema {
        root: "judgments".to_string(),
        fields: vec![SchemaField {
            name: "entries".to_string(),
            field_type: FieldType::Array,
            description: "one judgment per <entry>, each with uuid, relevant, score, reasoning".to_string(),
            required: true,
            nested: None,
        }],
    }
}

fn parse_judged_entries(raw: &str) -> Result<Vec<JudgedEntry>, CoreError> {
    let start = raw.find('[').ok_or_else(|| CoreError::LlmUnavailable("no judgment array in response".to_string()))?;
    let end = raw.rfind(']').ok_or_else(|| CoreError::LlmUnavailable("unterminated judgment array".to_string()))?;
    serde_json::from_str(&raw[start..=end]).map_err(|e| CoreError::LlmUnavailable(format!("malformed judgment array: {e}")))
}

/// Applies minScore filtering, descending sort, and an optional cap — the
/// post-merge contract shared by every pipeline stage that calls into C10.
pub fn finalize(mut entries: Vec<RerankedEntry>, min_score: Option<f32>, limit: Option<usize>) -> Vec<RerankedEntry> {
    if let Some(min) = min_score {
        entries.retain(|e| e.final_score >= min);
    }
    entries.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| a.uuid.cmp(&b.uuid)));
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uuid: &str, score: f32) -> WorkingEntry {
        WorkingEntry {
            uuid: uuid.to_string(),
            vector_score: score,
            context: EntityContext { entity_type: "Scope".to_string(), display_name: uuid.to_string(), fields: vec![], enrichments: vec![] },
        }
    }

    #[test]
    fn weighted_merge_matches_documented_default_weights() {
        let strategy = MergeStrategy::default();
        let merged = strategy.merge(1.0, 0.0);
        assert!((merged - 0.3).abs() < 1e-6);
    }

    #[test]
    fn llm_override_uses_llm_score_above_threshold() {
        let strategy = MergeStrategy::LlmOverride;
        assert!((strategy.merge(0.1, 0.95) - 0.95).abs() < 1e-6);
        assert!((strategy.merge(1.0, 0.5) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn finalize_sorts_descending_breaking_ties_by_uuid() {
        let entries = vec![
            RerankedEntry { uuid: "b".into(), final_score: 0.5, breakdown: ScoreBreakdown { vector_score: 0.5, llm_score: None, reasoning: None, degraded: false } },
            RerankedEntry { uuid: "a".into(), final_score: 0.5, breakdown: ScoreBreakdown { vector_score: 0.5, llm_score: None, reasoning: None, degraded: false } },
            RerankedEntry { uuid: "c".into(), final_score: 0.9, breakdown: ScoreBreakdown { vector_score: 0.9, llm_score: None, reasoning: None, degraded: false } },
        ];
        let sorted = finalize(entries, None, None);
        assert_eq!(sorted.iter().map(|e| e.uuid.as_str()).collect::<Vec<_>>(), vec!["c", "a", "b"]);
    }

    #[test]
    fn missing_judgment_degrades_to_vector_score() {
        let batch = vec![entry("a", 0.4)];
        let judged = vec![];
        let config = RerankConfig::default();
        let reranker = LlmReranker { provider: Arc::new(crate::providers::local::LocalProvider::new()), config };
        let merged = reranker.merge_scores(&batch, &judged);
        assert_eq!(merged[0].final_score, 0.4);
        assert!(merged[0].breakdown.degraded);
    }

    #[test]
    fn parse_judged_entries_extracts_array_from_prose() {
        let raw = "Here are the judgments:\n[{\"uuid\": \"a\", \"relevant\": true, \"score\": 0.8, \"reasoning\": \"matches\"}]";
        let parsed = parse_judged_entries(raw).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].uuid, "a");
    }

    #[test]
    fn truncate_does_not_panic_inside_a_multi_byte_character() {
        let text = "caf\u{e9}".repeat(100);
        let truncated = truncate(&text, Some(5));
        assert!(truncated.ends_with("..."));
        assert!(text.len() > 5, "fixture must actually exceed the cap");
    }

    #[test]
    fn required_field_renders_on_header_line() {
        let context = EntityContext {
            entity_type: "Scope".to_string(),
            display_name: "parse_file".to_string(),
            fields: vec![EntityField {
                name: "signature".to_string(),
                label: None,
                max_length: None,
                required: true,
                rerank_use: RerankUse::Always,
                summary: Some("fn parse_file(path: &Path) -> Result<ParsedFile>".to_string()),
                original: None,
            }],
            enrichments: vec![],
        };
        let rendered = context.render();
        assert!(rendered.starts_with("parse_file (Scope) —"));
    }
}
