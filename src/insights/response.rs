//! InsightsRequest / CrossInsightsRequest handling, grounded on the
//! teacher's RAG question-answering engine.

use crate::config::Prompts;
use crate::error::{CoreError, Result};
use crate::insights::context::{format_hits_for_prompt, ContextBuilder};
use crate::retrieval::SearchHit;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info, instrument};
use regex::Regex;

/// A citation-bearing source excerpt surfaced alongside generated insights.
#[derive(Debug, Clone)]
pub struct Source {
    pub filename: String,
    pub page_number: u32,
    pub score: f32,
}

impl From<&SearchHit> for Source {
    fn from(hit: &SearchHit) -> Self {
        Self {
            filename: hit.chunk.filename.clone(),
            page_number: hit.chunk.page_number,
            score: hit.score,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InsightsResponse {
    pub insights: String,
    pub sources: Vec<Source>,
}

/// A citation into a specific document page, as parsed out of a bullet's
/// trailing `[filename p.N]` markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    pub filename: String,
    pub page_number: u32,
}

/// One agreement or contradiction claim, with the citations backing it.
#[derive(Debug, Clone)]
pub struct Claim {
    pub text: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone)]
pub struct CrossInsightsResponse {
    pub agreements: Vec<Claim>,
    pub contradictions: Vec<Claim>,
    pub sources: Vec<Source>,
}

static CITATION_RE: OnceLock<Regex> = OnceLock::new();

fn citation_re() -> &'static Regex {
    CITATION_RE.get_or_init(|| Regex::new(r"\[([^\]]+?)\s+p\.(\d+)\]").expect("static regex is valid"))
}

/// Parse the LLM's "Agreements:"/"Contradictions:" bulleted response into
/// structured claims, each carrying the citations on its bullet line.
/// Lines outside either section, blank lines and literal "None." placeholder
/// bullets are dropped.
fn parse_cross_insights(raw: &str) -> (Vec<Claim>, Vec<Claim>) {
    let mut agreements = Vec::new();
    let mut contradictions = Vec::new();
    let mut current: Option<&mut Vec<Claim>> = None;

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        if lower.starts_with("agreements") {
            current = Some(&mut agreements);
            continue;
        }
        if lower.starts_with("contradictions") {
            current = Some(&mut contradictions);
            continue;
        }

        let bullet = trimmed.trim_start_matches(['-', '*', ' ']).trim();
        if bullet.is_empty() || bullet.eq_ignore_ascii_case("none.") || bullet.eq_ignore_ascii_case("none") {
            continue;
        }

        let Some(bucket) = current.as_deref_mut() else {
            continue;
        };

        let citations: Vec<Citation> = citation_re()
            .captures_iter(bullet)
            .filter_map(|caps| {
                let filename = caps.get(1)?.as_str().trim().to_string();
                let page_number = caps.get(2)?.as_str().parse().ok()?;
                Some(Citation { filename, page_number })
            })
            .collect();

        let text = citation_re().replace_all(bullet, "").trim().to_string();
        bucket.push(Claim { text, citations });
    }

    (agreements, contradictions)
}

pub struct InsightsEngine {
    client: Client<OpenAIConfig>,
    model: String,
    context_builder: ContextBuilder,
    prompts: Prompts,
}

impl InsightsEngine {
    pub fn new(client: Client<OpenAIConfig>, model: String, context_builder: ContextBuilder, prompts: Prompts) -> Self {
        Self {
            client,
            model,
            context_builder,
            prompts,
        }
    }

    /// C: single-document insights for an arbitrary subject query.
    #[instrument(skip(self))]
    pub async fn insights(&self, subject: &str, only_filenames: Option<&HashSet<String>>) -> Result<InsightsResponse> {
        info!("generating insights");
        let hits = self.context_builder.build(subject, only_filenames).await?;

        if hits.is_empty() {
            return Ok(InsightsResponse {
                insights: "No relevant excerpts were found in the indexed documents for this subject.".to_string(),
                sources: Vec::new(),
            });
        }

        let mut vars = HashMap::new();
        vars.insert("subject".to_string(), subject.to_string());
        vars.insert("chunks".to_string(), format_hits_for_prompt(&hits));

        let system = self.prompts.render_with_custom(&self.prompts.insights.insights_system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.insights.insights_user, &vars);

        let answer = self.call_llm(&system, &user).await?;
        debug!(source_count = hits.len(), "generated insights");

        Ok(InsightsResponse {
            insights: answer,
            sources: hits.iter().map(Source::from).collect(),
        })
    }

    /// Cross-document insights: agreements and contradictions across a set
    /// of documents for a given focus.
    #[instrument(skip(self))]
    pub async fn cross_insights(&self, filenames: &[String], focus: &str) -> Result<CrossInsightsResponse> {
        if filenames.len() < 2 {
            return Err(CoreError::InvalidRequest(
                "cross-document insights require at least two documents".to_string(),
            ));
        }

        let filter: HashSet<String> = filenames.iter().cloned().collect();
        let hits = self.context_builder.build(focus, Some(&filter)).await?;

        if hits.is_empty() {
            return Ok(CrossInsightsResponse {
                agreements: Vec::new(),
                contradictions: Vec::new(),
                sources: Vec::new(),
            });
        }

        let mut vars = HashMap::new();
        vars.insert("filenames".to_string(), filenames.join(", "));
        vars.insert("chunks".to_string(), format_hits_for_prompt(&hits));
        vars.insert("focus".to_string(), focus.to_string());

        let system = self
            .prompts
            .render_with_custom(&self.prompts.insights.cross_insights_system, &vars);
        let user = self.prompts.render_with_custom(&self.prompts.insights.cross_insights_user, &vars);

        let answer = self.call_llm(&system, &user).await?;
        let (agreements, contradictions) = parse_cross_insights(&answer);

        Ok(CrossInsightsResponse {
            agreements,
            contradictions,
            sources: hits.iter().map(Source::from).collect(),
        })
    }

    async fn call_llm(&self, system_message: &str, user_message: &str) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_message.to_string())
                .build()
                .map_err(|e| CoreError::OpenAI(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message.to_string())
                .build()
                .map_err(|e| CoreError::OpenAI(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.4)
            .build()
            .map_err(|e| CoreError::OpenAI(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| CoreError::OpenAI(format!("insights generation failed: {e}")))?;

        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| CoreError::OpenAI("empty response from LLM".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_hit() {
        let chunk = crate::retrieval::Chunk::new("text".to_string(), "a.pdf".to_string(), 2, 0, None);
        let hit = SearchHit { chunk, score: 0.9 };
        let source = Source::from(&hit);
        assert_eq!(source.filename, "a.pdf");
        assert_eq!(source.page_number, 2);
    }

    #[test]
    fn test_parse_cross_insights_splits_sections() {
        let raw = "Agreements:\n- Both papers support X [a.pdf p.1] [b.pdf p.3]\n\nContradictions:\n- Paper A says Y, paper B disagrees [a.pdf p.2]";
        let (agreements, contradictions) = parse_cross_insights(raw);
        assert_eq!(agreements.len(), 1);
        assert_eq!(agreements[0].citations.len(), 2);
        assert_eq!(agreements[0].citations[0].filename, "a.pdf");
        assert_eq!(agreements[0].citations[0].page_number, 1);
        assert_eq!(contradictions.len(), 1);
        assert_eq!(contradictions[0].citations[0].page_number, 2);
    }

    #[test]
    fn test_parse_cross_insights_drops_none_placeholder() {
        let raw = "Agreements:\nNone.\n\nContradictions:\n- Real one [a.pdf p.1]";
        let (agreements, contradictions) = parse_cross_insights(raw);
        assert!(agreements.is_empty());
        assert_eq!(contradictions.len(), 1);
    }
}
