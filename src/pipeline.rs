//! Coordinates C1-C6 into the external `IngestRequest` / `GenerateAudioRequest`
//! / `SearchRequest` / `InsightsRequest` / `CrossInsightsRequest` operations,
//! grounded on the teacher's `Orchestrator` coordinating its own per-stage
//! components behind a branching state machine.

use crate::config::Settings;
use crate::error::{CoreError, Result};
use crate::insights::{ContextBuilder as InsightsContextBuilder, CrossInsightsResponse, InsightsEngine, InsightsResponse};
use crate::mux::{AudioArtifact, Muxer};
use crate::openai::create_client;
use crate::retrieval::{sanitize_filename, Chunk, Embedder, Ingestor, OpenAiEmbedder, PdfIngestor, SearchHit, SearchParams, VectorIndex};
use crate::script::{CacheKey, ScriptMode, ScriptStyle, ScriptSynth, Speaker, VoiceConfig};
use crate::tts::{
    EdgeProvider, GeminiProvider, GoogleProvider, HfProvider, OfflineProvider, TTSDispatcher, TtsProvider,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock, Semaphore};
use tracing::{info, instrument, warn};

/// Request to ingest and index a PDF already saved at `path`.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct IngestResponse {
    pub filename: String,
    pub chunk_count: usize,
}

/// What a `GenerateAudioRequest`/`SearchRequest` reads its source content
/// from: raw text supplied inline, one page of a previously ingested
/// document, or a whole previously ingested document.
#[derive(Debug, Clone)]
pub enum AudioSource {
    Text(String),
    Page { filename: String, page_number: u32 },
    Document { filename: String },
}

impl AudioSource {
    /// A stable label identifying this source, used in cache keys and
    /// output filenames.
    fn label(&self) -> String {
        match self {
            AudioSource::Text(text) => format!("text:{}", CacheKey::from_fields(&[text.as_str()])),
            AudioSource::Page { filename, page_number } => format!("{filename}#p{page_number}"),
            AudioSource::Document { filename } => filename.clone(),
        }
    }
}

/// Request to produce an audio artifact from text, one page, or a whole
/// previously ingested document.
#[derive(Debug, Clone)]
pub struct GenerateAudioRequest {
    pub source: AudioSource,
    /// Produce a two-speaker podcast-style dialogue instead of narration.
    pub podcast: bool,
    /// Synonym for `podcast`, kept for callers that think in terms of
    /// speaker count rather than format; either flag selects dialogue mode.
    pub two_speakers: bool,
    pub accent: Option<String>,
    pub style: Option<String>,
    pub expressiveness: Option<String>,
    pub voices: VoiceConfig,
    /// Per-request voice overrides keyed by speaker label or alias
    /// (`"Speaker 1"`, `"Alex"`, `"A"`, ...), applied on top of `voices`.
    pub speakers_override: Option<HashMap<String, String>>,
}

impl GenerateAudioRequest {
    pub fn mode(&self) -> ScriptMode {
        if self.podcast || self.two_speakers {
            ScriptMode::Dialogue
        } else {
            ScriptMode::Narration
        }
    }

    pub fn script_style(&self) -> ScriptStyle {
        ScriptStyle {
            accent: self.accent.clone(),
            style: self.style.clone(),
            expressiveness: self.expressiveness.clone(),
        }
    }

    /// `voices` with `speakers_override` applied, recognizing any label
    /// alias `Speaker::from_label_alias` understands.
    fn resolved_voices(&self) -> VoiceConfig {
        let mut voices = self.voices.clone();
        let Some(overrides) = &self.speakers_override else {
            return voices;
        };
        for (label, voice) in overrides {
            match Speaker::from_label_alias(label) {
                Some(Speaker::A) => voices.speaker_a = voice.clone(),
                Some(Speaker::B) => voices.speaker_b = voice.clone(),
                None => warn!(label = %label, "ignoring speakers_override with unrecognized speaker label"),
            }
        }
        voices
    }
}

/// What to search: free text to embed fresh, or an already-indexed page
/// whose stored embedding is reused as the query.
#[derive(Debug, Clone)]
pub enum SearchSource {
    Text(String),
    Page { filename: String, page_number: u32 },
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub source: SearchSource,
    pub k: usize,
    pub fetch_k: Option<usize>,
    pub min_score: Option<f32>,
    /// When searching from a `Page` source, exclude that same page from
    /// the results.
    pub exclude_self: bool,
}

#[derive(Debug, Clone)]
pub struct InsightsRequest {
    pub subject: String,
    pub filenames: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct CrossInsightsRequest {
    pub filenames: Vec<String>,
    pub focus: String,
}

type SharedArtifact = std::result::Result<AudioArtifact, String>;

/// Coordinates ingestion, retrieval, script synthesis, TTS dispatch and
/// muxing into the crate's external request/response surface.
pub struct Pipeline {
    settings: Settings,
    ingestor: Arc<dyn Ingestor>,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    script_synth: Arc<ScriptSynth>,
    dispatcher: Arc<TTSDispatcher>,
    muxer: Arc<Muxer>,
    insights_engine: Arc<InsightsEngine>,
    inflight: RwLock<HashMap<CacheKey, Arc<OnceCell<SharedArtifact>>>>,
    /// Bounds concurrent full audio generations (LLM calls, TTS fan-out,
    /// mux subprocesses) the way the teacher bounds concurrent transcription
    /// jobs, independent of the TTS dispatcher's own per-line worker pool.
    bg_semaphore: Arc<Semaphore>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        ingestor: Arc<dyn Ingestor>,
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        script_synth: Arc<ScriptSynth>,
        dispatcher: Arc<TTSDispatcher>,
        muxer: Arc<Muxer>,
        insights_engine: Arc<InsightsEngine>,
    ) -> Self {
        let bg_workers = settings.general.bg_workers.max(1);
        Self {
            settings,
            ingestor,
            embedder,
            index,
            script_synth,
            dispatcher,
            muxer,
            insights_engine,
            inflight: RwLock::new(HashMap::new()),
            bg_semaphore: Arc::new(Semaphore::new(bg_workers)),
        }
    }

    /// Construct the retrieval-side context builder used by insights. Kept
    /// here rather than threaded through `new` since it's purely a view
    /// over `index` and `embedder`.
    pub fn insights_context_builder(&self) -> InsightsContextBuilder {
        InsightsContextBuilder::new(self.index.clone(), self.embedder.clone())
    }

    /// Wire up a full pipeline from configuration, the way each CLI command
    /// and the HTTP server do it. TTS providers are constructed from
    /// whichever provider credentials are present in the environment; a
    /// provider with no credentials is still added to the chain; its calls
    /// simply fail fast and the dispatcher moves on to the next one.
    ///
    /// The in-memory index is rebuilt from `document_library/` on every
    /// call: every PDF already saved there from a previous run is
    /// re-ingested and re-embedded so restarting the process doesn't lose
    /// search or audio-generation over previously ingested documents.
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        let ingestor: Arc<dyn Ingestor> = Arc::new(PdfIngestor::new(settings.ingest.clone()));
        let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(create_client(), &settings.embedding));
        let index = Arc::new(VectorIndex::new(settings.embedding.dimensions, settings.index.fetch_k_multiplier));

        let prompts = crate::config::Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )
        .unwrap_or_default();

        let script_synth = Arc::new(ScriptSynth::new(create_client(), settings.script.clone(), prompts.clone()));

        let providers: Vec<Arc<dyn TtsProvider>> = vec![
            Arc::new(GeminiProvider::new(std::env::var("GEMINI_API_KEY").unwrap_or_default())),
            Arc::new(GoogleProvider::new(std::env::var("GOOGLE_TTS_API_KEY").unwrap_or_default())),
            Arc::new(EdgeProvider::new()),
            Arc::new(HfProvider::new(std::env::var("HF_API_TOKEN").unwrap_or_default())),
            Arc::new(OfflineProvider::new()),
        ];

        let dispatcher = Arc::new(TTSDispatcher::new(
            providers,
            settings.tts.forced_provider.clone(),
            settings.tts.workers,
            settings.audio_dir().join("clips"),
            settings.temp_dir().join("tts-scratch"),
            settings.tts.provider_timeout_s,
        ));

        let muxer = Arc::new(Muxer::new(settings.temp_dir().join("mux-scratch")));

        let insights_context = InsightsContextBuilder::new(index.clone(), embedder.clone());
        let insights_engine = Arc::new(InsightsEngine::new(
            create_client(),
            settings.script.model.clone(),
            insights_context,
            prompts,
        ));

        rebuild_index_from_library(&settings, &ingestor, &embedder, &index).await;

        Ok(Self::new(
            settings,
            ingestor,
            embedder,
            index,
            script_synth,
            dispatcher,
            muxer,
            insights_engine,
        ))
    }

    #[instrument(skip(self))]
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse> {
        let chunks = self.ingestor.ingest(&request.path).await?;
        let filename = chunks
            .first()
            .map(|c| c.filename.clone())
            .unwrap_or_else(|| sanitize_filename(&request.path));

        self.index.remove_document(&filename).await;

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        self.persist_document(&request.path, &filename).await?;

        let chunk_count = chunks.len();
        self.index.add(chunks, vectors).await?;

        info!(filename = %filename, chunk_count, "ingested document");
        Ok(IngestResponse { filename, chunk_count })
    }

    async fn persist_document(&self, source: &Path, filename: &str) -> Result<()> {
        let dest_dir = self.settings.document_library_dir();
        std::fs::create_dir_all(&dest_dir)?;
        let dest = dest_dir.join(filename);
        if source != dest {
            std::fs::copy(source, &dest)?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let mut exclude: HashSet<(String, u32)> = HashSet::new();

        let query_vector = match &request.source {
            SearchSource::Text(text) => {
                let embeddings = self.embedder.embed(&[text.clone()]).await?;
                embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| CoreError::EmbedderUnavailable("no embedding returned for query".to_string()))?
            }
            SearchSource::Page { filename, page_number } => {
                let vector = self
                    .index
                    .vector_for_page(filename, *page_number)
                    .await
                    .ok_or_else(|| {
                        CoreError::InvalidRequest(format!("page {page_number} of '{filename}' is not indexed"))
                    })?;
                if request.exclude_self {
                    exclude.insert((filename.clone(), *page_number));
                }
                vector
            }
        };

        self.index
            .search(
                &query_vector,
                &SearchParams {
                    k: request.k,
                    fetch_k: request.fetch_k,
                    min_score: request.min_score,
                    exclude,
                },
            )
            .await
    }

    #[instrument(skip(self))]
    pub async fn insights(&self, request: InsightsRequest) -> Result<InsightsResponse> {
        let filter: Option<HashSet<String>> = request.filenames.map(|f| f.into_iter().collect());
        self.insights_engine.insights(&request.subject, filter.as_ref()).await
    }

    #[instrument(skip(self))]
    pub async fn cross_insights(&self, request: CrossInsightsRequest) -> Result<CrossInsightsResponse> {
        self.insights_engine.cross_insights(&request.filenames, &request.focus).await
    }

    /// Generate (or reuse an in-flight/cached) audio artifact for a
    /// document. Concurrent identical requests are coalesced: the first
    /// caller does the work, later callers await the same result instead
    /// of re-synthesizing.
    #[instrument(skip(self))]
    pub async fn generate_audio(&self, request: GenerateAudioRequest) -> Result<AudioArtifact> {
        let chunks = self.chunks_for_source(&request.source).await?;

        let key = self.audio_cache_key(&chunks, &request);
        let cell = self.cell_for(key.clone()).await;

        let timeout = std::time::Duration::from_secs(self.settings.general.request_timeout_s);
        let outcome = tokio::time::timeout(timeout, cell.get_or_init(|| self.run_generation(chunks, request, key.clone())))
            .await
            .map_err(|_| CoreError::Pipeline("audio generation exceeded the request deadline".to_string()))?;

        match outcome {
            Ok(artifact) => Ok(artifact.clone()),
            Err(reason) => Err(CoreError::Pipeline(reason.clone())),
        }
    }

    async fn cell_for(&self, key: CacheKey) -> Arc<OnceCell<SharedArtifact>> {
        if let Some(existing) = self.inflight.read().await.get(&key) {
            return existing.clone();
        }
        let mut guard = self.inflight.write().await;
        guard.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone()
    }

    async fn run_generation(&self, chunks: Vec<Chunk>, request: GenerateAudioRequest, key: CacheKey) -> SharedArtifact {
        let label = request.source.label();
        let result = self.run_generation_inner(&chunks, &request, &key).await;
        if let Err(e) = &result {
            warn!(source = %label, error = %e, "audio generation failed");
        }
        result.map_err(|e| e.to_string())
    }

    /// Resolve a `GenerateAudioRequest`'s source into the chunks to narrate,
    /// in document reading order.
    async fn chunks_for_source(&self, source: &AudioSource) -> Result<Vec<Chunk>> {
        match source {
            AudioSource::Text(text) => Ok(vec![Chunk::new(text.clone(), "<inline-text>".to_string(), 1, 0, None)]),
            AudioSource::Page { filename, page_number } => {
                let chunks: Vec<Chunk> = self
                    .index
                    .chunks_for_document(filename)
                    .await
                    .into_iter()
                    .filter(|c| c.page_number == *page_number)
                    .collect();
                if chunks.is_empty() {
                    return Err(CoreError::InvalidRequest(format!(
                        "page {page_number} of '{filename}' is not indexed"
                    )));
                }
                Ok(chunks)
            }
            AudioSource::Document { filename } => {
                let chunks = self.index.chunks_for_document(filename).await;
                if chunks.is_empty() {
                    return Err(CoreError::InvalidRequest(format!("document '{filename}' is not indexed")));
                }
                Ok(chunks)
            }
        }
    }

    async fn run_generation_inner(&self, chunks: &[Chunk], request: &GenerateAudioRequest, key: &CacheKey) -> Result<AudioArtifact> {
        let _permit = self
            .bg_semaphore
            .acquire()
            .await
            .expect("bg_semaphore is never closed");

        let mode = request.mode();
        let style = request.script_style();
        let voices = request.resolved_voices();
        let style_tag = CacheKey::from_fields(&[
            style.accent.as_deref().unwrap_or("default"),
            style.style.as_deref().unwrap_or("default"),
            style.expressiveness.as_deref().unwrap_or("default"),
        ]);

        let script = self.script_synth.synthesize(chunks, mode, &style).await?;

        let clips = self
            .dispatcher
            .synthesize_script(&script, &voices, key, style_tag.as_str())
            .await?;

        let dialogue_line_count = match &script {
            crate::script::Script::Dialogue(lines) => lines.len(),
            crate::script::Script::Narration(_) => 0,
        };

        let chapter_titles: Vec<Option<String>> = match &script {
            crate::script::Script::Narration(_) => chunks.iter().map(|c| c.section_title.clone()).collect(),
            crate::script::Script::Dialogue(lines) => {
                if clips.len() == 1 && dialogue_line_count > 1 {
                    vec![Some("Dialogue".to_string())]
                } else {
                    lines.iter().map(|l| Some(l.speaker.label().to_string())).collect()
                }
            }
        };

        let dest = self.settings.audio_dir().join(format!("{}.mp3", key.as_str()));
        self.muxer.mux(&clips, &dest, &chapter_titles).await
    }

    fn audio_cache_key(&self, chunks: &[Chunk], request: &GenerateAudioRequest) -> CacheKey {
        let mode = match request.mode() {
            ScriptMode::Narration => "narration",
            ScriptMode::Dialogue => "dialogue",
        };
        let voices = request.resolved_voices();
        let style = request.script_style();
        let count_str = chunks.len().to_string();
        CacheKey::from_fields(&[
            request.source.label().as_str(),
            mode,
            voices.speaker_a.as_str(),
            voices.speaker_b.as_str(),
            style.accent.as_deref().unwrap_or("default"),
            style.style.as_deref().unwrap_or("default"),
            style.expressiveness.as_deref().unwrap_or("default"),
            &count_str,
        ])
    }
}

/// Re-ingest and re-embed every PDF already saved in `document_library/` so
/// search and audio generation survive a process restart. Ingestion failures
/// for an individual file are logged and skipped rather than aborting the
/// whole startup.
async fn rebuild_index_from_library(
    settings: &Settings,
    ingestor: &Arc<dyn Ingestor>,
    embedder: &Arc<dyn Embedder>,
    index: &Arc<VectorIndex>,
) {
    let dir = settings.document_library_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("pdf") {
            continue;
        }

        let chunks = match ingestor.ingest(&path).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping document during startup rebuild");
                continue;
            }
        };
        if chunks.is_empty() {
            continue;
        }

        let filename = chunks[0].filename.clone();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = match embedder.embed(&texts).await {
            Ok(v) => v,
            Err(e) => {
                warn!(filename = %filename, error = %e, "skipping document embedding during startup rebuild");
                continue;
            }
        };

        if let Err(e) = index.add(chunks, vectors).await {
            warn!(filename = %filename, error = %e, "failed to add document to index during startup rebuild");
            continue;
        }
        info!(filename = %filename, "rebuilt document into index from library on startup");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_source_label_distinguishes_variants() {
        let text = AudioSource::Text("hello".to_string());
        let page = AudioSource::Page {
            filename: "a.pdf".to_string(),
            page_number: 3,
        };
        let doc = AudioSource::Document {
            filename: "a.pdf".to_string(),
        };
        assert_ne!(text.label(), page.label());
        assert_eq!(page.label(), "a.pdf#p3");
        assert_eq!(doc.label(), "a.pdf");
    }
}
