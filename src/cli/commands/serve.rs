//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for ingestion, retrieval, audio generation and
//! insights.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::{
    AudioSource, CrossInsightsRequest, GenerateAudioRequest, IngestRequest, InsightsRequest, Pipeline, SearchRequest,
    SearchSource,
};
use crate::script::VoiceConfig;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
struct AppState {
    pipeline: Pipeline,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_settings(settings).await?;
    let state = Arc::new(AppState { pipeline });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/ingest", post(ingest))
        .route("/search", post(search))
        .route("/generate-audio", post(generate_audio))
        .route("/insights", post(insights))
        .route("/cross-insights", post(cross_insights))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Pagevoice API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ingest", "POST /ingest");
    Output::kv("Search", "POST /search");
    Output::kv("Generate audio", "POST /generate-audio");
    Output::kv("Insights", "POST /insights");
    Output::kv("Cross insights", "POST /cross-insights");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct IngestApiRequest {
    path: String,
}

#[derive(Serialize)]
struct IngestApiResponse {
    filename: String,
    chunk_count: usize,
}

/// Exactly one of `text` or `filename` must be set. When `filename` is set
/// without `page_number`, the search reuses the whole document's chunks is
/// not supported here (search always operates over a single query vector);
/// `page_number` selects the already-indexed page whose stored embedding is
/// reused as the query.
#[derive(Deserialize)]
struct SearchApiRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    fetch_k: Option<usize>,
    #[serde(default)]
    min_score: Option<f32>,
    #[serde(default)]
    exclude_self: bool,
}

fn default_limit() -> usize {
    5
}

fn parse_search_source(req: &SearchApiRequest) -> Result<SearchSource, String> {
    match (&req.text, &req.filename, req.page_number) {
        (Some(text), None, None) => Ok(SearchSource::Text(text.clone())),
        (None, Some(filename), Some(page_number)) => Ok(SearchSource::Page {
            filename: filename.clone(),
            page_number,
        }),
        _ => Err("provide exactly one of `text` or `filename`+`page_number`".to_string()),
    }
}

#[derive(Serialize)]
struct SearchApiResponse {
    results: Vec<SearchResultApi>,
}

#[derive(Serialize)]
struct SearchResultApi {
    filename: String,
    page_number: u32,
    score: f32,
    content: String,
}

/// Exactly one of `text`, `filename`+`page_number`, or `filename`+
/// `entire_pdf: true` must be set.
#[derive(Deserialize)]
struct GenerateAudioApiRequest {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    entire_pdf: bool,
    #[serde(default)]
    podcast: bool,
    #[serde(default)]
    two_speakers: bool,
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    accent: Option<String>,
    #[serde(default)]
    expressiveness: Option<String>,
    speaker_a_voice: String,
    speaker_b_voice: String,
    #[serde(default)]
    speakers_override: Option<HashMap<String, String>>,
}

fn parse_audio_source(req: &GenerateAudioApiRequest) -> Result<AudioSource, String> {
    match (&req.text, &req.filename, req.page_number, req.entire_pdf) {
        (Some(text), None, None, false) => Ok(AudioSource::Text(text.clone())),
        (None, Some(filename), Some(page_number), false) => Ok(AudioSource::Page {
            filename: filename.clone(),
            page_number,
        }),
        (None, Some(filename), None, true) => Ok(AudioSource::Document {
            filename: filename.clone(),
        }),
        _ => Err("provide exactly one of `text`, `filename`+`page_number`, or `filename`+`entire_pdf: true`".to_string()),
    }
}

#[derive(Serialize)]
struct GenerateAudioApiResponse {
    path: String,
    duration_seconds: f64,
    chapter_count: usize,
    degraded: bool,
}

#[derive(Deserialize)]
struct InsightsApiRequest {
    subject: String,
    #[serde(default)]
    filenames: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct CrossInsightsApiRequest {
    filenames: Vec<String>,
    focus: String,
}

#[derive(Serialize)]
struct InsightsApiResponse {
    insights: String,
    sources: Vec<SourceApi>,
}

#[derive(Serialize)]
struct CrossInsightsApiResponse {
    agreements: Vec<ClaimApi>,
    contradictions: Vec<ClaimApi>,
    sources: Vec<SourceApi>,
}

#[derive(Serialize)]
struct ClaimApi {
    text: String,
    citations: Vec<CitationApi>,
}

#[derive(Serialize)]
struct CitationApi {
    filename: String,
    page_number: u32,
}

impl From<crate::insights::Claim> for ClaimApi {
    fn from(claim: crate::insights::Claim) -> Self {
        Self {
            text: claim.text,
            citations: claim
                .citations
                .into_iter()
                .map(|c| CitationApi {
                    filename: c.filename,
                    page_number: c.page_number,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct SourceApi {
    filename: String,
    page_number: u32,
    score: f32,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn ingest(State(state): State<Arc<AppState>>, Json(req): Json<IngestApiRequest>) -> impl IntoResponse {
    match state
        .pipeline
        .ingest(IngestRequest {
            path: std::path::PathBuf::from(req.path),
        })
        .await
    {
        Ok(response) => Json(IngestApiResponse {
            filename: response.filename,
            chunk_count: response.chunk_count,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() })).into_response(),
    }
}

async fn search(State(state): State<Arc<AppState>>, Json(req): Json<SearchApiRequest>) -> impl IntoResponse {
    let source = match parse_search_source(&req) {
        Ok(source) => source,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })).into_response(),
    };

    match state
        .pipeline
        .search(SearchRequest {
            source,
            k: req.limit,
            fetch_k: req.fetch_k,
            min_score: req.min_score,
            exclude_self: req.exclude_self,
        })
        .await
    {
        Ok(hits) => Json(SearchApiResponse {
            results: hits
                .into_iter()
                .map(|h| SearchResultApi {
                    filename: h.chunk.filename,
                    page_number: h.chunk.page_number,
                    score: h.score,
                    content: h.chunk.text,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() })).into_response(),
    }
}

async fn generate_audio(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateAudioApiRequest>,
) -> impl IntoResponse {
    let source = match parse_audio_source(&req) {
        Ok(source) => source,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })).into_response(),
    };

    match state
        .pipeline
        .generate_audio(GenerateAudioRequest {
            source,
            podcast: req.podcast,
            two_speakers: req.two_speakers,
            accent: req.accent,
            style: req.style,
            expressiveness: req.expressiveness,
            voices: VoiceConfig {
                speaker_a: req.speaker_a_voice,
                speaker_b: req.speaker_b_voice,
            },
            speakers_override: req.speakers_override,
        })
        .await
    {
        Ok(artifact) => Json(GenerateAudioApiResponse {
            path: artifact.path.to_string_lossy().to_string(),
            duration_seconds: artifact.duration_seconds,
            chapter_count: artifact.chapters.len(),
            degraded: artifact.degraded,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() })).into_response(),
    }
}

async fn insights(State(state): State<Arc<AppState>>, Json(req): Json<InsightsApiRequest>) -> impl IntoResponse {
    match state
        .pipeline
        .insights(InsightsRequest {
            subject: req.subject,
            filenames: req.filenames,
        })
        .await
    {
        Ok(response) => Json(InsightsApiResponse {
            insights: response.insights,
            sources: response
                .sources
                .into_iter()
                .map(|s| SourceApi {
                    filename: s.filename,
                    page_number: s.page_number,
                    score: s.score,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() })).into_response(),
    }
}

async fn cross_insights(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CrossInsightsApiRequest>,
) -> impl IntoResponse {
    match state
        .pipeline
        .cross_insights(CrossInsightsRequest {
            filenames: req.filenames,
            focus: req.focus,
        })
        .await
    {
        Ok(response) => Json(CrossInsightsApiResponse {
            agreements: response.agreements.into_iter().map(ClaimApi::from).collect(),
            contradictions: response.contradictions.into_iter().map(ClaimApi::from).collect(),
            sources: response
                .sources
                .into_iter()
                .map(|s| SourceApi {
                    filename: s.filename,
                    page_number: s.page_number,
                    score: s.score,
                })
                .collect(),
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: e.to_string() })).into_response(),
    }
}
