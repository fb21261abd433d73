//! HTTP routes consumed by the browser UI.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    routing::{get, post},
    Json, Router,
};
use colorful_core::analysis::{fetch_chapter_index, fetch_verse_text};
use colorful_core::{
    AnalysisError, AnalysisResult, AnalyzeRequest, Analyzer, ChapterVerseIndex, CompletionClient,
    Config, ScriptureReference, ScriptureStore, StaticMetadata,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;

/// Shared application state. Each part is optional so the server can start
/// with partial configuration; routes that need a missing part answer 500.
#[derive(Clone, Default)]
pub struct AppState {
    pub store: Option<Arc<ScriptureStore>>,
    pub metadata: Option<Arc<StaticMetadata>>,
    pub completion: Option<CompletionClient>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let store = match config.database_path() {
            Ok(path) => match ScriptureStore::open(path) {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "failed to open scripture store");
                    None
                }
            },
            Err(_) => {
                tracing::warn!("no database path configured");
                None
            }
        };

        let metadata = config
            .metadata_path
            .as_deref()
            .and_then(|path| match StaticMetadata::load(path) {
                Ok(metadata) => Some(Arc::new(metadata)),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring metadata snapshot, falling back to live queries");
                    None
                }
            });

        let completion = match CompletionClient::from_config(config) {
            Ok(client) => {
                tracing::info!(
                    provider = client.provider().display_name(),
                    model = client.model(),
                    "completion client ready"
                );
                Some(client)
            }
            Err(_) => None,
        };

        Self {
            store,
            metadata,
            completion,
        }
    }

    fn store(&self) -> Result<Arc<ScriptureStore>, AnalysisError> {
        self.store
            .clone()
            .ok_or(AnalysisError::NotConfigured("Database connection"))
    }

    fn analyzer(&self) -> Result<Analyzer, AnalysisError> {
        let store = self.store()?;
        let completion = self
            .completion
            .clone()
            .ok_or(AnalysisError::NotConfigured("AI API key"))?;
        Ok(Analyzer::new(store, completion))
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/reference-metadata", get(reference_metadata))
        .route("/verse-text", get(verse_text))
        .route("/analyze", post(analyze))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct MetadataQuery {
    book: Option<String>,
}

async fn reference_metadata(
    State(state): State<AppState>,
    query: Result<Query<MetadataQuery>, QueryRejection>,
) -> Result<Json<ChapterVerseIndex>, ApiError> {
    let Query(query) = query?;
    let book = query
        .book
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing book parameter.".to_string()))?;

    let index = match &state.metadata {
        Some(snapshot) => fetch_chapter_index(Arc::clone(snapshot), book).await?,
        None => fetch_chapter_index(state.store()?, book).await?,
    };
    Ok(Json(index))
}

#[derive(Debug, Deserialize)]
pub struct VerseQuery {
    book: Option<String>,
    chapter: Option<String>,
    verse: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerseTextResponse {
    pub scripture_text: String,
}

async fn verse_text(
    State(state): State<AppState>,
    query: Result<Query<VerseQuery>, QueryRejection>,
) -> Result<Json<VerseTextResponse>, ApiError> {
    let Query(query) = query?;
    let reference = ScriptureReference::parse(
        query.book.as_deref().unwrap_or_default(),
        query.chapter.as_deref().unwrap_or_default(),
        query.verse.as_deref().unwrap_or_default(),
    )?;

    let scripture_text = fetch_verse_text(state.store()?, reference).await?;
    Ok(Json(VerseTextResponse { scripture_text }))
}

async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(request) = payload?;
    let reference = request.reference()?;
    let legend = request.legend()?;
    if request.scripture_text.is_some() {
        tracing::debug!(%reference, "ignoring client-supplied scripture text");
    }

    let result = state.analyzer()?.analyze(reference, &legend).await?;
    Ok(Json(result))
}
