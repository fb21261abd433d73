//! The verse → prompt → completion → normalized result pipeline.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ai::CompletionClient;
use crate::error::AnalysisError;
use crate::legend::{Legend, LegendMeaning};
use crate::metadata::{ChapterVerseIndex, ReferenceMetadataProvider};
use crate::normalize::{normalize_response, AnalysisResult};
use crate::prompt::build_prompt;
use crate::scripture::{ScriptureReference, ScriptureStore};

/// One legend entry as submitted with an analyze request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeItem {
    pub label: String,
    pub meaning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Body of an analyze request. `chapter` and `verse` are kept loose so that
/// out-of-range numbers reach validation instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub book: String,
    pub chapter: i64,
    pub verse: i64,
    pub color_scheme: Vec<SchemeItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripture_text: Option<String>,
}

impl AnalyzeRequest {
    pub fn reference(&self) -> Result<ScriptureReference, AnalysisError> {
        ScriptureReference::new(&self.book, self.chapter, self.verse)
    }

    pub fn legend(&self) -> Result<Legend, AnalysisError> {
        Legend::new(
            self.color_scheme
                .iter()
                .cloned()
                .map(|item| {
                    LegendMeaning {
                        label: item.label,
                        meaning: item.meaning,
                    }
                    .into_entry(item.value)
                })
                .collect(),
        )
    }
}

/// Looks up a verse on the blocking pool.
pub async fn fetch_verse_text(
    store: Arc<ScriptureStore>,
    reference: ScriptureReference,
) -> Result<String, AnalysisError> {
    tokio::task::spawn_blocking(move || store.verse_text(&reference))
        .await
        .map_err(|e| AnalysisError::StoreUnavailable(format!("lookup task failed: {}", e)))?
}

pub async fn fetch_chapter_index<P>(
    provider: Arc<P>,
    book: String,
) -> Result<ChapterVerseIndex, AnalysisError>
where
    P: ReferenceMetadataProvider + Send + Sync + ?Sized + 'static,
{
    tokio::task::spawn_blocking(move || provider.chapter_index(&book))
        .await
        .map_err(|e| AnalysisError::StoreUnavailable(format!("metadata task failed: {}", e)))?
}

pub struct Analyzer {
    store: Arc<ScriptureStore>,
    completion: CompletionClient,
}

impl Analyzer {
    pub fn new(store: Arc<ScriptureStore>, completion: CompletionClient) -> Self {
        Self { store, completion }
    }

    /// Fetch, prompt, complete and normalize, strictly in that order.
    pub async fn analyze(
        &self,
        reference: ScriptureReference,
        legend: &Legend,
    ) -> Result<AnalysisResult, AnalysisError> {
        let scripture_text = fetch_verse_text(Arc::clone(&self.store), reference.clone()).await?;
        let prompt = build_prompt(&scripture_text, &legend.meanings());

        let raw = self.completion.complete(&prompt).await?;
        let result = normalize_response(&raw, legend, &scripture_text, reference)?;

        tracing::info!(
            reference = %result.analyzed_reference,
            colors = result.analysis.len(),
            top = result.analysis.first().map(|a| a.item.color_label.as_str()).unwrap_or("-"),
            "analysis complete"
        );
        Ok(result)
    }

    pub async fn analyze_request(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, AnalysisError> {
        let reference = request.reference()?;
        let legend = request.legend()?;
        if request.scripture_text.is_some() {
            tracing::debug!(%reference, "ignoring client-supplied scripture text");
        }
        self.analyze(reference, &legend).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{OllamaClient, ProviderClient};
    use crate::scripture::tests::sample_store;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn ollama_replying(reply: &str) -> (MockServer, Analyzer) {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": reply,
                "done": true
            })))
            .mount(&server)
            .await;
        let completion = CompletionClient::new(
            ProviderClient::Ollama(OllamaClient::new(&server.uri())),
            "llama3.2:latest",
        );
        (server, Analyzer::new(Arc::new(sample_store()), completion))
    }

    fn red_blue_request(book: &str, chapter: i64, verse: i64) -> AnalyzeRequest {
        AnalyzeRequest {
            book: book.to_string(),
            chapter,
            verse,
            color_scheme: vec![
                SchemeItem {
                    label: "Red".to_string(),
                    meaning: "Sin".to_string(),
                    value: None,
                },
                SchemeItem {
                    label: "Blue".to_string(),
                    meaning: "Wisdom".to_string(),
                    value: None,
                },
            ],
            scripture_text: Some("client supplied text".to_string()),
        }
    }

    #[tokio::test]
    async fn john_3_16_end_to_end() {
        let reply = serde_json::json!({
            "scriptureText": "In the beginning was the Word",
            "analysis": [
                {"colorLabel": "Blue", "colorMeaning": "Wisdom", "confidence": 70, "justification": "..."},
                {"colorLabel": "Red", "colorMeaning": "Sin", "confidence": 30, "justification": "..."}
            ],
            "primaryThemeReasoning": null
        })
        .to_string();
        let (_server, analyzer) = ollama_replying(&reply).await;

        let result = analyzer
            .analyze_request(&red_blue_request("John", 3, 16))
            .await
            .unwrap();

        assert_eq!(result.scripture_text, "For God so loved the world...");
        let ranked: Vec<_> = result
            .analysis
            .iter()
            .map(|a| (a.item.color_label.as_str(), a.normalized_confidence, a.color_value.as_str()))
            .collect();
        assert_eq!(ranked, vec![("Blue", 70, "blue"), ("Red", 30, "red")]);
    }

    #[tokio::test]
    async fn prompt_carries_stored_text_and_legend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("Jesus wept."))
            .and(body_string_contains("- Red: Sin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "{\"analysis\": []}"
            })))
            .expect(1)
            .mount(&server)
            .await;
        let completion = CompletionClient::new(
            ProviderClient::Ollama(OllamaClient::new(&server.uri())),
            "llama3.2:latest",
        );
        let analyzer = Analyzer::new(Arc::new(sample_store()), completion);

        let result = analyzer
            .analyze_request(&red_blue_request("John", 11, 35))
            .await
            .unwrap();
        assert!(result.analysis.is_empty());
    }

    #[tokio::test]
    async fn invalid_reference_never_reaches_the_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let completion = CompletionClient::new(
            ProviderClient::Ollama(OllamaClient::new(&server.uri())),
            "m",
        );
        let analyzer = Analyzer::new(Arc::new(sample_store()), completion);

        for (chapter, verse) in [(0, 16), (3, -1)] {
            let err = analyzer
                .analyze_request(&red_blue_request("John", chapter, verse))
                .await
                .unwrap_err();
            assert!(matches!(err, AnalysisError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn unknown_verse_is_not_found_before_completion() {
        let (_server, analyzer) = ollama_replying("{}").await;
        let err = analyzer
            .analyze_request(&red_blue_request("John", 3, 99))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound(_)));
    }

    #[tokio::test]
    async fn empty_color_scheme_is_rejected() {
        let (_server, analyzer) = ollama_replying("{}").await;
        let mut request = red_blue_request("John", 3, 16);
        request.color_scheme.clear();
        assert!(matches!(
            analyzer.analyze_request(&request).await,
            Err(AnalysisError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn chapter_index_runs_off_the_async_runtime() {
        let store = Arc::new(sample_store());
        let index = fetch_chapter_index(store.clone(), "John".to_string()).await.unwrap();
        assert_eq!(index.chapters, vec![3, 11]);
        assert!(matches!(
            fetch_chapter_index(store, "Enoch".to_string()).await,
            Err(AnalysisError::NotFound(_))
        ));
    }
}
