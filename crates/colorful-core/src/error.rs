//! Error taxonomy shared by every stage of the analysis pipeline.

use crate::scripture::ScriptureReference;

/// Every failure the pipeline can surface to a caller.
///
/// Variants carrying server-only detail (store, config, raw model output)
/// never expose that detail through [`AnalysisError::user_message`].
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("scripture not found: {0}")]
    NotFound(String),

    #[error("scripture store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("upstream AI service error: {0}")]
    UpstreamService(String),

    #[error("completion was not valid JSON")]
    InvalidResponseFormat { raw: String },

    #[error("completion lacked an analysis array")]
    InvalidAnalysisStructure { raw: String },

    #[error("network error: {0}")]
    Network(String),
}

impl AnalysisError {
    pub fn verse_not_found(reference: &ScriptureReference) -> Self {
        AnalysisError::NotFound(format!(
            "Verse not found: {}. Please check your input.",
            reference
        ))
    }

    /// Message that is safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::Validation(msg) => msg.clone(),
            AnalysisError::NotFound(msg) => msg.clone(),
            AnalysisError::StoreUnavailable(_) => "Failed to retrieve scripture text.".to_string(),
            AnalysisError::NotConfigured(what) => format!("{} is not configured.", what),
            AnalysisError::UpstreamService(msg) => format!("AI service error: {}", msg),
            AnalysisError::InvalidResponseFormat { .. } => {
                "Failed to process the analysis response. Invalid JSON format.".to_string()
            }
            AnalysisError::InvalidAnalysisStructure { .. } => {
                "Invalid analysis structure received from AI model.".to_string()
            }
            AnalysisError::Network(_) => {
                "Could not reach the service. Please try again.".to_string()
            }
        }
    }

    /// Whether a manual retry of the same request could reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AnalysisError::Network(_)
                | AnalysisError::UpstreamService(_)
                | AnalysisError::InvalidResponseFormat { .. }
                | AnalysisError::InvalidAnalysisStructure { .. }
        )
    }
}

impl From<rusqlite::Error> for AnalysisError {
    fn from(err: rusqlite::Error) -> Self {
        AnalysisError::StoreUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AnalysisError::Network(format!("request timed out: {}", err))
        } else {
            AnalysisError::Network(err.to_string())
        }
    }
}
