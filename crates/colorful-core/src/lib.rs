pub mod ai;
pub mod analysis;
pub mod config;
pub mod error;
pub mod legend;
pub mod metadata;
pub mod normalize;
pub mod prompt;
pub mod provider;
pub mod scripture;
pub mod state;
pub mod typewriter;

// Re-export main types for convenience
pub use ai::{ClaudeClient, CompletionClient, GeminiClient, OllamaClient, OpenAIClient, ProviderClient};
pub use analysis::{AnalyzeRequest, Analyzer, SchemeItem};
pub use config::Config;
pub use error::AnalysisError;
pub use legend::{ColorLegendEntry, Legend, LegendMeaning, LegendStore, FALLBACK_COLOR};
pub use metadata::{ChapterVerseIndex, ReferenceMetadataProvider, StaticMetadata};
pub use normalize::{normalize_response, AnalysisResult, NormalizedAnalysisItem, RawAnalysisItem};
pub use prompt::build_prompt;
pub use provider::Provider;
pub use scripture::{Scripture, ScriptureReference, ScriptureStore};
pub use state::{AnalysisSession, DropdownState, Outcome, SelectionState};
pub use typewriter::Typewriter;
