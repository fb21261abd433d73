//! Per-book chapter and verse-count metadata.
//!
//! Two sources implement [`ReferenceMetadataProvider`]: a precomputed
//! [`StaticMetadata`] snapshot and the live [`ScriptureStore`], which folds
//! every stored (chapter, verse) pair into a max-per-chapter map.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::scripture::{ScriptureStore, VOLUMES};

/// Chapter number → highest verse number, for one book.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterVerseIndex {
    pub chapters: Vec<u32>,
    pub verses_by_chapter: BTreeMap<u32, u32>,
}

impl ChapterVerseIndex {
    /// Rows with a chapter or verse below 1 are ignored.
    pub fn from_rows<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (i64, i64)>,
    {
        let mut verses_by_chapter: BTreeMap<u32, u32> = BTreeMap::new();
        for (chapter, verse) in rows {
            let (Ok(chapter), Ok(verse)) = (u32::try_from(chapter), u32::try_from(verse)) else {
                continue;
            };
            if chapter == 0 || verse == 0 {
                continue;
            }
            let max = verses_by_chapter.entry(chapter).or_insert(0);
            if verse > *max {
                *max = verse;
            }
        }
        Self::from_map(verses_by_chapter)
    }

    pub fn from_map(verses_by_chapter: BTreeMap<u32, u32>) -> Self {
        let verses_by_chapter: BTreeMap<u32, u32> = verses_by_chapter
            .into_iter()
            .filter(|(chapter, max)| *chapter >= 1 && *max >= 1)
            .collect();
        Self {
            chapters: verses_by_chapter.keys().copied().collect(),
            verses_by_chapter,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn verse_count(&self, chapter: u32) -> Option<u32> {
        self.verses_by_chapter.get(&chapter).copied()
    }

    /// Valid verse numbers `1..=max` for a chapter, empty if unknown.
    pub fn verses(&self, chapter: u32) -> Vec<u32> {
        self.verse_count(chapter)
            .map(|max| (1..=max).collect())
            .unwrap_or_default()
    }
}

pub trait ReferenceMetadataProvider {
    fn chapter_index(&self, book: &str) -> Result<ChapterVerseIndex, AnalysisError>;

    fn chapters(&self, book: &str) -> Result<Vec<u32>, AnalysisError> {
        Ok(self.chapter_index(book)?.chapters)
    }

    fn verse_count(&self, book: &str, chapter: u32) -> Result<Option<u32>, AnalysisError> {
        Ok(self.chapter_index(book)?.verse_count(chapter))
    }
}

fn no_chapters(book: &str) -> AnalysisError {
    tracing::warn!(book, "no chapters indexed for book");
    AnalysisError::NotFound("No chapters found for the provided book.".to_string())
}

impl ReferenceMetadataProvider for ScriptureStore {
    fn chapter_index(&self, book: &str) -> Result<ChapterVerseIndex, AnalysisError> {
        let index = ChapterVerseIndex::from_rows(self.chapter_rows(book)?);
        if index.is_empty() {
            return Err(no_chapters(book));
        }
        Ok(index)
    }
}

/// Precomputed snapshot of every book's chapter/verse table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticMetadata {
    #[serde(default)]
    pub volumes: BTreeMap<String, Vec<String>>,
    pub verses_by_chapter: BTreeMap<String, BTreeMap<u32, u32>>,
}

impl StaticMetadata {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading metadata snapshot {}", path.display()))?;
        let metadata: StaticMetadata = serde_json::from_str(&content)
            .with_context(|| format!("parsing metadata snapshot {}", path.display()))?;
        Ok(metadata)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content + "\n")?;
        Ok(())
    }

    /// Builds a snapshot by querying the live store for every canonical book.
    /// Books with no rows are skipped.
    pub fn from_store(store: &ScriptureStore) -> Result<Self, AnalysisError> {
        let mut metadata = StaticMetadata::default();
        for (volume, books) in VOLUMES {
            metadata.volumes.insert(
                volume.to_string(),
                books.iter().map(|b| b.to_string()).collect(),
            );
            for book in books.iter() {
                match store.chapter_index(book) {
                    Ok(index) => {
                        tracing::debug!(book, chapters = index.chapters.len(), "indexed book");
                        metadata
                            .verses_by_chapter
                            .insert(book.to_string(), index.verses_by_chapter);
                    }
                    Err(AnalysisError::NotFound(_)) => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(metadata)
    }
}

impl ReferenceMetadataProvider for StaticMetadata {
    fn chapter_index(&self, book: &str) -> Result<ChapterVerseIndex, AnalysisError> {
        let index = self
            .verses_by_chapter
            .get(book)
            .map(|map| ChapterVerseIndex::from_map(map.clone()))
            .unwrap_or_default();
        if index.is_empty() {
            return Err(no_chapters(book));
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripture::tests::sample_store;
    use pretty_assertions::assert_eq;

    #[test]
    fn folds_rows_into_max_per_chapter() {
        let index = ChapterVerseIndex::from_rows(vec![(2, 3), (1, 5), (2, 7), (1, 2), (0, 4), (3, -1)]);
        assert_eq!(index.chapters, vec![1, 2]);
        assert_eq!(index.verse_count(1), Some(5));
        assert_eq!(index.verse_count(2), Some(7));
        assert_eq!(index.verse_count(3), None);
        assert_eq!(index.verses(1), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn live_store_index() {
        let store = sample_store();
        assert_eq!(store.chapters("John").unwrap(), vec![3, 11]);
        assert_eq!(store.verse_count("John", 3).unwrap(), Some(17));
        assert_eq!(store.verse_count("John", 4).unwrap(), None);
    }

    #[test]
    fn unknown_book_is_not_found_not_empty() {
        let store = sample_store();
        assert!(matches!(store.chapter_index("Hezekiah"), Err(AnalysisError::NotFound(_))));

        let snapshot = StaticMetadata::default();
        assert!(matches!(snapshot.chapters("John"), Err(AnalysisError::NotFound(_))));
    }

    #[test]
    fn snapshot_round_trips_through_disk() {
        let store = sample_store();
        let snapshot = StaticMetadata::from_store(&store).unwrap();
        assert!(snapshot.verses_by_chapter.contains_key("John"));
        assert!(snapshot.verses_by_chapter.contains_key("3 John"));
        assert!(!snapshot.verses_by_chapter.contains_key("Genesis"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meta").join("scripture_metadata.json");
        snapshot.save(&path).unwrap();
        let loaded = StaticMetadata::load(&path).unwrap();
        assert_eq!(loaded.chapter_index("John").unwrap(), store.chapter_index("John").unwrap());
    }

    #[test]
    fn snapshot_parses_string_keyed_chapters() {
        let json = r#"{"versesByChapter":{"Jude":{"1":25}}}"#;
        let snapshot: StaticMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.verse_count("Jude", 1).unwrap(), Some(25));
    }
}
