//! UI-agnostic application state types
//!
//! This module contains the reference selection cascade, dropdown open/close
//! state and the bookkeeping around in-flight analyses. None of it depends on
//! a specific UI framework.

use crate::error::AnalysisError;
use crate::legend::Legend;
use crate::metadata::ChapterVerseIndex;
use crate::normalize::AnalysisResult;
use crate::scripture::{books_for_volume, ScriptureReference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStage {
    NoVolume,
    VolumeSelected,
    BookSelected,
    ChapterSelected,
    VerseSelected,
}

/// Volume → Book → Chapter → Verse, where every change clears what depends on it.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    volume: Option<String>,
    book: Option<String>,
    chapter: Option<u32>,
    verse: Option<u32>,
    book_options: Vec<String>,
    index: Option<ChapterVerseIndex>,
    verse_options: Vec<u32>,
    loading: bool,
    reference_error: Option<String>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_from_book(&mut self) {
        self.book = None;
        self.clear_from_chapter();
    }

    fn clear_from_chapter(&mut self) {
        self.chapter = None;
        self.verse = None;
        self.index = None;
        self.verse_options.clear();
        self.loading = false;
        self.reference_error = None;
    }

    pub fn select_volume(&mut self, volume: &str) -> Result<(), AnalysisError> {
        self.clear_from_book();
        self.volume = None;
        self.book_options.clear();

        let books = books_for_volume(volume)
            .ok_or_else(|| AnalysisError::Validation(format!("Unknown volume: {}", volume)))?;
        self.volume = Some(volume.to_string());
        self.book_options = books.iter().map(|b| b.to_string()).collect();
        Ok(())
    }

    /// Clears chapter and verse and marks metadata as loading. The caller
    /// fetches the book's chapter index and hands it to [`Self::apply_metadata`].
    pub fn select_book(&mut self, book: &str) -> Result<(), AnalysisError> {
        if self.volume.is_none() {
            return Err(AnalysisError::Validation("Please select a volume.".to_string()));
        }
        if !self.book_options.iter().any(|b| b == book) {
            return Err(AnalysisError::Validation(format!("Unknown book: {}", book)));
        }
        self.clear_from_chapter();
        self.book = Some(book.to_string());
        self.loading = true;
        Ok(())
    }

    /// Returns false when the metadata belongs to a book that is no longer selected.
    pub fn apply_metadata(
        &mut self,
        book: &str,
        metadata: Result<ChapterVerseIndex, AnalysisError>,
    ) -> bool {
        if self.book.as_deref() != Some(book) {
            tracing::debug!(book, "discarding metadata for deselected book");
            return false;
        }
        self.loading = false;

        match metadata {
            Ok(index) => {
                let only_chapter = match index.chapters.as_slice() {
                    [single] => Some(*single),
                    _ => None,
                };
                self.index = Some(index);
                self.reference_error = None;
                if let Some(chapter) = only_chapter {
                    // single-chapter books skip straight to verse selection
                    if let Err(e) = self.select_chapter(chapter) {
                        tracing::warn!(book, chapter, error = %e, "could not auto-select only chapter");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(book, error = %e, "failed to load reference metadata");
                self.index = None;
                self.chapter = None;
                self.verse = None;
                self.verse_options.clear();
                self.reference_error = Some(e.user_message());
            }
        }
        true
    }

    pub fn select_chapter(&mut self, chapter: u32) -> Result<(), AnalysisError> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| AnalysisError::Validation("Please select a book.".to_string()))?;
        let verses = index.verses(chapter);
        if verses.is_empty() {
            return Err(AnalysisError::Validation(
                "Please enter a valid chapter number.".to_string(),
            ));
        }

        self.chapter = Some(chapter);
        if verses.len() == 1 {
            self.verse = Some(1);
        } else if let Some(verse) = self.verse {
            if !verses.contains(&verse) {
                self.verse = None;
            }
        }
        self.verse_options = verses;
        Ok(())
    }

    pub fn select_verse(&mut self, verse: u32) -> Result<(), AnalysisError> {
        if self.chapter.is_none() {
            return Err(AnalysisError::Validation("Please select a chapter.".to_string()));
        }
        if !self.verse_options.contains(&verse) {
            return Err(AnalysisError::Validation(
                "Please enter a valid verse number.".to_string(),
            ));
        }
        self.verse = Some(verse);
        Ok(())
    }

    pub fn stage(&self) -> SelectionStage {
        match (&self.volume, &self.book, self.chapter, self.verse) {
            (None, _, _, _) => SelectionStage::NoVolume,
            (Some(_), None, _, _) => SelectionStage::VolumeSelected,
            (Some(_), Some(_), None, _) => SelectionStage::BookSelected,
            (Some(_), Some(_), Some(_), None) => SelectionStage::ChapterSelected,
            (Some(_), Some(_), Some(_), Some(_)) => SelectionStage::VerseSelected,
        }
    }

    pub fn volume(&self) -> Option<&str> {
        self.volume.as_deref()
    }

    pub fn book(&self) -> Option<&str> {
        self.book.as_deref()
    }

    pub fn chapter(&self) -> Option<u32> {
        self.chapter
    }

    pub fn verse(&self) -> Option<u32> {
        self.verse
    }

    pub fn book_options(&self) -> &[String] {
        &self.book_options
    }

    pub fn chapter_options(&self) -> &[u32] {
        self.index.as_ref().map(|i| i.chapters.as_slice()).unwrap_or(&[])
    }

    pub fn verse_options(&self) -> &[u32] {
        &self.verse_options
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn reference_error(&self) -> Option<&str> {
        self.reference_error.as_deref()
    }

    pub fn book_enabled(&self) -> bool {
        self.volume.is_some()
    }

    pub fn chapter_enabled(&self) -> bool {
        self.book.is_some() && !self.loading && !self.chapter_options().is_empty()
    }

    pub fn verse_enabled(&self) -> bool {
        self.chapter.is_some() && !self.verse_options.is_empty()
    }

    pub fn can_submit(&self) -> bool {
        self.stage() == SelectionStage::VerseSelected
    }

    /// The fully selected reference, if any.
    pub fn reference(&self) -> Option<ScriptureReference> {
        match (&self.book, self.chapter, self.verse) {
            (Some(book), Some(chapter), Some(verse)) => Some(ScriptureReference {
                book: book.clone(),
                chapter,
                verse,
            }),
            _ => None,
        }
    }

    /// The first missing selection, phrased for the user.
    pub fn missing_selection(&self) -> Option<AnalysisError> {
        let message = match self.stage() {
            SelectionStage::NoVolume => "Please select a volume.",
            SelectionStage::VolumeSelected => "Please select a book.",
            SelectionStage::BookSelected => "Please select a chapter.",
            SelectionStage::ChapterSelected => "Please select a verse.",
            SelectionStage::VerseSelected => return None,
        };
        Some(AnalysisError::Validation(message.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dropdown {
    Volume,
    Book,
}

/// At most one reference dropdown is open at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropdownState {
    open: Option<Dropdown>,
}

impl DropdownState {
    pub fn open(&mut self, dropdown: Dropdown) {
        self.open = Some(dropdown);
    }

    pub fn close(&mut self) {
        self.open = None;
    }

    pub fn toggle(&mut self, dropdown: Dropdown) {
        if self.open == Some(dropdown) {
            self.open = None;
        } else {
            self.open = Some(dropdown);
        }
    }

    /// Pointer went down outside the selector.
    pub fn pointer_left(&mut self) {
        self.close();
    }

    pub fn cancel_key(&mut self) {
        self.close();
    }

    pub fn is_open(&self, dropdown: Dropdown) -> bool {
        self.open == Some(dropdown)
    }

    pub fn current(&self) -> Option<Dropdown> {
        self.open
    }
}

/// A submitted analysis: what was asked, tagged so late replies can be recognised.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: u64,
    pub reference: ScriptureReference,
    pub legend: Legend,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Idle,
    Pending(ScriptureReference),
    Failed { message: String, retryable: bool },
    /// The model legitimately returned no colors.
    Empty(AnalysisResult),
    Ready(AnalysisResult),
}

#[derive(Debug, Clone)]
pub struct AnalysisSession {
    next_id: u64,
    last: Option<Submission>,
    outcome: Outcome,
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self {
            next_id: 1,
            last: None,
            outcome: Outcome::Idle,
        }
    }
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(&mut self, reference: ScriptureReference, legend: Legend) -> Submission {
        let submission = Submission {
            id: self.next_id,
            reference: reference.clone(),
            legend,
        };
        self.next_id += 1;
        self.last = Some(submission.clone());
        self.outcome = Outcome::Pending(reference);
        submission
    }

    /// Records a reply. Replies to superseded submissions, or for a reference
    /// that is no longer selected, are dropped and `false` is returned.
    pub fn complete(
        &mut self,
        submission_id: u64,
        current: Option<&ScriptureReference>,
        result: Result<AnalysisResult, AnalysisError>,
    ) -> bool {
        let Some(last) = &self.last else {
            return false;
        };
        if last.id != submission_id || current != Some(&last.reference) {
            tracing::debug!(submission_id, "discarding stale analysis reply");
            return false;
        }

        self.outcome = match result {
            Ok(result) if result.analysis.is_empty() => Outcome::Empty(result),
            Ok(result) => Outcome::Ready(result),
            Err(e) => Outcome::Failed {
                message: e.user_message(),
                retryable: e.is_retryable(),
            },
        };
        true
    }

    /// Replays the last submission's reference and legend under a new id.
    pub fn retry_request(&mut self) -> Option<Submission> {
        let last = self.last.clone()?;
        Some(self.submit(last.reference, last.legend))
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.outcome, Outcome::Pending(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn index(pairs: &[(u32, u32)]) -> ChapterVerseIndex {
        ChapterVerseIndex::from_map(pairs.iter().copied().collect::<BTreeMap<_, _>>())
    }

    fn at_book(volume: &str, book: &str, chapters: &[(u32, u32)]) -> SelectionState {
        let mut state = SelectionState::new();
        state.select_volume(volume).unwrap();
        state.select_book(book).unwrap();
        assert!(state.apply_metadata(book, Ok(index(chapters))));
        state
    }

    #[test]
    fn cascade_reaches_submittable() {
        let mut state = SelectionState::new();
        assert_eq!(state.stage(), SelectionStage::NoVolume);
        assert!(!state.book_enabled());

        state.select_volume("New Testament").unwrap();
        assert!(state.book_enabled());
        assert!(state.book_options().contains(&"John".to_string()));
        assert!(!state.chapter_enabled());

        state.select_book("John").unwrap();
        assert!(state.is_loading());
        assert!(!state.chapter_enabled());
        state.apply_metadata("John", Ok(index(&[(1, 51), (3, 36)])));
        assert!(state.chapter_enabled());
        assert!(!state.verse_enabled());

        state.select_chapter(3).unwrap();
        assert_eq!(state.verse_options().len(), 36);
        assert!(!state.can_submit());
        state.select_verse(16).unwrap();
        assert!(state.can_submit());
        assert_eq!(state.reference().unwrap().to_string(), "John 3:16");
    }

    #[test]
    fn new_volume_clears_everything_downstream() {
        let mut state = at_book("New Testament", "John", &[(3, 36)]);
        state.select_verse(16).unwrap();

        state.select_volume("New Testament").unwrap();
        assert_eq!(state.book(), None);
        assert_eq!(state.chapter(), None);
        assert_eq!(state.verse(), None);
        assert_eq!(state.stage(), SelectionStage::VolumeSelected);
    }

    #[test]
    fn new_book_clears_chapter_and_verse() {
        let mut state = at_book("New Testament", "John", &[(3, 36), (4, 54)]);
        state.select_chapter(3).unwrap();
        state.select_verse(16).unwrap();

        state.select_book("Mark").unwrap();
        assert_eq!(state.chapter(), None);
        assert_eq!(state.verse(), None);
        assert!(state.chapter_options().is_empty());
    }

    #[test]
    fn single_verse_chapter_auto_selects_verse_one() {
        let mut state = at_book("Old Testament", "Psalms", &[(116, 19), (117, 1)]);
        state.select_chapter(117).unwrap();
        assert_eq!(state.verse(), Some(1));
        assert!(state.can_submit());
    }

    #[test]
    fn chapter_change_keeps_verse_only_when_in_range() {
        let mut state = at_book("New Testament", "John", &[(3, 36), (11, 57), (21, 25)]);
        state.select_chapter(3).unwrap();
        state.select_verse(30).unwrap();

        state.select_chapter(11).unwrap();
        assert_eq!(state.verse(), Some(30));

        state.select_chapter(21).unwrap();
        assert_eq!(state.verse(), None);
    }

    #[test]
    fn single_chapter_book_auto_selects_chapter() {
        let state = at_book("New Testament", "Jude", &[(1, 25)]);
        assert_eq!(state.chapter(), Some(1));
        assert_eq!(state.verse(), None);
        assert!(state.verse_enabled());
    }

    #[test]
    fn stale_metadata_is_ignored() {
        let mut state = SelectionState::new();
        state.select_volume("New Testament").unwrap();
        state.select_book("John").unwrap();
        state.select_book("Mark").unwrap();
        assert!(!state.apply_metadata("John", Ok(index(&[(3, 36)]))));
        assert!(state.is_loading());
        assert!(state.chapter_options().is_empty());
    }

    #[test]
    fn metadata_failure_leaves_selectors_disabled() {
        let mut state = SelectionState::new();
        state.select_volume("New Testament").unwrap();
        state.select_book("Philemon").unwrap();
        state.apply_metadata(
            "Philemon",
            Err(AnalysisError::NotFound("No chapters found for the provided book.".to_string())),
        );
        assert!(!state.chapter_enabled());
        assert!(!state.verse_enabled());
        assert_eq!(
            state.reference_error(),
            Some("No chapters found for the provided book.")
        );
    }

    #[test]
    fn out_of_order_selection_is_rejected() {
        let mut state = SelectionState::new();
        assert!(state.select_book("John").is_err());
        assert!(state.select_chapter(3).is_err());
        assert!(state.select_verse(1).is_err());
        assert!(state.select_volume("Apocrypha").is_err());
        assert!(matches!(
            state.missing_selection(),
            Some(AnalysisError::Validation(msg)) if msg == "Please select a volume."
        ));
    }

    #[test]
    fn dropdown_commands() {
        let mut dropdown = DropdownState::default();
        dropdown.toggle(Dropdown::Volume);
        assert!(dropdown.is_open(Dropdown::Volume));
        dropdown.open(Dropdown::Book);
        assert!(!dropdown.is_open(Dropdown::Volume));
        dropdown.toggle(Dropdown::Book);
        assert_eq!(dropdown.current(), None);

        dropdown.open(Dropdown::Book);
        dropdown.pointer_left();
        assert_eq!(dropdown.current(), None);
        dropdown.open(Dropdown::Volume);
        dropdown.cancel_key();
        assert_eq!(dropdown.current(), None);
    }

    fn result_for(reference: &ScriptureReference, colors: usize) -> AnalysisResult {
        let raw = if colors == 0 {
            r#"{"analysis": []}"#.to_string()
        } else {
            r#"{"analysis": [{"colorLabel": "Red", "confidence": 100}]}"#.to_string()
        };
        crate::normalize::normalize_response(&raw, &Legend::default(), "text", reference.clone())
            .unwrap()
    }

    #[test]
    fn stale_replies_do_not_overwrite_newer_ones() {
        let john = ScriptureReference::new("John", 3, 16).unwrap();
        let mark = ScriptureReference::new("Mark", 1, 1).unwrap();
        let mut session = AnalysisSession::new();

        let first = session.submit(john.clone(), Legend::default());
        let second = session.submit(mark.clone(), Legend::default());

        assert!(!session.complete(first.id, Some(&mark), Ok(result_for(&john, 1))));
        assert!(session.is_pending());

        // selection moved on after submitting
        assert!(!session.complete(second.id, Some(&john), Ok(result_for(&mark, 1))));

        assert!(session.complete(second.id, Some(&mark), Ok(result_for(&mark, 1))));
        assert!(matches!(session.outcome(), Outcome::Ready(r) if r.analyzed_reference == mark));
    }

    #[test]
    fn empty_result_is_distinct_from_failure() {
        let john = ScriptureReference::new("John", 3, 16).unwrap();
        let mut session = AnalysisSession::new();

        let s = session.submit(john.clone(), Legend::default());
        session.complete(s.id, Some(&john), Ok(result_for(&john, 0)));
        assert!(matches!(session.outcome(), Outcome::Empty(_)));

        let s = session.submit(john.clone(), Legend::default());
        session.complete(s.id, Some(&john), Err(AnalysisError::Network("reset".to_string())));
        assert!(matches!(session.outcome(), Outcome::Failed { retryable: true, .. }));
    }

    #[test]
    fn retry_replays_last_submission_unchanged() {
        let john = ScriptureReference::new("John", 3, 16).unwrap();
        let mut session = AnalysisSession::new();
        assert!(session.retry_request().is_none());

        let mut legend = Legend::default();
        legend.set_meaning(0, "Worship").unwrap();
        let first = session.submit(john.clone(), legend.clone());
        let again = session.retry_request().unwrap();

        assert_ne!(again.id, first.id);
        assert_eq!(again.reference, john);
        assert_eq!(again.legend, legend);
        assert!(session.is_pending());
    }
}
