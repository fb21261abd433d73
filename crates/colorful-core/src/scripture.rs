use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Canonical volume → book ordering.
pub const VOLUMES: &[(&str, &[&str])] = &[
    (
        "Old Testament",
        &[
            "Genesis", "Exodus", "Leviticus", "Numbers", "Deuteronomy", "Joshua", "Judges",
            "Ruth", "1 Samuel", "2 Samuel", "1 Kings", "2 Kings", "1 Chronicles",
            "2 Chronicles", "Ezra", "Nehemiah", "Esther", "Job", "Psalms", "Proverbs",
            "Ecclesiastes", "Song of Solomon", "Isaiah", "Jeremiah", "Lamentations", "Ezekiel",
            "Daniel", "Hosea", "Joel", "Amos", "Obadiah", "Jonah", "Micah", "Nahum",
            "Habakkuk", "Zephaniah", "Haggai", "Zechariah", "Malachi",
        ],
    ),
    (
        "New Testament",
        &[
            "Matthew", "Mark", "Luke", "John", "Acts", "Romans", "1 Corinthians",
            "2 Corinthians", "Galatians", "Ephesians", "Philippians", "Colossians",
            "1 Thessalonians", "2 Thessalonians", "1 Timothy", "2 Timothy", "Titus",
            "Philemon", "Hebrews", "James", "1 Peter", "2 Peter", "1 John", "2 John", "3 John",
            "Jude", "Revelation",
        ],
    ),
    (
        "Book of Mormon",
        &[
            "1 Nephi", "2 Nephi", "Jacob", "Enos", "Jarom", "Omni", "Words of Mormon", "Mosiah",
            "Alma", "Helaman", "3 Nephi", "4 Nephi", "Mormon", "Ether", "Moroni",
        ],
    ),
    ("Doctrine and Covenants", &["Doctrine and Covenants"]),
    (
        "Pearl of Great Price",
        &[
            "Moses", "Abraham", "Joseph Smith--Matthew", "Joseph Smith--History",
            "Articles of Faith",
        ],
    ),
];

pub fn volumes() -> Vec<&'static str> {
    VOLUMES.iter().map(|(volume, _)| *volume).collect()
}

pub fn books_for_volume(volume: &str) -> Option<&'static [&'static str]> {
    VOLUMES
        .iter()
        .find(|(name, _)| *name == volume)
        .map(|(_, books)| *books)
}

/// One verse record in the canonical scripture dump.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Scripture {
    pub volume_title: String,
    pub book_title: String,
    pub book_short_title: String,
    pub chapter_number: i32,
    pub verse_number: i32,
    pub verse_title: String,
    pub verse_short_title: String,
    pub scripture_text: String,
}

/// A (book, chapter, verse) triple identifying exactly one verse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawReference")]
pub struct ScriptureReference {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
}

#[derive(Deserialize)]
struct RawReference {
    book: String,
    chapter: i64,
    verse: i64,
}

impl TryFrom<RawReference> for ScriptureReference {
    type Error = AnalysisError;

    fn try_from(raw: RawReference) -> Result<Self, Self::Error> {
        ScriptureReference::new(&raw.book, raw.chapter, raw.verse)
    }
}

impl ScriptureReference {
    /// Validates before any store query can be issued.
    pub fn new(book: &str, chapter: i64, verse: i64) -> Result<Self, AnalysisError> {
        let book = book.trim();
        if book.is_empty() {
            return Err(AnalysisError::Validation("Please select a book.".to_string()));
        }
        let chapter = u32::try_from(chapter)
            .ok()
            .filter(|c| *c >= 1)
            .ok_or_else(|| {
                AnalysisError::Validation("Please enter a valid chapter number.".to_string())
            })?;
        let verse = u32::try_from(verse)
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| {
                AnalysisError::Validation("Please enter a valid verse number.".to_string())
            })?;

        Ok(Self {
            book: book.to_string(),
            chapter,
            verse,
        })
    }

    /// Parses chapter and verse from raw form/query input.
    pub fn parse(book: &str, chapter: &str, verse: &str) -> Result<Self, AnalysisError> {
        let chapter: i64 = chapter.trim().parse().map_err(|_| {
            AnalysisError::Validation("Please enter a valid chapter number.".to_string())
        })?;
        let verse: i64 = verse.trim().parse().map_err(|_| {
            AnalysisError::Validation("Please enter a valid verse number.".to_string())
        })?;
        Self::new(book, chapter, verse)
    }
}

impl fmt::Display for ScriptureReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse)
    }
}

/// SQLite-backed verse store.
pub struct ScriptureStore {
    conn: Mutex<Connection>,
}

impl ScriptureStore {
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, AnalysisError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, AnalysisError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scriptures (
                volume_title      TEXT NOT NULL,
                book_title        TEXT NOT NULL,
                book_short_title  TEXT NOT NULL DEFAULT '',
                chapter_number    INTEGER NOT NULL,
                verse_number      INTEGER NOT NULL,
                verse_title       TEXT NOT NULL DEFAULT '',
                verse_short_title TEXT NOT NULL DEFAULT '',
                scripture_text    TEXT NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS scriptures_reference
                ON scriptures (book_title, chapter_number, verse_number);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AnalysisError> {
        self.conn
            .lock()
            .map_err(|_| AnalysisError::StoreUnavailable("connection lock poisoned".to_string()))
    }

    /// Loads the canonical JSON dump (an array of verse records).
    pub async fn import_json(&self, path: &Path) -> Result<usize> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        let records: Vec<Scripture> = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        let imported = self.import_records(&records)?;
        tracing::info!(imported, path = %path.display(), "imported scriptures");
        Ok(imported)
    }

    pub fn import_records(&self, records: &[Scripture]) -> Result<usize, AnalysisError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO scriptures (
                    volume_title, book_title, book_short_title, chapter_number,
                    verse_number, verse_title, verse_short_title, scripture_text
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for s in records {
                stmt.execute(params![
                    s.volume_title,
                    s.book_title,
                    s.book_short_title,
                    s.chapter_number,
                    s.verse_number,
                    s.verse_title,
                    s.verse_short_title,
                    s.scripture_text,
                ])?;
            }
        }
        tx.commit()?;
        Ok(records.len())
    }

    pub fn verse_text(&self, reference: &ScriptureReference) -> Result<String, AnalysisError> {
        let conn = self.conn()?;
        let text: Option<String> = conn
            .query_row(
                "SELECT scripture_text FROM scriptures
                 WHERE book_title = ?1 AND chapter_number = ?2 AND verse_number = ?3
                 LIMIT 1",
                params![reference.book, reference.chapter, reference.verse],
                |row| row.get(0),
            )
            .optional()?;

        match text {
            Some(text) => Ok(text),
            None => {
                tracing::warn!(%reference, "verse not found in store");
                Err(AnalysisError::verse_not_found(reference))
            }
        }
    }

    /// Every (chapter, verse) pair stored for a book.
    pub fn chapter_rows(&self, book: &str) -> Result<Vec<(i64, i64)>, AnalysisError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT chapter_number, verse_number FROM scriptures WHERE book_title = ?1",
        )?;
        let rows = stmt
            .query_map(params![book], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn record_count(&self) -> Result<usize, AnalysisError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM scriptures", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
