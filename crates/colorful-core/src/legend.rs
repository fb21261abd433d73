//! The user's color legend and its on-disk persistence.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// Attached when a model label does not match any legend entry.
pub const FALLBACK_COLOR: &str = "#6366f1";

pub const LEGEND_FILE_NAME: &str = "colorfulScriptures.colorScheme.json";

/// Highlight colors the legend editor knows how to render.
pub const PALETTE: &[&str] = &[
    "red", "orange", "yellow", "green", "lightblue", "blue", "purple", "pink", "brown", "white",
    "gray", "black",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorLegendEntry {
    pub label: String,
    pub value: String,
    pub meaning: String,
}

impl ColorLegendEntry {
    pub fn new(label: &str, value: &str, meaning: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
            meaning: meaning.to_string(),
        }
    }
}

/// The (label, meaning) pair sent to the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegendMeaning {
    pub label: String,
    pub meaning: String,
}

impl LegendMeaning {
    /// Palette labels map to their lowercase token; anything else gets [`FALLBACK_COLOR`].
    pub fn into_entry(self, value: Option<String>) -> ColorLegendEntry {
        let value = value.filter(|v| !v.trim().is_empty()).unwrap_or_else(|| {
            let lowered = self.label.to_lowercase();
            if PALETTE.contains(&lowered.as_str()) {
                lowered
            } else {
                FALLBACK_COLOR.to_string()
            }
        });
        ColorLegendEntry {
            label: self.label,
            value,
            meaning: self.meaning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Legend {
    entries: Vec<ColorLegendEntry>,
}

impl Default for Legend {
    fn default() -> Self {
        Self {
            entries: vec![
                ColorLegendEntry::new("Purple", "purple", "Prayer, Praise, Blessing, Worship"),
                ColorLegendEntry::new("Yellow", "yellow", "God, Jesus, Holy Spirit"),
                ColorLegendEntry::new("Blue", "blue", "Wisdom, Teaching, Instruction"),
                ColorLegendEntry::new("Green", "green", "Growth, New Life, Faith"),
                ColorLegendEntry::new("Red", "red", "Evil, Sin, Temptation, Death"),
                ColorLegendEntry::new(
                    "Pink",
                    "pink",
                    "Grace, Salvation, Love, Compassion, Repentance",
                ),
                ColorLegendEntry::new("Orange", "orange", "Laws, History, Genealogies, Numbers"),
            ],
        }
    }
}

impl Legend {
    pub fn new(entries: Vec<ColorLegendEntry>) -> Result<Self, AnalysisError> {
        if entries.is_empty() {
            return Err(AnalysisError::Validation(
                "Missing or invalid colorScheme array.".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ColorLegendEntry] {
        &self.entries
    }

    pub fn meanings(&self) -> Vec<LegendMeaning> {
        self.entries
            .iter()
            .map(|e| LegendMeaning {
                label: e.label.clone(),
                meaning: e.meaning.clone(),
            })
            .collect()
    }

    /// Exact label match; unknown labels get [`FALLBACK_COLOR`].
    pub fn color_for_label(&self, label: &str) -> &str {
        self.entries
            .iter()
            .find(|e| e.label == label)
            .map(|e| e.value.as_str())
            .unwrap_or(FALLBACK_COLOR)
    }

    pub fn set_meaning(&mut self, index: usize, meaning: &str) -> Result<(), AnalysisError> {
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| AnalysisError::Validation(format!("No legend entry at {}", index)))?;
        entry.meaning = meaning.to_string();
        Ok(())
    }

    /// Reassigns an entry's color. A value already held by another entry is refused.
    pub fn assign_value(&mut self, index: usize, value: &str, label: &str) -> Result<(), AnalysisError> {
        if self
            .entries
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.value == value)
        {
            return Err(AnalysisError::Validation(format!(
                "{} is already used in this legend.",
                label
            )));
        }
        let entry = self
            .entries
            .get_mut(index)
            .ok_or_else(|| AnalysisError::Validation(format!("No legend entry at {}", index)))?;
        entry.value = value.to_string();
        entry.label = label.to_string();
        Ok(())
    }

    /// Palette colors not yet assigned to any entry.
    pub fn unused_colors(&self) -> Vec<&'static str> {
        PALETTE
            .iter()
            .copied()
            .filter(|c| !self.entries.iter().any(|e| e.value == *c))
            .collect()
    }
}

/// Persists the legend as a JSON array under a namespaced file.
pub struct LegendStore {
    path: PathBuf,
}

impl LegendStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_config_dir() -> Result<Self> {
        let config_dir =
            dirs::config_dir().ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(Self::new(
            config_dir.join("colorful-scriptures").join(LEGEND_FILE_NAME),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Falls back to the default legend when the file is missing or malformed.
    pub fn load(&self) -> Legend {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Legend::default(),
        };

        match parse_saved_legend(&content) {
            Some(legend) => legend,
            None => {
                tracing::warn!(path = %self.path.display(), "ignoring invalid saved legend");
                Legend::default()
            }
        }
    }

    pub fn save(&self, legend: &Legend) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(legend)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

fn parse_saved_legend(content: &str) -> Option<Legend> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    let items = value.as_array()?;
    let valid = items.iter().all(|item| {
        ["label", "value", "meaning"]
            .iter()
            .all(|key| item.get(key).map(|v| v.is_string()).unwrap_or(false))
    });
    if !valid {
        return None;
    }
    let entries: Vec<ColorLegendEntry> = serde_json::from_value(value).ok()?;
    Legend::new(entries).ok()
}
