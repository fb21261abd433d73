//! Turns raw completion text into a validated, ranked analysis.
//!
//! Confidences are normalized over every returned item in the order the
//! model gave them (the last item absorbs the rounding remainder), then the
//! items are stably sorted by normalized confidence and cut to the top two.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AnalysisError;
use crate::legend::Legend;
use crate::scripture::ScriptureReference;

pub const MAX_RETAINED: usize = 2;

/// One analysis entry as reported by the model, after coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAnalysisItem {
    pub color_label: String,
    pub color_meaning: String,
    pub justification: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedAnalysisItem {
    #[serde(flatten)]
    pub item: RawAnalysisItem,
    pub color_value: String,
    pub normalized_confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub scripture_text: String,
    pub analysis: Vec<NormalizedAnalysisItem>,
    pub primary_theme_reasoning: Option<String>,
    pub analyzed_reference: ScriptureReference,
}

fn fence_open() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^```(?:json|JSON)?\s*").expect("valid fence regex"))
}

fn fence_close() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*```$").expect("valid fence regex"))
}

/// Removes a leading ```json opener and a trailing ``` closer.
pub fn strip_code_fences(raw: &str) -> &str {
    let text = raw.trim();
    let text = match fence_open().find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };
    let text = match fence_close().find(text) {
        Some(m) => &text[..m.start()],
        None => text,
    };
    text.trim()
}

/// Numeric coercion for untrusted confidence values; anything non-finite is 0.
pub fn coerce_confidence(value: Option<&Value>) -> f64 {
    let number = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        // a lone wrapped number, e.g. `[70]`, counts as that number
        Some(Value::Array(items)) if items.len() == 1 => return coerce_confidence(items.first()),
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    };
    if number.is_finite() {
        number
    } else {
        0.0
    }
}

fn coerce_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Rescales confidences so that, for a positive total, they sum to exactly 100.
///
/// Every entry but the last is `round(100 * c / total)` clamped to 0..=100;
/// the last takes whatever remains. A non-positive total yields all zeros.
pub fn normalize_confidences(confidences: &[f64]) -> Vec<u8> {
    let total: f64 = confidences.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return vec![0; confidences.len()];
    }

    let last = confidences.len().saturating_sub(1);
    let mut remainder: i64 = 100;
    confidences
        .iter()
        .enumerate()
        .map(|(i, confidence)| {
            let normalized = if i == last {
                remainder.clamp(0, 100)
            } else {
                ((confidence / total) * 100.0).round().clamp(0.0, 100.0) as i64
            };
            remainder = (remainder - normalized).max(0);
            normalized as u8
        })
        .collect()
}

/// Parses, validates and ranks a completion.
///
/// `scripture_text` is the stored verse; any text the model echoes is ignored.
pub fn normalize_response(
    raw: &str,
    legend: &Legend,
    scripture_text: &str,
    reference: ScriptureReference,
) -> Result<AnalysisResult, AnalysisError> {
    let cleaned = strip_code_fences(raw);

    let parsed: Value = match serde_json::from_str(cleaned) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, raw, "failed to parse completion as JSON");
            let lowered = raw.to_lowercase();
            if lowered.contains("error") || lowered.contains("denied") {
                return Err(AnalysisError::UpstreamService(raw.to_string()));
            }
            return Err(AnalysisError::InvalidResponseFormat {
                raw: raw.to_string(),
            });
        }
    };

    let Some(items) = parsed.get("analysis").and_then(Value::as_array) else {
        tracing::error!(raw, "completion lacks an analysis array");
        return Err(AnalysisError::InvalidAnalysisStructure {
            raw: raw.to_string(),
        });
    };

    let raw_items: Vec<RawAnalysisItem> = items
        .iter()
        .map(|item| RawAnalysisItem {
            color_label: coerce_text(item.get("colorLabel")),
            color_meaning: coerce_text(item.get("colorMeaning")),
            justification: coerce_text(item.get("justification")),
            confidence: coerce_confidence(item.get("confidence")),
        })
        .collect();

    let confidences: Vec<f64> = raw_items.iter().map(|i| i.confidence).collect();
    let normalized = normalize_confidences(&confidences);

    let mut ranked: Vec<(RawAnalysisItem, u8)> = raw_items.into_iter().zip(normalized).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(MAX_RETAINED);

    let analysis = ranked
        .into_iter()
        .map(|(item, normalized_confidence)| NormalizedAnalysisItem {
            color_value: legend.color_for_label(&item.color_label).to_string(),
            item,
            normalized_confidence,
        })
        .collect();

    let primary_theme_reasoning = parsed
        .get("primaryThemeReasoning")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(AnalysisResult {
        scripture_text: scripture_text.to_string(),
        analysis,
        primary_theme_reasoning,
        analyzed_reference: reference,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legend::ColorLegendEntry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn legend() -> Legend {
        Legend::new(vec![
            ColorLegendEntry::new("Red", "red", "Sin"),
            ColorLegendEntry::new("Blue", "blue", "Wisdom"),
        ])
        .unwrap()
    }

    fn john_3_16() -> ScriptureReference {
        ScriptureReference::new("John", 3, 16).unwrap()
    }

    const STORED: &str = "For God so loved the world...";

    fn normalize(raw: &str) -> Result<AnalysisResult, AnalysisError> {
        normalize_response(raw, &legend(), STORED, john_3_16())
    }

    fn summary(result: &AnalysisResult) -> Vec<(&str, u8, &str)> {
        result
            .analysis
            .iter()
            .map(|i| (i.item.color_label.as_str(), i.normalized_confidence, i.color_value.as_str()))
            .collect()
    }

    #[test]
    fn last_item_absorbs_the_remainder() {
        assert_eq!(normalize_confidences(&[33.0, 33.0, 34.0]), vec![33, 33, 34]);
        assert_eq!(normalize_confidences(&[1.0, 1.0, 1.0]), vec![33, 33, 34]);
        // independent rounding would give 67 + 67 = 134 here
        assert_eq!(normalize_confidences(&[2.0, 1.0]), vec![67, 33]);
        assert_eq!(normalize_confidences(&[1.0, 2.0]), vec![33, 67]);
    }

    #[test]
    fn positive_totals_sum_to_exactly_100() {
        let cases: &[&[f64]] = &[
            &[70.0, 30.0],
            &[1.0, 1.0, 1.0],
            &[0.4, 0.4, 0.2],
            &[12.5, 87.5],
            &[5.0],
            &[-10.0, 60.0, 50.0],
            &[99.9, 0.1],
            &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        ];
        for confidences in cases {
            let normalized = normalize_confidences(confidences);
            let sum: u32 = normalized.iter().map(|n| *n as u32).sum();
            assert_eq!(sum, 100, "{:?} -> {:?}", confidences, normalized);
            assert!(normalized.iter().all(|n| *n <= 100));
        }
    }

    #[test]
    fn non_positive_totals_are_all_zero() {
        assert_eq!(normalize_confidences(&[0.0, 0.0]), vec![0, 0]);
        assert_eq!(normalize_confidences(&[-5.0, -1.0]), vec![0, 0]);
        assert_eq!(normalize_confidences(&[30.0, -30.0]), vec![0, 0]);
        assert_eq!(normalize_confidences(&[]), Vec::<u8>::new());
    }

    #[test]
    fn coerces_untrusted_confidence_values() {
        assert_eq!(coerce_confidence(Some(&json!(42))), 42.0);
        assert_eq!(coerce_confidence(Some(&json!(" 12.5 "))), 12.5);
        assert_eq!(coerce_confidence(Some(&json!("high"))), 0.0);
        assert_eq!(coerce_confidence(Some(&json!(null))), 0.0);
        assert_eq!(coerce_confidence(Some(&json!([70]))), 70.0);
        assert_eq!(coerce_confidence(Some(&json!(["35"]))), 35.0);
        assert_eq!(coerce_confidence(Some(&json!([1, 2]))), 0.0);
        assert_eq!(coerce_confidence(Some(&json!([]))), 0.0);
        assert_eq!(coerce_confidence(Some(&json!("NaN"))), 0.0);
        assert_eq!(coerce_confidence(Some(&json!("inf"))), 0.0);
        assert_eq!(coerce_confidence(None), 0.0);
    }

    #[test]
    fn end_to_end_example() {
        let raw = json!({
            "scriptureText": "something the model made up",
            "analysis": [
                {"colorLabel": "Blue", "colorMeaning": "Wisdom", "confidence": 70, "justification": "teaches"},
                {"colorLabel": "Red", "colorMeaning": "Sin", "confidence": 30, "justification": "world"}
            ],
            "primaryThemeReasoning": "God's love."
        })
        .to_string();

        let result = normalize(&raw).unwrap();
        assert_eq!(summary(&result), vec![("Blue", 70, "blue"), ("Red", 30, "red")]);
        assert_eq!(result.scripture_text, STORED);
        assert_eq!(result.primary_theme_reasoning.as_deref(), Some("God's love."));
        assert_eq!(result.analyzed_reference, john_3_16());
    }

    #[test]
    fn fenced_and_unfenced_parse_identically() {
        let body = r#"{"analysis":[{"colorLabel":"Red","colorMeaning":"Sin","confidence":40,"justification":"j"},{"colorLabel":"Blue","colorMeaning":"Wisdom","confidence":60,"justification":"k"}],"primaryThemeReasoning":null}"#;
        let fenced = format!("```json\n{}\n```", body);
        assert_eq!(normalize(body).unwrap(), normalize(&fenced).unwrap());
        assert_eq!(strip_code_fences(&fenced), body);
        assert_eq!(strip_code_fences("  ```\n{}\n```  "), "{}");
    }

    #[test]
    fn retains_top_two_with_stable_ties() {
        let raw = json!({"analysis": [
            {"colorLabel": "Red", "confidence": 25},
            {"colorLabel": "Blue", "confidence": 25},
            {"colorLabel": "Green", "confidence": 25},
            {"colorLabel": "Teal", "confidence": 25}
        ]})
        .to_string();
        let result = normalize(&raw).unwrap();
        assert_eq!(summary(&result), vec![("Red", 25, "red"), ("Blue", 25, "blue")]);
    }

    #[test]
    fn ranks_by_normalized_confidence_descending() {
        let raw = json!({"analysis": [
            {"colorLabel": "Red", "confidence": 10},
            {"colorLabel": "Blue", "confidence": 20},
            {"colorLabel": "Purple", "confidence": 70}
        ]})
        .to_string();
        let result = normalize(&raw).unwrap();
        assert_eq!(
            summary(&result),
            vec![("Purple", 70, crate::legend::FALLBACK_COLOR), ("Blue", 20, "blue")]
        );
    }

    #[test]
    fn zero_total_keeps_items_at_zero() {
        let raw = json!({"analysis": [
            {"colorLabel": "Red", "confidence": "n/a"},
            {"colorLabel": "Blue"}
        ]})
        .to_string();
        let result = normalize(&raw).unwrap();
        assert_eq!(summary(&result), vec![("Red", 0, "red"), ("Blue", 0, "blue")]);
    }

    #[test]
    fn empty_analysis_is_a_valid_outcome() {
        let result = normalize(r#"{"analysis": []}"#).unwrap();
        assert!(result.analysis.is_empty());
        assert_eq!(result.primary_theme_reasoning, None);
    }

    #[test]
    fn single_item_gets_everything() {
        let result = normalize(r#"{"analysis":[{"colorLabel":"Red","confidence":3}]}"#).unwrap();
        assert_eq!(summary(&result), vec![("Red", 100, "red")]);
    }

    #[test]
    fn unparseable_text_is_invalid_format() {
        let err = normalize("I think this verse is blue.").unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidResponseFormat { .. }));
    }

    #[test]
    fn error_text_is_classified_as_upstream() {
        match normalize("Permission DENIED for this model") {
            Err(AnalysisError::UpstreamService(detail)) => {
                assert_eq!(detail, "Permission DENIED for this model")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            normalize("Internal Error occurred"),
            Err(AnalysisError::UpstreamService(_))
        ));
    }

    #[test]
    fn missing_analysis_array_is_invalid_structure() {
        for raw in [r#"{"result": []}"#, r#"{"analysis": "Blue"}"#, "[1, 2]", "null"] {
            assert!(
                matches!(normalize(raw), Err(AnalysisError::InvalidAnalysisStructure { .. })),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let result = normalize(r#"{"analysis":[{"colorLabel":"Red","colorMeaning":"Sin","confidence":1,"justification":"j"}]}"#)
            .unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["analysis"][0]["colorValue"], "red");
        assert_eq!(value["analysis"][0]["normalizedConfidence"], 100);
        assert_eq!(value["analysis"][0]["colorLabel"], "Red");
        assert_eq!(value["analyzedReference"]["chapter"], 3);
        assert_eq!(value["primaryThemeReasoning"], Value::Null);
    }
}
