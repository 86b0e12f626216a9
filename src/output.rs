//! The caller-facing evaluation produced by a grading run.
//!
//! Models are *instructed* to follow the schema in [`crate::prompts`], not
//! constrained to it, and different revisions of the prompt used different
//! key names. [`Evaluation::from_value`] therefore accepts the known aliases
//! and normalises them, but rejects replies missing a score or feedback.

use crate::error::GradeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;

const SCORE_KEYS: &[&str] = &["score", "grade"];
const FEEDBACK_KEYS: &[&str] = &["feedback", "summary", "detailedAnalysis", "detailed_analysis"];
const STRENGTH_KEYS: &[&str] = &["strengths"];
const WEAKNESS_KEYS: &[&str] = &["weaknesses", "improvements"];
const CORRECTION_KEYS: &[&str] = &["detailed_corrections", "detailedCorrections"];

/// Structured grading outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: Score,
    pub feedback: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detailed_corrections: Option<Vec<Correction>>,
}

/// A grade as the model wrote it: `17`, `8.5` or `"15/20"`.
///
/// Numbers keep their JSON form, so `17` is returned as `17`, not `17.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Number(Number),
    Text(String),
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Number(n) => write!(f, "{n}"),
            Score::Text(s) => f.write_str(s),
        }
    }
}

/// One suggested correction of an excerpt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    #[serde(default)]
    pub original: String,
    #[serde(default)]
    pub correction: String,
    #[serde(default)]
    pub explanation: String,
}

impl Evaluation {
    /// Validate a parsed reply object and normalise its field names.
    pub fn from_value(value: Value) -> Result<Self, GradeError> {
        let Value::Object(obj) = value else {
            return Err(invalid("reply is not a JSON object"));
        };

        let score = match first_present(&obj, SCORE_KEYS) {
            Some(Value::Number(n)) => Score::Number(n.clone()),
            Some(Value::String(s)) if !s.trim().is_empty() => Score::Text(s.trim().to_string()),
            Some(_) => return Err(invalid("score must be a number or a non-empty string")),
            None => return Err(invalid("missing required field 'score'")),
        };

        let feedback = match first_present(&obj, FEEDBACK_KEYS) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(_) => return Err(invalid("feedback must be a non-empty string")),
            None => return Err(invalid("missing required field 'feedback'")),
        };

        let strengths = string_list(&obj, STRENGTH_KEYS, "strengths")?;
        let weaknesses = string_list(&obj, WEAKNESS_KEYS, "weaknesses")?;

        let detailed_corrections = match first_present(&obj, CORRECTION_KEYS) {
            Some(v @ Value::Array(_)) => Some(
                serde_json::from_value::<Vec<Correction>>(v.clone())
                    .map_err(|e| invalid(&format!("detailed_corrections: {e}")))?,
            ),
            Some(_) => return Err(invalid("detailed_corrections must be an array")),
            None => None,
        };

        Ok(Self {
            score,
            feedback,
            strengths,
            weaknesses,
            detailed_corrections,
        })
    }
}

/// First non-null value among `keys`.
fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn string_list(
    obj: &Map<String, Value>,
    keys: &[&str],
    name: &str,
) -> Result<Vec<String>, GradeError> {
    match first_present(obj, keys) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                _ => Err(invalid(&format!("{name} must contain only strings"))),
            })
            .collect(),
        Some(_) => Err(invalid(&format!("{name} must be an array of strings"))),
    }
}

fn invalid(msg: &str) -> GradeError {
    GradeError::InvalidModelResponse(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_reply() {
        let e = Evaluation::from_value(json!({
            "score": 16,
            "feedback": "Solid work.",
            "strengths": ["clear"],
            "weaknesses": ["short"],
            "detailed_corrections": [
                {"original": "teh", "correction": "the", "explanation": "typo"}
            ]
        }))
        .unwrap();
        assert_eq!(e.score, Score::Number(16u64.into()));
        assert_eq!(e.strengths, vec!["clear"]);
        assert_eq!(e.detailed_corrections.unwrap()[0].correction, "the");
    }

    #[test]
    fn aliases_are_normalised() {
        let e = Evaluation::from_value(json!({
            "grade": "15/20",
            "summary": "ok",
            "improvements": ["more sources"]
        }))
        .unwrap();
        assert_eq!(e.score, Score::Text("15/20".into()));
        assert_eq!(e.feedback, "ok");
        assert_eq!(e.weaknesses, vec!["more sources"]);
        assert!(e.strengths.is_empty());
        assert!(e.detailed_corrections.is_none());
    }

    #[test]
    fn detailed_analysis_counts_as_feedback() {
        let e = Evaluation::from_value(json!({"score": "B", "detailedAnalysis": "deep"})).unwrap();
        assert_eq!(e.feedback, "deep");
    }

    #[test]
    fn missing_score_is_rejected() {
        let err = Evaluation::from_value(json!({"feedback": "x"})).unwrap_err();
        assert!(err.to_string().contains("score"), "{err}");
    }

    #[test]
    fn missing_feedback_is_rejected() {
        let err = Evaluation::from_value(json!({"score": 3})).unwrap_err();
        assert!(err.to_string().contains("feedback"), "{err}");
    }

    #[test]
    fn non_string_list_items_are_rejected() {
        assert!(Evaluation::from_value(json!({
            "score": 1, "feedback": "f", "strengths": [1, 2]
        }))
        .is_err());
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(Evaluation::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn serialises_with_canonical_names() {
        let e = Evaluation::from_value(json!({"grade": 12, "summary": "fine"})).unwrap();
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["score"], json!(12));
        assert_eq!(v["feedback"], json!("fine"));
        assert!(v.get("detailed_corrections").is_none());
    }

    #[test]
    fn numeric_scores_keep_their_json_form() {
        let whole = Evaluation::from_value(json!({"score": 16, "feedback": "f"})).unwrap();
        assert_eq!(serde_json::to_string(&whole.score).unwrap(), "16");
        assert_eq!(whole.score.to_string(), "16");

        let fractional = Evaluation::from_value(json!({"score": 8.5, "feedback": "f"})).unwrap();
        assert_eq!(serde_json::to_string(&fractional.score).unwrap(), "8.5");
    }
}
