//! Analysis records - one streamed payload describing one situation.
//!
//! A record keeps the JSON object exactly as the backend sent it. Only the
//! discriminator and `situation.situation_id` are validated; every other
//! field is read through lenient accessors that fall back instead of
//! rejecting the record, and serialization writes the original object back
//! out unchanged.

use std::fmt;

use serde_json::{json, Value};

use crate::ANALYSIS_KIND;

/// Why a JSON value cannot be held as a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    /// The value is not a JSON object.
    NotAnObject,
    /// `situation.situation_id` is absent, not a string, or empty.
    MissingSubject,
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::NotAnObject => f.write_str("record is not a JSON object"),
            RecordError::MissingSubject => f.write_str("record has no situation id"),
        }
    }
}

impl std::error::Error for RecordError {}

/// A complete analysis payload for a single situation.
///
/// # Example
///
/// ```rust
/// use enigma_types::{AnalysisRecord, Trend};
/// use serde_json::json;
///
/// let record = AnalysisRecord::from_value(json!({
///     "type": "situation_analysis",
///     "situation": {"situation_id": "sit-1", "max_anomaly": null, "region": "eu"},
///     "reasoning": {"trend": "escalating"}
/// }))
/// .unwrap();
///
/// assert_eq!(record.subject_id(), "sit-1");
/// assert_eq!(record.max_anomaly(), None);
/// assert_eq!(record.trend(), Some(Trend::Escalating));
/// assert_eq!(record.get("/situation/region"), Some(&json!("eu")));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    kind: String,
    subject: String,
    payload: Value,
}

impl AnalysisRecord {
    /// Create a minimal analysis record carrying only the subject key.
    pub fn new(subject_id: impl Into<String>) -> Self {
        let subject = subject_id.into();
        Self {
            kind: ANALYSIS_KIND.to_string(),
            payload: json!({
                "type": ANALYSIS_KIND,
                "situation": {"situation_id": subject},
            }),
            subject,
        }
    }

    /// Hold a decoded JSON object as a record.
    ///
    /// Accepts any object with a non-empty `situation.situation_id`,
    /// whatever its other fields contain. A missing `type` reads as an
    /// empty kind.
    pub fn from_value(payload: Value) -> Result<Self, RecordError> {
        if !payload.is_object() {
            return Err(RecordError::NotAnObject);
        }

        let subject = payload
            .pointer("/situation/situation_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or(RecordError::MissingSubject)?
            .to_string();
        let kind = payload
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self {
            kind,
            subject,
            payload,
        })
    }

    /// Record discriminator, expected to equal [`ANALYSIS_KIND`].
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The key identifying the subject this record describes.
    pub fn subject_id(&self) -> &str {
        &self.subject
    }

    /// Returns true if the discriminator marks this as an analysis record.
    pub fn is_analysis(&self) -> bool {
        self.kind == ANALYSIS_KIND
    }

    /// The object as received.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Look up a field by JSON pointer, e.g. `/situation/sources`.
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.payload.pointer(pointer)
    }

    /// A numeric field, or `None` if absent, null or not a number.
    pub fn number(&self, pointer: &str) -> Option<f64> {
        self.get(pointer).and_then(Value::as_f64)
    }

    /// A counter field. Floats are truncated; anything else reads as zero.
    pub fn count(&self, pointer: &str) -> u64 {
        self.get(pointer)
            .and_then(|value| {
                value.as_u64().or_else(|| {
                    value
                        .as_f64()
                        .filter(|f| f.is_finite() && *f >= 0.0)
                        .map(|f| f as u64)
                })
            })
            .unwrap_or(0)
    }

    /// The string field at `pointer`, if it is one.
    pub fn text(&self, pointer: &str) -> Option<&str> {
        self.get(pointer).and_then(Value::as_str)
    }

    /// The string elements of an array field. Other elements are skipped.
    pub fn strings(&self, pointer: &str) -> Vec<&str> {
        self.get(pointer)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.text("/situation/lifecycle").map(Lifecycle::from_wire)
    }

    /// Timestamp of the latest activity. Display only, never used for
    /// ordering updates.
    pub fn last_activity(&self) -> Option<&str> {
        self.text("/situation/last_activity")
    }

    pub fn max_anomaly(&self) -> Option<f64> {
        self.number("/situation/max_anomaly")
    }

    pub fn evidence_count(&self) -> u64 {
        self.count("/situation/evidence_count")
    }

    pub fn signal_types(&self) -> Vec<&str> {
        self.strings("/situation/signal_types")
    }

    pub fn entities(&self) -> Vec<&str> {
        self.strings("/situation/entities")
    }

    pub fn trend(&self) -> Option<Trend> {
        self.text("/reasoning/trend").map(Trend::from_wire)
    }

    /// Confidence in the dominant hypothesis.
    pub fn dominant_confidence(&self) -> Option<f64> {
        self.number("/explanation/dominant_confidence")
    }

    /// How settled the hypothesis graph is.
    pub fn convergence_score(&self) -> Option<f64> {
        self.number("/langgraph/convergence_score")
    }

    pub fn human_readable(&self) -> Option<&str> {
        self.text("/human_readable")
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for AnalysisRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serde::Serialize::serialize(&self.payload, serializer)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for AnalysisRecord {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let payload = <Value as serde::Deserialize>::deserialize(deserializer)?;
        Self::from_value(payload).map_err(serde::de::Error::custom)
    }
}

/// Lifecycle of a situation as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Active,
    Dormant,
    Expired,
    Unknown,
}

impl Lifecycle {
    fn from_wire(value: &str) -> Self {
        match value {
            "active" => Lifecycle::Active,
            "dormant" => Lifecycle::Dormant,
            "expired" => Lifecycle::Expired,
            _ => Lifecycle::Unknown,
        }
    }
}

/// Direction the situation is heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Escalating,
    Deescalating,
    Stable,
    Unknown,
}

impl Trend {
    fn from_wire(value: &str) -> Self {
        match value {
            "escalating" => Trend::Escalating,
            "deescalating" => Trend::Deescalating,
            "stable" => Trend::Stable,
            _ => Trend::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(value: Value) -> AnalysisRecord {
        AnalysisRecord::from_value(value).unwrap()
    }

    #[test]
    fn new_record_is_tagged_as_analysis() {
        let record = AnalysisRecord::new("abc");
        assert!(record.is_analysis());
        assert_eq!(record.kind(), ANALYSIS_KIND);
        assert_eq!(record.subject_id(), "abc");
        assert_eq!(record.text("/situation/situation_id"), Some("abc"));
    }

    #[test]
    fn foreign_kind_is_not_analysis() {
        let heartbeat = record(json!({"type": "heartbeat", "situation": {"situation_id": "abc"}}));
        assert!(!heartbeat.is_analysis());
        assert_eq!(heartbeat.kind(), "heartbeat");

        let untagged = record(json!({"situation": {"situation_id": "abc"}}));
        assert_eq!(untagged.kind(), "");
    }

    #[test]
    fn rejects_non_objects_and_missing_subjects() {
        assert_eq!(
            AnalysisRecord::from_value(json!([1, 2])),
            Err(RecordError::NotAnObject)
        );
        for value in [
            json!({"type": "situation_analysis"}),
            json!({"situation": {"situation_id": ""}}),
            json!({"situation": {"situation_id": 7}}),
            json!({"situation": "abc"}),
        ] {
            assert_eq!(
                AnalysisRecord::from_value(value),
                Err(RecordError::MissingSubject)
            );
        }
    }

    #[test]
    fn reads_full_wire_payload() {
        let record = record(json!({
            "type": "situation_analysis",
            "situation": {
                "situation_id": "sit-1",
                "lifecycle": "dormant",
                "evidence_count": 12,
                "signal_types": ["intrusion", "dos"],
                "entities": ["10.0.0.1"],
                "last_activity": "2024-01-01T00:05:00Z",
                "max_anomaly": 0.82
            },
            "reasoning": {"confidence": 0.7, "trend": "escalating"},
            "langgraph": {"convergence_score": 0.9},
            "explanation": {"dominant_confidence": 0.6},
            "human_readable": "Port scan in progress"
        }));

        assert_eq!(record.lifecycle(), Some(Lifecycle::Dormant));
        assert_eq!(record.evidence_count(), 12);
        assert_eq!(record.signal_types(), vec!["intrusion", "dos"]);
        assert_eq!(record.entities(), vec!["10.0.0.1"]);
        assert_eq!(record.last_activity(), Some("2024-01-01T00:05:00Z"));
        assert_eq!(record.max_anomaly(), Some(0.82));
        assert_eq!(record.trend(), Some(Trend::Escalating));
        assert_eq!(record.convergence_score(), Some(0.9));
        assert_eq!(record.dominant_confidence(), Some(0.6));
        assert_eq!(record.human_readable(), Some("Port scan in progress"));
    }

    #[test]
    fn absent_sections_are_not_invented() {
        let record = AnalysisRecord::new("abc");
        assert_eq!(record.lifecycle(), None);
        assert_eq!(record.trend(), None);
        assert_eq!(record.max_anomaly(), None);
        assert_eq!(record.evidence_count(), 0);
        assert!(record.signal_types().is_empty());
        assert_eq!(record.human_readable(), None);
    }

    #[test]
    fn odd_field_types_read_leniently() {
        let record = record(json!({
            "type": "situation_analysis",
            "situation": {
                "situation_id": "abc",
                "max_anomaly": null,
                "evidence_count": 12.0,
                "signal_types": ["scan", 3, null],
                "lifecycle": "archived"
            },
            "reasoning": {"trend": "oscillating"},
            "langgraph": {"hypotheses": [{"description": "no id"}]},
            "explanation": {"dominant_confidence": "high"}
        }));

        assert_eq!(record.max_anomaly(), None);
        assert_eq!(record.evidence_count(), 12);
        assert_eq!(record.signal_types(), vec!["scan"]);
        assert_eq!(record.lifecycle(), Some(Lifecycle::Unknown));
        assert_eq!(record.trend(), Some(Trend::Unknown));
        assert_eq!(record.dominant_confidence(), None);
        assert_eq!(record.count("/situation/entities"), 0);
    }

    #[test]
    fn negative_counters_read_as_zero() {
        let record = record(json!({"situation": {"situation_id": "abc", "evidence_count": -3}}));
        assert_eq!(record.evidence_count(), 0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip_keeps_payload_untouched() {
        let raw = json!({
            "type": "situation_analysis",
            "situation": {"situation_id": "abc", "region": "eu", "max_anomaly": null},
            "risk_model": {"version": 3}
        });

        let record: AnalysisRecord = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), raw);
        assert_eq!(record.into_payload(), raw);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn deserializing_without_subject_fails() {
        let json = r#"{"type": "situation_analysis", "situation": {"evidence_count": 1}}"#;
        assert!(serde_json::from_str::<AnalysisRecord>(json).is_err());
    }
}
