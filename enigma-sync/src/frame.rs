//! Decoding of inbound stream frames.

use std::fmt;

use enigma_types::{AnalysisRecord, RecordError, ANALYSIS_KIND};
use serde_json::Value;

/// Liveness probe sent by the client.
pub const PING: &str = "ping";

/// Liveness response sent by the server.
pub const PONG: &str = "pong";

/// Result of decoding one text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Keepalive response; carries no data.
    Pong,
    /// An analysis record, payload as received.
    Record(AnalysisRecord),
    /// Anything else. Dropped without affecting the connection.
    Discarded(DiscardReason),
}

/// Why a frame was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    /// Not JSON.
    Malformed,
    /// A JSON object tagged with a different kind (or none).
    ForeignKind(Option<String>),
    /// An analysis record with no usable subject id.
    MissingSubject,
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardReason::Malformed => f.write_str("malformed frame"),
            DiscardReason::ForeignKind(Some(kind)) => write!(f, "foreign kind '{}'", kind),
            DiscardReason::ForeignKind(None) => f.write_str("untagged frame"),
            DiscardReason::MissingSubject => f.write_str("record without subject id"),
        }
    }
}

/// Decode a text frame received from the stream.
///
/// Never fails: every input maps to a [`Frame`]. Beyond the `type` tag and
/// `situation.situation_id`, the payload is not inspected, so records with
/// unexpected field types or extra fields are kept as they are.
///
/// # Example
///
/// ```rust
/// use enigma_sync::{decode, Frame};
///
/// assert_eq!(decode("pong"), Frame::Pong);
///
/// let raw = r#"{"type":"situation_analysis","situation":{"situation_id":"abc"}}"#;
/// match decode(raw) {
///     Frame::Record(record) => assert_eq!(record.subject_id(), "abc"),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
pub fn decode(raw: &str) -> Frame {
    if raw == PONG {
        return Frame::Pong;
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(_) => return Frame::Discarded(DiscardReason::Malformed),
    };

    let kind = value.get("type").and_then(Value::as_str);
    if kind != Some(ANALYSIS_KIND) {
        return Frame::Discarded(DiscardReason::ForeignKind(kind.map(str::to_string)));
    }

    match AnalysisRecord::from_value(value) {
        Ok(record) => Frame::Record(record),
        Err(RecordError::MissingSubject) => Frame::Discarded(DiscardReason::MissingSubject),
        Err(RecordError::NotAnObject) => Frame::Discarded(DiscardReason::Malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pong_is_recognized() {
        assert_eq!(decode("pong"), Frame::Pong);
    }

    #[test]
    fn pong_match_is_exact() {
        assert_eq!(decode("PONG"), Frame::Discarded(DiscardReason::Malformed));
        assert_eq!(decode("\"pong\""), Frame::Discarded(DiscardReason::ForeignKind(None)));
    }

    #[test]
    fn valid_record_decodes() {
        let raw = r#"{
            "type": "situation_analysis",
            "situation": {"situation_id": "abc", "evidence_count": 3, "max_anomaly": 0.5},
            "human_readable": "text"
        }"#;

        match decode(raw) {
            Frame::Record(record) => {
                assert_eq!(record.subject_id(), "abc");
                assert_eq!(record.evidence_count(), 3);
                assert_eq!(record.human_readable(), Some("text"));
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn non_json_is_malformed() {
        assert_eq!(decode("not json"), Frame::Discarded(DiscardReason::Malformed));
        assert_eq!(decode(""), Frame::Discarded(DiscardReason::Malformed));
    }

    #[test]
    fn wrong_kind_is_foreign() {
        let raw = r#"{"type": "heartbeat", "situation": {"situation_id": "abc"}}"#;
        assert_eq!(
            decode(raw),
            Frame::Discarded(DiscardReason::ForeignKind(Some("heartbeat".to_string())))
        );
    }

    #[test]
    fn missing_kind_is_foreign() {
        let raw = r#"{"situation": {"situation_id": "abc"}}"#;
        assert_eq!(decode(raw), Frame::Discarded(DiscardReason::ForeignKind(None)));
    }

    #[test]
    fn missing_or_empty_subject_is_rejected() {
        let missing = r#"{"type": "situation_analysis", "situation": {}}"#;
        let empty = r#"{"type": "situation_analysis", "situation": {"situation_id": ""}}"#;
        let no_situation = r#"{"type": "situation_analysis"}"#;

        assert_eq!(decode(missing), Frame::Discarded(DiscardReason::MissingSubject));
        assert_eq!(decode(empty), Frame::Discarded(DiscardReason::MissingSubject));
        assert_eq!(decode(no_situation), Frame::Discarded(DiscardReason::MissingSubject));
    }

    fn expect_record(raw: &str) -> AnalysisRecord {
        match decode(raw) {
            Frame::Record(record) => record,
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn unexpected_field_types_are_kept() {
        let null_anomaly = expect_record(
            r#"{"type": "situation_analysis", "situation": {"situation_id": "abc", "max_anomaly": null}}"#,
        );
        assert_eq!(null_anomaly.max_anomaly(), None);

        let float_count = expect_record(
            r#"{"type": "situation_analysis", "situation": {"situation_id": "abc", "evidence_count": 12.0}}"#,
        );
        assert_eq!(float_count.evidence_count(), 12);

        let odd_count = expect_record(
            r#"{"type": "situation_analysis", "situation": {"situation_id": "abc", "evidence_count": "many"}}"#,
        );
        assert_eq!(odd_count.evidence_count(), 0);

        let loose_hypothesis = expect_record(
            r#"{"type": "situation_analysis", "situation": {"situation_id": "abc"},
                "langgraph": {"hypotheses": [{"description": "no id"}]}}"#,
        );
        assert_eq!(
            loose_hypothesis.text("/langgraph/hypotheses/0/description"),
            Some("no id")
        );
    }

    #[test]
    fn payload_passes_through_unchanged() {
        let raw = r#"{
            "type": "situation_analysis",
            "situation": {"situation_id": "abc", "region": "eu"},
            "risk_model": {"version": 2}
        }"#;

        let record = expect_record(raw);
        let expected: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), expected);
        assert_eq!(record.get("/situation/lifecycle"), None);
        assert_eq!(record.get("/reasoning"), None);
    }
}
