//! JSON export of a session's final state.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use enigma_sync::SessionSnapshot;
use serde_json::{json, Value};

use crate::data::Overview;

/// Build the export document for one session snapshot.
pub fn export_value(snapshot: &SessionSnapshot) -> Result<Value> {
    let overview = Overview::from_snapshot(&snapshot.store);

    let summary = json!({
        "connection": snapshot.connection.state.label(),
        "subjects": overview.subjects,
        "feed": overview.feed_len,
        "critical": overview.threats.critical,
        "escalating": overview.escalating,
        "total_evidence": overview.total_evidence,
        "health": snapshot.health.health.as_ref().map(|h| h.status.clone()),
        "latency_ms": snapshot.health.latency_ms,
    });

    Ok(json!({
        "summary": summary,
        "overview": serde_json::to_value(&overview)?,
        "snapshot": serde_json::to_value(snapshot)?,
    }))
}

/// Write the export document to `path`.
pub fn export_to_file(snapshot: &SessionSnapshot, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&export_value(snapshot)?)?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use enigma_sync::{ConnectionStatus, HealthSnapshot, ManualScheduler, MergeStore};
    use enigma_types::AnalysisRecord;
    use serde_json::json;

    fn snapshot() -> SessionSnapshot {
        let store = MergeStore::new(Arc::new(ManualScheduler::new()));
        let record = AnalysisRecord::from_value(json!({
            "type": "situation_analysis",
            "situation": {"situation_id": "sit-1", "max_anomaly": 0.9, "evidence_count": 4, "region": "eu"},
        }))
        .unwrap();
        store.apply(record);

        SessionSnapshot {
            connection: ConnectionStatus::default(),
            store: store.snapshot(),
            health: HealthSnapshot::default(),
        }
    }

    #[test]
    fn export_contains_summary_and_records() {
        let value = export_value(&snapshot()).unwrap();

        assert_eq!(value["summary"]["connection"], "disconnected");
        assert_eq!(value["summary"]["subjects"], 1);
        assert_eq!(value["summary"]["critical"], 1);
        assert_eq!(value["summary"]["health"], Value::Null);
        assert_eq!(value["overview"]["total_evidence"], 4);
        assert_eq!(
            value["snapshot"]["store"]["current"]["sit-1"]["situation"]["situation_id"],
            "sit-1"
        );
        assert_eq!(value["snapshot"]["store"]["feed"].as_array().unwrap().len(), 1);
        assert_eq!(value["snapshot"]["store"]["fresh"][0], "sit-1");
        assert_eq!(value["snapshot"]["store"]["current"]["sit-1"]["type"], "situation_analysis");
        assert_eq!(
            value["snapshot"]["store"]["current"]["sit-1"]["situation"]["region"],
            "eu"
        );
        assert_eq!(
            value["snapshot"]["store"]["current"]["sit-1"].get("reasoning"),
            None
        );
    }

    #[test]
    fn export_writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");

        export_to_file(&snapshot(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["summary"]["subjects"], 1);
        assert!(content.contains('\n'));
    }
}
