//! Overview aggregates derived from a store snapshot.
//!
//! Everything here is a pure function of one [`StoreSnapshot`]: the numbers a
//! dashboard overview charts (distributions, KPI averages, top-N bars and
//! sparklines), without any rendering.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use enigma_sync::StoreSnapshot;
use enigma_types::{AnalysisRecord, Trend};
use serde::Serialize;

/// Number of entries kept in ranked lists and the signal distribution.
pub const TOP_N: usize = 8;

/// Number of feed entries in the confidence trend.
pub const TREND_WINDOW: usize = 20;

/// Number of feed entries in each sparkline.
pub const SPARK_WINDOW: usize = 8;

/// Anomaly score above which a situation is critical.
pub const CRITICAL_ANOMALY: f64 = 0.7;

/// Anomaly score above which a situation is medium threat.
pub const MEDIUM_ANOMALY: f64 = 0.4;

/// Threat level of a situation, from its peak anomaly score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    Low,
    Medium,
    Critical,
}

impl ThreatLevel {
    /// Classify an anomaly score. Non-finite scores count as low.
    pub fn from_anomaly(score: f64) -> Self {
        if !score.is_finite() {
            ThreatLevel::Low
        } else if score > CRITICAL_ANOMALY {
            ThreatLevel::Critical
        } else if score > MEDIUM_ANOMALY {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MED",
            ThreatLevel::Critical => "CRIT",
        }
    }
}

/// A labelled count, e.g. one slice of a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Count {
    pub label: String,
    pub value: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ThreatDistribution {
    pub critical: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrendDistribution {
    pub escalating: usize,
    pub stable: usize,
    pub deescalating: usize,
}

/// One bar of a top-N chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSubject {
    pub subject: String,
    /// Short form of the subject id for chart labels.
    pub label: String,
    pub value: f64,
    pub threat: ThreatLevel,
}

/// Recent values from the feed, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sparklines {
    pub confidence: Vec<f64>,
    pub anomaly: Vec<f64>,
    pub evidence: Vec<u64>,
}

/// Aggregated view over every known subject and the recent feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Overview {
    pub subjects: usize,
    pub fresh: usize,
    pub feed_len: usize,
    pub signal_distribution: Vec<Count>,
    pub threats: ThreatDistribution,
    pub trends: TrendDistribution,
    pub confidence_trend: Vec<f64>,
    pub sparklines: Sparklines,
    pub avg_confidence: f64,
    pub avg_anomaly: f64,
    pub avg_convergence: f64,
    pub total_evidence: u64,
    pub escalating: usize,
    pub entity_count: usize,
    pub top_by_evidence: Vec<RankedSubject>,
    pub top_by_anomaly: Vec<RankedSubject>,
}

impl Overview {
    /// Compute the overview for one snapshot.
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> Self {
        let records: Vec<&AnalysisRecord> = snapshot.current().values().map(Arc::as_ref).collect();
        let recent = |n: usize| snapshot.feed().iter().take(n).rev().map(Arc::as_ref);

        let mut threats = ThreatDistribution::default();
        let mut trends = TrendDistribution::default();
        for record in &records {
            match ThreatLevel::from_anomaly(anomaly(record)) {
                ThreatLevel::Critical => threats.critical += 1,
                ThreatLevel::Medium => threats.medium += 1,
                ThreatLevel::Low => threats.low += 1,
            }
            // Missing or unrecognized trends count as stable
            match record.trend() {
                Some(Trend::Escalating) => trends.escalating += 1,
                Some(Trend::Deescalating) => trends.deescalating += 1,
                _ => trends.stable += 1,
            }
        }

        let entities: BTreeSet<&str> = records
            .iter()
            .flat_map(|r| r.entities())
            .collect();

        Self {
            subjects: records.len(),
            fresh: snapshot.fresh().len(),
            feed_len: snapshot.feed().len(),
            signal_distribution: signal_distribution(&records),
            threats,
            trends,
            confidence_trend: recent(TREND_WINDOW).map(dominant_confidence).collect(),
            sparklines: Sparklines {
                confidence: recent(SPARK_WINDOW).map(dominant_confidence).collect(),
                anomaly: recent(SPARK_WINDOW).map(anomaly).collect(),
                evidence: recent(SPARK_WINDOW).map(AnalysisRecord::evidence_count).collect(),
            },
            avg_confidence: mean(records.iter().copied().map(dominant_confidence)),
            avg_anomaly: mean(records.iter().copied().map(anomaly)),
            avg_convergence: mean(records.iter().map(|r| finite(r.convergence_score()))),
            total_evidence: records
                .iter()
                .fold(0u64, |total, r| total.saturating_add(r.evidence_count())),
            escalating: trends.escalating,
            entity_count: entities.len(),
            top_by_evidence: top_by(&records, |r| r.evidence_count() as f64),
            top_by_anomaly: top_by(&records, anomaly),
        }
    }
}

/// Missing, null and non-finite values read as zero.
fn finite(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

fn anomaly(record: &AnalysisRecord) -> f64 {
    finite(record.max_anomaly())
}

fn dominant_confidence(record: &AnalysisRecord) -> f64 {
    finite(record.dominant_confidence())
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn signal_distribution(records: &[&AnalysisRecord]) -> Vec<Count> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        for signal in record.signal_types() {
            *counts.entry(signal).or_default() += 1;
        }
    }

    let mut distribution: Vec<Count> = counts
        .into_iter()
        .map(|(label, value)| Count {
            label: label.to_string(),
            value,
        })
        .collect();
    // Stable sort keeps ties in name order
    distribution.sort_by(|a, b| b.value.cmp(&a.value));
    distribution.truncate(TOP_N);
    distribution
}

fn top_by(records: &[&AnalysisRecord], key: impl Fn(&AnalysisRecord) -> f64) -> Vec<RankedSubject> {
    let mut ranked: Vec<RankedSubject> = records
        .iter()
        .map(|&record| RankedSubject {
            subject: record.subject_id().to_string(),
            label: record.subject_id().chars().take(8).collect(),
            value: key(record),
            threat: ThreatLevel::from_anomaly(anomaly(record)),
        })
        .collect();
    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(TOP_N);
    ranked
}
