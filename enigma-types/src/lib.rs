//! # enigma-types
//!
//! Data contracts for the Enigma situation-analysis stream. This crate defines
//! the shape of the records pushed over the dashboard stream, the health
//! payload served by the API, and the connection state reported to consumers.
//!
//! ## Features
//!
//! - `serde`: serde impls matching the wire format. Records serialize back
//!   to exactly the object they were decoded from.
//!
//! ## Example
//!
//! ```rust
//! use enigma_types::{AnalysisRecord, ANALYSIS_KIND};
//!
//! let record = AnalysisRecord::new("sit-42");
//!
//! assert_eq!(record.kind(), ANALYSIS_KIND);
//! assert_eq!(record.subject_id(), "sit-42");
//! assert_eq!(record.evidence_count(), 0);
//! ```
//!
//! ## Identity
//!
//! Every record describes one subject (a security situation), identified by
//! `situation.situation_id`. Two records with the same id describe the same
//! evolving subject; consumers keep the one that arrived last.

mod connection;
mod health;
mod record;

pub use connection::*;
pub use health::*;
pub use record::*;

/// Discriminator value carried in the `type` field of analysis records.
///
/// Frames tagged with any other value are not analysis records and are
/// discarded by consumers.
pub const ANALYSIS_KIND: &str = "situation_analysis";
