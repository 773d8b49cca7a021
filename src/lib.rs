//! # enigma-watch
//!
//! A headless live client and library for the Enigma situation-analysis
//! stream.
//!
//! The streaming engine itself lives in `enigma-sync`; this crate wires it
//! to the real network adapters and adds what a dashboard needs on top.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         enigma-watch                          │
//! │  ┌──────────┐    ┌───────────────────┐    ┌────────────────┐  │
//! │  │  config  │───▶│ Session (sync)    │───▶│ data::Overview │  │
//! │  │(settings)│    │ store/conn/health │    │  (aggregates)  │  │
//! │  └──────────┘    └─────────┬─────────┘    └───────┬────────┘  │
//! │                            │                      ▼           │
//! │                 WsTransport + ApiClient        export         │
//! │                     (adapters)                 (JSON)         │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`config`]**: Layered [`Settings`] (defaults, file, `ENIGMA_*` environment)
//! - **[`data`]**: Derived [`Overview`] aggregates computed from store snapshots
//! - **[`export`]**: JSON export of a session's final state
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch the default local backend
//! enigma-watch
//!
//! # Point at another backend and export the final state on Ctrl-C
//! enigma-watch --ws-url ws://analysis:8000/ws/dashboard --export state.json
//! ```
//!
//! ### As a library
//!
//! ```
//! use std::sync::Arc;
//! use enigma_sync::{ManualScheduler, MergeStore};
//! use enigma_types::AnalysisRecord;
//! use enigma_watch::Overview;
//!
//! let store = MergeStore::new(Arc::new(ManualScheduler::new()));
//! store.apply(AnalysisRecord::new("sit-1"));
//!
//! let overview = Overview::from_snapshot(&store.snapshot());
//! assert_eq!(overview.subjects, 1);
//! ```

pub mod config;
pub mod data;
pub mod export;

// Re-export main types for convenience
pub use config::Settings;
pub use data::{Overview, ThreatLevel};
pub use export::{export_to_file, export_value};
