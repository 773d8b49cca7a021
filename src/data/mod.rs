//! Derived data for presentation consumers.
//!
//! ## Submodules
//!
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "2s", "1500ms")
//! - [`overview`]: Aggregates over a store snapshot ([`Overview`])
//!
//! ## Data Flow
//!
//! ```text
//! StoreSnapshot (from the session)
//!        │
//!        ▼
//! Overview::from_snapshot()
//!        │
//!        ├──▶ distributions (signal, threat, trend)
//!        ├──▶ KPI averages and totals
//!        └──▶ top-N bars and sparklines
//! ```

pub mod duration;
pub mod overview;

pub use overview::{
    Count, Overview, RankedSubject, Sparklines, ThreatDistribution, ThreatLevel,
    TrendDistribution,
};
