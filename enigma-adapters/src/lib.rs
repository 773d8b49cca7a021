//! # enigma-adapters
//!
//! Network collaborators for the Enigma sync engine.
//!
//! `enigma-sync` talks to the backend only through its `Transport` and
//! `HealthSource` traits. This crate provides the real implementations.
//!
//! ## Supported Endpoints
//!
//! - **Stream** (`ws` feature) - WebSocket transport for the analysis stream
//! - **REST API** (`http` feature) - health, situation listing and on-demand
//!   analysis via the backend's HTTP API
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use enigma_adapters::{http::ApiClient, ws::WsTransport};
//! use enigma_sync::{Session, SessionConfig, TokioScheduler};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = ApiClient::builder().endpoint("http://localhost:8000").build()?;
//!
//!     let session = Session::new(
//!         SessionConfig::default(),
//!         Arc::new(WsTransport::new()),
//!         Arc::new(api),
//!         Arc::new(TokioScheduler::new()),
//!     );
//!     session.start();
//!
//!     tokio::time::sleep(std::time::Duration::from_secs(10)).await;
//!     println!("{} subjects", session.snapshot().store.len());
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "ws")]
pub mod ws;

pub use error::AdapterError;
