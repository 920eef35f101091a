//! sleet: batch record intake with per-record fault isolation.
//!
//! Ingests aggregate artifacts, validates and splits them, and drives each
//! record through deduplication, durable persistence, and external
//! processing. The two stages carry independent, error-classified retry
//! policies, so one bad record never blocks the rest of its batch, and the
//! artifact's archival verdict depends only on structural validity.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use sleet::{Config, IntakeController, RecordPipeline};
//! use sleet::dedup::MemoryDedup;
//! use sleet::intake::JsonValidator;
//! use sleet::service::LogService;
//! use sleet::sink::LogSink;
//! use sleet::store::JsonlStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file("config.yaml")?;
//!     let store = Arc::new(JsonlStore::open(&config.persistence.path).await?);
//!
//!     let pipeline = RecordPipeline::new(
//!         &config,
//!         Arc::new(MemoryDedup::new()),
//!         store,
//!         Arc::new(LogService),
//!         Arc::new(LogSink),
//!         CancellationToken::new(),
//!     );
//!     let controller = IntakeController::new(Arc::new(JsonValidator::new()), pipeline);
//!
//!     let report = controller.submit(&std::fs::read("batch.json")?).await;
//!     println!("{}: {} emitted", report.verdict.as_str(), report.stats.emitted);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod dedup;
pub mod error;
pub mod intake;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod service;
pub mod sink;
pub mod stage;
pub mod store;

// Re-export main types
pub use config::Config;
pub use intake::{BatchReport, IntakeController};
pub use pipeline::RecordPipeline;
pub use record::{BatchVerdict, ProcessingOutcome, Record};
