//! Blocklist acquisition pipeline for rpz-updater.
//!
//! One run walks `Idle → Fetching → Aggregating → Rendering → Done | Failed`:
//!
//! - **Fetching**: every enabled source is acquired by a [`BlocklistProvider`]
//!   through a bounded worker pool, under a run-level deadline
//! - **Aggregating**: successful domain sets are merged; the run fails only
//!   when no source succeeded
//! - **Rendering**: the zone is written atomically; any I/O error fails the run
//!
//! Every run ends in a [`RunReport`].
//!
//! # Example
//!
//! ```rust,no_run
//! use rpz_core::TracingSink;
//! use rpz_pipeline::{Pipeline, Settings};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load(Path::new("/etc/rpz-updater/config.yml"))?;
//!     let pipeline = Pipeline::from_settings(&settings, Arc::new(TracingSink))?;
//!
//!     let report = pipeline.run().await;
//!     println!("{}: {} domains, serial {:?}", report.state, report.domains, report.serial);
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/rpz-pipeline/0.3.0")]

mod orchestrator;
pub mod provider;
mod report;
mod settings;

pub use orchestrator::{Pipeline, PipelineBuilder, DEFAULT_MAX_CONCURRENCY, DEFAULT_RUN_DEADLINE};
pub use provider::{acquire, BlocklistProvider};
pub use report::{RunReport, RunState, SourceReport, SourceStatus};
pub use settings::{FetchSettings, LogFormat, LoggingSettings, PipelineSettings, Settings};
