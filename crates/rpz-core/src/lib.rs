//! Core types and building blocks for rpz-updater.
//!
//! This crate holds everything that does not touch the network or the
//! filesystem:
//!
//! - **Types**: source descriptors, domain sets, provider results and the
//!   aggregated zone
//! - **Errors**: the per-stage error taxonomy ([`FetchError`], [`NormalizeError`],
//!   [`AggregateError`], [`RenderError`], [`ConfigError`])
//! - **Normalizers**: one parser per supported blocklist dialect
//! - **Aggregation**: merging provider results into one zone-ready set
//! - **Events**: the structured event sink injected by the caller
//!
//! # Example
//!
//! ```rust
//! use rpz_core::{normalize, FormatKind};
//!
//! let set = normalize(FormatKind::HostsFile, b"0.0.0.0 ads.example.com\n").unwrap();
//! assert!(set.contains_str("ads.example.com"));
//! ```

#![doc(html_root_url = "https://docs.rs/rpz-core/0.3.0")]

pub mod aggregate;
mod error;
pub mod event;
pub mod fetch;
pub mod normalize;
pub mod types;

pub use aggregate::{next_serial, Aggregator};
pub use error::{
    AcquireError, AggregateError, ConfigError, FetchError, NormalizeError, RenderError,
};
pub use event::{Event, EventEmitter, EventSink, Level, MemorySink, NullSink, Phase, TracingSink};
pub use fetch::{AttemptCounter, BlocklistFetcher};
pub use normalize::{normalize, Normalizer};
pub use types::*;
