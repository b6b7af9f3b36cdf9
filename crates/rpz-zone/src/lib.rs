//! RPZ zone file rendering for rpz-updater.
//!
//! Turns an [`AggregatedZone`](rpz_core::AggregatedZone) into a BIND-style
//! response policy zone and publishes it with a temp-file-then-rename
//! protocol, so a name server reloading the file never reads a partial zone.
//!
//! # Example
//!
//! ```rust,no_run
//! use rpz_core::EventEmitter;
//! use rpz_zone::{ZoneConfig, ZoneRenderer};
//!
//! let renderer = ZoneRenderer::new(ZoneConfig::new("/var/lib/bind/adblock.rpz"));
//! let previous = renderer.previous_serial(&EventEmitter::null());
//! println!("published serial: {previous:?}");
//! ```

#![doc(html_root_url = "https://docs.rs/rpz-zone/0.3.0")]

mod config;
pub mod publish;
mod render;
pub mod serial;

pub use config::{PolicyAction, ZoneConfig};
pub use render::{RenderedZone, ZoneRenderer};
pub use serial::read_previous_serial;
