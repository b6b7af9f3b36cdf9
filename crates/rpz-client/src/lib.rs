//! HTTP(S) fetcher for blocklist sources.
//!
//! This crate provides [`HttpFetcher`], the network-facing implementation of
//! [`rpz_core::BlocklistFetcher`].

#![doc(html_root_url = "https://docs.rs/rpz-client/0.3.0")]

mod client;
mod config;

pub use client::{HttpFetcher, HttpFetcherBuilder, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use config::*;
pub use rpz_core::FetchError;
