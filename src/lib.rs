//! Wiki Harvester Core Library
//!
//! This library ingests catalogs of named entities from wiki-style sites,
//! extracts structured records (name, description, category), and persists
//! them for later keyword/category lookup. A content-addressed cache keeps
//! derived assets from being rebuilt on every request.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`fetch`] - Single-attempt HTTP page fetching with timeout
//! - [`parse`] - Pure HTML extraction of candidates and item details
//! - [`store`] - Domain and item persistence with search queries
//! - [`cache`] - Content-addressed derived-artifact cache with eviction
//! - [`scrape`] - Orchestration of fetch → parse → store per domain
//!
//! The front-end (forms, theming, dialogs) is an external collaborator:
//! everything here is invoked as plain library calls on injected handles.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod db;
pub mod fetch;
pub mod parse;
pub mod scrape;
pub mod store;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheError, CacheManager, Variant, VariantDeriver};
pub use db::Database;
pub use fetch::{FetchError, PageClient};
pub use parse::{ScrapeCandidate, extract_candidates, extract_detail};
pub use scrape::{ProgressSink, ScrapeStats, Scraper};
pub use store::{ItemRecord, Store, StoreError};
