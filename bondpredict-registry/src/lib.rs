//! Market registry and query layer for BondPredict
//!
//! This crate provides:
//! - A durable key/value store adapter (SQLite-backed) used as a
//!   best-effort mirror of the in-memory collection
//! - The market registry owning the canonical market collection
//! - A pure query engine (search, filter, sort) over registry snapshots

pub mod query;
pub mod registry;
pub mod store;

pub use query::{apply, CategoryFilter, MarketQuery, SortKey};
pub use registry::{MarketRegistry, MARKETS_STORAGE_KEY};
pub use store::{SqliteStore, StoreAdapter, StoreError};
