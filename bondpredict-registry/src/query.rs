//! Query engine: search, filter, and sort over market snapshots
//!
//! Pure functions over an immutable snapshot — no side effects and no
//! shared state, so the same `(snapshot, query)` pair always produces the
//! same result. The pipeline order is fixed: search, then category
//! filter, then a stable sort.

use serde::{Deserialize, Serialize};
use std::fmt;

use bondpredict_core::MarketRecord;
use rust_decimal::Decimal;

/// Sort key for the market list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Descending raw volume
    Volume,
    /// Descending participant count
    Participants,
    /// Ascending deadline; unparsable or absent deadlines sort last
    Deadline,
}

impl Default for SortKey {
    fn default() -> Self {
        SortKey::Volume
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SortKey::Volume => "volume",
            SortKey::Participants => "participants",
            SortKey::Deadline => "deadline",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "volume" => Ok(SortKey::Volume),
            "participants" => Ok(SortKey::Participants),
            "deadline" => Ok(SortKey::Deadline),
            _ => Err(format!("Unknown sort key: {}", s)),
        }
    }
}

/// Category filter: everything, or one category exactly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    All,
    Only(String),
}

impl Default for CategoryFilter {
    fn default() -> Self {
        CategoryFilter::All
    }
}

impl std::str::FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            Ok(CategoryFilter::All)
        } else {
            Ok(CategoryFilter::Only(s.to_string()))
        }
    }
}

impl CategoryFilter {
    fn matches(&self, record: &MarketRecord) -> bool {
        match self {
            CategoryFilter::All => true,
            // An absent category never matches a specific filter
            CategoryFilter::Only(category) => {
                !record.category.is_empty() && record.category == *category
            }
        }
    }
}

/// Query parameters, owned by the caller and never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketQuery {
    pub search_term: String,
    pub category: CategoryFilter,
    pub sort_key: SortKey,
}

/// Apply a query to a snapshot, returning a new ordered sequence.
///
/// The input snapshot is never mutated; ties keep their prior relative
/// order (the sort is stable).
pub fn apply(snapshot: &[MarketRecord], query: &MarketQuery) -> Vec<MarketRecord> {
    let term = query.search_term.to_lowercase();

    let mut results: Vec<MarketRecord> = snapshot
        .iter()
        .filter(|record| matches_search(record, &term))
        .filter(|record| query.category.matches(record))
        .cloned()
        .collect();

    match query.sort_key {
        SortKey::Volume => {
            results.sort_by(|a, b| volume_key(b).cmp(&volume_key(a)));
        }
        SortKey::Participants => {
            results.sort_by(|a, b| b.participants.cmp(&a.participants));
        }
        SortKey::Deadline => {
            results.sort_by_key(|record| record.deadline_timestamp().unwrap_or(i64::MAX));
        }
    }

    results
}

/// Case-insensitive substring match against company name or bond ident.
/// An empty term passes everything.
fn matches_search(record: &MarketRecord, term: &str) -> bool {
    if term.is_empty() {
        return true;
    }
    record.company_name.to_lowercase().contains(term)
        || record.search_ident().to_lowercase().contains(term)
}

fn volume_key(record: &MarketRecord) -> Decimal {
    // Persisted blobs from older revisions may omit volumeRaw; serde
    // defaults it to zero, which is also the sort semantics for missing.
    record.volume_raw
}
