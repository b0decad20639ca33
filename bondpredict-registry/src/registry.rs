//! Market Registry
//!
//! Owns the canonical in-memory market collection and keeps a best-effort
//! durable mirror in sync. Memory is the source of truth: storage failures
//! are logged and never surface to callers, and the registry stays usable
//! even with a fully unavailable store.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

use bondpredict_core::{
    generate_market_id, BondDetails, CreateMarketInput, MarketRecord, PredictError,
    PredictResult, Trend,
};
use rust_decimal::Decimal;

use crate::store::StoreAdapter;

/// Fixed key the market collection is persisted under
pub const MARKETS_STORAGE_KEY: &str = "bondpredict.markets";

/// Registry owning the market collection
///
/// Constructed once at startup and shared by cloning; clones share the
/// same collection and store. Records are newest-first and never mutated
/// in place; the only destruction path is [`MarketRegistry::reset`].
pub struct MarketRegistry {
    markets: Arc<RwLock<Vec<MarketRecord>>>,
    store: Arc<dyn StoreAdapter>,
}

impl MarketRegistry {
    /// Create a registry over the given store. Call
    /// [`MarketRegistry::initialize`] before first use to load the
    /// persisted snapshot.
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self {
            markets: Arc::new(RwLock::new(Vec::new())),
            store,
        }
    }

    /// Load the persisted collection, falling back to empty on any read
    /// or parse failure. Returns the number of records loaded.
    pub fn initialize(&self) -> usize {
        let loaded = match self.load_snapshot() {
            Ok(records) => records,
            Err(err) => {
                warn!("Could not load markets from storage, starting empty: {}", err);
                Vec::new()
            }
        };

        let count = loaded.len();
        *self.markets.write() = loaded;
        info!("Market registry initialized with {} markets", count);
        count
    }

    fn load_snapshot(&self) -> PredictResult<Vec<MarketRecord>> {
        let blob = self
            .store
            .read(MARKETS_STORAGE_KEY)
            .map_err(|e| PredictError::storage(e.to_string()))?;

        match blob {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Create a new market from the given input.
    ///
    /// Field population is an ordered builder: user-supplied fields are
    /// applied first (including any shadowed computed fields carried by
    /// the payload), then the fixed computed overlay, then the bond
    /// sub-record. The computed overlay always wins.
    ///
    /// The new record is prepended; newest-first ordering is a committed
    /// contract. The only error this can return is a validation failure:
    /// incomplete input is the caller's to fix, so it is reported.
    /// Storage problems stay inside the registry: they are logged, not
    /// surfaced, and the in-memory mutation is never rolled back.
    pub fn create(&self, input: CreateMarketInput) -> PredictResult<MarketRecord> {
        input.validate()?;

        let record = build_record(input);
        debug!(id = %record.id, company = %record.company_name, "Created market");

        {
            let mut markets = self.markets.write();
            markets.insert(0, record.clone());
        }

        self.persist();
        Ok(record)
    }

    /// Immutable snapshot of the current collection, newest first
    pub fn list(&self) -> Vec<MarketRecord> {
        self.markets.read().clone()
    }

    /// Number of markets in the collection
    pub fn len(&self) -> usize {
        self.markets.read().len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.markets.read().is_empty()
    }

    /// Clear the collection and its durable mirror.
    ///
    /// Memory is cleared regardless of whether the store cooperates.
    pub fn reset(&self) {
        self.markets.write().clear();
        if let Err(err) = self.store.clear(MARKETS_STORAGE_KEY) {
            warn!("Could not clear persisted markets: {}", err);
        }
        info!("Market registry reset");
    }

    /// Write-through persist of the full collection. Best-effort: a failed
    /// write leaves memory untouched and the durable copy at most one
    /// write behind.
    fn persist(&self) {
        let snapshot = self.markets.read().clone();
        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(err) => {
                warn!("Could not serialize markets for persistence: {}", err);
                return;
            }
        };

        if let Err(err) = self.store.write(MARKETS_STORAGE_KEY, &json) {
            warn!("Could not persist {} markets: {}", snapshot.len(), err);
        }
    }
}

impl Clone for MarketRegistry {
    fn clone(&self) -> Self {
        Self {
            markets: Arc::clone(&self.markets),
            store: Arc::clone(&self.store),
        }
    }
}

/// Ordered builder for a new record: user fields first, computed overlay
/// second, bond sub-record last. Kept as an explicit sequence because the
/// overlay-wins rule is an invariant, not an accident of field order.
fn build_record(input: CreateMarketInput) -> MarketRecord {
    // 1. User fields, including any shadowed computed fields the payload
    //    happened to carry.
    let mut record = MarketRecord {
        id: input.id.clone().unwrap_or_default(),
        company_name: input.company_name.clone(),
        ticker_symbol: input.ticker_symbol.clone(),
        sector_industry: input.sector_industry.clone(),
        country_region: input.country_region.clone(),
        question: input.question.clone(),
        description: input.description.clone(),
        deadline: input.deadline.clone(),
        category: input.category.clone(),
        resolution_criteria: input.resolution_criteria.clone(),
        bond_id: input.bond_id.clone(),
        bond_details: BondDetails {
            issuer: String::new(),
            coupon: String::new(),
            maturity: String::new(),
            principal: String::new(),
            rating: String::new(),
            sector: String::new(),
        },
        yes_price: input.yes_price.unwrap_or_default(),
        no_price: input.no_price.unwrap_or_default(),
        volume: input.volume.clone().unwrap_or_default(),
        volume_raw: input.volume_raw.unwrap_or_default(),
        participants: input.participants.unwrap_or_default(),
        trend: input.trend.unwrap_or_default(),
    };

    // 2. Computed overlay. Always wins over identically named input fields.
    record.id = generate_market_id();
    record.yes_price = Decimal::new(5, 1);
    record.no_price = Decimal::new(5, 1);
    record.volume = "$0".to_string();
    record.volume_raw = Decimal::ZERO;
    record.participants = 0;
    record.trend = Trend::Up;

    // 3. Bond sub-record, synthesized from the already-applied input.
    record.bond_details = BondDetails::from_input(&input);

    record
}
