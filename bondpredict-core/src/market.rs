//! Market data structures for bond default prediction markets

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{PredictError, PredictResult};

/// Price trend direction for a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    /// YES price trending up
    Up,
    /// YES price trending down
    Down,
}

impl Default for Trend {
    fn default() -> Self {
        Trend::Up
    }
}

/// Bond details attached to a market, synthesized from creation input
///
/// Every field falls back to the literal `"N/A"` when the source field
/// was absent or empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BondDetails {
    pub issuer: String,
    pub coupon: String,
    pub maturity: String,
    pub principal: String,
    pub rating: String,
    pub sector: String,
}

/// A bond default prediction market
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRecord {
    /// Unique identifier, generated at creation, never reused
    pub id: String,

    /// Issuer company name
    pub company_name: String,

    /// Issuer ticker symbol
    pub ticker_symbol: String,

    /// Issuer sector/industry
    pub sector_industry: String,

    /// Issuer country/region
    pub country_region: String,

    /// The market question (e.g. "Will X default on its 2027 bond?")
    pub question: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Resolution deadline as entered by the creator; may be absent or
    /// unparsable, see [`MarketRecord::deadline_timestamp`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,

    /// Category slug (e.g. "technology", "automotive")
    #[serde(default)]
    pub category: String,

    /// Resolution criteria tags selected at creation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resolution_criteria: Vec<String>,

    /// Bond identifier (e.g. "TSLA-2027-5.3%")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bond_id: Option<String>,

    /// Structured bond details
    pub bond_details: BondDetails,

    /// Current YES price (0.00 - 1.00, represents probability)
    pub yes_price: Decimal,

    /// Current NO price (0.00 - 1.00, yes_price + no_price == 1 at creation)
    pub no_price: Decimal,

    /// Trading volume as a display string (e.g. "$45,230")
    pub volume: String,

    /// Trading volume as a raw number, the canonical sort key
    #[serde(default)]
    pub volume_raw: Decimal,

    /// Number of participants
    #[serde(default)]
    pub participants: u32,

    /// Current price trend
    #[serde(default)]
    pub trend: Trend,
}

impl MarketRecord {
    /// Identifier used for search matching: the bond id when present,
    /// falling back to the ticker symbol.
    pub fn search_ident(&self) -> &str {
        match self.bond_id.as_deref() {
            Some(id) if !id.is_empty() => id,
            _ => &self.ticker_symbol,
        }
    }

    /// Parse the deadline into epoch milliseconds.
    ///
    /// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates. Returns
    /// `None` for an absent or unparsable deadline; callers sorting by
    /// deadline push those records to the end.
    pub fn deadline_timestamp(&self) -> Option<i64> {
        let raw = self.deadline.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.timestamp_millis());
        }
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            return Some(midnight.and_utc().timestamp_millis());
        }
        None
    }
}

/// Creation input for a new market
///
/// Deserializes from the creation form payload. Besides the user-entered
/// fields it carries optional shadows of every system-computed field; the
/// registry applies user fields first and then overlays the computed
/// values, so a payload that smuggles in `yesPrice` or `id` never wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateMarketInput {
    pub company_name: String,
    pub ticker_symbol: String,
    pub sector_industry: String,
    pub country_region: String,
    pub question: String,
    pub description: String,
    pub deadline: Option<String>,
    pub category: String,
    pub resolution_criteria: Vec<String>,
    pub bond_id: Option<String>,
    pub bond_type: Option<String>,
    pub issue_date: Option<String>,
    pub maturity_date: Option<String>,
    pub coupon_rate: Option<String>,
    pub face_value: Option<String>,
    pub credit_rating: Option<String>,

    // Shadows of system-computed fields. Copied in first, overridden always.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_raw: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

impl CreateMarketInput {
    /// Check that all required form fields are present
    pub fn validate(&self) -> PredictResult<()> {
        let required = [
            ("companyName", &self.company_name),
            ("tickerSymbol", &self.ticker_symbol),
            ("sectorIndustry", &self.sector_industry),
            ("countryRegion", &self.country_region),
            ("question", &self.question),
            ("category", &self.category),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PredictError::validation(format!(
                    "Missing required field: {}",
                    name
                )));
            }
        }
        match self.deadline.as_deref() {
            Some(d) if !d.trim().is_empty() => Ok(()),
            _ => Err(PredictError::validation("Missing required field: deadline")),
        }
    }
}

impl BondDetails {
    /// Synthesize bond details from creation input, `"N/A"` per missing field
    pub fn from_input(input: &CreateMarketInput) -> Self {
        fn or_na(value: &str) -> String {
            if value.trim().is_empty() {
                "N/A".to_string()
            } else {
                value.to_string()
            }
        }
        fn opt_or_na(value: &Option<String>) -> String {
            or_na(value.as_deref().unwrap_or(""))
        }

        Self {
            issuer: or_na(&input.company_name),
            coupon: opt_or_na(&input.coupon_rate),
            maturity: opt_or_na(&input.maturity_date),
            principal: opt_or_na(&input.face_value),
            rating: opt_or_na(&input.credit_rating),
            sector: or_na(&input.sector_industry),
        }
    }
}

/// Process-wide sequence component for generated market ids
static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generate a unique market id.
///
/// Combines a random component with the current time in milliseconds and a
/// monotonically increasing sequence number, so repeated calls within a
/// session can never collide even inside the same millisecond.
pub fn generate_market_id() -> String {
    let nonce: u32 = rand::random();
    let millis = Utc::now().timestamp_millis();
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{:08x}{:x}-{:x}", nonce, millis, seq)
}
