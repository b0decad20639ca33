//! Core types for the BondPredict market library
//!
//! This crate defines the shared data structures used across the library:
//! market records and their creation inputs, wallet session state, user
//! notices, and the library-wide error type.

pub mod error;
pub mod market;
pub mod session;

pub use error::{PredictError, PredictResult};
pub use market::{
    generate_market_id, BondDetails, CreateMarketInput, MarketRecord, Trend,
};
pub use session::{format_balance, Notice, NoticeLevel, SessionState, ZERO_BALANCE};
