//! Wallet integration for BondPredict
//!
//! This crate provides:
//! - The provider gateway: a thin boundary over an externally injected
//!   account provider, with a typed event channel
//! - The session manager: a small state machine tracking connection,
//!   account, and balance, driven by explicit calls and provider events

pub mod provider;
pub mod session;

pub use provider::{AccountProvider, ProviderEvent, ProviderGateway, WalletError};
pub use session::SessionManager;
