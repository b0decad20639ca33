//! Wallet session state and user notices

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Display value for an empty or reset balance
pub const ZERO_BALANCE: &str = "0.00";

/// Connection state of the wallet session
///
/// `connecting` is true only while a connect request is in flight; it
/// returns to false on every exit path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Connected account address, if any
    pub account: Option<String>,
    /// Balance display string (e.g. "2.45")
    pub balance: String,
    /// Whether a connect request is currently in flight
    pub connecting: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            account: None,
            balance: ZERO_BALANCE.to_string(),
            connecting: false,
        }
    }
}

impl SessionState {
    /// An account is present
    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }
}

/// Format a balance for display with two decimal places
pub fn format_balance(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-facing notice emitted on the side channel (rendered by the UI
/// layer as a toast; never raised as an error to the caller)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}
