//! Provider gateway - thin boundary over the injected account provider
//!
//! The host environment injects (or doesn't inject) a wallet-like account
//! provider. The gateway isolates that side effect: presence check,
//! request dispatch, and a typed event channel for the provider's
//! asynchronous account/network notifications.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

/// Errors from provider interactions
#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no wallet provider is available")]
    ProviderUnavailable,

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("balance unavailable: {0}")]
    BalanceUnavailable(String),

    #[error("provider error: {0}")]
    Provider(String),
}

/// Result type alias for wallet operations
pub type Result<T> = std::result::Result<T, WalletError>;

/// Externally injected account provider boundary
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Request account access. Interactive: suspends pending user
    /// approval and fails with [`WalletError::Rejected`] if declined.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    /// Already-authorized accounts, empty if none. Non-interactive.
    async fn get_accounts(&self) -> Result<Vec<String>>;

    /// Balance for an address. Fails with
    /// [`WalletError::BalanceUnavailable`] on any provider or network
    /// error.
    async fn get_balance(&self, address: &str) -> Result<Decimal>;
}

/// Asynchronous events emitted by the provider, delivered in emission order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The authorized account list changed (possibly to empty)
    AccountsChanged(Vec<String>),
    /// The provider switched to another chain; payload is opaque
    ChainChanged(String),
}

/// Gateway over an optionally present provider
///
/// Provider events flow through a single typed channel: the host pushes
/// emissions into [`ProviderGateway::event_sink`], the session manager
/// consumes them via [`ProviderGateway::subscribe`]. The receiver is
/// handed out exactly once, so re-activation can never accumulate
/// duplicate handlers.
pub struct ProviderGateway {
    provider: Option<Arc<dyn AccountProvider>>,
    event_tx: Mutex<Option<UnboundedSender<ProviderEvent>>>,
    event_rx: Mutex<Option<UnboundedReceiver<ProviderEvent>>>,
}

impl ProviderGateway {
    /// Wrap the injected provider, `None` when the host has none
    pub fn new(provider: Option<Arc<dyn AccountProvider>>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            event_tx: Mutex::new(Some(event_tx)),
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// True iff an external account provider is present
    pub fn is_available(&self) -> bool {
        self.provider.is_some()
    }

    /// Sender the host adapter uses to forward provider emissions.
    /// `None` after [`ProviderGateway::shutdown`].
    pub fn event_sink(&self) -> Option<UnboundedSender<ProviderEvent>> {
        self.event_tx.lock().clone()
    }

    /// Tear down the event channel. Once every handed-out sink is also
    /// dropped, the consumer's receive loop ends, so no event is ever
    /// delivered to a torn-down session.
    pub fn shutdown(&self) {
        if self.event_tx.lock().take().is_some() {
            debug!("provider event sink closed");
        }
    }

    /// Take the single event receiver. Returns `None` on every call after
    /// the first.
    pub fn subscribe(&self) -> Option<UnboundedReceiver<ProviderEvent>> {
        let receiver = self.event_rx.lock().take();
        if receiver.is_some() {
            debug!("provider event subscription handed out");
        }
        receiver
    }

    pub async fn request_accounts(&self) -> Result<Vec<String>> {
        self.require_provider()?.request_accounts().await
    }

    pub async fn get_accounts(&self) -> Result<Vec<String>> {
        self.require_provider()?.get_accounts().await
    }

    pub async fn get_balance(&self, address: &str) -> Result<Decimal> {
        self.require_provider()?.get_balance(address).await
    }

    fn require_provider(&self) -> Result<&Arc<dyn AccountProvider>> {
        self.provider.as_ref().ok_or(WalletError::ProviderUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopProvider;

    #[async_trait]
    impl AccountProvider for NoopProvider {
        async fn request_accounts(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn get_accounts(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }

        async fn get_balance(&self, _address: &str) -> Result<Decimal> {
            Ok(Decimal::ZERO)
        }
    }

    #[test]
    fn test_availability_tracks_injection() {
        assert!(!ProviderGateway::new(None).is_available());
        assert!(ProviderGateway::new(Some(Arc::new(NoopProvider))).is_available());
    }

    #[tokio::test]
    async fn test_requests_without_provider_fail() {
        let gateway = ProviderGateway::new(None);
        assert!(matches!(
            gateway.request_accounts().await,
            Err(WalletError::ProviderUnavailable)
        ));
        assert!(matches!(
            gateway.get_accounts().await,
            Err(WalletError::ProviderUnavailable)
        ));
        assert!(matches!(
            gateway.get_balance("0xAA").await,
            Err(WalletError::ProviderUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_subscribe_hands_out_receiver_once() {
        let gateway = ProviderGateway::new(None);
        let mut receiver = gateway.subscribe().expect("first subscribe");
        assert!(gateway.subscribe().is_none());

        gateway
            .event_sink()
            .unwrap()
            .send(ProviderEvent::ChainChanged("0x89".to_string()))
            .unwrap();
        assert_eq!(
            receiver.recv().await,
            Some(ProviderEvent::ChainChanged("0x89".to_string()))
        );
    }

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let gateway = ProviderGateway::new(None);
        let mut receiver = gateway.subscribe().unwrap();
        let sink = gateway.event_sink().unwrap();

        sink.send(ProviderEvent::AccountsChanged(vec!["0xAA".to_string()]))
            .unwrap();
        sink.send(ProviderEvent::AccountsChanged(vec![])).unwrap();
        sink.send(ProviderEvent::ChainChanged("0x1".to_string()))
            .unwrap();

        assert_eq!(
            receiver.recv().await,
            Some(ProviderEvent::AccountsChanged(vec!["0xAA".to_string()]))
        );
        assert_eq!(
            receiver.recv().await,
            Some(ProviderEvent::AccountsChanged(vec![]))
        );
        assert_eq!(
            receiver.recv().await,
            Some(ProviderEvent::ChainChanged("0x1".to_string()))
        );
    }

    #[tokio::test]
    async fn test_shutdown_closes_the_channel() {
        let gateway = ProviderGateway::new(None);
        let mut receiver = gateway.subscribe().unwrap();
        let sink = gateway.event_sink().unwrap();

        sink.send(ProviderEvent::ChainChanged("0x1".to_string()))
            .unwrap();
        gateway.shutdown();
        assert!(gateway.event_sink().is_none());
        drop(sink);

        // Queued events still drain, then the channel reports closed
        assert!(receiver.recv().await.is_some());
        assert_eq!(receiver.recv().await, None);
    }
}
