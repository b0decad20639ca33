//! Wallet session manager
//!
//! State machine over [`SessionState`]: Disconnected, Connecting (only
//! while a connect request is in flight), Connected. Driven by explicit
//! connect/disconnect calls and by provider events, and never raises
//! errors to its caller — failures surface as state transitions plus a
//! notice on the side channel.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use bondpredict_core::{format_balance, Notice, SessionState, ZERO_BALANCE};

use crate::provider::{ProviderEvent, ProviderGateway};

/// Session manager over the provider gateway
///
/// Clones share the same state; the gateway's event receiver feeds
/// [`SessionManager::run`], the single consumer of provider events.
pub struct SessionManager {
    gateway: Arc<ProviderGateway>,
    state: Arc<RwLock<SessionState>>,
    /// Bumped on every forced disconnect; an in-flight connect that
    /// resumes under a newer epoch discards its result.
    epoch: Arc<AtomicU64>,
    notice_tx: UnboundedSender<Notice>,
}

impl SessionManager {
    /// Create a session manager and the receiving end of its notice
    /// side channel
    pub fn new(gateway: ProviderGateway) -> (Self, UnboundedReceiver<Notice>) {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let manager = Self {
            gateway: Arc::new(gateway),
            state: Arc::new(RwLock::new(SessionState::default())),
            epoch: Arc::new(AtomicU64::new(0)),
            notice_tx,
        };
        (manager, notice_rx)
    }

    /// Snapshot of the current session state
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// The gateway this session is bound to
    pub fn gateway(&self) -> &ProviderGateway {
        &self.gateway
    }

    /// Connect to the provider.
    ///
    /// No-op (plus a notice) when no provider is injected. Otherwise
    /// requests accounts, ending Connected with the first address on
    /// success and Disconnected with a notice on rejection or error.
    /// `connecting` returns to false on every exit path. A forced
    /// disconnect that lands while the request is in flight wins: the
    /// late result is discarded.
    pub async fn connect(&self) {
        if !self.gateway.is_available() {
            self.notify(Notice::error(
                "No wallet provider detected. Please install MetaMask to continue.",
            ));
            return;
        }

        let epoch = self.epoch.load(Ordering::SeqCst);
        self.state.write().connecting = true;

        let result = self.gateway.request_accounts().await;
        self.state.write().connecting = false;

        if self.epoch.load(Ordering::SeqCst) != epoch {
            debug!("Discarding connect result; session was disconnected mid-flight");
            return;
        }

        match result {
            Ok(accounts) => match accounts.into_iter().next() {
                Some(primary) => {
                    info!(account = %primary, "Wallet connected");
                    self.state.write().account = Some(primary.clone());
                    self.refresh_balance(&primary).await;
                }
                None => {
                    // Zero authorized accounts is treated like a rejection
                    self.clear_session();
                    self.notify(Notice::error("Wallet connection was declined"));
                }
            },
            Err(err) => {
                warn!("Wallet connect failed: {}", err);
                self.clear_session();
                self.notify(Notice::error(format!("Failed to connect wallet: {}", err)));
            }
        }
    }

    /// Unconditionally drop the session: account cleared, balance reset.
    /// The provider is not told — it has no concept of an app-initiated
    /// disconnect.
    pub fn disconnect(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.clear_session();
        info!("Wallet disconnected");
    }

    /// Restore a previously authorized session without prompting.
    ///
    /// Passive: uses the non-interactive account query and never flips
    /// `connecting`. Failures are logged only — nothing user-initiated
    /// happened, so no notice is emitted.
    pub async fn restore(&self) {
        if !self.gateway.is_available() {
            return;
        }

        match self.gateway.get_accounts().await {
            Ok(accounts) => {
                if let Some(primary) = accounts.into_iter().next() {
                    info!(account = %primary, "Restored authorized wallet session");
                    self.state.write().account = Some(primary.clone());
                    self.refresh_balance(&primary).await;
                }
            }
            Err(err) => {
                debug!("Passive account check failed: {}", err);
            }
        }
    }

    /// React to a provider event. Events must be handled in delivery
    /// order; [`SessionManager::run`] guarantees that for the gateway's
    /// channel.
    pub async fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::AccountsChanged(accounts) => match accounts.into_iter().next() {
                Some(primary) => {
                    info!(account = %primary, "Provider switched accounts");
                    self.state.write().account = Some(primary.clone());
                    self.refresh_balance(&primary).await;
                }
                None => {
                    // Accounts revoked: identical to an explicit disconnect
                    self.disconnect();
                }
            },
            ProviderEvent::ChainChanged(chain) => {
                // Never trust a stale balance across a network switch
                warn!(chain = %chain, "Provider changed networks, forcing disconnect");
                self.disconnect();
                self.notify(Notice::warning(
                    "Network changed. Wallet disconnected; please reconnect.",
                ));
            }
        }
    }

    /// Drain provider events until the channel closes.
    ///
    /// Single consumer: take the receiver from the gateway once on
    /// activation and run this loop; dropping every sink tears it down.
    pub async fn run(&self, mut events: UnboundedReceiver<ProviderEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        debug!("Provider event channel closed, session event loop stopped");
    }

    /// Fetch and apply the balance for `address`.
    ///
    /// The fetched-for address is compared against the live session
    /// account before the result is applied, so a late result for a
    /// superseded account is discarded.
    async fn refresh_balance(&self, address: &str) {
        match self.gateway.get_balance(address).await {
            Ok(amount) => {
                let mut state = self.state.write();
                if state.account.as_deref() == Some(address) {
                    state.balance = format_balance(amount);
                } else {
                    debug!(address = %address, "Discarding stale balance result");
                }
            }
            Err(err) => {
                warn!(address = %address, "Balance refresh failed: {}", err);
                {
                    let mut state = self.state.write();
                    if state.account.as_deref() == Some(address) {
                        state.balance = ZERO_BALANCE.to_string();
                    }
                }
                self.notify(Notice::warning("Unable to fetch wallet balance"));
            }
        }
    }

    fn clear_session(&self) {
        let mut state = self.state.write();
        state.account = None;
        state.balance = ZERO_BALANCE.to_string();
        state.connecting = false;
    }

    fn notify(&self, notice: Notice) {
        // The UI may not be listening (e.g. in tests); that is fine
        let _ = self.notice_tx.send(notice);
    }
}

impl Clone for SessionManager {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            state: Arc::clone(&self.state),
            epoch: Arc::clone(&self.epoch),
            notice_tx: self.notice_tx.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AccountProvider, Result as WalletResult, WalletError};
    use async_trait::async_trait;
    use bondpredict_core::NoticeLevel;
    use parking_lot::Mutex;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use tokio::sync::Notify;

    /// Scriptable provider double
    #[derive(Default)]
    struct MockProvider {
        accounts: Vec<String>,
        authorized: Vec<String>,
        balance: Decimal,
        /// Per-address balances, consulted before the flat `balance`
        balances: HashMap<String, Decimal>,
        reject_request: bool,
        fail_balance: bool,
        /// Addresses whose balance fetch fails
        fail_addresses: Vec<String>,
        balance_calls: Mutex<Vec<String>>,
        /// When set, request_accounts waits for a permit before resolving
        request_gate: Option<Arc<Notify>>,
        /// When set, get_balance waits for a permit before resolving
        balance_gate: Option<Arc<Notify>>,
    }

    impl MockProvider {
        fn with_accounts(accounts: &[&str], balance: Decimal) -> Self {
            Self {
                accounts: accounts.iter().map(|s| s.to_string()).collect(),
                balance,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl AccountProvider for MockProvider {
        async fn request_accounts(&self) -> WalletResult<Vec<String>> {
            if let Some(gate) = &self.request_gate {
                gate.notified().await;
            }
            if self.reject_request {
                return Err(WalletError::Rejected("user declined".to_string()));
            }
            Ok(self.accounts.clone())
        }

        async fn get_accounts(&self) -> WalletResult<Vec<String>> {
            Ok(self.authorized.clone())
        }

        async fn get_balance(&self, address: &str) -> WalletResult<Decimal> {
            self.balance_calls.lock().push(address.to_string());
            if let Some(gate) = &self.balance_gate {
                gate.notified().await;
            }
            if self.fail_balance || self.fail_addresses.iter().any(|a| a == address) {
                return Err(WalletError::BalanceUnavailable("rpc down".to_string()));
            }
            match self.balances.get(address) {
                Some(amount) => Ok(*amount),
                None => Ok(self.balance),
            }
        }
    }

    fn manager_with(
        provider: MockProvider,
    ) -> (SessionManager, UnboundedReceiver<Notice>, Arc<MockProvider>) {
        let provider = Arc::new(provider);
        let gateway = ProviderGateway::new(Some(provider.clone() as Arc<dyn AccountProvider>));
        let (manager, notices) = SessionManager::new(gateway);
        (manager, notices, provider)
    }

    #[tokio::test]
    async fn test_connect_without_provider() {
        let (manager, mut notices) = SessionManager::new(ProviderGateway::new(None));

        manager.connect().await;

        let state = manager.state();
        assert_eq!(state.account, None);
        assert!(!state.connecting);

        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        // Exactly one notice
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_success_refreshes_balance() {
        let (manager, _notices, provider) =
            manager_with(MockProvider::with_accounts(&["0xAA", "0xBB"], dec!(2.45)));

        manager.connect().await;

        let state = manager.state();
        assert_eq!(state.account.as_deref(), Some("0xAA"));
        assert_eq!(state.balance, "2.45");
        assert!(!state.connecting);
        assert_eq!(provider.balance_calls.lock().as_slice(), ["0xAA"]);
    }

    #[tokio::test]
    async fn test_connect_rejection() {
        let provider = MockProvider {
            reject_request: true,
            ..Default::default()
        };
        let (manager, mut notices, _) = manager_with(provider);

        manager.connect().await;

        let state = manager.state();
        assert_eq!(state.account, None);
        assert_eq!(state.balance, ZERO_BALANCE);
        assert!(!state.connecting);
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_connect_with_zero_accounts_acts_like_rejection() {
        let (manager, mut notices, provider) =
            manager_with(MockProvider::with_accounts(&[], dec!(1)));

        manager.connect().await;

        let state = manager.state();
        assert_eq!(state.account, None);
        assert!(!state.connecting);
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Error);
        assert!(provider.balance_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_balance_failure_resets_display_value() {
        let provider = MockProvider {
            accounts: vec!["0xAA".to_string()],
            fail_balance: true,
            ..Default::default()
        };
        let (manager, mut notices, _) = manager_with(provider);

        manager.connect().await;

        let state = manager.state();
        assert_eq!(state.account.as_deref(), Some("0xAA"));
        assert_eq!(state.balance, ZERO_BALANCE);
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn test_disconnect_resets_state() {
        let (manager, _notices, _) =
            manager_with(MockProvider::with_accounts(&["0xAA"], dec!(2.45)));

        manager.connect().await;
        assert!(manager.state().is_connected());

        manager.disconnect();
        let state = manager.state();
        assert_eq!(state.account, None);
        assert_eq!(state.balance, ZERO_BALANCE);
        assert!(!state.connecting);
    }

    #[tokio::test]
    async fn test_accounts_changed_to_empty_is_disconnect() {
        let (manager, _notices, _) =
            manager_with(MockProvider::with_accounts(&["0xAA"], dec!(2.45)));
        manager.connect().await;

        manager
            .handle_event(ProviderEvent::AccountsChanged(vec![]))
            .await;

        let state = manager.state();
        assert_eq!(state.account, None);
        assert_eq!(state.balance, ZERO_BALANCE);
    }

    #[tokio::test]
    async fn test_accounts_changed_switches_primary() {
        let (manager, _notices, provider) =
            manager_with(MockProvider::with_accounts(&["0xAA"], dec!(2.45)));
        manager.connect().await;

        manager
            .handle_event(ProviderEvent::AccountsChanged(vec![
                "0xBB".to_string(),
                "0xCC".to_string(),
            ]))
            .await;

        let state = manager.state();
        assert_eq!(state.account.as_deref(), Some("0xBB"));
        assert_eq!(provider.balance_calls.lock().as_slice(), ["0xAA", "0xBB"]);
    }

    #[tokio::test]
    async fn test_chain_changed_forces_disconnect_with_warning() {
        let (manager, mut notices, _) =
            manager_with(MockProvider::with_accounts(&["0xAA"], dec!(2.45)));
        manager.connect().await;

        manager
            .handle_event(ProviderEvent::ChainChanged("0x89".to_string()))
            .await;

        let state = manager.state();
        assert_eq!(state.account, None);
        assert_eq!(state.balance, ZERO_BALANCE);
        assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Warning);
    }

    #[tokio::test]
    async fn test_restore_is_passive() {
        let provider = MockProvider {
            authorized: vec!["0xAA".to_string()],
            balance: dec!(2.45),
            ..Default::default()
        };
        let (manager, mut notices, _) = manager_with(provider);

        manager.restore().await;

        let state = manager.state();
        assert_eq!(state.account.as_deref(), Some("0xAA"));
        assert_eq!(state.balance, "2.45");
        assert!(!state.connecting);
        // Passive restore emits no notices
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_restore_without_authorization_stays_disconnected() {
        let (manager, _notices, provider) = manager_with(MockProvider::default());

        manager.restore().await;

        assert_eq!(manager.state().account, None);
        assert!(provider.balance_calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_forced_disconnect_wins_over_inflight_connect() {
        let gate = Arc::new(Notify::new());
        let provider = MockProvider {
            accounts: vec!["0xAA".to_string()],
            balance: dec!(2.45),
            request_gate: Some(gate.clone()),
            ..Default::default()
        };
        let (manager, _notices, _) = manager_with(provider);

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });

        // Let the connect reach its suspension point, then race it
        tokio::task::yield_now().await;
        assert!(manager.state().connecting);
        manager
            .handle_event(ProviderEvent::ChainChanged("0x1".to_string()))
            .await;

        gate.notify_one();
        pending.await.unwrap();

        // The forced disconnect won; the late account list was discarded
        let state = manager.state();
        assert_eq!(state.account, None);
        assert_eq!(state.balance, ZERO_BALANCE);
        assert!(!state.connecting);
    }

    #[tokio::test]
    async fn test_stale_balance_result_discarded_after_account_switch() {
        let gate = Arc::new(Notify::new());
        let provider = MockProvider {
            accounts: vec!["0xAA".to_string()],
            balances: HashMap::from([
                ("0xAA".to_string(), dec!(1.11)),
                ("0xBB".to_string(), dec!(2.22)),
            ]),
            balance_gate: Some(gate.clone()),
            ..Default::default()
        };
        let (manager, _notices, provider) = manager_with(provider);

        // Connect parks inside the balance fetch for 0xAA
        let connecting = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });
        tokio::task::yield_now().await;
        assert_eq!(manager.state().account.as_deref(), Some("0xAA"));

        // The provider switches accounts while that fetch is in flight
        let switching = tokio::spawn({
            let manager = manager.clone();
            async move {
                manager
                    .handle_event(ProviderEvent::AccountsChanged(vec!["0xBB".to_string()]))
                    .await
            }
        });
        tokio::task::yield_now().await;
        assert_eq!(manager.state().account.as_deref(), Some("0xBB"));

        gate.notify_one();
        gate.notify_one();
        connecting.await.unwrap();
        switching.await.unwrap();

        // 0xAA's late result was discarded; the balance is 0xBB's
        let state = manager.state();
        assert_eq!(state.account.as_deref(), Some("0xBB"));
        assert_eq!(state.balance, "2.22");
        assert_eq!(provider.balance_calls.lock().clone(), ["0xAA", "0xBB"]);
    }

    #[tokio::test]
    async fn test_failing_stale_fetch_leaves_new_balance_untouched() {
        let gate = Arc::new(Notify::new());
        let provider = MockProvider {
            accounts: vec!["0xAA".to_string()],
            balances: HashMap::from([("0xBB".to_string(), dec!(2.22))]),
            fail_addresses: vec!["0xAA".to_string()],
            balance_gate: Some(gate.clone()),
            ..Default::default()
        };
        let (manager, _notices, _) = manager_with(provider);

        let connecting = tokio::spawn({
            let manager = manager.clone();
            async move { manager.connect().await }
        });
        tokio::task::yield_now().await;

        let switching = tokio::spawn({
            let manager = manager.clone();
            async move {
                manager
                    .handle_event(ProviderEvent::AccountsChanged(vec!["0xBB".to_string()]))
                    .await
            }
        });
        tokio::task::yield_now().await;

        gate.notify_one();
        gate.notify_one();
        connecting.await.unwrap();
        switching.await.unwrap();

        // The stale failure for 0xAA must not zero out 0xBB's balance
        let state = manager.state();
        assert_eq!(state.account.as_deref(), Some("0xBB"));
        assert_eq!(state.balance, "2.22");
    }
}
