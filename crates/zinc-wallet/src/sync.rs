//! Synchronization with a [`SyncProvider`].
//!
//! The [`SyncCoordinator`] owns the wallet's [`SyncState`] machine:
//!
//! ```text
//! Idle ──start──▶ Syncing ──caught up──▶ Synced
//!                   │  ▲                   │
//!     provider error│  └──────start────────┤
//!                   ▼                      │
//!                 Failed ◀──provider error─┘
//! ```
//!
//! Synced and Failed are rest states; `start()` resumes from either.
//! Provider deliveries are fed in through the `on_*` methods, or by
//! [`run`](SyncCoordinator::run) draining a [`ProviderEvent`] channel.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use zinc_core::address::Address;
use zinc_core::error::ProviderError;
use zinc_core::traits::{ProviderEvent, SyncProvider};
use zinc_core::types::{BlockInfo, ObservedTransaction, Txid};

use crate::builder::BuiltTransaction;
use crate::error::WalletError;
use crate::events::WalletEvent;
use crate::wallet::Wallet;

/// Synchronization state of one wallet.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    Idle,
    Syncing,
    Synced,
    Failed(String),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Syncing => f.write_str("syncing"),
            Self::Synced => f.write_str("synced"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Drives one wallet against one provider.
pub struct SyncCoordinator {
    wallet: Arc<Wallet>,
    provider: Arc<dyn SyncProvider>,
    state: Mutex<SyncState>,
    watched: Mutex<BTreeSet<Address>>,
}

impl SyncCoordinator {
    pub fn new(wallet: Arc<Wallet>, provider: Arc<dyn SyncProvider>) -> Self {
        Self {
            wallet,
            provider,
            state: Mutex::new(SyncState::Idle),
            watched: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn wallet(&self) -> &Arc<Wallet> {
        &self.wallet
    }

    pub fn state(&self) -> SyncState {
        self.state.lock().clone()
    }

    /// Addresses currently registered with the provider.
    pub fn watched(&self) -> Vec<Address> {
        self.watched.lock().iter().copied().collect()
    }

    /// Apply `f` to the state; logs and returns whether it changed.
    fn transition(&self, f: impl FnOnce(&SyncState) -> Option<SyncState>) -> bool {
        let mut state = self.state.lock();
        match f(&state) {
            Some(next) if next != *state => {
                let prev = std::mem::replace(&mut *state, next);
                info!(from = %prev, to = %*state, "sync state changed");
                true
            }
            _ => false,
        }
    }

    /// Begin (or resume) syncing.
    ///
    /// Registers every known and lookahead address with the provider. A
    /// registration failure moves to Failed.
    pub async fn start(&self) -> Result<(), WalletError> {
        self.transition(|_| Some(SyncState::Syncing));
        self.wallet.emit(WalletEvent::SyncStarted);

        self.wallet.release_expired()?;

        let addresses = self.wallet.watch_addresses();
        if let Err(e) = self.provider.watch(&addresses).await {
            warn!(error = %e, "failed to register addresses");
            self.on_provider_error(e.to_string());
            return Err(e.into());
        }
        debug!(count = addresses.len(), "registered addresses with provider");
        self.watched.lock().extend(addresses);
        Ok(())
    }

    /// Register addresses derived since the last registration.
    async fn watch_new(&self) -> Result<(), ProviderError> {
        let fresh: Vec<Address> = {
            let watched = self.watched.lock();
            self.wallet
                .watch_addresses()
                .into_iter()
                .filter(|a| !watched.contains(a))
                .collect()
        };
        if fresh.is_empty() {
            return Ok(());
        }
        self.provider.watch(&fresh).await?;
        debug!(count = fresh.len(), "registered new addresses");
        self.watched.lock().extend(fresh);
        Ok(())
    }

    /// Ingest a delivery and register any addresses it caused to be derived.
    ///
    /// Deliveries while Idle are dropped. A batch that cannot be ingested
    /// leaves the wallet untouched and moves to Failed, so the next
    /// `start()` gets it delivered again.
    pub async fn on_data_received(
        &self,
        transactions: &[ObservedTransaction],
        blocks: &[BlockInfo],
    ) -> Result<(), WalletError> {
        if self.state() == SyncState::Idle {
            debug!(
                transactions = transactions.len(),
                blocks = blocks.len(),
                "ignoring delivery while idle"
            );
            return Ok(());
        }

        if let Err(e) = self.wallet.apply_sync_data(transactions, blocks) {
            warn!(error = %e, "failed to ingest delivery");
            self.on_provider_error(e.to_string());
            return Err(e);
        }

        if let Err(e) = self.watch_new().await {
            warn!(error = %e, "failed to register new addresses");
            self.on_provider_error(e.to_string());
            return Err(e.into());
        }
        Ok(())
    }

    /// Syncing or Synced → Failed(reason). Wallet state is not touched.
    pub fn on_provider_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        let changed = self.transition(|s| match s {
            SyncState::Syncing | SyncState::Synced => Some(SyncState::Failed(reason.clone())),
            _ => None,
        });
        if changed {
            warn!(%reason, "sync failed");
            self.wallet.emit(WalletEvent::SyncFailed(reason));
        } else {
            debug!(%reason, state = %self.state(), "provider error outside of sync");
        }
    }

    /// Syncing → Synced.
    pub fn on_caught_up(&self) {
        if self.transition(|s| (*s == SyncState::Syncing).then_some(SyncState::Synced)) {
            self.wallet.emit(WalletEvent::SyncFinished);
        }
    }

    /// Relay a built transaction.
    ///
    /// On success the wallet records the transaction as its own unconfirmed
    /// spend. On any failure its reservation is released; a rejection
    /// surfaces as [`WalletError::BroadcastRejected`] and leaves the sync
    /// state alone, other failures move to Failed.
    pub async fn broadcast(&self, built: &BuiltTransaction) -> Result<Txid, WalletError> {
        let txid = built.txid();

        let result = match self.watch_new().await {
            Ok(()) => self.provider.broadcast(&built.tx).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.wallet.confirm_broadcast(&built.tx)?;
                info!(%txid, "broadcast transaction");
                if let Err(e) = self.watch_new().await {
                    warn!(error = %e, "failed to register new addresses");
                    self.on_provider_error(e.to_string());
                }
                Ok(txid)
            }
            Err(ProviderError::Rejected(reason)) => {
                self.wallet.release_reservation(&txid)?;
                warn!(%txid, %reason, "broadcast rejected");
                Err(WalletError::BroadcastRejected(reason))
            }
            Err(e) => {
                self.wallet.release_reservation(&txid)?;
                warn!(%txid, error = %e, "broadcast failed");
                self.on_provider_error(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Unregister all addresses, release every reservation, and go Idle.
    pub async fn stop(&self) -> Result<(), WalletError> {
        let watched: Vec<Address> = std::mem::take(&mut *self.watched.lock()).into_iter().collect();
        let unwatched = if watched.is_empty() {
            Ok(())
        } else {
            self.provider.unwatch(&watched).await
        };
        let released = self.wallet.release_all_reservations()?;
        self.transition(|_| Some(SyncState::Idle));
        info!(addresses = watched.len(), reservations = released, "sync stopped");

        if let Err(e) = unwatched {
            warn!(error = %e, "failed to unregister addresses");
            return Err(e.into());
        }
        Ok(())
    }

    /// Dispatch a single provider event.
    pub async fn handle(&self, event: ProviderEvent) {
        let result = match event {
            ProviderEvent::Transactions(txs) => self.on_data_received(&txs, &[]).await,
            ProviderEvent::Blocks(blocks) => self.on_data_received(&[], &blocks).await,
            ProviderEvent::CaughtUp => {
                self.on_caught_up();
                Ok(())
            }
            ProviderEvent::Error(e) => {
                self.on_provider_error(e.to_string());
                Ok(())
            }
        };
        if let Err(e) = result {
            debug!(error = %e, "provider event not applied");
        }
    }

    /// Process provider events until the channel closes.
    pub async fn run(&self, mut events: mpsc::Receiver<ProviderEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("provider event channel closed");
    }
}
