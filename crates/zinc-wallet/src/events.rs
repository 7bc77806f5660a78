//! Lifecycle notifications.
//!
//! Events go out on a `tokio::sync::broadcast` channel owned by the wallet.
//! Sending never blocks; a subscriber that falls behind loses the oldest
//! events and sees `RecvError::Lagged`.

use serde::{Deserialize, Serialize};

/// A sync lifecycle notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "reason", rename_all = "snake_case")]
pub enum WalletEvent {
    SyncStarted,
    SyncFinished,
    SyncFailed(String),
}

impl WalletEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SyncStarted => "sync-started",
            Self::SyncFinished => "sync-finished",
            Self::SyncFailed(_) => "sync-failed",
        }
    }
}

impl std::fmt::Display for WalletEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SyncFailed(reason) => write!(f, "{}({reason})", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}
