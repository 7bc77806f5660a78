//! Trait interfaces between the wallet and its external collaborators.
//!
//! - [`SyncProvider`]: the blockchain network as seen by a light wallet
//!   (watch addresses, broadcast transactions). Deliveries flow back as
//!   [`ProviderEvent`]s.

use async_trait::async_trait;

use crate::address::Address;
use crate::error::ProviderError;
use crate::types::{BlockInfo, ObservedTransaction, Transaction};

/// Connection to the network that delivers wallet-relevant data.
///
/// Implementations push what they observe for watched addresses as
/// [`ProviderEvent`]s on a channel handed to them at construction. All
/// methods may be called concurrently.
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Start delivering transactions that pay or spend from `addresses`.
    ///
    /// Watching an address that is already watched is a no-op.
    async fn watch(&self, addresses: &[Address]) -> Result<(), ProviderError>;

    /// Stop delivering data for `addresses`.
    async fn unwatch(&self, addresses: &[Address]) -> Result<(), ProviderError>;

    /// Relay a signed transaction to the network.
    ///
    /// Returns [`ProviderError::Rejected`] when the network refuses it.
    async fn broadcast(&self, tx: &Transaction) -> Result<(), ProviderError>;
}

/// Asynchronous delivery from a [`SyncProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Transactions touching watched addresses.
    Transactions(Vec<ObservedTransaction>),
    /// New blocks, in any order.
    Blocks(Vec<BlockInfo>),
    /// Everything up to the current tip has been delivered.
    CaughtUp,
    /// The provider lost its connection or failed a request.
    Error(ProviderError),
}
