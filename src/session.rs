//! Wallet session and network reconciliation.
//!
//! Every mutating request goes through [`SessionGuard::ensure_required_network`]
//! right before it is sent: the wallet's network can change between two
//! renders, and a request signed on the wrong chain would address the wrong
//! program instance.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::account::{Identity, NetworkDescriptor, NetworkId};
use crate::error::{classify_wallet, Failure, FailureKind, Outcome};
use crate::ledger::WalletProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected { identity: Identity, network: NetworkId },
    WrongNetwork { identity: Identity, network: NetworkId },
}

impl SessionState {
    pub fn identity(&self) -> Option<Identity> {
        match self {
            SessionState::Connected { identity, .. } | SessionState::WrongNetwork { identity, .. } => {
                Some(*identity)
            }
            SessionState::Disconnected | SessionState::Connecting => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected { .. })
    }
}

/// What cached data must go through after a session transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    /// Nothing changed for the caches.
    Keep,
    /// Drop caches and reload them for the current identity.
    Reload,
    /// Drop everything, there is no usable session anymore.
    Reset,
}

pub struct SessionGuard {
    wallet: Option<Arc<dyn WalletProvider>>,
    required: NetworkDescriptor,
    state: SessionState,
}

impl SessionGuard {
    pub fn new(wallet: Option<Arc<dyn WalletProvider>>, required: NetworkDescriptor) -> Self {
        Self {
            wallet,
            required,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.identity()
    }

    pub fn required_network(&self) -> &NetworkDescriptor {
        &self.required
    }

    pub fn wallet(&self) -> Outcome<&Arc<dyn WalletProvider>> {
        self.wallet.as_ref().ok_or_else(|| {
            Failure::new(FailureKind::ProviderUnavailable, "No wallet provider installed")
        })
    }

    // === Transitions ===

    pub async fn connect(&mut self) -> Outcome<SessionState> {
        let wallet = self.wallet()?.clone();
        self.state = SessionState::Connecting;

        let accounts = match wallet.request_identity().await {
            Ok(accounts) => accounts,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(classify_wallet(&e));
            }
        };
        let Some(identity) = accounts.first().copied() else {
            self.state = SessionState::Disconnected;
            return Err(Failure::new(FailureKind::UserRejected, "Wallet exposed no account"));
        };

        self.settle(&wallet, identity).await?;
        info!("Connected {} ({:?})", identity.short(), self.state);
        Ok(self.state)
    }

    /// Asks the wallet to pick accounts again, then reconnects.
    pub async fn switch_account(&mut self) -> Outcome<SessionState> {
        let wallet = self.wallet()?.clone();
        wallet
            .request_permissions()
            .await
            .map_err(|e| classify_wallet(&e))?;
        self.connect().await
    }

    pub fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            info!("Session disconnected");
        }
        self.state = SessionState::Disconnected;
    }

    /// Makes sure the wallet is on the required network and returns the
    /// identity the next request must be bound to.
    pub async fn ensure_required_network(&mut self) -> Outcome<Identity> {
        let identity = self.identity().ok_or_else(|| {
            Failure::new(FailureKind::NotConnected, "Please connect your wallet first")
        })?;
        let wallet = self.wallet()?.clone();
        let required = self.required.chain_id;

        let current = wallet
            .current_network()
            .await
            .map_err(|e| classify_wallet(&e))?;
        if current == required {
            self.state = SessionState::Connected { identity, network: current };
            return Ok(identity);
        }

        info!("Switching wallet from chain {} to {}", current, required);
        if let Err(e) = wallet.switch_network(required).await {
            let failure = classify_wallet(&e);
            if failure.kind != FailureKind::UnknownNetwork {
                return Err(self.mismatch(identity, current, &failure.message));
            }
            info!("Chain {} unknown to the wallet, registering it", required);
            if let Err(e) = wallet.register_network(&self.required).await {
                return Err(self.mismatch(identity, current, &e.message));
            }
        }

        let now = match wallet.current_network().await {
            Ok(now) => now,
            Err(e) => return Err(self.mismatch(identity, current, &e.message)),
        };
        if now != required {
            return Err(self.mismatch(identity, now, "wallet stayed on another chain"));
        }

        self.state = SessionState::Connected { identity, network: now };
        Ok(identity)
    }

    // === Wallet events ===

    pub async fn on_identity_changed(&mut self, accounts: &[Identity]) -> Outcome<Reconcile> {
        if self.state == SessionState::Disconnected {
            return Ok(Reconcile::Keep);
        }
        let Some(identity) = accounts.first().copied() else {
            self.disconnect();
            return Ok(Reconcile::Reset);
        };

        let wallet = self.wallet()?.clone();
        self.state = SessionState::Connecting;
        self.settle(&wallet, identity).await?;
        info!("Account switched to {}", identity.short());
        Ok(Reconcile::Reload)
    }

    pub async fn on_network_changed(&mut self, network: NetworkId) -> Reconcile {
        let Some(identity) = self.identity() else {
            return Reconcile::Keep;
        };
        let required = self.required.chain_id;
        if network != required {
            // notifications queue up, the wallet may already be back
            let current = match self.wallet() {
                Ok(wallet) => wallet.current_network().await.ok(),
                Err(_) => None,
            };
            if current == Some(required) && self.state.is_connected() {
                debug!("Ignoring stale switch to chain {}", network);
                return Reconcile::Keep;
            }
            warn!(
                "Wallet moved to chain {}, expected {}; resetting session",
                network, required
            );
            self.state = SessionState::Disconnected;
            return Reconcile::Reset;
        }
        self.state = SessionState::Connected { identity, network };
        Reconcile::Reload
    }

    // === Helpers ===

    async fn settle(&mut self, wallet: &Arc<dyn WalletProvider>, identity: Identity) -> Outcome<()> {
        let network = match wallet.current_network().await {
            Ok(network) => network,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(classify_wallet(&e));
            }
        };
        self.state = if network == self.required.chain_id {
            SessionState::Connected { identity, network }
        } else {
            SessionState::WrongNetwork { identity, network }
        };
        Ok(())
    }

    fn mismatch(&mut self, identity: Identity, network: NetworkId, reason: &str) -> Failure {
        warn!("Network reconciliation failed: {}", reason);
        self.state = SessionState::WrongNetwork { identity, network };
        Failure::new(
            FailureKind::NetworkMismatch,
            format!(
                "Please switch to {} (Chain ID: {}): {}",
                self.required.chain_name, self.required.chain_id, reason
            ),
        )
    }
}
