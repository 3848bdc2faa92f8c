pub mod account;
pub mod config;
pub mod error;
pub mod ledger;
pub mod membership;
pub mod proposals;
pub mod sandbox;
pub mod session;
pub mod utils;
pub mod votes;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::account::Identity;
use crate::config::ClientConfig;
use crate::error::{Failure, FailureKind, Outcome};
use crate::ledger::{Ledger, WalletEvent, WalletProvider};
use crate::membership::{Member, MembershipView};
use crate::proposals::{Proposal, ProposalStore, RiskOption};
use crate::session::{Reconcile, SessionGuard, SessionState};
use crate::votes::VoteCoordinator;

/// Result of a mutating action together with the reload that followed it.
#[derive(Debug)]
pub struct ActionReport<T> {
    pub outcome: Outcome<T>,
    /// `None` when the action was rejected before anything could change.
    pub reconciled: Option<Outcome<()>>,
}

impl<T> ActionReport<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.outcome.as_ref().err().map(|f| f.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub proposal_count: u64,
    /// `None` when the program does not expose a member count.
    pub member_count: Option<u64>,
    pub token_balance: u64,
    pub is_member: bool,
}

pub struct DaoClient {
    config: ClientConfig,
    session: SessionGuard,
    membership: MembershipView,
    proposals: ProposalStore,
    votes: VoteCoordinator,
    events: Option<broadcast::Receiver<WalletEvent>>,
}

impl DaoClient {
    // === Constructors ===

    pub fn new(
        ledger: Arc<dyn Ledger>,
        wallet: Option<Arc<dyn WalletProvider>>,
        config: ClientConfig,
    ) -> Self {
        Self {
            session: SessionGuard::new(wallet, config.required_network.clone()),
            membership: MembershipView::new(
                ledger.clone(),
                config.max_name_len,
                config.fetch_concurrency,
            ),
            proposals: ProposalStore::new(ledger.clone(), config.min_quorum, config.fetch_concurrency),
            votes: VoteCoordinator::new(ledger, config.min_quorum),
            config,
            events: None,
        }
    }

    // === Getters ===

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> SessionState {
        self.session.state()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.session.identity()
    }

    pub fn member(&self) -> Option<&Member> {
        self.membership.member()
    }

    pub fn members(&self) -> Option<&[Member]> {
        self.membership.directory()
    }

    pub fn proposals(&self) -> Option<&[Proposal]> {
        self.proposals.proposals()
    }

    pub fn proposal(&self, id: u64) -> Option<&Proposal> {
        self.proposals.proposal(id)
    }

    pub fn search(&self, term: &str) -> Vec<&Proposal> {
        self.proposals.search(term)
    }

    pub fn coordinator(&self) -> &VoteCoordinator {
        &self.votes
    }

    /// Whether the finalize affordance should be offered for `id`.
    pub fn can_finalize(&self, id: u64) -> bool {
        self.proposals.proposal(id).is_some() && self.votes.check_finalize(&self.proposals, id).is_ok()
    }

    // === Session ===

    /// Fails only when the wallet cannot be reached or the user declines.
    /// A reload failure after the session is up lands in `reconciled`.
    pub async fn connect(&mut self) -> ActionReport<SessionState> {
        let mut state = match self.session.connect().await {
            Ok(state) => state,
            Err(e) => return ActionReport { outcome: Err(e), reconciled: None },
        };
        self.events = self.session.wallet().ok().map(|wallet| wallet.subscribe());
        self.invalidate(false);

        if let SessionState::WrongNetwork { .. } = state {
            if let Err(e) = self.session.ensure_required_network().await {
                warn!("Connected on the wrong network: {}", e);
                return ActionReport {
                    outcome: Ok(self.session.state()),
                    reconciled: None,
                };
            }
            state = self.session.state();
            // the switch already reached us through the wallet, nothing to replay
            self.drain_events();
        }

        ActionReport {
            outcome: Ok(state),
            reconciled: Some(self.reload_after("connect").await),
        }
    }

    pub async fn switch_account(&mut self) -> ActionReport<SessionState> {
        if let Err(e) = self.session.switch_account().await {
            return ActionReport { outcome: Err(e), reconciled: None };
        }
        self.invalidate(false);
        let state = self.session.state();
        let reconciled = if state.is_connected() {
            Some(self.reload_after("account switch").await)
        } else {
            None
        };
        ActionReport { outcome: Ok(state), reconciled }
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
        self.events = None;
        self.invalidate(true);
    }

    /// Applies one wallet notification and reloads what it invalidated.
    pub async fn handle_event(&mut self, event: WalletEvent) -> Outcome<Reconcile> {
        debug!("Wallet event {:?}", event);
        let reconcile = match event {
            WalletEvent::AccountsChanged(accounts) => {
                match self.session.on_identity_changed(&accounts).await {
                    Ok(reconcile) => reconcile,
                    Err(e) => {
                        self.invalidate(false);
                        return Err(e);
                    }
                }
            }
            WalletEvent::NetworkChanged(network) => self.session.on_network_changed(network).await,
        };

        match reconcile {
            Reconcile::Keep => {}
            Reconcile::Reload => {
                self.invalidate(false);
                if self.session.state().is_connected() {
                    self.refresh().await?;
                }
            }
            Reconcile::Reset => {
                self.disconnect();
            }
        }
        Ok(reconcile)
    }

    /// Handles every notification queued since the last call.
    pub async fn process_pending_events(&mut self) -> Vec<Outcome<Reconcile>> {
        let mut results = Vec::new();
        while let Some(event) = self.try_next_event() {
            results.push(self.handle_event(event).await);
        }
        results
    }

    /// Waits for the next wallet notification. `None` once unsubscribed.
    pub async fn next_event(&mut self) -> Option<WalletEvent> {
        loop {
            let events = self.events.as_mut()?;
            match events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} wallet events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    self.events = None;
                    return None;
                }
            }
        }
    }

    fn try_next_event(&mut self) -> Option<WalletEvent> {
        loop {
            let events = self.events.as_mut()?;
            match events.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Missed {} wallet events", skipped);
                }
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => {
                    self.events = None;
                    return None;
                }
            }
        }
    }

    fn drain_events(&mut self) {
        while self.try_next_event().is_some() {}
    }

    fn invalidate(&mut self, ledger_changed: bool) {
        self.membership.clear();
        self.proposals.clear(ledger_changed);
    }

    // === Reads ===

    /// Re-fetches membership and proposals for the connected identity.
    pub async fn refresh(&mut self) -> Outcome<()> {
        let identity = self.session.identity().ok_or_else(|| {
            Failure::new(FailureKind::NotConnected, "Please connect your wallet first")
        })?;
        let member = self.membership.refresh(identity).await.map(|_| ());
        let proposals = self.proposals.load_all().await.map(|_| ());
        member.and(proposals)
    }

    pub async fn load_members(&mut self) -> Outcome<&[Member]> {
        self.membership.load_directory().await
    }

    pub async fn dashboard(&mut self) -> Outcome<Dashboard> {
        if self.proposals.proposals().is_none() || self.membership.member().is_none() {
            self.refresh().await?;
        }
        let member_count = self.membership.member_count().await;
        let member = self.membership.member();
        Ok(Dashboard {
            proposal_count: self.proposals.proposals().map_or(0, |p| p.len() as u64),
            member_count,
            token_balance: member.map_or(0, |m| m.token_balance),
            is_member: member.is_some_and(|m| m.is_registered),
        })
    }

    // === Actions ===

    pub async fn join(&mut self, display_name: &str) -> ActionReport<()> {
        let outcome = self.membership.join(&mut self.session, display_name).await;
        if outcome.is_ok() {
            info!("Welcome {}! You are now a DAO member.", display_name);
        }
        self.reconcile(outcome).await
    }

    pub async fn submit(&mut self, url: &str) -> ActionReport<()> {
        let outcome = self
            .proposals
            .submit(&mut self.session, &self.membership, url)
            .await;
        self.reconcile(outcome).await
    }

    pub async fn vote(&mut self, id: u64, option: RiskOption) -> ActionReport<()> {
        let outcome = self
            .votes
            .vote(&mut self.session, &self.membership, &self.proposals, id, option)
            .await;
        if outcome.is_ok() {
            info!(
                "Voted \"{}\" on proposal #{}, {} tokens will be credited",
                option.label(),
                id,
                self.config.vote_reward
            );
        }
        self.reconcile(outcome).await
    }

    pub async fn finalize(&mut self, id: u64) -> ActionReport<()> {
        let outcome = self
            .votes
            .finalize(&mut self.session, &self.proposals, id)
            .await;
        self.reconcile(outcome).await
    }

    async fn reconcile<T>(&mut self, outcome: Outcome<T>) -> ActionReport<T> {
        let needed = match &outcome {
            Ok(_) => true,
            Err(failure) => !matches!(
                failure.kind,
                FailureKind::NameRequired
                    | FailureKind::NameTooLong
                    | FailureKind::UrlRequired
                    | FailureKind::NotConnected
                    | FailureKind::ProviderUnavailable
                    | FailureKind::UserRejected
                    | FailureKind::NetworkMismatch
                    | FailureKind::UnknownNetwork
                    | FailureKind::RequestInFlight
            ),
        };
        // the action may have switched network or the user may have moved on
        for result in self.process_pending_events().await {
            if let Err(e) = result {
                warn!("Wallet event during action: {}", e);
            }
        }

        let reconciled = if needed {
            Some(self.reload_after("action").await)
        } else {
            None
        };
        ActionReport { outcome, reconciled }
    }

    async fn reload_after(&mut self, what: &str) -> Outcome<()> {
        let reloaded = self.refresh().await;
        if let Err(e) = &reloaded {
            warn!("Reload after {} failed: {}", what, e);
        }
        reloaded
    }
}

//**************************************************************************************************//
