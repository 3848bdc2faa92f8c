use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::error::{classify_ledger, Failure, FailureKind, Outcome, Request};
use crate::ledger::Ledger;
use crate::membership::MembershipView;
use crate::proposals::{ProposalStore, RiskOption};
use crate::session::SessionGuard;

/// Issues vote and finalize requests, one at a time per proposal.
#[derive(Clone)]
pub struct VoteCoordinator {
    ledger: Arc<dyn Ledger>,
    min_quorum: u64,
    in_flight: Arc<Mutex<HashSet<u64>>>,
}

/// Held while a mutating request for `id` is outstanding.
pub struct InFlightGuard {
    in_flight: Arc<Mutex<HashSet<u64>>>,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.id);
    }
}

impl VoteCoordinator {
    pub fn new(ledger: Arc<dyn Ledger>, min_quorum: u64) -> Self {
        Self {
            ledger,
            min_quorum,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn is_in_flight(&self, id: u64) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.contains(&id)
    }

    /// Claims `id` until the returned guard is dropped.
    pub fn begin(&self, id: u64) -> Outcome<InFlightGuard> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !in_flight.insert(id) {
            return Err(Failure::new(
                FailureKind::RequestInFlight,
                format!("A request for proposal #{} is still pending", id),
            ));
        }
        Ok(InFlightGuard {
            in_flight: self.in_flight.clone(),
            id,
        })
    }

    // === Local checks ===

    /// What the loaded snapshot says about voting on `id`. Unknown proposals
    /// pass, the ledger has the last word.
    pub fn check_vote(&self, membership: &MembershipView, proposals: &ProposalStore, id: u64) -> Outcome<()> {
        if membership.member().is_some_and(|m| !m.is_registered) {
            return Err(Failure::new(FailureKind::NotAMember, "You must join the DAO first"));
        }
        if proposals.proposal(id).is_some_and(|p| p.is_finalized()) {
            return Err(Failure::new(
                FailureKind::ProposalFinalized,
                format!("Proposal #{} is already finalized", id),
            ));
        }
        Ok(())
    }

    pub fn check_finalize(&self, proposals: &ProposalStore, id: u64) -> Outcome<()> {
        let Some(proposal) = proposals.proposal(id) else {
            return Ok(());
        };
        if proposal.is_finalized() {
            return Err(Failure::new(
                FailureKind::AlreadyFinalized,
                "This proposal has already been finalized",
            ));
        }
        if !proposal.quorum_reached(self.min_quorum) {
            return Err(Failure::new(
                FailureKind::QuorumNotMet,
                format!(
                    "Not enough votes to finalize ({} of minimum {})",
                    proposal.total_votes(),
                    self.min_quorum
                ),
            ));
        }
        Ok(())
    }

    // === Requests ===

    pub async fn vote(
        &self,
        session: &mut SessionGuard,
        membership: &MembershipView,
        proposals: &ProposalStore,
        id: u64,
        option: RiskOption,
    ) -> Outcome<()> {
        let identity = session.ensure_required_network().await?;
        self.check_vote(membership, proposals, id)?;
        let _guard = self.begin(id)?;

        match self.ledger.cast_vote(identity, id, option as u8).await {
            Ok(()) => {
                info!("{} voted {} on proposal #{}", identity.short(), option, id);
                Ok(())
            }
            Err(e) => {
                let failure = classify_ledger(Request::Vote, &e);
                warn!("Vote on proposal #{} rejected: {}", id, failure);
                Err(failure)
            }
        }
    }

    /// The resulting status is read back from the ledger on the next reload.
    pub async fn finalize(
        &self,
        session: &mut SessionGuard,
        proposals: &ProposalStore,
        id: u64,
    ) -> Outcome<()> {
        let identity = session.ensure_required_network().await?;
        self.check_finalize(proposals, id)?;
        let _guard = self.begin(id)?;

        match self.ledger.finalize_proposal(identity, id).await {
            Ok(()) => {
                info!("{} finalized proposal #{}", identity.short(), id);
                Ok(())
            }
            Err(e) => {
                let failure = classify_ledger(Request::Finalize, &e);
                warn!("Finalize of proposal #{} rejected: {}", id, failure);
                Err(failure)
            }
        }
    }
}
