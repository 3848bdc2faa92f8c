use futures::stream::{Stream, TryStreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::account::Identity;
use crate::error::{classify_ledger, Failure, FailureKind, Outcome, Request};
use crate::ledger::Ledger;
use crate::membership::MembershipView;
use crate::session::SessionGuard;
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskOption {
    Scam = 0,
    HighRisk = 1,
    Normal = 2,
    Safe = 3,
}

impl RiskOption {
    pub const ALL: [RiskOption; 4] = [
        RiskOption::Scam,
        RiskOption::HighRisk,
        RiskOption::Normal,
        RiskOption::Safe,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Human label, e.g. "High Risk".
    pub fn label(&self) -> &'static str {
        match self {
            RiskOption::Scam => "Scam",
            RiskOption::HighRisk => "High Risk",
            RiskOption::Normal => "Normal",
            RiskOption::Safe => "Safe",
        }
    }
}

impl TryFrom<u8> for RiskOption {
    type Error = Failure;

    fn try_from(value: u8) -> Outcome<Self> {
        RiskOption::ALL.get(value as usize).copied().ok_or_else(|| {
            Failure::new(FailureKind::RequestFailed, format!("Unknown risk option {}", value))
        })
    }
}

impl FromStr for RiskOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "0" | "scam" => Ok(RiskOption::Scam),
            "1" | "highrisk" => Ok(RiskOption::HighRisk),
            "2" | "normal" => Ok(RiskOption::Normal),
            "3" | "safe" => Ok(RiskOption::Safe),
            _ => Err(format!("Invalid risk option: {}", s)),
        }
    }
}

impl fmt::Display for RiskOption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RiskOption::Scam => write!(f, "Scam"),
            RiskOption::HighRisk => write!(f, "HighRisk"),
            RiskOption::Normal => write!(f, "Normal"),
            RiskOption::Safe => write!(f, "Safe"),
        }
    }
}

/// Votes per option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally(pub [u64; 4]);

impl Tally {
    pub fn get(&self, option: RiskOption) -> u64 {
        self.0[option.index()]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProposalStatus {
    Pending,
    Finalized(RiskOption),
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProposalStatus::Pending => write!(f, "Pending"),
            ProposalStatus::Finalized(option) => write!(f, "{}", option),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Proposal {
    pub id: u64,
    pub proposer: Identity,
    pub url: String,
    pub start_time: u64,
    pub tally: Tally,
    /// Set by the ledger when the proposal is finalized, `None` while pending.
    pub final_status: Option<RiskOption>,
}

impl Proposal {
    pub fn is_finalized(&self) -> bool {
        self.final_status.is_some()
    }

    pub fn total_votes(&self) -> u64 {
        self.tally.total()
    }

    pub fn quorum_reached(&self, min_quorum: u64) -> bool {
        self.total_votes() >= min_quorum
    }

    pub fn status(&self) -> ProposalStatus {
        match self.final_status {
            Some(option) => ProposalStatus::Finalized(option),
            None => ProposalStatus::Pending,
        }
    }

    /// Case-insensitive match on url or id; an empty term matches everything.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return true;
        }
        // cards title proposals "Proposal #<id>"
        self.url.to_lowercase().contains(&term)
            || format!("proposal #{}", self.id).contains(&term)
    }
}

pub struct ProposalStore {
    ledger: Arc<dyn Ledger>,
    min_quorum: u64,
    fetch_concurrency: usize,
    proposals: Option<Vec<Proposal>>, // if None then not fetched yet
    // statuses already observed as final, they must never change
    finalized: HashMap<u64, RiskOption>,
}

impl ProposalStore {
    pub fn new(ledger: Arc<dyn Ledger>, min_quorum: u64, fetch_concurrency: usize) -> Self {
        Self {
            ledger,
            min_quorum,
            fetch_concurrency,
            proposals: None,
            finalized: HashMap::new(),
        }
    }

    pub fn proposals(&self) -> Option<&[Proposal]> {
        self.proposals.as_deref()
    }

    pub fn proposal(&self, id: u64) -> Option<&Proposal> {
        self.proposals.as_ref()?.iter().find(|p| p.id == id)
    }

    pub fn min_quorum(&self) -> u64 {
        self.min_quorum
    }

    pub fn quorum_reached(&self, proposal: &Proposal) -> bool {
        proposal.quorum_reached(self.min_quorum)
    }

    pub fn derived_status(&self, proposal: &Proposal) -> ProposalStatus {
        proposal.status()
    }

    /// Drops the loaded snapshot. With `forget_finalized` the monotonicity
    /// history goes too, which is only correct when the ledger itself changed.
    pub fn clear(&mut self, forget_finalized: bool) {
        self.proposals = None;
        if forget_finalized {
            self.finalized.clear();
        }
    }

    /// Filters the loaded snapshot, never hits the ledger.
    pub fn search(&self, term: &str) -> Vec<&Proposal> {
        self.proposals
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter(|p| p.matches(term))
            .collect()
    }

    /// Every proposal in id order, fetched fresh on each call.
    pub async fn stream(&self) -> Outcome<impl Stream<Item = Outcome<Proposal>>> {
        let count = self
            .ledger
            .proposal_count()
            .await
            .map_err(|e| classify_ledger(Request::Read, &e))?;
        debug!("Loading {} proposals", count);

        let ledger = self.ledger.clone();
        Ok(utils::fetch_stream(0..count, self.fetch_concurrency, move |id| {
            let ledger = ledger.clone();
            async move { fetch_proposal(ledger.as_ref(), id).await }
        }))
    }

    pub async fn load_all(&mut self) -> Outcome<&[Proposal]> {
        let loaded = match self.stream().await {
            Ok(stream) => stream.try_collect::<Vec<_>>().await,
            Err(e) => Err(e),
        };
        let proposals = match loaded.and_then(|proposals| self.check_monotonic(proposals)) {
            Ok(proposals) => proposals,
            Err(e) => {
                self.proposals = None;
                return Err(e);
            }
        };

        for p in &proposals {
            if let Some(status) = p.final_status {
                self.finalized.insert(p.id, status);
            }
        }
        Ok(self.proposals.insert(proposals).as_slice())
    }

    fn check_monotonic(&self, proposals: Vec<Proposal>) -> Outcome<Vec<Proposal>> {
        for p in &proposals {
            if let Some(seen) = self.finalized.get(&p.id) {
                if p.final_status != Some(*seen) {
                    warn!(
                        "Proposal {} was finalized as {} but now reads {}",
                        p.id,
                        seen,
                        p.status()
                    );
                    return Err(Failure::new(
                        FailureKind::RequestFailed,
                        format!("Proposal {} changed after finalization", p.id),
                    ));
                }
            }
        }
        if let Some(max) = self.finalized.keys().max() {
            if *max >= proposals.len() as u64 {
                return Err(Failure::new(
                    FailureKind::RequestFailed,
                    format!("Proposal {} disappeared", max),
                ));
            }
        }
        Ok(proposals)
    }

    pub async fn submit(
        &self,
        session: &mut SessionGuard,
        membership: &MembershipView,
        url: &str,
    ) -> Outcome<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Failure::new(FailureKind::UrlRequired, "Please enter a website URL"));
        }
        let identity = session.ensure_required_network().await?;
        if membership.member().is_some_and(|m| m.identity == identity && !m.is_registered) {
            return Err(Failure::new(FailureKind::NotAMember, "You must join the DAO first"));
        }

        match self.ledger.submit_proposal(identity, url).await {
            Ok(()) => {
                info!("{} submitted {}", identity.short(), url);
                Ok(())
            }
            Err(e) => {
                let failure = classify_ledger(Request::Submit, &e);
                warn!("Submit rejected: {}", failure);
                Err(failure)
            }
        }
    }
}

async fn fetch_proposal(ledger: &dyn Ledger, id: u64) -> Outcome<Proposal> {
    let (record, votes) = futures::future::try_join(ledger.proposal(id), ledger.proposal_tally(id))
        .await
        .map_err(|e| classify_ledger(Request::Read, &e))?;
    let final_status = if record.processed {
        Some(RiskOption::try_from(record.final_status)?)
    } else {
        None
    };
    Ok(Proposal {
        id,
        proposer: record.proposer,
        url: record.website_url,
        start_time: record.start_time,
        tally: Tally(votes),
        final_status,
    })
}
