//! In-process development chain.
//!
//! [`SandboxLedger`] follows the reputation program's observable rules and
//! revert reasons, [`SandboxWallet`] behaves like a browser wallet attached
//! to a local node. The CLI runs against them and so do the integration
//! tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::debug;

use crate::account::{Identity, NetworkDescriptor, NetworkId};
use crate::error::{RequestError, UNKNOWN_NETWORK_CODE, USER_REJECTED_CODE};
use crate::ledger::{
    Ledger, MemberDetailRecord, MemberRecord, ProposalRecord, RequestResult, WalletEvent,
    WalletProvider,
};
use crate::membership::Role;

/// Deterministic development accounts, `0x0101..01`, `0x0202..02`, ...
pub fn dev_accounts(n: u8) -> Vec<Identity> {
    (1..=n).map(|i| Identity::new([i; 20])).collect()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn revert(reason: &str) -> RequestError {
    RequestError::new(format!(
        "VM Exception while processing transaction: revert {}",
        reason
    ))
}

// === Ledger ===

struct MemberEntry {
    name: String,
    role: Role,
    tokens: u64,
    proposals_submitted: u64,
    votes_count: u64,
}

struct ProposalEntry {
    record: ProposalRecord,
    votes: [u64; 4],
    voters: HashSet<Identity>,
}

#[derive(Default)]
struct LedgerState {
    members: HashMap<Identity, MemberEntry>,
    order: Vec<Identity>,
    proposals: Vec<ProposalEntry>,
    mutations: u64,
    unavailable: bool,
}

impl LedgerState {
    fn check_up(&self) -> RequestResult<()> {
        if self.unavailable {
            return Err(RequestError::new("connection refused"));
        }
        Ok(())
    }

    fn proposal_mut(&mut self, id: u64) -> RequestResult<&mut ProposalEntry> {
        self.proposals
            .get_mut(id as usize)
            .ok_or_else(|| revert("Invalid proposal"))
    }
}

pub struct SandboxLedger {
    state: Mutex<LedgerState>,
}

impl SandboxLedger {
    pub const INITIAL_TOKENS: u64 = 100;
    pub const VOTE_REWARD: u64 = 10;
    pub const MIN_VOTES: u64 = 3;
    pub const MAX_NAME_LEN: usize = 50;

    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Number of mutating requests that reached the ledger, rejected or not.
    pub fn mutations(&self) -> u64 {
        lock(&self.state).mutations
    }

    /// Makes every request fail as if the node went away.
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Roles are assigned by the program owner, never by the client.
    pub fn grant_role(&self, identity: Identity, role: Role) -> RequestResult<()> {
        let mut state = lock(&self.state);
        let member = state
            .members
            .get_mut(&identity)
            .ok_or_else(|| revert("Not a member"))?;
        member.role = role;
        Ok(())
    }

    // plurality, ties go to the lowest option
    fn plurality(votes: &[u64; 4]) -> u8 {
        let mut best = 0;
        for (i, count) in votes.iter().enumerate() {
            if *count > votes[best] {
                best = i;
            }
        }
        best as u8
    }
}

impl Default for SandboxLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for SandboxLedger {
    async fn proposal_count(&self) -> RequestResult<u64> {
        let state = lock(&self.state);
        state.check_up()?;
        Ok(state.proposals.len() as u64)
    }

    async fn proposal(&self, id: u64) -> RequestResult<ProposalRecord> {
        let state = lock(&self.state);
        state.check_up()?;
        state
            .proposals
            .get(id as usize)
            .map(|p| p.record.clone())
            .ok_or_else(|| revert("Invalid proposal"))
    }

    async fn proposal_tally(&self, id: u64) -> RequestResult<[u64; 4]> {
        let state = lock(&self.state);
        state.check_up()?;
        state
            .proposals
            .get(id as usize)
            .map(|p| p.votes)
            .ok_or_else(|| revert("Invalid proposal"))
    }

    async fn member(&self, identity: Identity) -> RequestResult<MemberRecord> {
        let state = lock(&self.state);
        state.check_up()?;
        Ok(state
            .members
            .get(&identity)
            .map(|m| MemberRecord {
                is_member: true,
                tokens: m.tokens,
            })
            .unwrap_or_default())
    }

    async fn member_count(&self) -> RequestResult<u64> {
        let state = lock(&self.state);
        state.check_up()?;
        Ok(state.order.len() as u64)
    }

    async fn all_member_identities(&self) -> RequestResult<Vec<Identity>> {
        let state = lock(&self.state);
        state.check_up()?;
        Ok(state.order.clone())
    }

    async fn member_detail(&self, identity: Identity) -> RequestResult<MemberDetailRecord> {
        let state = lock(&self.state);
        state.check_up()?;
        let member = state
            .members
            .get(&identity)
            .ok_or_else(|| revert("Not a member"))?;
        Ok(MemberDetailRecord {
            name: member.name.clone(),
            role: member.role as u8,
            tokens: member.tokens,
            proposals_submitted: member.proposals_submitted,
            votes_count: member.votes_count,
        })
    }

    async fn join(&self, from: Identity, display_name: &str) -> RequestResult<()> {
        let mut state = lock(&self.state);
        state.check_up()?;
        state.mutations += 1;
        if state.members.contains_key(&from) {
            return Err(revert("Already a member"));
        }
        if display_name.is_empty() {
            return Err(revert("Name required"));
        }
        if display_name.chars().count() > Self::MAX_NAME_LEN {
            return Err(revert("Name too long"));
        }
        state.members.insert(
            from,
            MemberEntry {
                name: display_name.to_string(),
                role: Role::Member,
                tokens: Self::INITIAL_TOKENS,
                proposals_submitted: 0,
                votes_count: 0,
            },
        );
        state.order.push(from);
        debug!("sandbox: {} joined", from);
        Ok(())
    }

    async fn submit_proposal(&self, from: Identity, url: &str) -> RequestResult<()> {
        let mut state = lock(&self.state);
        state.check_up()?;
        state.mutations += 1;
        let member = state
            .members
            .get_mut(&from)
            .ok_or_else(|| revert("Not a member"))?;
        member.proposals_submitted += 1;

        let id = state.proposals.len() as u64;
        let start_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        state.proposals.push(ProposalEntry {
            record: ProposalRecord {
                id,
                website_url: url.to_string(),
                proposer: from,
                start_time,
                processed: false,
                final_status: 0,
            },
            votes: [0; 4],
            voters: HashSet::new(),
        });
        debug!("sandbox: proposal #{} submitted", id);
        Ok(())
    }

    async fn cast_vote(&self, from: Identity, id: u64, option: u8) -> RequestResult<()> {
        let mut state = lock(&self.state);
        state.check_up()?;
        state.mutations += 1;
        if !state.members.contains_key(&from) {
            return Err(revert("Not a member"));
        }
        if option > 3 {
            return Err(revert("Invalid option"));
        }
        let proposal = state.proposal_mut(id)?;
        if proposal.record.processed {
            return Err(revert("Proposal already processed"));
        }
        if !proposal.voters.insert(from) {
            return Err(revert("Already voted"));
        }
        proposal.votes[option as usize] += 1;

        if let Some(member) = state.members.get_mut(&from) {
            member.votes_count += 1;
            member.tokens += Self::VOTE_REWARD;
        }
        Ok(())
    }

    async fn finalize_proposal(&self, _from: Identity, id: u64) -> RequestResult<()> {
        let mut state = lock(&self.state);
        state.check_up()?;
        state.mutations += 1;
        let proposal = state.proposal_mut(id)?;
        if proposal.record.processed {
            return Err(revert("Already processed"));
        }
        if proposal.votes.iter().sum::<u64>() < Self::MIN_VOTES {
            return Err(revert("Not enough votes"));
        }
        proposal.record.processed = true;
        proposal.record.final_status = Self::plurality(&proposal.votes);
        debug!("sandbox: proposal #{} processed", id);
        Ok(())
    }
}

// === Wallet ===

struct WalletState {
    accounts: Vec<Identity>,
    selected: usize,
    network: NetworkId,
    known_networks: HashSet<NetworkId>,
    reject_identity: bool,
    reject_switch: bool,
    reject_register: bool,
    switch_requests: u64,
}

pub struct SandboxWallet {
    state: Mutex<WalletState>,
    events: broadcast::Sender<WalletEvent>,
}

impl SandboxWallet {
    pub fn new(accounts: Vec<Identity>, network: NetworkId) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(WalletState {
                accounts,
                selected: 0,
                network,
                known_networks: HashSet::from([network]),
                reject_identity: false,
                reject_switch: false,
                reject_register: false,
                switch_requests: 0,
            }),
            events,
        }
    }

    pub fn accounts(&self) -> Vec<Identity> {
        lock(&self.state).accounts.clone()
    }

    pub fn network(&self) -> NetworkId {
        lock(&self.state).network
    }

    /// How many times the client asked to switch network.
    pub fn switch_requests(&self) -> u64 {
        lock(&self.state).switch_requests
    }

    pub fn knows_network(&self, network: NetworkId) -> bool {
        lock(&self.state).known_networks.contains(&network)
    }

    /// The user picks another account in the wallet UI.
    pub fn select_account(&self, index: usize) -> Option<Identity> {
        let identity = {
            let mut state = lock(&self.state);
            let identity = *state.accounts.get(index)?;
            state.selected = index;
            identity
        };
        let _ = self.events.send(WalletEvent::AccountsChanged(vec![identity]));
        Some(identity)
    }

    /// The user locks the wallet or revokes access.
    pub fn lock_accounts(&self) {
        let _ = self.events.send(WalletEvent::AccountsChanged(Vec::new()));
    }

    /// The user switches network in the wallet UI.
    pub fn set_network(&self, network: NetworkId) {
        {
            let mut state = lock(&self.state);
            state.known_networks.insert(network);
            state.network = network;
        }
        let _ = self.events.send(WalletEvent::NetworkChanged(network));
    }

    pub fn forget_network(&self, network: NetworkId) {
        lock(&self.state).known_networks.remove(&network);
    }

    pub fn reject_identity_requests(&self, reject: bool) {
        lock(&self.state).reject_identity = reject;
    }

    pub fn reject_network_switch(&self, reject: bool) {
        lock(&self.state).reject_switch = reject;
    }

    pub fn reject_network_registration(&self, reject: bool) {
        lock(&self.state).reject_register = reject;
    }
}

fn user_rejected() -> RequestError {
    RequestError::with_code(USER_REJECTED_CODE, "User rejected the request.")
}

#[async_trait]
impl WalletProvider for SandboxWallet {
    async fn request_identity(&self) -> RequestResult<Vec<Identity>> {
        let state = lock(&self.state);
        if state.reject_identity {
            return Err(user_rejected());
        }
        Ok(state.accounts.get(state.selected).copied().into_iter().collect())
    }

    async fn request_permissions(&self) -> RequestResult<()> {
        if lock(&self.state).reject_identity {
            return Err(user_rejected());
        }
        Ok(())
    }

    async fn current_network(&self) -> RequestResult<NetworkId> {
        Ok(lock(&self.state).network)
    }

    async fn switch_network(&self, network: NetworkId) -> RequestResult<()> {
        {
            let mut state = lock(&self.state);
            state.switch_requests += 1;
            if state.reject_switch {
                return Err(user_rejected());
            }
            if !state.known_networks.contains(&network) {
                return Err(RequestError::with_code(
                    UNKNOWN_NETWORK_CODE,
                    format!("Unrecognized chain ID \"{}\"", network.to_hex()),
                ));
            }
            state.network = network;
        }
        let _ = self.events.send(WalletEvent::NetworkChanged(network));
        Ok(())
    }

    async fn register_network(&self, descriptor: &NetworkDescriptor) -> RequestResult<()> {
        {
            let mut state = lock(&self.state);
            if state.reject_register {
                return Err(user_rejected());
            }
            state.known_networks.insert(descriptor.chain_id);
            state.network = descriptor.chain_id;
        }
        let _ = self.events.send(WalletEvent::NetworkChanged(descriptor.chain_id));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
