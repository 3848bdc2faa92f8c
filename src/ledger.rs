//! Collaborator boundary: the wallet provider and the ledger program.
//!
//! Nothing in here knows about a concrete chain. Implementations sign,
//! submit and wait for confirmation; the rest of the crate only sees the
//! records below and [`RequestError`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::account::{Identity, NetworkDescriptor, NetworkId};
use crate::error::RequestError;

pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// Notifications pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Identity>),
    NetworkChanged(NetworkId),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompts for account access. First entry is the active account.
    async fn request_identity(&self) -> RequestResult<Vec<Identity>>;

    /// Re-prompts the user to pick which accounts are exposed.
    async fn request_permissions(&self) -> RequestResult<()>;

    async fn current_network(&self) -> RequestResult<NetworkId>;

    async fn switch_network(&self, network: NetworkId) -> RequestResult<()>;

    async fn register_network(&self, descriptor: &NetworkDescriptor) -> RequestResult<()>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// `members(address)` as stored by the program.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub is_member: bool,
    pub tokens: u64,
}

/// `getMemberInfo(address)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDetailRecord {
    pub name: String,
    pub role: u8,
    pub tokens: u64,
    pub proposals_submitted: u64,
    pub votes_count: u64,
}

/// `proposals(id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub id: u64,
    pub website_url: String,
    pub proposer: Identity,
    pub start_time: u64,
    pub processed: bool,
    pub final_status: u8,
}

#[async_trait]
pub trait Ledger: Send + Sync {
    // === Reads ===

    async fn proposal_count(&self) -> RequestResult<u64>;

    async fn proposal(&self, id: u64) -> RequestResult<ProposalRecord>;

    /// Votes per option, indexed like `RiskOption`.
    async fn proposal_tally(&self, id: u64) -> RequestResult<[u64; 4]>;

    async fn member(&self, identity: Identity) -> RequestResult<MemberRecord>;

    async fn member_count(&self) -> RequestResult<u64>;

    async fn all_member_identities(&self) -> RequestResult<Vec<Identity>>;

    async fn member_detail(&self, identity: Identity) -> RequestResult<MemberDetailRecord>;

    // === Writes ===
    // `from` is bound by the caller when the request is sent.

    async fn join(&self, from: Identity, display_name: &str) -> RequestResult<()>;

    async fn submit_proposal(&self, from: Identity, url: &str) -> RequestResult<()>;

    async fn cast_vote(&self, from: Identity, id: u64, option: u8) -> RequestResult<()>;

    async fn finalize_proposal(&self, from: Identity, id: u64) -> RequestResult<()>;
}
