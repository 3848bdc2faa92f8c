#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use reputation_dao_sdk::account::{Identity, NetworkId};
use reputation_dao_sdk::config::ClientConfig;
use reputation_dao_sdk::error::RequestError;
use reputation_dao_sdk::ledger::{
    Ledger, MemberDetailRecord, MemberRecord, ProposalRecord, RequestResult,
};
use reputation_dao_sdk::proposals::RiskOption;
use reputation_dao_sdk::sandbox::{dev_accounts, SandboxLedger, SandboxWallet};
use reputation_dao_sdk::DaoClient;

pub struct Fixture {
    pub client: DaoClient,
    pub ledger: Arc<SandboxLedger>,
    pub wallet: Arc<SandboxWallet>,
}

/// Client over a fresh sandbox, wallet on `network` with `accounts` accounts.
pub fn setup(network: NetworkId, accounts: u8) -> Fixture {
    let ledger = Arc::new(SandboxLedger::new());
    let wallet = Arc::new(SandboxWallet::new(dev_accounts(accounts), network));
    let client = DaoClient::new(ledger.clone(), Some(wallet.clone()), ClientConfig::default());
    Fixture {
        client,
        ledger,
        wallet,
    }
}

/// Second client sharing the fixture's ledger, connected as `account`.
pub async fn other_member(ledger: &Arc<SandboxLedger>, account: u8, name: &str) -> DaoClient {
    let identity = Identity::new([account; 20]);
    let wallet = Arc::new(SandboxWallet::new(vec![identity], NetworkId::GANACHE));
    let mut client = DaoClient::new(ledger.clone(), Some(wallet), ClientConfig::default());
    client.connect().await.outcome.unwrap();
    assert!(client.join(name).await.is_ok());
    client
}

/// Connected client whose identity already joined, with one proposal submitted.
pub async fn member_with_proposal(url: &str) -> Fixture {
    let mut fixture = setup(NetworkId::GANACHE, 1);
    fixture.client.connect().await.outcome.unwrap();
    assert!(fixture.client.join("Alice").await.is_ok());
    assert!(fixture.client.submit(url).await.is_ok());
    fixture
}

/// Delegates to a sandbox but reports a fixed status once a proposal is
/// finalized, the way an arbitrary tie-break on the ledger would.
pub struct FixedOutcomeLedger {
    pub inner: Arc<SandboxLedger>,
    pub final_status: RiskOption,
    /// When set, the finalized flag of every proposal reads as false again.
    pub regress: Mutex<bool>,
}

impl FixedOutcomeLedger {
    pub fn new(inner: Arc<SandboxLedger>, final_status: RiskOption) -> Self {
        Self {
            inner,
            final_status,
            regress: Mutex::new(false),
        }
    }
}

#[async_trait]
impl Ledger for FixedOutcomeLedger {
    async fn proposal_count(&self) -> RequestResult<u64> {
        self.inner.proposal_count().await
    }

    async fn proposal(&self, id: u64) -> RequestResult<ProposalRecord> {
        let mut record = self.inner.proposal(id).await?;
        if record.processed {
            record.final_status = self.final_status as u8;
        }
        if *self.regress.lock().unwrap() {
            record.processed = false;
        }
        Ok(record)
    }

    async fn proposal_tally(&self, id: u64) -> RequestResult<[u64; 4]> {
        self.inner.proposal_tally(id).await
    }

    async fn member(&self, identity: Identity) -> RequestResult<MemberRecord> {
        self.inner.member(identity).await
    }

    async fn member_count(&self) -> RequestResult<u64> {
        Err(RequestError::new("getMemberCount is not a function"))
    }

    async fn all_member_identities(&self) -> RequestResult<Vec<Identity>> {
        self.inner.all_member_identities().await
    }

    async fn member_detail(&self, identity: Identity) -> RequestResult<MemberDetailRecord> {
        self.inner.member_detail(identity).await
    }

    async fn join(&self, from: Identity, display_name: &str) -> RequestResult<()> {
        self.inner.join(from, display_name).await
    }

    async fn submit_proposal(&self, from: Identity, url: &str) -> RequestResult<()> {
        self.inner.submit_proposal(from, url).await
    }

    async fn cast_vote(&self, from: Identity, id: u64, option: u8) -> RequestResult<()> {
        self.inner.cast_vote(from, id, option).await
    }

    async fn finalize_proposal(&self, from: Identity, id: u64) -> RequestResult<()> {
        self.inner.finalize_proposal(from, id).await
    }
}
