mod utils;
use utils::{member_with_proposal, other_member, setup, FixedOutcomeLedger};

use std::sync::Arc;

use reputation_dao_sdk::account::NetworkId;
use reputation_dao_sdk::config::ClientConfig;
use reputation_dao_sdk::error::FailureKind;
use reputation_dao_sdk::ledger::Ledger;
use reputation_dao_sdk::proposals::{ProposalStatus, ProposalStore, RiskOption};
use reputation_dao_sdk::sandbox::{dev_accounts, SandboxLedger, SandboxWallet};
use reputation_dao_sdk::session::SessionGuard;
use reputation_dao_sdk::votes::VoteCoordinator;
use reputation_dao_sdk::DaoClient;

#[tokio::test]
async fn test_no_proposals_yet() {
    let mut fixture = setup(NetworkId::GANACHE, 1);
    fixture.client.connect().await.outcome.unwrap();

    let proposals = fixture.client.proposals().unwrap();
    assert!(proposals.is_empty());
    assert!(fixture.client.search("").is_empty());
}

#[tokio::test]
async fn test_submit_and_load() {
    let fixture = member_with_proposal("http://test.com").await;
    let identity = fixture.client.identity().unwrap();

    let proposals = fixture.client.proposals().unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].id, 0);
    assert_eq!(proposals[0].url, "http://test.com");
    assert_eq!(proposals[0].proposer, identity);
    assert_eq!(proposals[0].total_votes(), 0);
    assert_eq!(proposals[0].status(), ProposalStatus::Pending);
    assert_eq!(fixture.client.member().unwrap().proposals_submitted, 1);
}

#[tokio::test]
async fn test_load_keeps_id_order() {
    let mut fixture = member_with_proposal("http://site-0.com").await;
    for i in 1..20 {
        let report = fixture.client.submit(&format!("http://site-{}.com", i)).await;
        assert!(report.is_ok());
    }

    let proposals = fixture.client.proposals().unwrap();
    assert_eq!(proposals.len(), 20);
    for (i, p) in proposals.iter().enumerate() {
        assert_eq!(p.id, i as u64);
        assert_eq!(p.url, format!("http://site-{}.com", i));
    }

    let hits: Vec<u64> = fixture.client.search("SITE-1").iter().map(|p| p.id).collect();
    assert_eq!(hits, vec![1, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19]);
    assert_eq!(fixture.client.search("#7").len(), 1);
    let pasted: Vec<u64> = fixture.client.search("Proposal #7").iter().map(|p| p.id).collect();
    assert_eq!(pasted, vec![7]);
    assert_eq!(fixture.client.search("").len(), 20);
}

#[tokio::test]
async fn test_vote_is_counted_once() {
    let mut fixture = member_with_proposal("http://phish.example").await;
    let tokens_before = fixture.client.member().unwrap().token_balance;

    let first = fixture.client.vote(0, RiskOption::Scam).await;
    assert!(first.is_ok());
    assert!(matches!(first.reconciled, Some(Ok(()))));
    assert_eq!(fixture.client.proposal(0).unwrap().tally.get(RiskOption::Scam), 1);
    let member = fixture.client.member().unwrap();
    assert_eq!(member.token_balance, tokens_before + 10);
    assert_eq!(member.votes_cast, 1);

    let second = fixture.client.vote(0, RiskOption::Safe).await;
    assert_eq!(second.failure_kind(), Some(FailureKind::AlreadyVoted));
    assert!(second.outcome.unwrap_err().is_informational());

    let proposal = fixture.client.proposal(0).unwrap();
    assert_eq!(proposal.tally.0, [1, 0, 0, 0]);
    assert_eq!(proposal.total_votes(), 1);
    assert_eq!(fixture.client.member().unwrap().token_balance, tokens_before + 10);
}

#[tokio::test]
async fn test_unregistered_vote_is_rejected() {
    let fixture = setup(NetworkId::GANACHE, 1);
    let mut proposer = other_member(&fixture.ledger, 9, "Proposer").await;
    assert!(proposer.submit("http://a.com").await.is_ok());

    let mut client = fixture.client;
    client.connect().await.outcome.unwrap();
    assert!(!client.member().unwrap().is_registered);
    let mutations = fixture.ledger.mutations();

    let report = client.vote(0, RiskOption::Scam).await;
    assert_eq!(report.failure_kind(), Some(FailureKind::NotAMember));
    assert_eq!(fixture.ledger.mutations(), mutations);
    assert_eq!(client.proposal(0).unwrap().tally.0, [0; 4]);
}

#[tokio::test]
async fn test_finalize_needs_quorum() {
    let mut fixture = member_with_proposal("http://a.com").await;
    let mut bob = other_member(&fixture.ledger, 2, "Bob").await;

    assert!(fixture.client.vote(0, RiskOption::Safe).await.is_ok());
    assert!(bob.vote(0, RiskOption::Safe).await.is_ok());
    assert!(fixture.client.refresh().await.is_ok());
    assert_eq!(fixture.client.proposal(0).unwrap().total_votes(), 2);
    assert!(!fixture.client.can_finalize(0));

    let mutations = fixture.ledger.mutations();
    let report = fixture.client.finalize(0).await;
    assert_eq!(report.failure_kind(), Some(FailureKind::QuorumNotMet));
    assert!(report.outcome.unwrap_err().is_informational());
    assert_eq!(fixture.ledger.mutations(), mutations);
    assert!(!fixture.client.proposal(0).unwrap().is_finalized());
}

#[tokio::test]
async fn test_ledger_rejects_finalize_below_quorum() {
    // no snapshot loaded, so only the ledger can refuse
    let ledger = Arc::new(SandboxLedger::new());
    let wallet = Arc::new(SandboxWallet::new(dev_accounts(1), NetworkId::GANACHE));
    let mut session = SessionGuard::new(Some(wallet.clone()), ClientConfig::default().required_network);
    session.connect().await.unwrap();

    let identity = session.identity().unwrap();
    ledger.join(identity, "Alice").await.unwrap();
    ledger.submit_proposal(identity, "http://a.com").await.unwrap();

    let store = ProposalStore::new(ledger.clone(), 3, 4);
    let coordinator = VoteCoordinator::new(ledger.clone(), 3);
    let err = coordinator.finalize(&mut session, &store, 0).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::QuorumNotMet);
    assert_eq!(ledger.mutations(), 3);
    assert!(!ledger.proposal(0).await.unwrap().processed);
}

#[tokio::test]
async fn test_finalize_shows_ledger_status() {
    let sandbox = Arc::new(SandboxLedger::new());
    let ledger = Arc::new(FixedOutcomeLedger::new(sandbox.clone(), RiskOption::Normal));
    let wallet = Arc::new(SandboxWallet::new(dev_accounts(1), NetworkId::GANACHE));
    let mut client = DaoClient::new(ledger.clone(), Some(wallet), ClientConfig::default());
    client.connect().await.outcome.unwrap();
    assert!(client.join("Alice").await.is_ok());
    assert!(client.submit("http://tie.example").await.is_ok());

    let mut bob = other_member(&sandbox, 2, "Bob").await;
    let mut carol = other_member(&sandbox, 3, "Carol").await;
    assert!(client.vote(0, RiskOption::Scam).await.is_ok());
    assert!(bob.vote(0, RiskOption::Normal).await.is_ok());
    assert!(carol.vote(0, RiskOption::Safe).await.is_ok());

    assert!(client.refresh().await.is_ok());
    let proposal = client.proposal(0).unwrap();
    assert_eq!(proposal.tally.0, [1, 0, 1, 1]);
    assert!(proposal.quorum_reached(3));
    assert!(client.can_finalize(0));

    let report = client.finalize(0).await;
    assert!(report.is_ok());
    let proposal = client.proposal(0).unwrap();
    assert!(proposal.is_finalized());
    assert_eq!(proposal.status(), ProposalStatus::Finalized(RiskOption::Normal));
    assert_eq!(proposal.status().to_string(), "Normal");
}

#[tokio::test]
async fn test_finalized_is_terminal() {
    let mut fixture = member_with_proposal("http://a.com").await;
    let mut bob = other_member(&fixture.ledger, 2, "Bob").await;
    let mut carol = other_member(&fixture.ledger, 3, "Carol").await;
    assert!(bob.vote(0, RiskOption::Scam).await.is_ok());
    assert!(carol.vote(0, RiskOption::Scam).await.is_ok());
    assert!(fixture.client.vote(0, RiskOption::HighRisk).await.is_ok());

    assert!(fixture.client.finalize(0).await.is_ok());
    let status = fixture.client.proposal(0).unwrap().status();
    assert!(matches!(status, ProposalStatus::Finalized(_)));

    let mutations = fixture.ledger.mutations();
    let again = fixture.client.finalize(0).await;
    assert_eq!(again.failure_kind(), Some(FailureKind::AlreadyFinalized));
    assert_eq!(fixture.ledger.mutations(), mutations);

    // bob's snapshot is stale, the ledger refuses
    let late = bob.vote(0, RiskOption::Safe).await;
    assert!(matches!(
        late.failure_kind(),
        Some(FailureKind::AlreadyVoted) | Some(FailureKind::ProposalFinalized)
    ));

    let mut dave = other_member(&fixture.ledger, 4, "Dave").await;
    let late = dave.vote(0, RiskOption::Safe).await;
    assert_eq!(late.failure_kind(), Some(FailureKind::ProposalFinalized));

    assert!(fixture.client.refresh().await.is_ok());
    assert_eq!(fixture.client.proposal(0).unwrap().status(), status);
    assert_eq!(fixture.client.proposal(0).unwrap().total_votes(), 3);
}

#[tokio::test]
async fn test_ledger_finalize_after_stale_snapshot() {
    let mut fixture = member_with_proposal("http://a.com").await;
    let mut bob = other_member(&fixture.ledger, 2, "Bob").await;
    let mut carol = other_member(&fixture.ledger, 3, "Carol").await;
    assert!(fixture.client.vote(0, RiskOption::Safe).await.is_ok());
    assert!(bob.vote(0, RiskOption::Safe).await.is_ok());
    assert!(carol.vote(0, RiskOption::Safe).await.is_ok());

    // both see quorum, the second finalize loses the race
    assert!(bob.refresh().await.is_ok());
    assert!(fixture.client.refresh().await.is_ok());
    assert!(fixture.client.finalize(0).await.is_ok());
    let report = bob.finalize(0).await;
    assert_eq!(report.failure_kind(), Some(FailureKind::AlreadyFinalized));
    assert!(bob.proposal(0).unwrap().is_finalized());
}

#[tokio::test]
async fn test_finalized_never_reverts() {
    let sandbox = Arc::new(SandboxLedger::new());
    let ledger = Arc::new(FixedOutcomeLedger::new(sandbox.clone(), RiskOption::Safe));
    let wallet = Arc::new(SandboxWallet::new(dev_accounts(1), NetworkId::GANACHE));
    let mut client = DaoClient::new(ledger.clone(), Some(wallet), ClientConfig::default());
    client.connect().await.outcome.unwrap();
    assert!(client.join("Alice").await.is_ok());
    assert!(client.submit("http://a.com").await.is_ok());
    for (account, name) in [(2, "Bob"), (3, "Carol"), (4, "Dave")] {
        let mut voter = other_member(&sandbox, account, name).await;
        assert!(voter.vote(0, RiskOption::Safe).await.is_ok());
    }
    assert!(client.refresh().await.is_ok());
    assert!(client.finalize(0).await.is_ok());
    assert!(client.proposal(0).unwrap().is_finalized());

    *ledger.regress.lock().unwrap() = true;
    let err = client.refresh().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RequestFailed);
    assert!(client.proposals().is_none());

    *ledger.regress.lock().unwrap() = false;
    assert!(client.refresh().await.is_ok());
    assert_eq!(
        client.proposal(0).unwrap().status(),
        ProposalStatus::Finalized(RiskOption::Safe)
    );
}

#[tokio::test]
async fn test_one_request_per_proposal() {
    let mut fixture = member_with_proposal("http://a.com").await;
    let coordinator = fixture.client.coordinator().clone();
    let mutations = fixture.ledger.mutations();

    let guard = coordinator.begin(0).unwrap();
    assert!(coordinator.is_in_flight(0));
    let report = fixture.client.vote(0, RiskOption::Normal).await;
    assert_eq!(report.failure_kind(), Some(FailureKind::RequestInFlight));
    assert!(report.reconciled.is_none());
    assert_eq!(fixture.ledger.mutations(), mutations);

    drop(guard);
    assert!(!coordinator.is_in_flight(0));
    assert!(fixture.client.vote(0, RiskOption::Normal).await.is_ok());
    assert!(!coordinator.is_in_flight(0));
}

#[tokio::test]
async fn test_failed_load_drops_snapshot() {
    let mut fixture = member_with_proposal("http://a.com").await;
    assert!(fixture.client.proposals().is_some());

    fixture.ledger.set_unavailable(true);
    let err = fixture.client.refresh().await.unwrap_err();
    assert_eq!(err.kind, FailureKind::RequestFailed);
    assert!(fixture.client.proposals().is_none());
    assert!(fixture.client.member().is_none());

    fixture.ledger.set_unavailable(false);
    assert!(fixture.client.refresh().await.is_ok());
    assert_eq!(fixture.client.proposals().unwrap().len(), 1);
}
