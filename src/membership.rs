use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::account::Identity;
use crate::error::{classify_ledger, Failure, FailureKind, Outcome, Request};
use crate::ledger::Ledger;
use crate::session::SessionGuard;
use crate::utils;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Role {
    #[default]
    Member,
    Moderator,
    Admin,
}

impl TryFrom<u8> for Role {
    type Error = Failure;

    fn try_from(value: u8) -> Outcome<Self> {
        match value {
            0 => Ok(Role::Member),
            1 => Ok(Role::Moderator),
            2 => Ok(Role::Admin),
            other => Err(Failure::new(
                FailureKind::RequestFailed,
                format!("Unknown role {}", other),
            )),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Member => write!(f, "Member"),
            Role::Moderator => write!(f, "Moderator"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub identity: Identity,
    pub display_name: String,
    pub role: Role,
    pub token_balance: u64,
    pub proposals_submitted: u64,
    pub votes_cast: u64,
    pub is_registered: bool,
}

impl Member {
    /// An identity that never joined.
    pub fn unregistered(identity: Identity, token_balance: u64) -> Self {
        Self {
            identity,
            display_name: String::new(),
            role: Role::Member,
            token_balance,
            proposals_submitted: 0,
            votes_cast: 0,
            is_registered: false,
        }
    }
}

/// Cached view of the connected identity's membership.
pub struct MembershipView {
    ledger: Arc<dyn Ledger>,
    max_name_len: usize,
    fetch_concurrency: usize,
    member: Option<Member>, // if None then not fetched yet
    directory: Option<Vec<Member>>, // if None then not fetched yet
}

impl MembershipView {
    pub fn new(ledger: Arc<dyn Ledger>, max_name_len: usize, fetch_concurrency: usize) -> Self {
        Self {
            ledger,
            max_name_len,
            fetch_concurrency,
            member: None,
            directory: None,
        }
    }

    pub fn member(&self) -> Option<&Member> {
        self.member.as_ref()
    }

    pub fn directory(&self) -> Option<&[Member]> {
        self.directory.as_deref()
    }

    pub fn is_registered(&self) -> bool {
        self.member.as_ref().is_some_and(|m| m.is_registered)
    }

    pub fn clear(&mut self) {
        self.member = None;
        self.directory = None;
    }

    pub async fn refresh(&mut self, identity: Identity) -> Outcome<&Member> {
        self.directory = None;
        match self.fetch(identity).await {
            Ok(member) => Ok(&*self.member.insert(member)),
            Err(e) => {
                self.member = None;
                Err(e)
            }
        }
    }

    async fn fetch(&self, identity: Identity) -> Outcome<Member> {
        debug!("Fetching member {}", identity);
        let record = self
            .ledger
            .member(identity)
            .await
            .map_err(|e| classify_ledger(Request::Read, &e))?;
        if !record.is_member {
            return Ok(Member::unregistered(identity, record.tokens));
        }
        fetch_detail(self.ledger.as_ref(), identity).await
    }

    /// Checks the name before anything leaves the client.
    pub fn validate_name(&self, display_name: &str) -> Outcome<()> {
        if display_name.trim().is_empty() {
            return Err(Failure::new(FailureKind::NameRequired, "Name is required to join"));
        }
        if display_name.chars().count() > self.max_name_len {
            return Err(Failure::new(
                FailureKind::NameTooLong,
                format!("Name is too long (max {} chars)", self.max_name_len),
            ));
        }
        Ok(())
    }

    pub async fn join(&self, session: &mut SessionGuard, display_name: &str) -> Outcome<()> {
        self.validate_name(display_name)?;
        let identity = session.ensure_required_network().await?;

        if self.member.as_ref().is_some_and(|m| m.identity == identity && m.is_registered) {
            return Err(Failure::new(FailureKind::AlreadyMember, "You are already a member"));
        }

        match self.ledger.join(identity, display_name).await {
            Ok(()) => {
                info!("{} joined as {}", identity.short(), display_name);
                Ok(())
            }
            Err(e) => {
                let failure = classify_ledger(Request::Join, &e);
                warn!("Join rejected: {}", failure);
                Err(failure)
            }
        }
    }

    /// Member-only listing of every registered member.
    pub async fn load_directory(&mut self) -> Outcome<&[Member]> {
        if !self.is_registered() {
            self.directory = None;
            return Err(Failure::new(
                FailureKind::NotAMember,
                "Only DAO members can view the member list",
            ));
        }

        let ledger = self.ledger.clone();
        let identities = match ledger.all_member_identities().await {
            Ok(identities) => identities,
            Err(e) => {
                self.directory = None;
                return Err(classify_ledger(Request::Read, &e));
            }
        };
        let members = utils::fetch_ordered(identities, self.fetch_concurrency, |identity| {
            let ledger = ledger.clone();
            async move { fetch_detail(ledger.as_ref(), identity).await }
        })
        .await;

        match members {
            Ok(members) => Ok(self.directory.insert(members).as_slice()),
            Err(e) => {
                self.directory = None;
                Err(e)
            }
        }
    }

    /// `None` when the program does not expose a count.
    pub async fn member_count(&self) -> Option<u64> {
        match self.ledger.member_count().await {
            Ok(count) => Some(count),
            Err(e) => {
                debug!("Member count not available: {}", e);
                None
            }
        }
    }
}

/// Only meaningful for registered identities.
async fn fetch_detail(ledger: &dyn Ledger, identity: Identity) -> Outcome<Member> {
    let detail = ledger
        .member_detail(identity)
        .await
        .map_err(|e| classify_ledger(Request::Read, &e))?;
    Ok(Member {
        identity,
        display_name: detail.name,
        role: Role::try_from(detail.role)?,
        token_balance: detail.tokens,
        proposals_submitted: detail.proposals_submitted,
        votes_cast: detail.votes_count,
        is_registered: true,
    })
}
