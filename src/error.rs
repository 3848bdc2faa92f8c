use std::fmt;
use thiserror::Error;

/// Wallet code for a request the user declined.
pub const USER_REJECTED_CODE: i64 = 4001;
/// Wallet code for a network the provider does not know about.
pub const UNKNOWN_NETWORK_CODE: i64 = 4902;

/// Raw failure reported by a collaborator (wallet or ledger).
///
/// The ledger only gives back a reason string, the wallet sometimes adds a
/// numeric code. Both are classified into a [`FailureKind`] exactly once, at
/// the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RequestError {
    pub code: Option<i64>,
    pub message: String,
}

impl RequestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(code: i64, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    fn mentions(&self, needle: &str) -> bool {
        self.message.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    ProviderUnavailable,
    UserRejected,
    NotConnected,
    NetworkMismatch,
    UnknownNetwork,
    AlreadyMember,
    NotAMember,
    NameRequired,
    NameTooLong,
    UrlRequired,
    AlreadyVoted,
    ProposalFinalized,
    QuorumNotMet,
    AlreadyFinalized,
    RequestInFlight,
    RequestFailed,
}

impl FailureKind {
    /// Informational kinds are shown to the user but are not faults.
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            FailureKind::AlreadyMember
                | FailureKind::AlreadyVoted
                | FailureKind::QuorumNotMet
                | FailureKind::AlreadyFinalized
                | FailureKind::RequestInFlight
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            FailureKind::ProviderUnavailable => "ProviderUnavailable",
            FailureKind::UserRejected => "UserRejected",
            FailureKind::NotConnected => "NotConnected",
            FailureKind::NetworkMismatch => "NetworkMismatch",
            FailureKind::UnknownNetwork => "UnknownNetwork",
            FailureKind::AlreadyMember => "AlreadyMember",
            FailureKind::NotAMember => "NotAMember",
            FailureKind::NameRequired => "NameRequired",
            FailureKind::NameTooLong => "NameTooLong",
            FailureKind::UrlRequired => "UrlRequired",
            FailureKind::AlreadyVoted => "AlreadyVoted",
            FailureKind::ProposalFinalized => "ProposalFinalized",
            FailureKind::QuorumNotMet => "QuorumNotMet",
            FailureKind::AlreadyFinalized => "AlreadyFinalized",
            FailureKind::RequestInFlight => "RequestInFlight",
            FailureKind::RequestFailed => "RequestFailed",
        };
        f.write_str(name)
    }
}

/// Structured outcome of a failed operation, handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_informational(&self) -> bool {
        self.kind.is_informational()
    }
}

pub type Outcome<T> = std::result::Result<T, Failure>;

/// The request a ledger rejection came back from. The same reason text can
/// mean different things depending on what was asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Read,
    Join,
    Submit,
    Vote,
    Finalize,
}

/// Maps a wallet failure into the session part of the taxonomy.
pub fn classify_wallet(err: &RequestError) -> Failure {
    let kind = match err.code {
        Some(USER_REJECTED_CODE) => FailureKind::UserRejected,
        Some(UNKNOWN_NETWORK_CODE) => FailureKind::UnknownNetwork,
        _ if err.mentions("rejected") || err.mentions("denied") => FailureKind::UserRejected,
        _ if err.mentions("unrecognized chain") || err.mentions("unknown network") => {
            FailureKind::UnknownNetwork
        }
        _ => FailureKind::RequestFailed,
    };
    Failure::new(kind, err.message.clone())
}

/// Maps a ledger rejection reason into the taxonomy.
pub fn classify_ledger(request: Request, err: &RequestError) -> Failure {
    let kind = if err.mentions("already a member") {
        FailureKind::AlreadyMember
    } else if err.mentions("not a member") {
        FailureKind::NotAMember
    } else if err.mentions("already voted") {
        FailureKind::AlreadyVoted
    } else if err.mentions("not enough votes") {
        FailureKind::QuorumNotMet
    } else if err.mentions("name required") || err.mentions("name is required") {
        FailureKind::NameRequired
    } else if err.mentions("name too long") || err.mentions("name is too long") {
        FailureKind::NameTooLong
    } else if err.mentions("already processed") || err.mentions("already finalized") {
        match request {
            Request::Finalize => FailureKind::AlreadyFinalized,
            _ => FailureKind::ProposalFinalized,
        }
    } else if err.code == Some(USER_REJECTED_CODE) {
        FailureKind::UserRejected
    } else {
        FailureKind::RequestFailed
    };
    Failure::new(kind, err.message.clone())
}
