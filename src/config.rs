use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::account::NetworkDescriptor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// The only network mutating requests may be sent on.
    pub required_network: NetworkDescriptor,
    /// Minimum total votes before a proposal can be finalized.
    ///
    /// `min_quorum`, `vote_reward` and `max_name_len` mirror rules enforced by
    /// the deployed program and must be set to its values. The client only
    /// uses them to reject requests early; the ledger stays authoritative.
    pub min_quorum: u64,
    /// Tokens the ledger credits per successful vote (display only).
    pub vote_reward: u64,
    pub max_name_len: usize,
    /// Upper bound on concurrent reads during a reload.
    pub fetch_concurrency: usize,
    /// Deployed program address, as written by the deploy script.
    pub contract_address: Option<String>,
}

impl ClientConfig {
    pub const MIN_QUORUM: u64 = 3;
    pub const VOTE_REWARD: u64 = 10;
    pub const MAX_NAME_LEN: usize = 50;
    pub const FETCH_CONCURRENCY: usize = 8;

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_concurrency == 0 {
            return Err(anyhow!("fetch_concurrency must be at least 1"));
        }
        if self.min_quorum == 0 {
            return Err(anyhow!("min_quorum must be at least 1"));
        }
        if self.max_name_len == 0 {
            return Err(anyhow!("max_name_len must be at least 1"));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            required_network: NetworkDescriptor::ganache(),
            min_quorum: Self::MIN_QUORUM,
            vote_reward: Self::VOTE_REWARD,
            max_name_len: Self::MAX_NAME_LEN,
            fetch_concurrency: Self::FETCH_CONCURRENCY,
            contract_address: None,
        }
    }
}
