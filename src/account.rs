use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Address of a wallet account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity([u8; 20]);

impl Identity {
    pub const ZERO: Identity = Identity([0; 20]);

    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// `0x1234...abcd`
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[38..])
    }
}

impl FromStr for Identity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| anyhow!("Invalid address {}: {}", s, e))?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| anyhow!("Invalid address {}: expected 20 bytes", s))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Identity {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

/// Chain id of a ledger network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u64);

impl NetworkId {
    pub const GANACHE: NetworkId = NetworkId(1337);

    /// Wallets exchange chain ids as `0x`-prefixed hex.
    pub fn to_hex(&self) -> String {
        format!("{:#x}", self.0)
    }
}

impl FromStr for NetworkId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = match s.strip_prefix("0x") {
            Some(digits) => u64::from_str_radix(digits, 16),
            None => s.parse::<u64>(),
        }
        .map_err(|e| anyhow!("Invalid chain id {}: {}", s, e))?;
        Ok(Self(id))
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// What a wallet needs to register a network it does not know yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    pub chain_id: NetworkId,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
}

impl NetworkDescriptor {
    pub fn ganache() -> Self {
        Self {
            chain_id: NetworkId::GANACHE,
            chain_name: "Ganache Local".to_string(),
            rpc_urls: vec!["http://127.0.0.1:8545".to_string()],
            native_currency: NativeCurrency {
                name: "Ethereum".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
        }
    }
}

impl Default for NetworkDescriptor {
    fn default() -> Self {
        Self::ganache()
    }
}
