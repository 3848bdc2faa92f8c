use anyhow::{Result, anyhow};
use clap::Subcommand;
use reputation_dao_sdk::account::NetworkId;
use reputation_dao_sdk::sandbox::SandboxWallet;

use crate::parsers::AccountSlot;

/// What a user would do in the wallet's own UI.
#[derive(Debug, Subcommand)]
pub enum WalletCommands {
    #[command(name = "accounts", about = "List the wallet's accounts")]
    Accounts,
    #[command(name = "select", about = "Select another account (1-based)")]
    Select { slot: AccountSlot },
    #[command(name = "network", about = "Move the wallet to another chain id (hex or decimal)")]
    Network { chain_id: NetworkId },
    #[command(name = "lock", about = "Lock the wallet")]
    Lock,
}

impl WalletCommands {
    pub fn run(&self, wallet: &SandboxWallet) -> Result<()> {
        match self {
            WalletCommands::Accounts => {
                for (i, account) in wallet.accounts().iter().enumerate() {
                    println!("{:>2}. {}", i + 1, account);
                }
                println!("Network: {}", wallet.network());
                Ok(())
            }
            WalletCommands::Select { slot } => {
                let identity = wallet
                    .select_account(slot.0)
                    .ok_or(anyhow!("No account in slot {}", slot.0 + 1))?;
                println!("Wallet switched to {}", identity);
                Ok(())
            }
            WalletCommands::Network { chain_id } => {
                wallet.set_network(*chain_id);
                println!("Wallet moved to chain {}", chain_id);
                Ok(())
            }
            WalletCommands::Lock => {
                wallet.lock_accounts();
                println!("Wallet locked");
                Ok(())
            }
        }
    }
}
