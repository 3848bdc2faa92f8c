use anyhow::{Result, anyhow};
use clap::Subcommand;
use reputation_dao_sdk::DaoClient;

use super::print_report;

#[derive(Debug, Subcommand)]
pub enum MemberCommands {
    #[command(name = "join", about = "Join the DAO under a display name")]
    Join {
        #[arg(num_args = 1.., trailing_var_arg = true)]
        name: Vec<String>,
    },
    #[command(name = "list", about = "List every member (members only)")]
    List,
    #[command(name = "me", about = "Show the connected account's membership")]
    Me,
}

impl MemberCommands {
    pub async fn run(&self, client: &mut DaoClient) -> Result<()> {
        match self {
            MemberCommands::Join { name } => {
                let report = client.join(&name.join(" ")).await;
                print_report("Join", &report);
                Ok(())
            }
            MemberCommands::List => {
                let members = client.load_members().await?;
                println!("\n=== MEMBERS ({}) ===\n", members.len());
                for member in members {
                    println!(
                        "{} {:<20} {:<9} {:>5} tokens  {} proposals  {} votes",
                        member.identity.short(),
                        member.display_name,
                        member.role.to_string(),
                        member.token_balance,
                        member.proposals_submitted,
                        member.votes_cast
                    );
                }
                Ok(())
            }
            MemberCommands::Me => {
                let member = client
                    .member()
                    .ok_or(anyhow!("Not connected, run `connect` first"))?;
                println!("{}", serde_json::to_string_pretty(member)?);
                Ok(())
            }
        }
    }
}
