use anyhow::{Result, anyhow};
use clap::Subcommand;
use reputation_dao_sdk::DaoClient;
use reputation_dao_sdk::proposals::{Proposal, RiskOption};

use super::print_report;
use crate::parsers::ProposalRef;

#[derive(Debug, Subcommand)]
pub enum ProposalCommands {
    #[command(name = "list", about = "List proposals, optionally filtered by url or #id")]
    List { search: Option<String> },
    #[command(name = "show", about = "Show one proposal with its tally")]
    Show { id: ProposalRef },
    #[command(name = "submit", about = "Submit a website for review")]
    Submit { url: String },
    #[command(
        name = "vote",
        about = "Vote on a proposal: scam, high-risk, normal or safe"
    )]
    Vote { id: ProposalRef, option: RiskOption },
    #[command(name = "finalize", about = "Finalize a proposal once quorum is reached")]
    Finalize { id: ProposalRef },
}

impl ProposalCommands {
    pub async fn run(&self, client: &mut DaoClient) -> Result<()> {
        match self {
            ProposalCommands::List { search } => {
                if client.proposals().is_none() {
                    client.refresh().await?;
                }
                let found = client.search(search.as_deref().unwrap_or(""));
                println!("\n=== PROPOSALS ({}) ===\n", found.len());
                for proposal in found {
                    println!(
                        "#{:<4} {:<40} {:>3} votes  {}",
                        proposal.id,
                        proposal.url,
                        proposal.total_votes(),
                        proposal.status()
                    );
                }
                Ok(())
            }
            ProposalCommands::Show { id } => {
                let proposal = client
                    .proposal(id.0)
                    .ok_or(anyhow!("Proposal #{} not loaded", id.0))?;
                print_proposal(proposal, client.config().min_quorum);
                if client.can_finalize(id.0) {
                    println!("Quorum reached, ready to finalize");
                }
                Ok(())
            }
            ProposalCommands::Submit { url } => {
                let report = client.submit(url).await;
                print_report("Submit", &report);
                Ok(())
            }
            ProposalCommands::Vote { id, option } => {
                let report = client.vote(id.0, *option).await;
                print_report("Vote", &report);
                Ok(())
            }
            ProposalCommands::Finalize { id } => {
                let report = client.finalize(id.0).await;
                print_report("Finalize", &report);
                if let Some(proposal) = client.proposal(id.0) {
                    println!("Proposal #{} is now {}", id.0, proposal.status());
                }
                Ok(())
            }
        }
    }
}

fn print_proposal(proposal: &Proposal, min_quorum: u64) {
    println!("\n=== PROPOSAL #{} ===\n", proposal.id);
    println!("Url: {}", proposal.url);
    println!("Proposer: {}", proposal.proposer);
    println!("Submitted at: {} (unix)", proposal.start_time);
    println!("Status: {}", proposal.status());
    for option in RiskOption::ALL {
        println!("  {:<10} {}", option.label(), proposal.tally.get(option));
    }
    println!("Votes: {}/{}", proposal.total_votes(), min_quorum);
}
