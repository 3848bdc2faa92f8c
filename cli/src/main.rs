mod commands;
mod parsers;

use std::io::{self, Write};
use std::sync::Arc;
use anyhow::Result;
use clap::{Parser, Subcommand};
use reputation_dao_sdk::{DaoClient, config::ClientConfig};
use reputation_dao_sdk::sandbox::{SandboxLedger, SandboxWallet, dev_accounts};
use reputation_dao_sdk::session::Reconcile;

use commands::{member::MemberCommands, proposal::ProposalCommands, wallet::WalletCommands};

const DEV_ACCOUNTS: u8 = 10;

#[derive(Debug, Parser)]
#[command(name = "reputation-dao", version, about, long_about = None)]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(name = "exit", about = "Exit the CLI")]
    Exit,
    #[command(name = "connect", about = "Connect the wallet and load the DAO")]
    Connect,
    #[command(name = "disconnect", about = "Forget the session and every cached view")]
    Disconnect,
    #[command(name = "switch-account", about = "Ask the wallet for another account")]
    SwitchAccount,
    #[command(name = "status", about = "Show the session and dashboard")]
    Status,
    #[command(name = "members", about = "Membership")]
    Members {
        #[command(subcommand)]
        command: MemberCommands,
    },
    #[command(name = "proposals", about = "Proposals and voting")]
    Proposals {
        #[command(subcommand)]
        command: ProposalCommands,
    },
    #[command(name = "wallet", about = "Act in the wallet UI")]
    Wallet {
        #[command(subcommand)]
        command: WalletCommands,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Reputation DAO CLI - Interactive Mode");
    println!("Type 'help' for commands, 'exit' to quit");

    let config = match std::env::args().nth(1) {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    let ledger = Arc::new(SandboxLedger::new());
    let wallet = Arc::new(SandboxWallet::new(
        dev_accounts(DEV_ACCOUNTS),
        config.required_network.chain_id,
    ));
    let mut client = DaoClient::new(ledger, Some(wallet.clone()), config);

    loop {
        print!("dao> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == "exit" || input == "quit" {
            break;
        }

        let args = std::iter::once("dao").chain(input.split_whitespace());
        match App::try_parse_from(args) {
            Ok(app) => {
                let result = match app.command {
                    Commands::Exit => break,
                    Commands::Connect => connect(&mut client).await,
                    Commands::Disconnect => {
                        client.disconnect();
                        println!("Disconnected");
                        Ok(())
                    }
                    Commands::SwitchAccount => {
                        let report = client.switch_account().await;
                        commands::print_report("Account switch", &report);
                        println!("Session: {:?}", client.session());
                        Ok(())
                    }
                    Commands::Status => status(&mut client).await,
                    Commands::Members { command } => command.run(&mut client).await,
                    Commands::Proposals { command } => command.run(&mut client).await,
                    Commands::Wallet { command } => command.run(&wallet),
                };
                if let Err(e) = result {
                    eprintln!("Error: {}", e);
                }
            }
            Err(e) => {
                eprintln!("{}", e);
            }
        }

        // wallet notifications arrive between prompts
        for result in client.process_pending_events().await {
            match result {
                Ok(Reconcile::Keep) => {}
                Ok(Reconcile::Reload) => println!("Wallet changed, reloaded for {:?}", client.session()),
                Ok(Reconcile::Reset) => println!("Wallet left the required network, please reconnect"),
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    }

    Ok(())
}

async fn connect(client: &mut DaoClient) -> Result<()> {
    let report = client.connect().await;
    commands::print_report("Connect", &report);
    let Ok(state) = report.outcome else {
        return Ok(());
    };
    println!("Session: {:?}", state);
    if !state.is_connected() {
        let required = &client.config().required_network;
        println!(
            "Please switch to {} (Chain ID: {})",
            required.chain_name, required.chain_id
        );
    }
    Ok(())
}

async fn status(client: &mut DaoClient) -> Result<()> {
    println!("Session: {:?}", client.session());
    if client.identity().is_none() {
        return Ok(());
    }
    let dashboard = client.dashboard().await?;
    println!("{}", serde_json::to_string_pretty(&dashboard)?);
    Ok(())
}
