//! walletlink demo
//!
//! Plays either side of a pairing against a live relay: `connect` acts as the
//! dApp and prints a pairing string, `pair` acts as the wallet and approves
//! one.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use walletlink::protocol::TransactionResponse;
use walletlink::transport::websocket::DEFAULT_RELAY_URL;
use walletlink::transport::{RelayConfig, WebSocketRelay};
use walletlink::{
    ConnectionStatus, Engine, EngineConfig, EngineEvent, Metadata, ProtocolResult, SavedSession,
    Session,
};

/// walletlink: pair a dApp with a wallet over a relay
#[derive(Parser)]
#[command(name = "walletlink-demo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Relay server URL
    #[arg(short, long, default_value = DEFAULT_RELAY_URL)]
    relay: String,

    /// Path to the saved session (default: ~/.walletlink/session.json)
    #[arg(short, long)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Act as the dApp: print a pairing string (or resume) and wait for a wallet
    Connect {
        /// Ledger network to request
        #[arg(short, long, default_value = "testnet")]
        network: String,

        /// Ask for more than one account
        #[arg(short, long)]
        multi_account: bool,

        /// Start over even if a saved session exists
        #[arg(short, long)]
        fresh: bool,
    },

    /// Act as the wallet: approve a pairing string
    Pair {
        /// Pairing string from the dApp
        pairing_string: String,

        /// Accounts to share
        #[arg(short, long, required = true)]
        account: Vec<String>,

        /// Ledger network the accounts live on
        #[arg(short, long, default_value = "testnet")]
        network: String,
    },

    /// Print the contents of a pairing string
    Decode {
        /// Pairing string to inspect
        pairing_string: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("walletlink=info")),
        )
        .init();

    let cli = Cli::parse();
    let state_path = cli.state.unwrap_or_else(default_state_path);

    let result = match cli.command {
        Commands::Connect {
            network,
            multi_account,
            fresh,
        } => cmd_connect(&cli.relay, &state_path, &network, multi_account, fresh).await,
        Commands::Pair {
            pairing_string,
            account,
            network,
        } => cmd_pair(&cli.relay, &pairing_string, &account, &network).await,
        Commands::Decode { pairing_string } => cmd_decode(&pairing_string),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn default_state_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".walletlink")
        .join("session.json")
}

fn dapp_metadata() -> Metadata {
    Metadata::new(
        "walletlink demo",
        "Command line pairing demo",
        "https://hashpack.app/img/logo.svg",
    )
}

fn wallet_metadata() -> Metadata {
    Metadata::new(
        "walletlink demo wallet",
        "Command line wallet that never signs",
        "https://hashpack.app/img/logo.svg",
    )
}

fn engine(relay_url: &str) -> Engine<WebSocketRelay> {
    let session = Session::shared();
    let config = RelayConfig {
        url: relay_url.to_string(),
    };
    let relay = WebSocketRelay::new(config, session.clone());
    Engine::new(relay, session, EngineConfig::default())
}

fn load_session(path: &Path) -> Option<SavedSession> {
    let json = fs::read_to_string(path).ok()?;
    match SavedSession::from_json(&json) {
        Ok(saved) => Some(saved),
        Err(e) => {
            warn!("Ignoring unreadable session at {:?}: {}", path, e);
            None
        }
    }
}

fn save_session(saved: &SavedSession, path: &Path) {
    let written = saved.to_json().map_err(|e| e.to_string()).and_then(|json| {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(path, json).map_err(|e| e.to_string())
    });

    match written {
        Ok(()) => info!("Session saved to {:?}", path),
        Err(e) => warn!("Could not save session to {:?}: {}", path, e),
    }
}

async fn cmd_connect(
    relay_url: &str,
    state_path: &Path,
    network: &str,
    multi_account: bool,
    fresh: bool,
) -> ProtocolResult<()> {
    let dapp = engine(relay_url);
    let mut events = dapp.events();

    let saved = if fresh { None } else { load_session(state_path) };
    let mut saved = match saved {
        Some(saved) => {
            let state = dapp.resume(&saved, dapp_metadata()).await?;
            println!("Resumed session on topic {}", state.topic);
            if saved.is_paired() {
                println!("Paired accounts: {}", saved.paired_accounts.join(", "));
            } else {
                println!("Pairing string (still waiting for a wallet):");
                println!("{}", saved.pairing_string);
            }
            saved
        }
        None => {
            let init = dapp.init(dapp_metadata(), None).await?;
            let state = dapp.connect(None, None).await?;
            let pairing_string = dapp.generate_pairing_string(&state, network, multi_account)?;

            println!("Pairing string (give this to the wallet):");
            println!("{}", pairing_string);

            SavedSession {
                topic: state.topic,
                pairing_string,
                private_key: Some(init.private_key),
                ..Default::default()
            }
        }
    };
    save_session(&saved, state_path);

    println!();
    println!("Waiting for wallet messages (Ctrl-C to quit)...");

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => break,
        };

        match event {
            Ok(EngineEvent::Pairing(approval)) => {
                println!(
                    "Paired with {} on {}: {}",
                    approval.metadata.name,
                    approval.network,
                    approval.account_ids.join(", ")
                );
                saved.paired_peer_metadata = Some(approval.metadata);
                saved.add_accounts(approval.account_ids);
                save_session(&saved, state_path);
            }
            Ok(EngineEvent::PairingRejected(rejected)) => {
                println!(
                    "Rejected: {}",
                    rejected.reason.as_deref().unwrap_or("no reason given")
                );
            }
            Ok(EngineEvent::ConnectionStatus(ConnectionStatus::Disconnected)) => {
                println!("Relay connection closed");
                break;
            }
            Ok(event) => info!(?event, "Event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed events"),
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}

async fn cmd_pair(
    relay_url: &str,
    pairing_string: &str,
    accounts: &[String],
    network: &str,
) -> ProtocolResult<()> {
    let pairing = Engine::<WebSocketRelay>::decode_pairing_string(pairing_string)?;
    let wallet = engine(relay_url);
    let mut events = wallet.events();

    wallet.init(wallet_metadata(), None).await?;
    let state = wallet.pair(&pairing, accounts, network).await?;
    println!("Approved pairing with {} on topic {}", pairing.metadata.name, state.topic);

    println!();
    println!("Waiting for requests (Ctrl-C to quit)...");

    loop {
        let event = tokio::select! {
            event = events.recv() => event,
            _ = tokio::signal::ctrl_c() => break,
        };

        match event {
            Ok(EngineEvent::Transaction(transaction)) => {
                println!(
                    "Transaction for {} ({} bytes), declining",
                    transaction.metadata.account_to_sign,
                    transaction.byte_array.len()
                );
                let response = TransactionResponse {
                    msg_id: Some(transaction.id),
                    success: false,
                    error: Some("demo wallet does not sign".to_string()),
                    ..Default::default()
                };
                if let Err(e) = wallet
                    .send_transaction_response(&transaction.topic, response)
                    .await
                {
                    warn!("Could not answer transaction: {}", e);
                }
            }
            Ok(EngineEvent::AdditionalAccountRequest(request)) => {
                println!("Additional accounts requested on {}", request.network);
            }
            Ok(EngineEvent::AuthenticationRequest(request)) => {
                println!("Authentication requested by {}", request.payload.url);
            }
            Ok(EngineEvent::ConnectionStatus(ConnectionStatus::Disconnected)) => {
                println!("Relay connection closed");
                break;
            }
            Ok(event) => info!(?event, "Event"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Missed events"),
            Err(RecvError::Closed) => break,
        }
    }

    Ok(())
}

fn cmd_decode(pairing_string: &str) -> ProtocolResult<()> {
    let pairing = Engine::<WebSocketRelay>::decode_pairing_string(pairing_string)?;

    println!("Topic:         {}", pairing.topic);
    println!("Network:       {}", pairing.network);
    println!("Multi account: {}", pairing.multi_account);
    println!("Name:          {}", pairing.metadata.name);
    println!("Description:   {}", pairing.metadata.description);
    println!("Icon:          {}", pairing.metadata.icon);
    println!("Url:           {}", pairing.metadata.url);
    Ok(())
}
