// Console loop - Reads operator commands and renders replies

use crate::console::command::{Command, CommandError, HELP};
use crate::node::{NodeError, PeerNode};
use std::fmt::Write as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

/// What the console should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Exit,
}

/// Run one command against the node. Failures are rendered as text.
pub async fn execute(node: &PeerNode, command: Command) -> Reply {
    let text = match command {
        Command::Connect { host, port } => match node.connect(&host, port).await {
            Ok(_) => format!("Connected to {}:{}", host, port),
            Err(e) => format!("Connection failed: {}", e),
        },
        Command::Send { recipient, amount } => {
            match node.submit_local_transaction(&recipient, amount).await {
                Ok(applied) => format!(
                    "Sent {} coins to {}. Your balance: {}",
                    applied.transfer.amount,
                    applied.transfer.recipient,
                    node.query_own_balance().await
                ),
                Err(NodeError::Validation(e)) => format!("Transaction failed: {}", e),
                Err(e) => format!("Transaction failed: {}", e),
            }
        }
        Command::Chat(text) => match node.send_chat(&text).await {
            Ok(delivered) => format!("(Chat) sent to {} peer(s)", delivered),
            Err(e) => format!("Chat not sent: {}", e),
        },
        Command::Balance => format!("Your current balance: {}", node.query_own_balance().await),
        Command::Ledger => render_ledger(&node.query_ledger().await),
        Command::Peers => render_peers(node).await,
        Command::Help => HELP.to_string(),
        Command::Exit => return Reply::Exit,
    };
    Reply::Text(text)
}

fn render_ledger(ledger: &[String]) -> String {
    let mut out = format!("--- Transaction Ledger ({} entries) ---\n", ledger.len());
    if ledger.is_empty() {
        out.push_str("  (Ledger is empty)\n");
    }
    for (i, entry) in ledger.iter().enumerate() {
        let _ = writeln!(out, "  {}. {}", i + 1, entry);
    }
    out.push_str("------------------------------------------");
    out
}

async fn render_peers(node: &PeerNode) -> String {
    let known = node.query_known_peers().await;
    let active = node.query_active_peers().await;

    let mut out = format!("--- Known Peers and Balances ({}) ---\n", known.len());
    for (identity, balance) in &known {
        let marker = if identity == node.identity() { " (You)" } else { "" };
        let _ = writeln!(out, "  - {:<15}: {} coins{}", identity.as_str(), balance, marker);
    }

    let _ = writeln!(out, "--- Active Connections ({}) ---", active.len());
    if active.is_empty() {
        out.push_str("  (No active connections)\n");
    }
    for peer in &active {
        let _ = writeln!(out, "  - Connected to: {}", peer);
    }
    out.push_str("------------------------------------");
    out
}

/// Read commands from `input` until `/exit` or end of input, then shut the
/// node down.
pub async fn run_console<R, W>(node: PeerNode, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let prompt = format!("{}> ", node.identity());
    let mut lines = input.lines();

    output.write_all(format!("{}\n", HELP).as_bytes()).await?;

    loop {
        output.write_all(prompt.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            info!("Input stream closed. Shutting down...");
            break;
        };

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(CommandError::Empty) => continue,
            Err(e) => {
                output.write_all(format!("{}\n", e).as_bytes()).await?;
                continue;
            }
        };
        debug!(?command, "Console command");

        match execute(&node, command).await {
            Reply::Text(text) => output.write_all(format!("{}\n", text).as_bytes()).await?,
            Reply::Exit => break,
        }
    }

    node.shutdown().await;
    output.flush().await?;
    Ok(())
}
