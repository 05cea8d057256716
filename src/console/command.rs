// Command - The operator's slash-command grammar

use thiserror::Error;

/// One-line summary of the available commands
pub const HELP: &str = "Enter commands: /connect <host> <port>, /send <nick> <amount>, \
                        /chat <text>, /balance, /ledger, /peers, /exit";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Invalid port number: '{0}'")]
    InvalidPort(String),

    #[error("Invalid amount: '{0}'")]
    InvalidAmount(String),

    #[error("Invalid endpoint '{0}', expected host:port")]
    InvalidEndpoint(String),

    #[error("Unknown command: '{0}'. Available: /connect, /send, /chat, /balance, /ledger, /peers, /exit")]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Connect { host: String, port: u16 },
    /// The amount is checked for sign by the ledger, not here
    Send { recipient: String, amount: i64 },
    Chat(String),
    Balance,
    Ledger,
    Peers,
    Help,
    Exit,
}

impl Command {
    /// Parse one input line. The command word is case-insensitive.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let Some(word) = parts.next() else {
            return Err(CommandError::Empty);
        };
        let args: Vec<&str> = parts.collect();

        match word.to_lowercase().as_str() {
            "/connect" => match args.as_slice() {
                [host, port] => Ok(Command::Connect {
                    host: host.to_string(),
                    port: parse_port(port)?,
                }),
                _ => Err(CommandError::Usage("/connect <host> <port>")),
            },
            "/send" => match args.as_slice() {
                [recipient, amount] => Ok(Command::Send {
                    recipient: recipient.to_string(),
                    amount: amount
                        .parse()
                        .map_err(|_| CommandError::InvalidAmount(amount.to_string()))?,
                }),
                _ => Err(CommandError::Usage("/send <recipient_nickname> <amount>")),
            },
            "/chat" => {
                // Keep the text's own spacing
                let text = line[word.len()..].trim();
                if text.is_empty() {
                    return Err(CommandError::Usage("/chat <text>"));
                }
                Ok(Command::Chat(text.to_string()))
            }
            "/balance" => Ok(Command::Balance),
            "/ledger" => Ok(Command::Ledger),
            "/peers" => Ok(Command::Peers),
            "/help" => Ok(Command::Help),
            "/exit" => Ok(Command::Exit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

/// Split `host:port`, as given to `--connect`
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16), CommandError> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .filter(|(host, _)| !host.is_empty())
        .ok_or_else(|| CommandError::InvalidEndpoint(endpoint.to_string()))?;
    Ok((host.to_string(), parse_port(port)?))
}

fn parse_port(port: &str) -> Result<u16, CommandError> {
    match port.parse::<u16>() {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(CommandError::InvalidPort(port.to_string())),
    }
}
