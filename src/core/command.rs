//! Command parser for the : command system

/// Parsed command from user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Address list
    Add(String),
    /// Remove by card number (1-based) or by address
    Remove(String),
    Copy(Option<usize>),

    // Wallet
    Connect(Option<usize>),
    Disconnect,

    // Node
    Endpoint(Option<usize>),
    Refresh,

    Help,
    Quit,

    // Unknown command
    Unknown(String),
}

/// Parse a command string (without the leading :)
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let mut parts = input.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("");
    let args = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match cmd.to_lowercase().as_str() {
        "add" | "a" | "watch" => match args {
            Some(addr) => Command::Add(addr),
            None => Command::Unknown(input.to_string()),
        },
        "rm" | "remove" | "del" | "delete" => match args {
            Some(target) => Command::Remove(target),
            None => Command::Unknown(input.to_string()),
        },
        "copy" | "yank" | "y" => match args {
            None => Command::Copy(None),
            Some(n) => match n.parse() {
                Ok(n) => Command::Copy(Some(n)),
                Err(_) => Command::Unknown(input.to_string()),
            },
        },

        "connect" | "conn" => match args {
            None => Command::Connect(None),
            Some(n) => match n.parse() {
                Ok(n) => Command::Connect(Some(n)),
                Err(_) => Command::Unknown(input.to_string()),
            },
        },
        "disconnect" | "dc" => Command::Disconnect,

        "endpoint" | "rpc" => match args {
            None => Command::Endpoint(None),
            Some(n) => match n.parse() {
                Ok(n) => Command::Endpoint(Some(n)),
                Err(_) => Command::Unknown(input.to_string()),
            },
        },
        "refresh" | "r" => Command::Refresh,

        "help" | "h" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,

        _ => Command::Unknown(input.to_string()),
    }
}
