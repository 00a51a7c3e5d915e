use thiserror::Error;

use crate::storage::Key;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set { key: Key, value: String },
    Get { key: Key },
    Stats,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}. Usage: SET <key> <value> | GET <key> | STATS")]
    Unknown(String),

    #[error("{0} requires a key")]
    MissingKey(&'static str),

    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    #[error("SET requires key and value")]
    MissingValue,

    #[error("GET takes exactly one key")]
    TrailingInput,
}

/// Splits off the first whitespace-delimited token; the remainder keeps its
/// inner spacing.
fn split_token(input: &str) -> (&str, &str) {
    match input.find(char::is_whitespace) {
        Some(idx) => (&input[..idx], input[idx..].trim_start()),
        None => (input, ""),
    }
}

fn parse_key(raw: &str) -> Result<Key, CommandError> {
    raw.parse()
        .map_err(|_| CommandError::InvalidKey(raw.to_string()))
}

/// Parses one line of the client protocol.
///
/// ```text
/// SET <key> <value...>
/// GET <key>
/// STATS
/// ```
///
/// The verb is case-insensitive; the value of a SET is the rest of the line.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(CommandError::Empty);
    }

    let (verb, rest) = split_token(line);
    match verb.to_ascii_uppercase().as_str() {
        "STATS" => Ok(Command::Stats),
        "SET" => {
            let (key, value) = split_token(rest);
            if key.is_empty() {
                return Err(CommandError::MissingKey("SET"));
            }
            let key = parse_key(key)?;
            if value.is_empty() {
                return Err(CommandError::MissingValue);
            }
            Ok(Command::Set {
                key,
                value: value.to_string(),
            })
        }
        "GET" => {
            let (key, extra) = split_token(rest);
            if key.is_empty() {
                return Err(CommandError::MissingKey("GET"));
            }
            let key = parse_key(key)?;
            if !extra.is_empty() {
                return Err(CommandError::TrailingInput);
            }
            Ok(Command::Get { key })
        }
        other => Err(CommandError::Unknown(other.to_string())),
    }
}
