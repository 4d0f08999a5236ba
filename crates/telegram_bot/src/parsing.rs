//! Small text parsers shared by the command handlers.

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ParseError {
    #[error("cantidad no válida: {0}")]
    InvalidAmount(String),
    #[error("id de jugador no válido: {0}")]
    InvalidMember(String),
    #[error("impuesto no válido: {0}")]
    InvalidTax(String),
    #[error("falta la cantidad")]
    MissingAmount,
    #[error("demasiados argumentos")]
    TooManyArguments,
    #[error("opción desconocida: {0}")]
    UnknownOption(String),
}

/// Parse a silver amount. `_` and `,` are accepted as digit separators
/// (`1_000_000`, `1,000,000`).
pub(crate) fn parse_amount(raw: &str) -> Result<i64, ParseError> {
    let digits: String = raw.chars().filter(|c| *c != '_' && *c != ',').collect();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidAmount(raw.to_string()));
    }
    digits
        .parse()
        .map_err(|_| ParseError::InvalidAmount(raw.to_string()))
}

/// Parse a numeric Telegram user id.
pub(crate) fn parse_member(raw: &str) -> Result<i64, ParseError> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| ParseError::InvalidMember(raw.to_string()))
}

/// Parse a tax percentage, with or without the trailing `%`.
pub(crate) fn parse_tax(raw: &str) -> Result<u8, ParseError> {
    let value = raw.strip_suffix('%').unwrap_or(raw);
    value
        .parse::<u8>()
        .ok()
        .filter(|pct| *pct <= 100)
        .ok_or_else(|| ParseError::InvalidTax(raw.to_string()))
}

/// Public link to a message of a supergroup, which is the only kind of chat
/// whose messages can be linked by id.
pub(crate) fn message_link(chat_id: i64, message_id: i64) -> Option<String> {
    let chat = chat_id.to_string();
    let internal = chat.strip_prefix("-100")?;
    if internal.is_empty() {
        return None;
    }
    Some(format!("https://t.me/c/{internal}/{message_id}"))
}
