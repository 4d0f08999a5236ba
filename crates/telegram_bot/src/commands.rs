//! Slash commands understood by the bot.
//!
//! Commands that act on a member take it either as a numeric user id or,
//! when the id is omitted, from the message being replied to.

use crate::parsing::{ParseError, parse_amount, parse_member, parse_tax};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SplitArgs {
    pub gross: i64,
    pub tax_percent: Option<u8>,
    pub liquid: i64,
    pub repair: i64,
    pub members: Vec<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Balance { member: Option<i64> },
    Top,
    AddBalance { member: Option<i64>, amount: i64 },
    RemoveBalance { member: Option<i64>, amount: i64 },
    Pay { member: Option<i64> },
    UpdateBalances,
    Transfer { member: Option<i64>, amount: i64 },
    Split(SplitArgs),
    Help,
}

impl Command {
    /// Whether only reviewers may run it.
    pub(crate) fn admin_only(&self) -> bool {
        matches!(
            self,
            Self::AddBalance { .. }
                | Self::RemoveBalance { .. }
                | Self::Pay { .. }
                | Self::UpdateBalances
        )
    }
}

/// Parse a slash command. `None` when `text` is not one of ours.
pub(crate) fn parse_command(text: &str) -> Option<Result<Command, ParseError>> {
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return None;
    }
    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or("");
    // `/top@regear_bot` in groups
    let name = head.split('@').next().unwrap_or(head);
    let args: Vec<&str> = parts.collect();

    let parsed = match name {
        "/balance" | "/bal" => optional_member(&args).map(|member| Command::Balance { member }),
        "/top" => Ok(Command::Top),
        "/addbal" => member_and_amount(&args)
            .map(|(member, amount)| Command::AddBalance { member, amount }),
        "/balremove" => member_and_amount(&args)
            .map(|(member, amount)| Command::RemoveBalance { member, amount }),
        "/pagar" => optional_member(&args).map(|member| Command::Pay { member }),
        "/updatebalances" => Ok(Command::UpdateBalances),
        "/transferir" => member_and_amount(&args)
            .map(|(member, amount)| Command::Transfer { member, amount }),
        "/split" => split_args(&args).map(Command::Split),
        "/helpbot" | "/help" | "/start" => Ok(Command::Help),
        _ => return None,
    };
    Some(parsed)
}

fn optional_member(args: &[&str]) -> Result<Option<i64>, ParseError> {
    match args {
        [] => Ok(None),
        [member] => parse_member(member).map(Some),
        _ => Err(ParseError::TooManyArguments),
    }
}

fn member_and_amount(args: &[&str]) -> Result<(Option<i64>, i64), ParseError> {
    match args {
        [] => Err(ParseError::MissingAmount),
        [amount] => Ok((None, parse_amount(amount)?)),
        [member, amount] => Ok((Some(parse_member(member)?), parse_amount(amount)?)),
        _ => Err(ParseError::TooManyArguments),
    }
}

/// `/split <total> <id>... [imp=19|19%] [liq=N] [rep=N]`
fn split_args(args: &[&str]) -> Result<SplitArgs, ParseError> {
    let Some((gross, rest)) = args.split_first() else {
        return Err(ParseError::MissingAmount);
    };
    let mut split = SplitArgs {
        gross: parse_amount(gross)?,
        tax_percent: None,
        liquid: 0,
        repair: 0,
        members: Vec::new(),
    };

    for arg in rest {
        if let Some((key, value)) = arg.split_once('=') {
            match key.to_lowercase().as_str() {
                "imp" | "impuesto" => split.tax_percent = Some(parse_tax(value)?),
                "liq" | "liquido" | "líquido" => split.liquid = parse_amount(value)?,
                "rep" | "reparacion" | "reparación" => split.repair = parse_amount(value)?,
                _ => return Err(ParseError::UnknownOption(key.to_string())),
            }
        } else if arg.ends_with('%') {
            split.tax_percent = Some(parse_tax(arg)?);
        } else {
            split.members.push(parse_member(arg)?);
        }
    }
    Ok(split)
}
