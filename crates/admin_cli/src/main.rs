use std::error::Error;

use clap::{Args, Parser, Subcommand};
use engine::{CommunityId, Direction, Engine, MemberId};
use migration::MigratorTrait;
use sea_orm::{Database, DatabaseConnection};

#[derive(Parser, Debug)]
#[command(name = "regear_admin")]
#[command(about = "Admin utilities for the regear ledger (inspect and fix balances)")]
struct Cli {
    /// Database connection string (also read from `DATABASE_URL`).
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./regear.db?mode=rwc"
    )]
    database_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a member's balance.
    Balance(MemberArgs),
    /// Show the top balances of a community.
    Top(TopArgs),
    /// Show a member's leaderboard position.
    Rank(MemberArgs),
    /// Add silver to a member.
    Credit(AmountArgs),
    /// Remove silver from a member (never below zero).
    Debit(AmountArgs),
    /// Overwrite a member's balance.
    Set(AmountArgs),
    /// Pay a member out, leaving the balance at zero.
    Payout(MemberArgs),
}

#[derive(Args, Debug)]
struct MemberArgs {
    #[arg(long, allow_negative_numbers = true)]
    community: i64,
    #[arg(long)]
    member: i64,
}

#[derive(Args, Debug)]
struct AmountArgs {
    #[command(flatten)]
    target: MemberArgs,
    #[arg(long, allow_negative_numbers = true)]
    amount: i64,
}

#[derive(Args, Debug)]
struct TopArgs {
    #[arg(long, allow_negative_numbers = true)]
    community: i64,
    #[arg(long)]
    limit: Option<u64>,
}

impl Command {
    /// Credits and debits must move silver; a set must keep `balance >= 0`.
    fn validate(&self) -> Result<(), String> {
        match self {
            Command::Credit(args) | Command::Debit(args) if args.amount <= 0 => {
                Err("amount must be > 0".to_string())
            }
            Command::Set(args) if args.amount < 0 => Err("amount must be >= 0".to_string()),
            _ => Ok(()),
        }
    }
}

impl MemberArgs {
    fn ids(&self) -> (CommunityId, MemberId) {
        (CommunityId(self.community), MemberId(self.member))
    }
}

async fn connect_db(
    database_url: &str,
) -> Result<DatabaseConnection, Box<dyn Error + Send + Sync>> {
    let db = Database::connect(database_url).await?;
    migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    cli.command.validate()?;

    let db = connect_db(&cli.database_url).await?;
    let engine = Engine::builder().database(db).build().await?;

    match cli.command {
        Command::Balance(args) => {
            let (community, member) = args.ids();
            let balance = engine.balance(community, member).await?;
            println!("{member}: {balance}");
        }
        Command::Top(args) => {
            let standings = engine
                .leaderboard(CommunityId(args.community), args.limit)
                .await?;
            if standings.is_empty() {
                println!("no balances in community {}", args.community);
            }
            for (rank, standing) in standings.iter().enumerate() {
                println!("{:>4}. {:<20} {}", rank + 1, standing.member_id, standing.balance);
            }
        }
        Command::Rank(args) => {
            let (community, member) = args.ids();
            match engine.rank(community, member).await? {
                Some(rank) => println!("{member}: #{rank}"),
                None => println!("{member}: unranked"),
            }
        }
        Command::Credit(args) => {
            let (community, member) = args.target.ids();
            let balance = engine
                .adjust_balance(community, member, args.amount, Direction::Credit)
                .await?;
            println!("credited {} to {member}, balance {balance}", args.amount);
        }
        Command::Debit(args) => {
            let (community, member) = args.target.ids();
            let balance = engine
                .adjust_balance(community, member, args.amount, Direction::Debit)
                .await?;
            println!("debited {} from {member}, balance {balance}", args.amount);
        }
        Command::Set(args) => {
            let (community, member) = args.target.ids();
            engine.set_balance(community, member, args.amount).await?;
            println!("{member}: balance set to {}", args.amount);
        }
        Command::Payout(args) => {
            let (community, member) = args.ids();
            let paid = engine.payout(community, member).await?;
            println!("paid {paid} to {member}, balance 0");
        }
    }

    engine.shutdown().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(args: &[&str]) -> Command {
        let mut argv = vec!["regear_admin"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap().command
    }

    #[test]
    fn set_rejects_negative_amounts() {
        let cmd = command(&["set", "--community", "-100", "--member", "2", "--amount=-5"]);
        assert!(cmd.validate().is_err());

        let cmd = command(&["set", "--community", "1", "--member", "2", "--amount", "-5"]);
        assert!(cmd.validate().is_err());

        let cmd = command(&["set", "--community", "1", "--member", "2", "--amount", "0"]);
        assert!(cmd.validate().is_ok());
    }

    #[test]
    fn credit_and_debit_need_a_positive_amount() {
        let cmd = command(&["credit", "--community", "1", "--member", "2", "--amount", "0"]);
        assert!(cmd.validate().is_err());

        let cmd = command(&["debit", "--community", "1", "--member", "2", "--amount=-3"]);
        assert!(cmd.validate().is_err());

        let cmd = command(&["debit", "--community", "1", "--member", "2", "--amount", "3"]);
        assert!(cmd.validate().is_ok());
    }
}
