//! Regear engine.
//!
//! The engine owns the two resources that must stay correct under
//! concurrent access:
//!
//! - the [`Ledger`](ledger::Ledger): durable per-community, per-member
//!   balances, every access serialized behind one gate;
//! - the approval queue: per-community FIFO lanes of pending
//!   [`Submission`]s, resolved head first.
//!
//! [`Engine`] is the only way in. Build one per process and share it (e.g.
//! behind an `Arc`) between every caller, so there is a single authority for
//! ledger mutation.

use std::{fmt, time::Duration};

use sea_orm::DatabaseConnection;

pub use accounts::Standing;
pub use commands::{DEFAULT_TAX_PERCENT, SplitCmd, SplitOutcome, SubmitCmd};
pub use error::EngineError;
pub use ledger::{
    DEFAULT_LEADERBOARD_LIMIT, DEFAULT_TIMEOUT, Direction, MAX_LEADERBOARD_LIMIT, Transfer,
};
pub use pricing::{ItemCounts, PriceTable};
pub use queue::{Decision, OriginRef, Resolution, Submission};

use ledger::Ledger;
use queue::ApprovalQueue;

mod accounts;
mod commands;
mod error;
mod ledger;
mod pricing;
mod queue;

type ResultEngine<T> = Result<T, EngineError>;

/// A community (a guild, a group chat) owning its own ledger and queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommunityId(pub i64);

/// A member of a community.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub i64);

impl fmt::Display for CommunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug)]
pub struct Engine {
    ledger: Ledger,
    queue: ApprovalQueue,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Queue a regear request. Returns `true` when it became the head of its
    /// community's queue, which is when the review display has to change.
    pub async fn submit(&self, cmd: SubmitCmd) -> bool {
        let submission = Submission {
            id: uuid::Uuid::new_v4(),
            community: cmd.community,
            submitter: cmd.submitter,
            items: cmd.items,
            total_value: cmd.total_value,
            origin: cmd.origin,
            attachments: cmd.attachments,
            submitted_at: chrono::Utc::now(),
        };
        tracing::info!(
            "submission {} from {} in {}: {} silver, {} attachments",
            submission.id,
            submission.submitter,
            submission.community,
            submission.total_value,
            submission.attachments.len()
        );
        self.queue.enqueue(submission).await
    }

    /// Resolve the head of `community`'s queue.
    ///
    /// An approval credits the head's total to its submitter. A storage
    /// failure leaves both the queue and the ledger as they were.
    pub async fn resolve(
        &self,
        community: CommunityId,
        decision: Decision,
        reviewer_authorized: bool,
    ) -> ResultEngine<Resolution> {
        self.queue
            .resolve_head(community, decision, reviewer_authorized, &self.ledger)
            .await
    }

    /// The submission currently under review.
    pub async fn head(&self, community: CommunityId) -> Option<Submission> {
        self.queue.head(community).await
    }

    /// Number of submissions waiting, head included.
    pub async fn pending(&self, community: CommunityId) -> usize {
        self.queue.len(community).await
    }

    pub async fn balance(&self, community: CommunityId, member: MemberId) -> ResultEngine<i64> {
        self.ledger.get(community, member).await
    }

    /// Credit or debit (clamped at zero) and return the new balance.
    pub async fn adjust_balance(
        &self,
        community: CommunityId,
        member: MemberId,
        amount: i64,
        direction: Direction,
    ) -> ResultEngine<i64> {
        self.ledger
            .adjust(community, member, amount, direction)
            .await
    }

    pub async fn set_balance(
        &self,
        community: CommunityId,
        member: MemberId,
        amount: i64,
    ) -> ResultEngine<()> {
        self.ledger.set(community, member, amount).await
    }

    /// Top balances, [`DEFAULT_LEADERBOARD_LIMIT`] when `limit` is `None`.
    pub async fn leaderboard(
        &self,
        community: CommunityId,
        limit: Option<u64>,
    ) -> ResultEngine<Vec<Standing>> {
        self.ledger.top(community, limit).await
    }

    pub async fn rank(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> ResultEngine<Option<u64>> {
        self.ledger.rank(community, member).await
    }

    /// Pay a member out: the balance drops to zero, the old one is returned.
    pub async fn payout(&self, community: CommunityId, member: MemberId) -> ResultEngine<i64> {
        self.ledger.payout(community, member).await
    }

    pub async fn transfer(
        &self,
        community: CommunityId,
        from: MemberId,
        to: MemberId,
        amount: i64,
    ) -> ResultEngine<Transfer> {
        self.ledger.transfer(community, from, to, amount).await
    }

    /// Split loot and credit every member's share.
    pub async fn split(&self, cmd: SplitCmd) -> ResultEngine<SplitOutcome> {
        let outcome = cmd.compute()?;
        self.ledger
            .credit_many(cmd.community, &outcome.members, outcome.per_member)
            .await?;
        tracing::info!(
            "split in {}: gross {}, net {}, {} each to {} members",
            cmd.community,
            outcome.gross,
            outcome.net,
            outcome.per_member,
            outcome.members.len()
        );
        Ok(outcome)
    }

    /// Tear down: pending submissions are dropped, the database is closed.
    pub async fn shutdown(self) -> ResultEngine<()> {
        let dropped = self.queue.drain().await;
        if dropped > 0 {
            tracing::warn!("dropping {dropped} pending submissions on shutdown");
        }
        self.ledger.close().await
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    timeout: Option<Duration>,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Bound the wait for the ledger gate. Defaults to [`DEFAULT_TIMEOUT`].
    pub fn timeout(mut self, timeout: Duration) -> EngineBuilder {
        self.timeout = Some(timeout);
        self
    }

    /// Construct `Engine`, checking the database answers.
    pub async fn build(self) -> ResultEngine<Engine> {
        self.database.ping().await?;
        Ok(Engine {
            ledger: Ledger::new(self.database, self.timeout.unwrap_or(DEFAULT_TIMEOUT)),
            queue: ApprovalQueue::new(),
        })
    }
}
