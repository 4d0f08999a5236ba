//! The balance ledger.
//!
//! [`Ledger`] is the single authority for balance mutation in the process.
//! Every operation, reads included, runs behind one process-wide gate so
//! that the history of each account is a plain sequence: two concurrent
//! credits to the same account always add up. Waiting for the gate is
//! bounded by a timeout; hitting it yields a fatal ledger error before any
//! statement was issued. Once an operation holds the gate it runs to
//! completion, so a reported failure never hides a write that landed.
//! Multi-statement operations run in a database transaction.
//!
//! Debits clamp at zero instead of failing. Credits that would overflow a
//! balance fail and leave it untouched. Non-positive credits and debits are
//! no-ops.

use std::{future::Future, time::Duration};

use sea_orm::{
    ActiveValue, Condition, ConnectionTrait, DatabaseConnection, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Statement, TransactionTrait, prelude::*,
};
use tokio::sync::Mutex;

use crate::{
    CommunityId, EngineError, MemberId, ResultEngine,
    accounts::{self, Standing},
};

/// Upper bound for the wait on the ledger gate.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Leaderboard size when the caller does not ask for one.
pub const DEFAULT_LEADERBOARD_LIMIT: u64 = 250;
/// Leaderboard size never exceeds this, whatever the caller asks.
pub const MAX_LEADERBOARD_LIMIT: u64 = 1000;

const CREDIT_SQL: &str = "INSERT INTO balances (community_id, member_id, balance) \
     VALUES (?, ?, ?) \
     ON CONFLICT(community_id, member_id) DO UPDATE SET balance = balance + excluded.balance \
     WHERE balances.balance <= ?";

const SET_SQL: &str = "INSERT INTO balances (community_id, member_id, balance) \
     VALUES (?, ?, ?) \
     ON CONFLICT(community_id, member_id) DO UPDATE SET balance = excluded.balance";

const DEBIT_SQL: &str = "UPDATE balances SET balance = MAX(balance - ?, 0) \
     WHERE community_id = ? AND member_id = ?";

/// Direction of an administrative balance adjustment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

/// Balances of both parties right after a transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from_balance: i64,
    pub to_balance: i64,
}

#[derive(Debug)]
pub struct Ledger {
    database: DatabaseConnection,
    gate: Mutex<()>,
    timeout: Duration,
}

impl Ledger {
    pub fn new(database: DatabaseConnection, timeout: Duration) -> Self {
        Self {
            database,
            gate: Mutex::new(()),
            timeout,
        }
    }

    /// Run `work` behind the gate. Only the wait for the gate is bounded by
    /// the configured timeout: `work` is never dropped half way.
    async fn serialized<T>(
        &self,
        op: &'static str,
        work: impl Future<Output = ResultEngine<T>>,
    ) -> ResultEngine<T> {
        let Ok(_guard) = tokio::time::timeout(self.timeout, self.gate.lock()).await else {
            tracing::error!("ledger {op} timed out after {:?}", self.timeout);
            return Err(EngineError::StorageUnavailable(format!(
                "{op} timed out after {}ms",
                self.timeout.as_millis()
            )));
        };

        match work.await {
            Err(err) if err.is_storage_failure() => {
                tracing::error!("ledger {op} failed: {err}");
                Err(err)
            }
            result => result,
        }
    }

    #[cfg(test)]
    pub(crate) async fn hold_gate(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Current balance, `0` for an account that was never touched.
    pub async fn get(&self, community: CommunityId, member: MemberId) -> ResultEngine<i64> {
        self.serialized("get", balance_of(&self.database, community, member))
            .await
    }

    /// Replace the balance unconditionally.
    pub async fn set(
        &self,
        community: CommunityId,
        member: MemberId,
        amount: i64,
    ) -> ResultEngine<()> {
        self.serialized("set", async {
            let stmt = Statement::from_sql_and_values(
                self.database.get_database_backend(),
                SET_SQL,
                vec![community.0.into(), member.0.into(), amount.into()],
            );
            self.database.execute(stmt).await?;
            tracing::info!("ledger set: {community}/{member} = {amount}");
            Ok(())
        })
        .await
    }

    pub async fn increment(
        &self,
        community: CommunityId,
        member: MemberId,
        amount: i64,
    ) -> ResultEngine<()> {
        if amount <= 0 {
            return Ok(());
        }
        self.serialized("increment", credit(&self.database, community, member, amount))
            .await
    }

    /// Credit or debit and return the resulting balance, as one step.
    pub async fn adjust(
        &self,
        community: CommunityId,
        member: MemberId,
        amount: i64,
        direction: Direction,
    ) -> ResultEngine<i64> {
        self.serialized("adjust", async {
            let db_tx = self.database.begin().await?;
            match direction {
                Direction::Credit => credit(&db_tx, community, member, amount).await?,
                Direction::Debit => debit(&db_tx, community, member, amount).await?,
            }
            let balance = balance_of(&db_tx, community, member).await?;
            db_tx.commit().await?;
            Ok(balance)
        })
        .await
    }

    /// Accounts of a community by descending balance, oldest account first
    /// on ties.
    pub async fn top(
        &self,
        community: CommunityId,
        limit: Option<u64>,
    ) -> ResultEngine<Vec<Standing>> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .min(MAX_LEADERBOARD_LIMIT);

        self.serialized("top", async {
            let rows = accounts::Entity::find()
                .filter(accounts::Column::CommunityId.eq(community.0))
                .order_by_desc(accounts::Column::Balance)
                .order_by_asc(accounts::Column::Id)
                .limit(limit)
                .all(&self.database)
                .await?;
            Ok(rows.into_iter().map(Standing::from).collect())
        })
        .await
    }

    /// 1-based position in the full leaderboard, `None` when the member has
    /// no account row.
    pub async fn rank(
        &self,
        community: CommunityId,
        member: MemberId,
    ) -> ResultEngine<Option<u64>> {
        self.serialized("rank", async {
            let Some(account) = find_account(&self.database, community, member).await? else {
                return Ok(None);
            };

            let ahead = accounts::Entity::find()
                .filter(accounts::Column::CommunityId.eq(community.0))
                .filter(
                    Condition::any()
                        .add(accounts::Column::Balance.gt(account.balance))
                        .add(
                            Condition::all()
                                .add(accounts::Column::Balance.eq(account.balance))
                                .add(accounts::Column::Id.lt(account.id)),
                        ),
                )
                .count(&self.database)
                .await?;
            Ok(Some(ahead + 1))
        })
        .await
    }

    /// Zero the balance and return what it was.
    pub async fn payout(&self, community: CommunityId, member: MemberId) -> ResultEngine<i64> {
        self.serialized("payout", async {
            let db_tx = self.database.begin().await?;
            let Some(account) = find_account(&db_tx, community, member).await? else {
                return Ok(0);
            };

            let paid = account.balance;
            let model = accounts::ActiveModel {
                id: ActiveValue::Set(account.id),
                balance: ActiveValue::Set(0),
                ..Default::default()
            };
            model.update(&db_tx).await?;
            db_tx.commit().await?;

            tracing::info!("ledger payout: {community}/{member} paid {paid}");
            Ok(paid)
        })
        .await
    }

    /// Move `amount` between two members. Fails without touching either
    /// account when the sender cannot cover it.
    pub async fn transfer(
        &self,
        community: CommunityId,
        from: MemberId,
        to: MemberId,
        amount: i64,
    ) -> ResultEngine<Transfer> {
        if amount <= 0 {
            return Err(EngineError::InvalidTransfer(
                "amount must be > 0".to_string(),
            ));
        }
        if from == to {
            return Err(EngineError::InvalidTransfer(
                "sender and receiver must differ".to_string(),
            ));
        }

        self.serialized("transfer", async {
            let db_tx = self.database.begin().await?;
            let available = balance_of(&db_tx, community, from).await?;
            if available < amount {
                return Err(EngineError::InsufficientFunds(format!(
                    "balance is {available}, requested {amount}"
                )));
            }

            debit(&db_tx, community, from, amount).await?;
            credit(&db_tx, community, to, amount).await?;
            let transfer = Transfer {
                from_balance: balance_of(&db_tx, community, from).await?,
                to_balance: balance_of(&db_tx, community, to).await?,
            };
            db_tx.commit().await?;
            Ok(transfer)
        })
        .await
    }

    /// Credit the same amount to every member, all or nothing.
    pub async fn credit_many(
        &self,
        community: CommunityId,
        members: &[MemberId],
        amount: i64,
    ) -> ResultEngine<()> {
        if amount <= 0 || members.is_empty() {
            return Ok(());
        }

        self.serialized("credit_many", async {
            let db_tx = self.database.begin().await?;
            for member in members {
                credit(&db_tx, community, *member, amount).await?;
            }
            db_tx.commit().await?;
            Ok(())
        })
        .await
    }

    /// Close the backing database.
    pub async fn close(self) -> ResultEngine<()> {
        self.database.close().await?;
        Ok(())
    }
}

async fn find_account<C: ConnectionTrait>(
    conn: &C,
    community: CommunityId,
    member: MemberId,
) -> ResultEngine<Option<accounts::Model>> {
    Ok(accounts::Entity::find()
        .filter(accounts::Column::CommunityId.eq(community.0))
        .filter(accounts::Column::MemberId.eq(member.0))
        .one(conn)
        .await?)
}

async fn balance_of<C: ConnectionTrait>(
    conn: &C,
    community: CommunityId,
    member: MemberId,
) -> ResultEngine<i64> {
    Ok(find_account(conn, community, member)
        .await?
        .map_or(0, |account| account.balance))
}

async fn credit<C: ConnectionTrait>(
    conn: &C,
    community: CommunityId,
    member: MemberId,
    amount: i64,
) -> ResultEngine<()> {
    if amount <= 0 {
        return Ok(());
    }
    let stmt = Statement::from_sql_and_values(
        conn.get_database_backend(),
        CREDIT_SQL,
        vec![
            community.0.into(),
            member.0.into(),
            amount.into(),
            (i64::MAX - amount).into(),
        ],
    );
    // The guarded upsert touches no row when the sum would overflow.
    if conn.execute(stmt).await?.rows_affected() == 0 {
        return Err(EngineError::BalanceOverflow(format!(
            "crediting {amount} to {community}/{member}"
        )));
    }
    tracing::info!("ledger credit: {community}/{member} +{amount}");
    Ok(())
}

async fn debit<C: ConnectionTrait>(
    conn: &C,
    community: CommunityId,
    member: MemberId,
    amount: i64,
) -> ResultEngine<()> {
    if amount <= 0 {
        return Ok(());
    }
    let stmt = Statement::from_sql_and_values(
        conn.get_database_backend(),
        DEBIT_SQL,
        vec![amount.into(), community.0.into(), member.0.into()],
    );
    conn.execute(stmt).await?;
    tracing::info!("ledger debit: {community}/{member} -{amount}");
    Ok(())
}
