use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{CommunityId, Direction, Engine, EngineError, MemberId, SplitCmd, Transfer};
use migration::MigratorTrait;

const GUILD: CommunityId = CommunityId(1);
const OTHER_GUILD: CommunityId = CommunityId(2);

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

async fn credit(engine: &Engine, member: i64, amount: i64) {
    engine
        .adjust_balance(GUILD, MemberId(member), amount, Direction::Credit)
        .await
        .unwrap();
}

#[tokio::test]
async fn untouched_account_reads_zero_and_is_unranked() {
    let (engine, _db) = engine_with_db().await;

    assert_eq!(engine.balance(GUILD, MemberId(7)).await.unwrap(), 0);
    assert_eq!(engine.rank(GUILD, MemberId(7)).await.unwrap(), None);
    assert!(engine.leaderboard(GUILD, None).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_credits_all_land() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..20 {
        let engine = Arc::clone(&engine);
        tasks.spawn(async move {
            engine
                .adjust_balance(GUILD, MemberId(5), 250, Direction::Credit)
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(engine.balance(GUILD, MemberId(5)).await.unwrap(), 5_000);
}

#[tokio::test]
async fn debit_clamps_at_zero() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 3, 100).await;

    let balance = engine
        .adjust_balance(GUILD, MemberId(3), 40, Direction::Debit)
        .await
        .unwrap();
    assert_eq!(balance, 60);

    let balance = engine
        .adjust_balance(GUILD, MemberId(3), 1_000, Direction::Debit)
        .await
        .unwrap();
    assert_eq!(balance, 0);
}

#[tokio::test]
async fn debit_of_missing_account_stays_unranked() {
    let (engine, _db) = engine_with_db().await;

    let balance = engine
        .adjust_balance(GUILD, MemberId(9), 500, Direction::Debit)
        .await
        .unwrap();
    assert_eq!(balance, 0);
    assert_eq!(engine.rank(GUILD, MemberId(9)).await.unwrap(), None);
}

#[tokio::test]
async fn non_positive_adjustments_are_no_ops() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 4, 100).await;

    credit(&engine, 4, 0).await;
    credit(&engine, 4, -50).await;
    let balance = engine
        .adjust_balance(GUILD, MemberId(4), -50, Direction::Debit)
        .await
        .unwrap();
    assert_eq!(balance, 100);
}

#[tokio::test]
async fn set_balance_overwrites() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 4, 100).await;

    engine.set_balance(GUILD, MemberId(4), 42).await.unwrap();
    assert_eq!(engine.balance(GUILD, MemberId(4)).await.unwrap(), 42);

    engine.set_balance(GUILD, MemberId(8), 7).await.unwrap();
    assert_eq!(engine.balance(GUILD, MemberId(8)).await.unwrap(), 7);
}

#[tokio::test]
async fn leaderboard_orders_by_balance_then_creation() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 1, 300).await;
    credit(&engine, 2, 500).await;
    credit(&engine, 3, 300).await;
    credit(&engine, 4, 100).await;

    let top: Vec<(i64, i64)> = engine
        .leaderboard(GUILD, None)
        .await
        .unwrap()
        .into_iter()
        .map(|s| (s.member_id.0, s.balance))
        .collect();
    assert_eq!(top, vec![(2, 500), (1, 300), (3, 300), (4, 100)]);

    let top_two = engine.leaderboard(GUILD, Some(2)).await.unwrap();
    assert_eq!(top_two.len(), 2);
    assert_eq!(top_two[1].member_id, MemberId(1));

    assert_eq!(engine.rank(GUILD, MemberId(2)).await.unwrap(), Some(1));
    assert_eq!(engine.rank(GUILD, MemberId(1)).await.unwrap(), Some(2));
    assert_eq!(engine.rank(GUILD, MemberId(3)).await.unwrap(), Some(3));
    assert_eq!(engine.rank(GUILD, MemberId(4)).await.unwrap(), Some(4));
}

#[tokio::test]
async fn zero_balance_accounts_stay_ranked() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 1, 300).await;
    credit(&engine, 2, 100).await;
    engine.payout(GUILD, MemberId(2)).await.unwrap();

    assert_eq!(engine.rank(GUILD, MemberId(2)).await.unwrap(), Some(2));
    let top = engine.leaderboard(GUILD, None).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[1].balance, 0);
}

#[tokio::test]
async fn communities_do_not_share_balances() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 1, 300).await;
    engine
        .adjust_balance(OTHER_GUILD, MemberId(1), 10, Direction::Credit)
        .await
        .unwrap();

    assert_eq!(engine.balance(GUILD, MemberId(1)).await.unwrap(), 300);
    assert_eq!(engine.balance(OTHER_GUILD, MemberId(1)).await.unwrap(), 10);
    assert_eq!(engine.leaderboard(OTHER_GUILD, None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn payout_zeroes_and_returns_previous_balance() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 6, 1_500).await;

    assert_eq!(engine.payout(GUILD, MemberId(6)).await.unwrap(), 1_500);
    assert_eq!(engine.balance(GUILD, MemberId(6)).await.unwrap(), 0);
    assert_eq!(engine.payout(GUILD, MemberId(6)).await.unwrap(), 0);

    assert_eq!(engine.payout(GUILD, MemberId(99)).await.unwrap(), 0);
    assert_eq!(engine.rank(GUILD, MemberId(99)).await.unwrap(), None);
}

#[tokio::test]
async fn transfer_moves_silver() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 1, 1_000).await;

    let transfer = engine
        .transfer(GUILD, MemberId(1), MemberId(2), 400)
        .await
        .unwrap();
    assert_eq!(
        transfer,
        Transfer {
            from_balance: 600,
            to_balance: 400
        }
    );
}

#[tokio::test]
async fn transfer_rejects_overdraft_and_self() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 1, 100).await;

    let err = engine
        .transfer(GUILD, MemberId(1), MemberId(2), 101)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    assert_eq!(engine.balance(GUILD, MemberId(1)).await.unwrap(), 100);
    assert_eq!(engine.rank(GUILD, MemberId(2)).await.unwrap(), None);

    let err = engine
        .transfer(GUILD, MemberId(1), MemberId(1), 10)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransfer(_)));

    let err = engine
        .transfer(GUILD, MemberId(1), MemberId(2), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransfer(_)));
}

#[tokio::test]
async fn split_credits_every_member() {
    let (engine, _db) = engine_with_db().await;
    credit(&engine, 1, 10).await;

    let outcome = engine
        .split(
            SplitCmd::new(GUILD, 1_000_000, vec![MemberId(1), MemberId(2), MemberId(1)])
                .repair(10_000),
        )
        .await
        .unwrap();

    assert_eq!(outcome.tax, 190_000);
    assert_eq!(outcome.net, 800_000);
    assert_eq!(outcome.per_member, 400_000);
    assert_eq!(engine.balance(GUILD, MemberId(1)).await.unwrap(), 400_010);
    assert_eq!(engine.balance(GUILD, MemberId(2)).await.unwrap(), 400_000);
}

#[tokio::test]
async fn storage_failure_is_reported() {
    let (engine, db) = engine_with_db().await;
    db.execute(Statement::from_string(
        db.get_database_backend(),
        "DROP TABLE balances",
    ))
    .await
    .unwrap();

    let err = engine.balance(GUILD, MemberId(1)).await.unwrap_err();
    assert!(err.is_storage_failure());
}

#[tokio::test]
async fn survives_reopening_the_database() {
    let root = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../target/test_dbs");
    std::fs::create_dir_all(&root).unwrap();
    let path = root.join(format!("ledger_{}.db", uuid::Uuid::new_v4()));
    let url = format!("sqlite:{}?mode=rwc", path.display());

    {
        let db = Database::connect(&url).await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db).build().await.unwrap();
        engine
            .adjust_balance(GUILD, MemberId(1), 777, Direction::Credit)
            .await
            .unwrap();
        engine.shutdown().await.unwrap();
    }

    let db = Database::connect(&url).await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db).build().await.unwrap();
    assert_eq!(engine.balance(GUILD, MemberId(1)).await.unwrap(), 777);
    engine.shutdown().await.unwrap();

    let _ = std::fs::remove_file(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_credits_and_debits_add_up() {
    let (engine, _db) = engine_with_db().await;
    let engine = Arc::new(engine);
    engine.set_balance(GUILD, MemberId(5), 100_000).await.unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..40 {
        let engine = Arc::clone(&engine);
        let direction = if i % 2 == 0 {
            Direction::Credit
        } else {
            Direction::Debit
        };
        tasks.spawn(async move {
            for _ in 0..10 {
                engine
                    .adjust_balance(GUILD, MemberId(5), 75, direction)
                    .await?;
            }
            Ok::<_, EngineError>(())
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(engine.balance(GUILD, MemberId(5)).await.unwrap(), 100_000);
}

#[tokio::test]
async fn overflowing_credit_leaves_balance_untouched() {
    let (engine, _db) = engine_with_db().await;
    engine
        .set_balance(GUILD, MemberId(1), i64::MAX - 10)
        .await
        .unwrap();

    let err = engine
        .adjust_balance(GUILD, MemberId(1), 11, Direction::Credit)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BalanceOverflow(_)));
    assert_eq!(
        engine.balance(GUILD, MemberId(1)).await.unwrap(),
        i64::MAX - 10
    );

    credit(&engine, 1, 10).await;
    assert_eq!(engine.balance(GUILD, MemberId(1)).await.unwrap(), i64::MAX);
}

#[tokio::test]
async fn overflowing_split_credits_nobody() {
    let (engine, _db) = engine_with_db().await;
    engine
        .set_balance(GUILD, MemberId(2), i64::MAX - 100)
        .await
        .unwrap();

    let err = engine
        .split(SplitCmd::new(GUILD, i64::MAX, vec![MemberId(1), MemberId(2)]).tax_percent(0))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BalanceOverflow(_)));

    let err = engine
        .split(SplitCmd::new(GUILD, i64::MAX, vec![MemberId(1)]))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSplit(_)));

    assert_eq!(engine.balance(GUILD, MemberId(1)).await.unwrap(), 0);
    assert_eq!(engine.rank(GUILD, MemberId(1)).await.unwrap(), None);
    assert_eq!(
        engine.balance(GUILD, MemberId(2)).await.unwrap(),
        i64::MAX - 100
    );
    assert_eq!(engine.leaderboard(GUILD, None).await.unwrap().len(), 1);
}
