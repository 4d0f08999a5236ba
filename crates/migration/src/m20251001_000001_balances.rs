//! Balance ledger schema.
//!
//! One row per (community, member) account. The autoincrement `id` records
//! creation order and breaks leaderboard ties: among equal balances the
//! older account ranks first.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Balances {
    Table,
    Id,
    CommunityId,
    MemberId,
    Balance,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Balances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Balances::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Balances::CommunityId).big_integer().not_null())
                    .col(ColumnDef::new(Balances::MemberId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Balances::Balance)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-balances-community_id-member_id-unique")
                    .table(Balances::Table)
                    .col(Balances::CommunityId)
                    .col(Balances::MemberId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // leaderboard scans
        manager
            .create_index(
                Index::create()
                    .name("idx-balances-community_id-balance")
                    .table(Balances::Table)
                    .col(Balances::CommunityId)
                    .col(Balances::Balance)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Balances::Table).to_owned())
            .await?;
        Ok(())
    }
}
