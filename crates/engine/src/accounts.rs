//! The `balances` table: one row per account.
//!
//! Rows are created by the first credit (or an explicit set) and never
//! deleted. `id` follows insertion order, which is what breaks ties when
//! ranking accounts with the same balance.

use sea_orm::entity::prelude::*;

use crate::MemberId;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub community_id: i64,
    pub member_id: i64,
    pub balance: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// A member's position in a community leaderboard.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Standing {
    pub member_id: MemberId,
    pub balance: i64,
}

impl From<Model> for Standing {
    fn from(value: Model) -> Self {
        Self {
            member_id: MemberId(value.member_id),
            balance: value.balance,
        }
    }
}
