//! Ledger API endpoints

use axum::{
    Json,
    extract::{Path, Query, State},
};
use engine::{CommunityId, MemberId};

use crate::{
    ServerError,
    server::ServerState,
    types::ledger::{LeaderboardQuery, LeaderboardResponse, MemberView, StandingView},
};

/// Handle requests for a community leaderboard
pub async fn leaderboard(
    State(state): State<ServerState>,
    Path(community_id): Path<i64>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ServerError> {
    if query.limit == Some(0) {
        return Err(ServerError::Generic("limit must be > 0".to_string()));
    }

    let standings = state
        .engine
        .leaderboard(CommunityId(community_id), query.limit)
        .await?;

    Ok(Json(LeaderboardResponse {
        community_id,
        standings: standings
            .into_iter()
            .zip(1..)
            .map(|(standing, rank)| StandingView {
                rank,
                member_id: standing.member_id.0,
                balance: standing.balance,
            })
            .collect(),
    }))
}

/// Handle requests for one member's balance and rank
pub async fn member(
    State(state): State<ServerState>,
    Path((community_id, member_id)): Path<(i64, i64)>,
) -> Result<Json<MemberView>, ServerError> {
    let community = CommunityId(community_id);
    let member = MemberId(member_id);

    let balance = state.engine.balance(community, member).await?;
    let rank = state.engine.rank(community, member).await?;

    Ok(Json(MemberView {
        community_id,
        member_id,
        balance,
        rank,
    }))
}
