use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod ledger {
    use super::*;

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct LeaderboardQuery {
        /// Number of rows, capped server side.
        pub limit: Option<u64>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StandingView {
        /// 1-based position in the leaderboard.
        pub rank: u64,
        pub member_id: i64,
        pub balance: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct LeaderboardResponse {
        pub community_id: i64,
        pub standings: Vec<StandingView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub community_id: i64,
        pub member_id: i64,
        pub balance: i64,
        /// `None` when the member never had an account.
        pub rank: Option<u64>,
    }
}

pub mod queue {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ItemCount {
        pub code: String,
        pub count: u32,
    }

    /// The submission currently under review.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct SubmissionView {
        pub id: Uuid,
        pub submitter: i64,
        pub items: Vec<ItemCount>,
        pub total_value: i64,
        pub attachments: usize,
        pub submitted_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct QueueStatus {
        pub community_id: i64,
        /// Submissions waiting, head included.
        pub pending: usize,
        pub head: Option<SubmissionView>,
    }
}
