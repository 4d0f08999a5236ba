//! The approval queue.
//!
//! Each community has a single lane of pending [`Submission`]s. Only the
//! head of a lane is ever shown to reviewers or resolved; everything behind
//! it waits. Resolving the head is exclusive: the lanes stay locked from the
//! moment the head is read until it is popped, and the ledger credit of an
//! approval happens inside that window. The ledger gate is therefore always
//! taken after the queue lock, never before.
//!
//! The queue lives in memory only; a restart drops what is pending.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{CommunityId, EngineError, MemberId, ResultEngine, ledger::Ledger, pricing::ItemCounts};

/// Where a submission came from, used to deliver its outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OriginRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// A pending regear request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submission {
    pub id: Uuid,
    pub community: CommunityId,
    pub submitter: MemberId,
    pub items: ItemCounts,
    pub total_value: i64,
    pub origin: OriginRef,
    /// Opaque media references, in the order they were attached.
    pub attachments: Vec<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Reviewer decision on the head submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decision {
    Approved,
    Rejected,
    /// Discarded like a rejection; only the notification differs.
    Deferred,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Deferred => "deferred",
        }
    }
}

impl TryFrom<&str> for Decision {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "approve" | "approved" => Ok(Self::Approved),
            "reject" | "rejected" => Ok(Self::Rejected),
            "pending" | "defer" | "deferred" => Ok(Self::Deferred),
            other => Err(format!("unknown decision: {other}")),
        }
    }
}

/// What a resolution did, and what the queue looks like afterwards.
#[derive(Clone, Debug)]
pub struct Resolution {
    pub submission: Submission,
    pub decision: Decision,
    /// Silver credited to the submitter: the total for an approval, `0`
    /// otherwise.
    pub credited: i64,
    pub next_head: Option<Submission>,
    pub remaining: usize,
}

impl Resolution {
    pub fn queue_empty(&self) -> bool {
        self.next_head.is_none()
    }
}

#[derive(Debug, Default)]
pub struct ApprovalQueue {
    lanes: Mutex<HashMap<CommunityId, VecDeque<Submission>>>,
}

impl ApprovalQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail of the submission's lane. Returns `true` when the
    /// submission became the head, i.e. the lane was empty.
    pub async fn enqueue(&self, submission: Submission) -> bool {
        let mut lanes = self.lanes.lock().await;
        let lane = lanes.entry(submission.community).or_default();
        lane.push_back(submission);
        lane.len() == 1
    }

    pub async fn head(&self, community: CommunityId) -> Option<Submission> {
        let lanes = self.lanes.lock().await;
        lanes.get(&community).and_then(|lane| lane.front().cloned())
    }

    pub async fn len(&self, community: CommunityId) -> usize {
        let lanes = self.lanes.lock().await;
        lanes.get(&community).map_or(0, VecDeque::len)
    }

    /// Resolve the head of `community`'s lane.
    ///
    /// The head is popped only once the decision has been fully applied: if
    /// the ledger credit of an approval fails, the error is returned and the
    /// head stays in place so the same resolution can be retried.
    pub async fn resolve_head(
        &self,
        community: CommunityId,
        decision: Decision,
        reviewer_authorized: bool,
        ledger: &Ledger,
    ) -> ResultEngine<Resolution> {
        let mut lanes = self.lanes.lock().await;

        if !reviewer_authorized {
            return Err(EngineError::NotAuthorized(
                "reviewer is not allowed to resolve submissions".to_string(),
            ));
        }

        let (submitter, total_value) = match lanes.get(&community).and_then(VecDeque::front) {
            Some(head) => (head.submitter, head.total_value),
            None => return Err(EngineError::EmptyQueue),
        };

        let credited = match decision {
            Decision::Approved => {
                ledger.increment(community, submitter, total_value).await?;
                total_value.max(0)
            }
            Decision::Rejected | Decision::Deferred => 0,
        };

        let Some(lane) = lanes.get_mut(&community) else {
            return Err(EngineError::EmptyQueue);
        };
        let Some(submission) = lane.pop_front() else {
            return Err(EngineError::EmptyQueue);
        };
        let next_head = lane.front().cloned();
        let remaining = lane.len();
        if lane.is_empty() {
            lanes.remove(&community);
        }

        tracing::info!(
            "submission {} of {} {}: credited {credited}, {remaining} pending",
            submission.id,
            submission.submitter,
            decision.as_str()
        );

        Ok(Resolution {
            submission,
            decision,
            credited,
            next_head,
            remaining,
        })
    }

    /// Empty every lane, returning how many submissions were dropped.
    pub async fn drain(&self) -> usize {
        let mut lanes = self.lanes.lock().await;
        lanes.drain().map(|(_, lane)| lane.len()).sum()
    }
}
