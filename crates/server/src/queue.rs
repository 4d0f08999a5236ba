//! Approval queue API endpoints

use axum::{
    Json,
    extract::{Path, State},
};
use engine::{CommunityId, Submission};

use crate::{
    ServerError,
    server::ServerState,
    types::queue::{ItemCount, QueueStatus, SubmissionView},
};

fn submission_view(submission: Submission) -> SubmissionView {
    SubmissionView {
        id: submission.id,
        submitter: submission.submitter.0,
        items: submission
            .items
            .iter()
            .map(|(code, count)| ItemCount {
                code: code.to_string(),
                count,
            })
            .collect(),
        total_value: submission.total_value,
        attachments: submission.attachments.len(),
        submitted_at: submission.submitted_at,
    }
}

/// Handle requests for the pending count and the head under review
pub async fn status(
    State(state): State<ServerState>,
    Path(community_id): Path<i64>,
) -> Result<Json<QueueStatus>, ServerError> {
    let community = CommunityId(community_id);
    let pending = state.engine.pending(community).await;
    let head = state.engine.head(community).await.map(submission_view);

    Ok(Json(QueueStatus {
        community_id,
        pending,
        head,
    }))
}
