use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use serde::Serialize;
pub use server::{Credentials, ServerState, router, run, run_with_listener};

mod ledger;
mod queue;
mod server;

pub mod types {
    pub mod ledger {
        pub use api_types::ledger::{LeaderboardQuery, LeaderboardResponse, MemberView, StandingView};
    }

    pub mod queue {
        pub use api_types::queue::{ItemCount, QueueStatus, SubmissionView};
    }
}

#[derive(Debug)]
pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

#[derive(Serialize)]
struct Error {
    error: String,
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::NotAuthorized(_) => StatusCode::FORBIDDEN,
        EngineError::EmptyQueue => StatusCode::CONFLICT,
        EngineError::StorageUnavailable(_) | EngineError::Database(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        EngineError::InsufficientFunds(_)
        | EngineError::InvalidTransfer(_)
        | EngineError::InvalidSplit(_)
        | EngineError::BalanceOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    match err {
        EngineError::Database(db_err) => {
            tracing::error!("database error: {db_err}");
            "ledger unavailable".to_string()
        }
        EngineError::StorageUnavailable(reason) => {
            tracing::error!("ledger unavailable: {reason}");
            "ledger unavailable".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(Error { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
