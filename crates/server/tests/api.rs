use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use base64::Engine as _;
use http_body_util::BodyExt;
use sea_orm::Database;
use tower::ServiceExt;

use engine::{CommunityId, Direction, Engine, ItemCounts, MemberId, OriginRef, SubmitCmd};
use migration::MigratorTrait;
use server::{Credentials, ServerState};

const GUILD: CommunityId = CommunityId(-1001);

async fn app(credentials: Option<Credentials>) -> (Router, Arc<Engine>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Arc::new(Engine::builder().database(db).build().await.unwrap());
    let state = ServerState {
        engine: Arc::clone(&engine),
        credentials,
    };
    (server::router(state), engine)
}

fn credentials() -> Credentials {
    Credentials {
        username: "ops".to_string(),
        password: "secret".to_string(),
    }
}

fn basic(username: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}

fn get(uri: &str, authorization: Option<String>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn liveness_is_public() {
    let (app, _engine) = app(Some(credentials())).await;

    let response = app.oneshot(get("/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn api_requires_matching_credentials() {
    let (app, _engine) = app(Some(credentials())).await;
    let uri = "/communities/-1001/leaderboard";

    let response = app.clone().oneshot(get(uri, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(get(uri, Some(basic("ops", "wrong"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(get(uri, Some(basic("ops", "secret"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn leaderboard_lists_ranked_standings() {
    let (app, engine) = app(None).await;
    for (member, amount) in [(1, 300), (2, 500), (3, 300)] {
        engine
            .adjust_balance(GUILD, MemberId(member), amount, Direction::Credit)
            .await
            .unwrap();
    }

    let response = app
        .oneshot(get("/communities/-1001/leaderboard?limit=2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    let standings = body["standings"].as_array().unwrap();
    assert_eq!(standings.len(), 2);
    assert_eq!(standings[0]["member_id"], 2);
    assert_eq!(standings[0]["rank"], 1);
    assert_eq!(standings[1]["member_id"], 1);
    assert_eq!(standings[1]["balance"], 300);
}

#[tokio::test]
async fn zero_limit_is_a_bad_request() {
    let (app, _engine) = app(None).await;

    let response = app
        .oneshot(get("/communities/-1001/leaderboard?limit=0", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn member_reports_balance_and_rank() {
    let (app, engine) = app(None).await;
    engine
        .adjust_balance(GUILD, MemberId(7), 1_000, Direction::Credit)
        .await
        .unwrap();

    let body = json(
        app.clone()
            .oneshot(get("/communities/-1001/members/7", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["balance"], 1_000);
    assert_eq!(body["rank"], 1);

    let body = json(
        app.oneshot(get("/communities/-1001/members/8", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["balance"], 0);
    assert!(body["rank"].is_null());
}

#[tokio::test]
async fn queue_shows_head_and_pending_count() {
    let (app, engine) = app(None).await;

    let body = json(
        app.clone()
            .oneshot(get("/communities/-1001/queue", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["pending"], 0);
    assert!(body["head"].is_null());

    let origin = OriginRef {
        chat_id: GUILD.0,
        message_id: 3,
    };
    engine
        .submit(
            SubmitCmd::new(GUILD, MemberId(5), origin)
                .items(ItemCounts::new().with("1", 1), 925_000)
                .attachment("photo"),
        )
        .await;
    engine
        .submit(SubmitCmd::new(GUILD, MemberId(6), origin).attachment("photo"))
        .await;

    let body = json(
        app.oneshot(get("/communities/-1001/queue", None))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["pending"], 2);
    assert_eq!(body["head"]["submitter"], 5);
    assert_eq!(body["head"]["total_value"], 925_000);
    assert_eq!(body["head"]["items"][0]["code"], "1");
    assert_eq!(body["head"]["attachments"], 1);
}
