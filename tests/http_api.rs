use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use backchannel::{
    AppState,
    auth::{self, Identity, Verifier},
    chat::Coordinator,
    db,
    rooms::{self, directory, store},
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use tower::ServiceExt;

async fn pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init_schema(&pool).await.unwrap();
    pool
}

async fn seed_user(pool: &SqlitePool, username: &str) -> Identity {
    let id = sqlx::query("INSERT INTO users (username) VALUES (?)")
        .bind(username)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid();
    Identity {
        id,
        username: username.to_owned(),
    }
}

fn test_app(pool: SqlitePool, verifier: &Verifier) -> Router {
    let state = AppState {
        db_pool: pool.clone(),
        verifier: verifier.clone(),
        coordinator: Arc::new(Coordinator::new(pool)),
    };
    Router::new()
        .nest("/api/chat", rooms::router())
        .with_state(state)
}

fn get(path: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(path);
    if let Some(token) = token {
        builder = builder.header(auth::TOKEN_HEADER, token);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn history_read_is_gated_on_room_membership() {
    let pool = pool().await;
    let alice = seed_user(&pool, "alice").await;
    let carol = seed_user(&pool, "carol").await;
    let room = directory::create_public_room(&pool, "general", alice.id)
        .await
        .unwrap();
    store::append(&pool, room.id, &alice, "hi").await.unwrap();

    let verifier = Verifier::new(b"test-secret");
    let alice_token = verifier.issue(&alice, time::Duration::hours(1)).unwrap();
    let carol_token = verifier.issue(&carol, time::Duration::hours(1)).unwrap();
    let app = test_app(pool, &verifier);
    let path = format!("/api/chat/messages/{}", room.id);

    // a member reads the log
    let response = app
        .clone()
        .oneshot(get(&path, Some(&alice_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // a verified non-member does not
    let response = app
        .clone()
        .oneshot(get(&path, Some(&carol_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // a room that doesn't exist is not found, not forbidden
    let response = app
        .clone()
        .oneshot(get("/api/chat/messages/999", Some(&alice_token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // no token is refused before anything else
    let response = app.oneshot(get(&path, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
