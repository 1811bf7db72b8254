use std::sync::Arc;

use axum::Router;
use backchannel::{AppState, auth, chat, config::Config, db, rooms};
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let db_pool = db::connect(&config.database_url).await?;
    let verifier = auth::Verifier::new(config.jwt_secret.as_bytes());
    let coordinator = Arc::new(chat::Coordinator::new(db_pool.clone()));

    let state = AppState {
        db_pool,
        verifier,
        coordinator,
    };

    let app = Router::new()
        .nest("/api/chat", rooms::router())
        .merge(chat::ws::router())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
