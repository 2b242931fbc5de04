use std::env;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::Registry;
use warp::Filter;

use ladle_sdk::routes::{handle_rejection, routes};
use ladle_sdk::MediaStore;

#[tokio::main]
async fn main() {
    let stdout_log = tracing_subscriber::fmt::layer();
    Registry::default()
        .with(stdout_log)
        .with(LevelFilter::from_level(Level::INFO))
        .init();

    dotenv().ok();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
        tracing::warn!("JWT_SECRET is not set, sessions are signed with the default key");
        "secret".to_string()
    });
    let media_root = env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(3030);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to database");

    let media = MediaStore::new(media_root);
    let api = routes(pool, media, secret).recover(handle_rejection);

    tracing::info!("listening on port {port}");
    warp::serve(api).run(([0, 0, 0, 0], port)).await;
}
