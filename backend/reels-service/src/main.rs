use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, App, HttpResponse, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reels_service::cache::FeedCache;
use reels_service::config::Config;
use reels_service::db::{InteractionRepo, PreferenceRepo, ReelRepo};
use reels_service::handlers::{
    follow_merchant, get_followed_feed, get_personalized_feed, get_trending_feed, like_reel,
    share_reel, unfollow_merchant, unlike_reel, view_reel, AppState,
};
use reels_service::jobs::{run_preference_refresh, PreferenceRefreshConfig};
use reels_service::services::feed::FeedEngine;
use reels_service::services::interactions::InteractionService;

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

async fn metrics_endpoint() -> HttpResponse {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    info!(
        env = %config.app.env,
        "starting reels-service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let pool = match PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("ERROR: failed to connect to Postgres: {e}");
            std::process::exit(1);
        }
    };

    let cache = match FeedCache::connect(
        &config.redis.url,
        config.feed.feed_ttl_secs,
        config.feed.trending_ttl_secs,
    )
    .await
    {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("ERROR: failed to connect to Redis: {e}");
            std::process::exit(1);
        }
    };

    let reel_repo = Arc::new(ReelRepo::new(pool.clone()));
    let interaction_repo = Arc::new(InteractionRepo::new(pool.clone()));
    let preference_repo = Arc::new(PreferenceRepo::new(pool));

    let feed_engine = Arc::new(FeedEngine::new(
        reel_repo.clone(),
        interaction_repo.clone(),
        preference_repo.clone(),
        cache.clone(),
        config.feed.clone(),
    ));

    let interaction_service = Arc::new(InteractionService::new(
        reel_repo,
        interaction_repo,
        preference_repo.clone(),
        cache,
        config.feed.view_history_cap,
    ));

    // Owned background task with an explicit stop signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut refresh_handle = None;
    if config.feed.preference_refresh_secs > 0 {
        let job_config = PreferenceRefreshConfig {
            interval: Duration::from_secs(config.feed.preference_refresh_secs),
            ..Default::default()
        };
        refresh_handle = Some(tokio::spawn(run_preference_refresh(
            preference_repo,
            job_config,
            shutdown_rx,
        )));
    }

    let state = web::Data::new(AppState {
        feed: feed_engine,
        interactions: interaction_service,
    });

    let bind_addr = (config.app.host.clone(), config.app.port);
    info!(host = %config.app.host, port = config.app.port, "binding HTTP server");

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(health))
            .route("/metrics", web::get().to(metrics_endpoint))
            .service(
                web::scope("/api/v1")
                    .service(get_personalized_feed)
                    .service(get_trending_feed)
                    .service(get_followed_feed)
                    .service(like_reel)
                    .service(unlike_reel)
                    .service(view_reel)
                    .service(share_reel)
                    .service(follow_merchant)
                    .service(unfollow_merchant),
            )
    })
    .bind(bind_addr)?
    .run()
    .await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = refresh_handle {
        let _ = handle.await;
    }

    server
}
