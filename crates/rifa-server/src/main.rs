use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use rifa_api::auth::{self, AppState, AppStateInner};
use rifa_api::middleware::require_admin;
use rifa_api::{admin, images, purchases, raffles};

const DEV_JWT_SECRET: &str = "dev-secret-change-me";
const DEV_ADMIN_PASSWORD: &str = "change-me";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rifa=debug,tower_http=debug".into()),
        )
        .init();

    // Config — externally supplied, with dev-only fallbacks
    let jwt_secret = std::env::var("RIFA_JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.into());
    if jwt_secret == DEV_JWT_SECRET {
        warn!("RIFA_JWT_SECRET is unset, using the dev fallback (unsuitable for production)");
    }
    let db_path = std::env::var("RIFA_DB_PATH").unwrap_or_else(|_| "rifa.db".into());
    let host = std::env::var("RIFA_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("RIFA_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let image_cache_dir: PathBuf = std::env::var("RIFA_IMAGE_CACHE_DIR")
        .unwrap_or_else(|_| "./image-cache".into())
        .into();
    let admin_user = std::env::var("RIFA_ADMIN_USER").unwrap_or_else(|_| "Admin".into());
    let admin_email =
        std::env::var("RIFA_ADMIN_EMAIL").unwrap_or_else(|_| "admin@rifas.local".into());
    let admin_password =
        std::env::var("RIFA_ADMIN_PASSWORD").unwrap_or_else(|_| DEV_ADMIN_PASSWORD.into());
    if admin_password == DEV_ADMIN_PASSWORD {
        warn!("RIFA_ADMIN_PASSWORD is unset, using the dev fallback (unsuitable for production)");
    }

    // Init database and guarantee the admin account
    let db = rifa_db::Database::open(&PathBuf::from(&db_path))?;
    auth::bootstrap_admin(&db, &admin_user, &admin_email, &admin_password)?;

    tokio::fs::create_dir_all(&image_cache_dir).await?;

    // Short-timeout client for the image proxy; failures there degrade to 404
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(6))
        .user_agent("Rifa/1.0")
        .build()?;

    // Shared state
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        http,
        image_cache_dir,
    });

    // Routes
    let public_routes = Router::new()
        .route("/raffles", get(raffles::list_raffles))
        .route("/raffles/{raffle_id}", get(raffles::get_raffle))
        .route("/raffles/{raffle_id}/image", get(images::raffle_image))
        .route("/purchases", post(purchases::submit_purchase))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let admin_routes = Router::new()
        .route("/admin/dashboard", get(admin::dashboard))
        .route("/admin/purchases", get(admin::list_purchases))
        .route("/admin/purchases/{purchase_id}/approve", post(admin::approve_purchase))
        .route("/admin/purchases/{purchase_id}/reject", post(admin::reject_purchase))
        .route("/admin/raffles", get(admin::list_raffles))
        .route("/admin/raffles", post(admin::create_raffle))
        .route("/admin/raffles/{raffle_id}", put(admin::update_raffle))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_admin))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Rifa server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
