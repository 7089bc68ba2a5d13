//! HTTP surface: routes, request logging and the serve loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::Request,
    http::{header::CONTENT_TYPE, Method},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use log::info;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub mod handlers;
pub mod params;
pub mod render;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/", get(handlers::home))
        .route("/find_colleges", get(handlers::find_colleges))
        .route("/search", post(handlers::search_form))
        .route("/export", post(handlers::export))
        .route("/api/facets", get(handlers::facets))
        .route("/api/college/{code}", get(handlers::college))
        .route("/health", get(handlers::health))
        .route("/admin/reload", post(handlers::reload))
        .layer(middleware::from_fn(log_requests));

    if state.config.cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .max_age(Duration::from_secs(60 * 60)),
        );
    }

    router.with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{method} {uri} -> {} ({:.1?})",
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

/// Bind the configured address and serve until Ctrl+C / SIGTERM.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let address = state.config.listen_addr();
    let app = build_router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
