use std::net::SocketAddr;

use axum::{
    extract::State,
    http::{HeaderValue, Request, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::{
    auth,
    config::AppConfig,
    contacts,
    error::{ApiError, ApiResult},
    rate_limit::{limited, RateLimit},
    state::AppState,
    users,
};

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router(&state))
        .merge(users::router(&state))
        .merge(contacts::router(&state))
        .route(
            "/healthchecker",
            limited(get(healthchecker), &state, "healthchecker", RateLimit::ONE_PER_SECOND),
        );

    Router::new()
        .route(
            "/",
            limited(get(root), &state, "root", RateLimit::ONE_PER_SECOND),
        )
        .nest("/api", api)
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
        .layer(cors_layer(&state.config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
        .with_state(state)
}

/// Credentialed CORS for the configured origins only.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Contacts API" }))
}

async fn healthchecker(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let one = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_optional(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "database health check failed");
            ApiError::Database("Error connecting to the database".into())
        })?;
    if one.is_none() {
        return Err(ApiError::Database("Database is not configured correctly".into()));
    }
    Ok(Json(json!({ "message": "OK" })))
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.api_host, config.api_port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
