use axum::{http::Method, middleware as axum_middleware, Router};
use std::{sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use authbroker_backend::{
    config::Config,
    db::connection::{create_pool, DbPool},
    handlers,
    middleware::{log_error_responses, request_id},
    repositories::{PgSessionStore, PgUserDirectory},
    services::idp_client::HttpIdpClient,
    state::AppState,
    utils::mask_secret,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "authbroker_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        database_url = %mask_secret(&config.database_url),
        tenant_url = %config.tenant_url,
        oauth_application_id = %mask_secret(&config.oauth_application_id),
        session_inactive_time_secs = config.session_inactive_time_secs,
        mobile_inactive_time_secs = config.mobile_inactive_time_secs,
        redirect_uri = %config.redirect_uri(),
        idp_handle_retry_limit = config.idp_handle_retry_limit,
        idp_request_timeout_secs = config.idp_request_timeout_secs,
        cookie_same_site = ?config.cookie_same_site,
        "Loaded configuration from environment/.env"
    );

    let pool: DbPool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let idp = HttpIdpClient::new(
        &config.tenant_url,
        &config.oauth_application_id,
        Duration::from_secs(config.idp_request_timeout_secs),
    )?;

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(
        config,
        Arc::new(PgSessionStore::new(pool.clone())),
        Arc::new(PgUserDirectory::new(pool)),
        Arc::new(idp),
    );

    let app: Router = handlers::router(state).layer(
        ServiceBuilder::new()
            .layer(axum_middleware::from_fn(request_id))
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers(Any)
                    .max_age(Duration::from_secs(24 * 60 * 60)),
            )
            .layer(axum_middleware::from_fn(log_error_responses)),
    );

    tracing::info!("Server listening on {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
