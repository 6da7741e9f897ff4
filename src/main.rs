use ludov_api::{
    AppState, CloudinarySigner, GeocoderState, NominatimGeocoder, RateLimiter, UploadSignerState,
    auth::bootstrap_admin,
    config::{AppConfig, Env},
    create_router,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, database, external services, HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise verbose for this crate, request summaries for tower_http.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ludov_api=debug,tower_http=info,sqlx=warn".into());

    // 3. Pretty logs locally, JSON lines in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Database Initialization (Postgres)
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    let postgres = PostgresRepository::new(pool);
    postgres
        .migrate()
        .await
        .expect("FATAL: Failed to apply database migrations.");
    tracing::info!("Database migrations applied.");

    let repo = Arc::new(postgres) as RepositoryState;

    // 5. First admin account (ADMIN_EMAIL / ADMIN_PASSWORD)
    match bootstrap_admin(&repo, &config).await {
        Ok(true) => tracing::info!("Bootstrap admin account created."),
        Ok(false) => {}
        Err(e) => tracing::error!(error = %e, "Bootstrap admin creation failed"),
    }

    // 6. External Services
    let media = Arc::new(CloudinarySigner::new(
        &config.cloudinary_cloud_name,
        &config.cloudinary_api_key,
        &config.cloudinary_api_secret,
        &config.cloudinary_folder,
    )) as UploadSignerState;

    let geocoder = Arc::new(
        NominatimGeocoder::new(&config.geocoder_url, &config.geocoder_user_agent)
            .expect("FATAL: Failed to build the geocoder HTTP client."),
    ) as GeocoderState;

    // 7. Rate Limiter, with periodic eviction of idle clients.
    let window = Duration::from_secs(config.rate_limit_window_secs);
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit_max, window));
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(window.max(Duration::from_secs(1)) * 2);
            loop {
                ticker.tick().await;
                limiter.cleanup();
            }
        });
    }

    // 8. Unified State Assembly
    let listen_addr = config.listen_addr.clone();
    let app_state = AppState {
        repo,
        media,
        geocoder,
        rate_limiter,
        config,
    };

    // 9. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&listen_addr)
        .await
        .expect("FATAL: Failed to bind LISTEN_ADDR.");

    tracing::info!("Listening on {}", listen_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", listen_addr);

    // Peer addresses feed the per-IP rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("FATAL: HTTP server terminated unexpectedly.");
}
