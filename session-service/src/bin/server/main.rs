use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use session_service::background::sweeper::TokenSweeper;
use session_service::config::Config;
use session_service::domain::session::clock::Clock;
use session_service::domain::session::clock::SystemClock;
use session_service::domain::session::service::AuthService;
use session_service::domain::session::service::SecurityServices;
use session_service::inbound::http::rate_limit::RateLimiter;
use session_service::inbound::http::router::create_router;
use session_service::outbound::email::TracingEmailSender;
use session_service::outbound::repositories::PostgresTokenRepository;
use session_service::outbound::repositories::PostgresUserRepository;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "session_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "session-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    if config.jwt.secret.len() < auth::jwt::MIN_SECRET_LENGTH {
        anyhow::bail!(
            "jwt.secret must be at least {} bytes, got {}",
            auth::jwt::MIN_SECRET_LENGTH,
            config.jwt.secret.len()
        );
    }

    tracing::info!(
        http_port = config.server.http_port,
        jwt_issuer = %config.jwt.issuer,
        jwt_audience = %config.jwt.audience,
        rotate_refresh_tokens = config.session.rotate_refresh_tokens,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let security = SecurityServices {
        hasher: Arc::new(auth::PasswordHasher::new()),
        token_generator: Arc::new(auth::OpaqueTokenGenerator::new()),
        access_tokens: Arc::new(auth::JwtHandler::new(
            config.jwt.secret.as_bytes(),
            &config.jwt.issuer,
            &config.jwt.audience,
        )),
        clock: Arc::clone(&clock),
    };

    let user_repository = Arc::new(PostgresUserRepository::new(pg_pool.clone()));
    let token_repository = Arc::new(PostgresTokenRepository::new(pg_pool));
    let email_sender = Arc::new(TracingEmailSender::new(&config.email.from));

    let auth_service = Arc::new(AuthService::new(
        user_repository,
        Arc::clone(&token_repository),
        email_sender,
        security,
        config.session.settings(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = TokenSweeper::new(
        token_repository,
        clock,
        Duration::from_secs(config.sweeper.interval_secs),
        Duration::from_secs(config.sweeper.timeout_secs),
    )
    .spawn(shutdown_rx);

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit.max_attempts,
        Duration::from_secs(config.rate_limit.window_secs),
    ));

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(auth_service, rate_limiter);
    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Http server stopped, stopping background tasks");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper.await {
        tracing::error!(error = %e, "Token sweeper task failed");
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
