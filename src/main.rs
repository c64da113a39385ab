use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use webook_server::users::handlers::configure_routes;
use webook_server::{health_check, AppError, AppState, Settings};

#[actix_web::main]
async fn main() -> webook_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({} environment)", config.environment);
    info!("Login mode: {:?}", config.auth.mode);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let state = web::Data::new(state);

    // Drop expired sessions in the background
    let cleanup_state = state.clone();
    let cleanup_every = Duration::from_secs(config.auth.session_cleanup_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(cleanup_every).await;
            match cleanup_state.sessions.purge_expired().await {
                Ok(0) => {}
                Ok(removed) => info!("Removed {} expired sessions", removed),
                Err(e) => error!("Session cleanup failed: {}", e),
            }
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;
    info!("Starting server at http://{}:{}", config.server.host, config.server.port);

    let login_middleware = state.login_middleware();
    let routes = configure_routes(config.auth.mode);

    HttpServer::new(move || {
        App::new()
            .wrap(login_middleware.clone())
            .app_data(state.clone())
            .route("/health", web::get().to(health_check))
            .configure(routes.clone())
    })
    .listen(listener)?
    .workers(config.server.workers as usize)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
