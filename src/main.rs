use std::sync::{Arc, Mutex};

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use walkies::config::AppConfig;
use walkies::db;
use walkies::handlers;
use walkies::services::mail::http::HttpMailer;
use walkies::services::mail::{LogMailer, Mailer};
use walkies::services::notifier::{run_dispatcher, Notifier};
use walkies::services::sweeper::run_sweeper;
use walkies::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    let mailer: Arc<dyn Mailer> = if config.mail_api_url.is_empty() {
        tracing::info!("MAIL_API_URL not set, emails will only be logged");
        Arc::new(LogMailer)
    } else {
        anyhow::ensure!(!config.mail_api_key.is_empty(), "MAIL_API_KEY must be set when MAIL_API_URL is");
        tracing::info!("sending email via {}", config.mail_api_url);
        Arc::new(HttpMailer::new(
            config.mail_api_url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        ))
    };

    let (notifier, outbox) = Notifier::channel();
    tokio::spawn(run_dispatcher(outbox, mailer));

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        notifier,
    });

    tokio::spawn(run_sweeper(Arc::clone(&state)));

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
