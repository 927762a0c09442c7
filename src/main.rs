use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tradebook::config::AppConfig;
use tradebook::db;
use tradebook::handlers;
use tradebook::services::messaging::twilio::TwilioSmsProvider;
use tradebook::services::messaging::MessagingProvider;
use tradebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    if config.auth_secret == "changeme" {
        tracing::warn!("AUTH_SECRET is the default value; set it before exposing the service");
    }

    let conn = db::init_db(&config.database_url)?;

    let sms: Option<Arc<dyn MessagingProvider>> = match TwilioSmsProvider::from_config(&config) {
        Some(provider) => {
            tracing::info!("sms notifications enabled via Twilio");
            Some(Arc::new(provider))
        }
        None => {
            tracing::info!("sms notifications disabled");
            None
        }
    };

    let state = Arc::new(AppState::new(conn, config.clone(), sms));

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
