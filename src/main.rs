//! Clinic appointment assistant
//!
//! A WhatsApp bot that walks patients through requesting an appointment by
//! professional or by specialty. Conversation logic is a pure state machine;
//! this binary wires it to the WhatsApp Cloud API.

mod config;
mod directory;
mod replies;
mod runtime;
mod session_store;
mod shutdown;
mod state_machine;
mod transport;

use config::BotConfig;
use directory::ClinicDirectory;
use runtime::ProductionManager;
use session_store::{InMemorySessionStore, SessionStore};
use shutdown::{termination_signal, Shutdown};
use std::net::SocketAddr;
use std::sync::Arc;
use transport::webhook::{create_router, WebhookState};
use transport::{ChatTransport, CloudApiTransport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clinic_bot=info,tower_http=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_span_list(false),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_logging();

    // Configuration
    let config = BotConfig::from_env()?;
    let directory = Arc::new(ClinicDirectory::load(&config.clinic_config_path)?);

    // Connect to the chat network; rejected credentials end the process here
    let transport = Arc::new(CloudApiTransport::connect(&config.whatsapp).await?);

    let shutdown = Shutdown::new();
    let manager: Arc<ProductionManager> = Arc::new(runtime::RuntimeManager::new(
        directory,
        Arc::new(InMemorySessionStore::new()),
        transport.clone(),
        config.think_delay,
        shutdown.clone(),
    ));

    tokio::spawn(runtime::log_events(manager.subscribe()));

    let app = create_router(WebhookState {
        verify_token: Arc::from(config.whatsapp.verify_token.as_str()),
        handler: manager.clone(),
    });

    // Stop on SIGINT/SIGTERM
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        termination_signal().await;
        signal_shutdown.trigger();
    });

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        min_delay_ms = u64::try_from(config.think_delay.min.as_millis()).unwrap_or(u64::MAX),
        max_delay_ms = u64::try_from(config.think_delay.max.as_millis()).unwrap_or(u64::MAX),
        "Clinic bot webhook listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.wait().await })
        .await?;

    tracing::info!(
        users = manager.active_users().await,
        sessions = manager.store().len().await,
        "Shutting down"
    );
    transport.close().await;

    if let Some(reason) = shutdown.fatal_reason() {
        tracing::error!(reason = %reason, "Fatal error, exiting");
        std::process::exit(1);
    }

    Ok(())
}
