use std::sync::Arc;

use agency_portal::chat::hub::ChatHub;
use agency_portal::chat::routes::chat_routes;
use agency_portal::chat::service::ConversationService;
use agency_portal::checklist::routes::checklist_routes;
use agency_portal::config::{PortalConfig, SmtpSettings};
use agency_portal::documents::{document_routes, FsObjectStore};
use agency_portal::mailer::{LogMailer, Mailer, SmtpMailer};
use agency_portal::reminders::dispatcher::{spawn_sweep_ticker, Dispatcher, SweepGate};
use agency_portal::reminders::routes::reminder_routes;
use agency_portal::store::{Database, LibSqlBackend};
use agency_portal::users::user_routes;
use tower_http::cors::CorsLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| "Failed to install rustls crypto provider")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = PortalConfig::from_env();

    eprintln!("🏢 Agency Portal v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API:     http://0.0.0.0:{}/api", config.port);
    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws/chat", config.port);
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!("   Files:    {}\n", config.data_dir.display());

    let store: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );

    // SMTP is optional: without it, reminder emails are logged, not sent.
    let mailer: Arc<dyn Mailer> = match SmtpSettings::from_env()? {
        Some(settings) => Arc::new(SmtpMailer::new(&settings)?),
        None => {
            tracing::warn!("PORTAL_SMTP_PROVIDER not set, emails will only be logged");
            Arc::new(LogMailer)
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        mailer,
        config.send_timeout,
    ));
    let gate = Arc::new(SweepGate::new(config.trigger_min_spacing));
    spawn_sweep_ticker(
        Arc::clone(&dispatcher),
        config.sweep_interval,
        config.sweep_limit,
    );

    let hub = Arc::new(ChatHub::new());
    let conversations = Arc::new(ConversationService::new(
        Arc::clone(&store),
        Arc::clone(&hub),
    ));
    let objects = Arc::new(FsObjectStore::new(config.data_dir.clone()));

    let app = reminder_routes(
        Arc::clone(&store),
        dispatcher,
        gate,
        config.sweep_limit,
    )
    .merge(checklist_routes(Arc::clone(&store)))
    .merge(chat_routes(conversations, hub))
    .merge(document_routes(Arc::clone(&store), objects))
    .merge(user_routes(store))
    .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Portal server started");
    axum::serve(listener, app).await?;

    Ok(())
}
