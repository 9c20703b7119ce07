use actix_web::{App, HttpServer, web};
use anyhow::Context;
use std::sync::Arc;
use tracing::{info, instrument};
use user_platform::application::user_service::UserService;
use user_platform::data::connection::{DataSource, DbConnectionManager};
use user_platform::data::template::SqlTemplate;
use user_platform::data::user_repository::DatabaseUserRepository;
use user_platform::infrastructure::config::AppConfig;
use user_platform::infrastructure::logging::init_logging;
use user_platform::presentation::handlers::{AppState, configure, not_found};
use user_platform::presentation::middleware::RequestTelemetry;

#[tokio::main]
#[instrument]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    init_logging(&config.log_level);
    info!(?config, "Configuration loaded");

    let source = DataSource::from_url(&config.database_url);
    let manager = DbConnectionManager::open(source)
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    info!(source = %manager.source(), "Connection manager ready");

    let repository = DatabaseUserRepository::new(SqlTemplate::new(Arc::new(manager)));
    let user_service = UserService::new(Arc::new(repository));

    if config.init_schema_on_start {
        info!("Initializing users table on start");
        if !user_service.init_table().await {
            anyhow::bail!("Users table initialization failed");
        }
    }

    let state = web::Data::new(AppState { user_service });

    let server = HttpServer::new(move || {
        tracing::trace!("Creating new application instance");
        App::new()
            .app_data(state.clone())
            .wrap(RequestTelemetry)
            .configure(configure)
            .default_service(web::to(not_found))
    });

    let bind_addr = config.bind_address();
    info!(address = %bind_addr, "Binding server to address");
    let server = server
        .bind(bind_addr.as_str())
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!(
        address = %bind_addr,
        routes = %"GET /health, GET /login, POST /login, POST /register, GET /user/list, GET /user/init",
        "Starting HTTP server"
    );
    server.run().await.context("HTTP server terminated with an error")
}
