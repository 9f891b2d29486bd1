//! # Blog Server
//!
//! The main entry point for the Actix-web HTTP server.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use handlers::RouteOptions;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!("Starting blog server on {}:{}", config.host, config.port);

    let state = AppState::new(&config).await;
    let options = RouteOptions {
        share_limiter: state.share_limiter.clone(),
        admin_enabled: config.admin_enabled,
        trust_proxy_headers: config.trust_proxy_headers,
    };

    if options.admin_enabled {
        tracing::warn!("Admin endpoints enabled without authentication");
    }

    HttpServer::new(move || {
        let options = options.clone();
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .configure(move |cfg| handlers::configure_routes(cfg, &options))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
