/// Codename Chat Server
///
/// Main server entry point. Handles:
/// - Command-line argument parsing
/// - Database initialization
/// - Retention sweeper and HTTP server startup
use actix_web::web;
use anyhow::Context;
use codename_chat_server::config::Config;
use codename_chat_server::db;
use codename_chat_server::retention::RetentionSweeper;
use codename_chat_server::server;
use std::fs;
use std::process;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .init();

    let config = Config::from_args();

    log::info!("Starting Codename Chat Server");
    log::info!("Database: {:?}", config.database);
    log::info!("Port: {}", config.port);
    log::info!(
        "Message retention: {}h, sweep every {}s",
        config.retention_hours,
        config.sweep_interval_secs
    );

    // Write PID file if specified
    if let Some(pidfile) = &config.pidfile {
        let pid = process::id().to_string();
        fs::write(pidfile, pid)
            .with_context(|| format!("Failed to write PID file {:?}", pidfile))?;
        log::info!("PID file written to: {:?}", pidfile);
    }

    // Initialize database
    let db_path = config
        .database
        .to_str()
        .context("Database path is not valid UTF-8")?;
    let pool = db::create_pool(db_path).context("Failed to create database pool")?;

    log::info!("Database initialized");

    let sweeper = RetentionSweeper::new(pool.clone(), config.retention(), config.sweep_interval());
    let _sweeper_handle = sweeper.spawn();

    // Start HTTP server
    let bind_addr = format!("127.0.0.1:{}", config.port);
    log::info!("Starting HTTP server on {}", bind_addr);

    let http_server = server::create_http_server(web::Data::new(pool), &bind_addr)?;
    http_server.await?;
    Ok(())
}
