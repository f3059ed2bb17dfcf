/// HTTP server factory and configuration.
/// Provides a reusable function to create and configure the HTTP server
/// for use in both the main binary and tests.

use actix_web::{middleware, web, App, HttpServer};
use crate::db::DbPool;
use crate::handlers::{
    create_server, create_session, get_messages, get_server, get_user, get_user_by_code,
    get_user_servers, health, invite_member, join_server, list_public_servers,
    list_server_members, register_user, search_users, send_message,
};

/// Register every REST route.
///
/// Literal `/users/...` paths come before `/users/{id}` so they are not
/// captured by the id matcher.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        // Identity & directory
        .route("/users", web::post().to(register_user))
        .route("/sessions", web::post().to(create_session))
        .route("/users/search", web::get().to(search_users))
        .route("/users/code/{user_code}", web::get().to(get_user_by_code))
        .route("/users/{id}", web::get().to(get_user))
        .route("/users/{id}/servers", web::get().to(get_user_servers))
        // Servers & membership
        .route("/servers", web::post().to(create_server))
        .route("/servers", web::get().to(list_public_servers))
        .route("/servers/{id}", web::get().to(get_server))
        .route("/servers/{id}/members", web::get().to(list_server_members))
        .route("/servers/{id}/join", web::post().to(join_server))
        .route("/servers/{id}/invite", web::post().to(invite_member))
        // Messages
        .route("/servers/{id}/messages", web::post().to(send_message))
        .route("/servers/{id}/messages", web::get().to(get_messages));
}

/// Create a configured HTTP server
///
/// Takes a database pool and bind address, then returns a fully configured
/// `HttpServer` ready to be run.
///
/// # Arguments
/// * `pool` - Database connection pool wrapped in web::Data
/// * `bind_addr` - Address to bind the server to (e.g., "127.0.0.1:4000")
///
/// # Example
/// ```ignore
/// let pool = web::Data::new(db::create_pool("chatserver.db")?);
/// let server = server::create_http_server(pool, "127.0.0.1:4000")?;
/// server.await?;
/// ```
pub fn create_http_server(
    pool: web::Data<DbPool>,
    bind_addr: &str,
) -> std::io::Result<actix_web::dev::Server> {
    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind(bind_addr)?
    .run();

    Ok(server)
}

/// Create a test HTTP server with an in-memory database
///
/// Binds to a random available port.
///
/// # Returns
/// A tuple of (server, bind_address) where bind_address can be used to make requests
pub fn create_test_http_server() -> std::io::Result<(actix_web::dev::Server, String)> {
    let pool = web::Data::new(crate::db::create_test_pool());

    let server = HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .wrap(middleware::Logger::default())
            .configure(configure_routes)
    })
    .bind("127.0.0.1:0")?;

    // Get the actual bind address (including the assigned port)
    let addr_str = server
        .addrs()
        .first()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "No bind address found"))?
        .to_string();

    Ok((server.run(), addr_str))
}
