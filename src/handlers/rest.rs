/// REST API handlers for HTTP endpoints.
/// Handles registration, sessions, directory lookups, servers, membership
/// and messages. The acting user's id is always part of the request.

use crate::db::models::*;
use crate::db::{Directory, DbPool, IdentityStore, MembershipLedger, MessageLog, ServerRegistry};
use crate::error::ChatError;
use crate::validation::validate_new_server;
use actix_web::{web, HttpResponse, Result as ActixResult};
use serde_json::json;

/// Map a core error to a response. Storage details only go to the log.
fn error_response(context: &str, err: ChatError) -> HttpResponse {
    match err {
        ChatError::DuplicateCodename(_) => HttpResponse::Conflict().json(json!({
            "error": "Codename already exists"
        })),
        ChatError::ServerNotFound(_) => HttpResponse::NotFound().json(json!({
            "error": "Server not found"
        })),
        ChatError::InvalidSecret
        | ChatError::NotOwner
        | ChatError::NotAMember
        | ChatError::AccessDenied => HttpResponse::Forbidden().json(json!({
            "error": err.to_string()
        })),
        ChatError::Validation(msg) => HttpResponse::BadRequest().json(json!({
            "error": msg
        })),
        ChatError::UserNotFound(_) => HttpResponse::NotFound().json(json!({
            "error": "User not found"
        })),
        ChatError::UserCodeExhausted(_) | ChatError::Database(_) => {
            log::error!("{}: {}", context, err);
            HttpResponse::InternalServerError().json(json!({
                "error": "Internal server error"
            }))
        }
    }
}

/// Register a new user
/// POST /users
pub async fn register_user(
    pool: web::Data<DbPool>,
    req: web::Json<CredentialsRequest>,
) -> ActixResult<HttpResponse> {
    match IdentityStore::register(&pool, &req.codename, &req.credential_digest).await {
        Ok(user) => Ok(HttpResponse::Created().json(user.profile())),
        Err(e) => Ok(error_response("Failed to register user", e)),
    }
}

/// Authenticate a codename/digest pair
/// POST /sessions
pub async fn create_session(
    pool: web::Data<DbPool>,
    req: web::Json<CredentialsRequest>,
) -> ActixResult<HttpResponse> {
    match IdentityStore::authenticate(&pool, &req.codename, &req.credential_digest).await {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(user.profile())),
        Ok(None) => Ok(HttpResponse::Unauthorized().json(json!({
            "error": "Invalid codename or password"
        }))),
        Err(e) => Ok(error_response("Failed to authenticate", e)),
    }
}

/// Get a user's public profile
/// GET /users/:id
pub async fn get_user(pool: web::Data<DbPool>, user_id: web::Path<UserId>) -> ActixResult<HttpResponse> {
    match IdentityStore::profile(&pool, *user_id).await {
        Ok(Some(profile)) => Ok(HttpResponse::Ok().json(profile)),
        Ok(None) => Ok(HttpResponse::NotFound().json(json!({
            "error": "User not found"
        }))),
        Err(e) => Ok(error_response("Failed to retrieve user", e)),
    }
}

/// Look a user up by their shareable code
/// GET /users/code/:user_code
pub async fn get_user_by_code(
    pool: web::Data<DbPool>,
    user_code: web::Path<String>,
) -> ActixResult<HttpResponse> {
    match IdentityStore::lookup_by_code(&pool, user_code.trim()).await {
        Ok(Some(user)) => Ok(HttpResponse::Ok().json(user.profile())),
        Ok(None) => Ok(HttpResponse::NotFound().json(json!({
            "error": "User not found"
        }))),
        Err(e) => Ok(error_response("Failed to retrieve user", e)),
    }
}

/// Search users by codename
/// GET /users/search?q=term
pub async fn search_users(
    pool: web::Data<DbPool>,
    query: web::Query<SearchQuery>,
) -> ActixResult<HttpResponse> {
    match Directory::search(&pool, &query.q).await {
        Ok(results) => Ok(HttpResponse::Ok().json(results)),
        Err(e) => Ok(error_response("Failed to search users", e)),
    }
}

/// Servers a user belongs to
/// GET /users/:id/servers
pub async fn get_user_servers(
    pool: web::Data<DbPool>,
    user_id: web::Path<UserId>,
) -> ActixResult<HttpResponse> {
    match ServerRegistry::list_for_user(&pool, *user_id).await {
        Ok(servers) => Ok(HttpResponse::Ok().json(servers)),
        Err(e) => Ok(error_response("Failed to list user servers", e)),
    }
}

/// Create a server; the owner becomes its first member
/// POST /servers
pub async fn create_server(
    pool: web::Data<DbPool>,
    req: web::Json<CreateServerRequest>,
) -> ActixResult<HttpResponse> {
    let new_server = match validate_new_server(req.into_inner()) {
        Ok(server) => server,
        Err(e) => return Ok(error_response("Invalid server request", e)),
    };

    let server_id = match ServerRegistry::create_server(&pool, new_server).await {
        Ok(id) => id,
        Err(e) => return Ok(error_response("Failed to create server", e)),
    };

    match ServerRegistry::get_info(&pool, server_id).await {
        Ok(Some(summary)) => Ok(HttpResponse::Created().json(summary)),
        Ok(None) => Ok(error_response(
            "Created server vanished",
            ChatError::ServerNotFound(server_id),
        )),
        Err(e) => Ok(error_response("Failed to load created server", e)),
    }
}

/// List public servers
/// GET /servers
pub async fn list_public_servers(pool: web::Data<DbPool>) -> ActixResult<HttpResponse> {
    match ServerRegistry::list_public(&pool).await {
        Ok(servers) => Ok(HttpResponse::Ok().json(servers)),
        Err(e) => Ok(error_response("Failed to list servers", e)),
    }
}

/// Server metadata
/// GET /servers/:id
pub async fn get_server(
    pool: web::Data<DbPool>,
    server_id: web::Path<ServerId>,
) -> ActixResult<HttpResponse> {
    match ServerRegistry::get_info(&pool, *server_id).await {
        Ok(Some(summary)) => Ok(HttpResponse::Ok().json(summary)),
        Ok(None) => Ok(error_response("Unknown server", ChatError::ServerNotFound(*server_id))),
        Err(e) => Ok(error_response("Failed to retrieve server", e)),
    }
}

/// Memberships of a server
/// GET /servers/:id/members
pub async fn list_server_members(
    pool: web::Data<DbPool>,
    server_id: web::Path<ServerId>,
) -> ActixResult<HttpResponse> {
    match MembershipLedger::list_for_server(&pool, *server_id).await {
        Ok(members) => Ok(HttpResponse::Ok().json(members)),
        Err(e) => Ok(error_response("Failed to list members", e)),
    }
}

/// Join a server, with its secret if private
/// POST /servers/:id/join
pub async fn join_server(
    pool: web::Data<DbPool>,
    server_id: web::Path<ServerId>,
    req: web::Json<JoinServerRequest>,
) -> ActixResult<HttpResponse> {
    match MembershipLedger::join(&pool, *server_id, req.user_id, req.secret.as_deref()).await {
        Ok(status) => Ok(HttpResponse::Ok().json(MembershipResponse { status })),
        Err(e) => Ok(error_response("Failed to join server", e)),
    }
}

/// Owner adds a user to a server
/// POST /servers/:id/invite
pub async fn invite_member(
    pool: web::Data<DbPool>,
    server_id: web::Path<ServerId>,
    req: web::Json<InviteRequest>,
) -> ActixResult<HttpResponse> {
    match MembershipLedger::invite(&pool, *server_id, req.requester_id, req.target_user_id).await {
        Ok(status) => Ok(HttpResponse::Ok().json(MembershipResponse { status })),
        Err(e) => Ok(error_response("Failed to invite member", e)),
    }
}

/// Post a message
/// POST /servers/:id/messages
pub async fn send_message(
    pool: web::Data<DbPool>,
    server_id: web::Path<ServerId>,
    req: web::Json<SendMessageRequest>,
) -> ActixResult<HttpResponse> {
    match MessageLog::send(&pool, *server_id, req.author_id, &req.content, req.anonymous).await {
        Ok(message) => Ok(HttpResponse::Created().json(json!({
            "id": message.id,
            "posted_at": message.posted_at
        }))),
        Err(e) => Ok(error_response("Failed to send message", e)),
    }
}

/// Recent messages, oldest first
/// GET /servers/:id/messages?user_id=..&limit=..
pub async fn get_messages(
    pool: web::Data<DbPool>,
    server_id: web::Path<ServerId>,
    query: web::Query<RecentMessagesQuery>,
) -> ActixResult<HttpResponse> {
    match MessageLog::recent(&pool, *server_id, query.user_id, query.limit).await {
        Ok(messages) => Ok(HttpResponse::Ok().json(messages)),
        Err(e) => Ok(error_response("Failed to fetch messages", e)),
    }
}

/// Health check endpoint
/// GET /health
pub async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(json!({
        "status": "ok"
    })))
}
