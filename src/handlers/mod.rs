/// HTTP handlers module
/// Provides the REST endpoints

pub mod rest;

pub use rest::{
    create_server, create_session, get_messages, get_server, get_user, get_user_by_code,
    get_user_servers, health, invite_member, join_server, list_public_servers,
    list_server_members, register_user, search_users, send_message,
};
