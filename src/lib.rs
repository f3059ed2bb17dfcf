/// Codename chat server library
///
/// Membership-gated servers with expiring messages, served over REST.
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod retention;
pub mod server;
pub mod validation;
