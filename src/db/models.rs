/// Data models for database operations.
/// Represents users, servers, memberships, and messages, plus the
/// request/response DTOs used by the REST layer.
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ServerId = i64;
pub type MessageId = i64;

/// Display name used when a referenced user record cannot be resolved.
pub const UNKNOWN_CODENAME: &str = "Unknown";

/// Display name rendered for messages posted anonymously.
pub const ANONYMOUS_CODENAME: &str = "Anonymous";

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub codename: String,
    pub credential_digest: String,
    pub user_code: String,
    pub created_at: i64,
}

impl User {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            codename: self.codename.clone(),
            user_code: self.user_code.clone(),
        }
    }
}

/// Public projection of a user. Never carries the credential digest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: UserId,
    pub codename: String,
    pub user_code: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Server {
    pub id: ServerId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub created_at: i64,
    pub visibility: Visibility,
    pub join_secret: Option<String>,
}

/// Fields supplied when creating a server.
#[derive(Debug, Clone)]
pub struct NewServer {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub visibility: Visibility,
    pub join_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSummary {
    pub id: ServerId,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub owner_codename: String,
    pub created_at: i64,
    pub visibility: Visibility,
    pub member_count: u64,
}

/// A server as seen from one of its members.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserServer {
    #[serde(flatten)]
    pub server: ServerSummary,
    pub joined_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub server_id: ServerId,
    pub user_id: UserId,
    pub joined_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JoinOutcome {
    Joined,
    AlreadyMember,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub server_id: ServerId,
    pub author_id: UserId,
    pub content: String,
    pub anonymous: bool,
    pub posted_at: i64,
}

/// A message ready for display. `author_id` is withheld for anonymous posts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnrichedMessage {
    pub id: MessageId,
    pub server_id: ServerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<UserId>,
    pub author_codename: String,
    pub content: String,
    pub anonymous: bool,
    pub posted_at: i64,
}

// Request/Response DTOs
#[derive(Debug, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub codename: String,
    pub credential_digest: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: UserId,
    pub visibility: Visibility,
    pub join_secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JoinServerRequest {
    pub user_id: UserId,
    pub secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteRequest {
    pub requester_id: UserId,
    pub target_user_id: UserId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MembershipResponse {
    pub status: JoinOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub author_id: UserId,
    pub content: String,
    #[serde(default)]
    pub anonymous: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentMessagesQuery {
    pub user_id: UserId,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}
