/// Request validation applied by the HTTP layer before touching the stores.
use crate::db::models::{CreateServerRequest, NewServer, Visibility};
use crate::error::{ChatError, Result};

pub const MAX_SERVER_NAME_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 200;

/// Normalize a create-server request.
///
/// Trims name and description, drops an empty description, requires a non-blank secret
/// for private servers and discards one sent for a public server.
pub fn validate_new_server(req: CreateServerRequest) -> Result<NewServer> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(ChatError::Validation("Server name is required".to_string()));
    }
    if name.chars().count() > MAX_SERVER_NAME_CHARS {
        return Err(ChatError::Validation(format!(
            "Server name exceeds {} characters",
            MAX_SERVER_NAME_CHARS
        )));
    }

    let description = req
        .description
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    if let Some(d) = description {
        if d.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ChatError::Validation(format!(
                "Description exceeds {} characters",
                MAX_DESCRIPTION_CHARS
            )));
        }
    }

    let join_secret = match req.visibility {
        // Stored untrimmed: joins compare the secret byte for byte
        Visibility::Private => match req.join_secret.as_deref() {
            Some(secret) if !secret.trim().is_empty() => Some(secret.to_string()),
            _ => {
                return Err(ChatError::Validation(
                    "Private servers require a password".to_string(),
                ))
            }
        },
        Visibility::Public => None,
    };

    Ok(NewServer {
        name: name.to_string(),
        description: description.map(str::to_string),
        owner_id: req.owner_id,
        visibility: req.visibility,
        join_secret,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(visibility: Visibility, secret: Option<&str>) -> CreateServerRequest {
        CreateServerRequest {
            name: "  general  ".to_string(),
            description: Some("   ".to_string()),
            owner_id: 1,
            visibility,
            join_secret: secret.map(str::to_string),
        }
    }

    #[test]
    fn test_public_server_is_normalized() {
        let server = validate_new_server(request(Visibility::Public, Some("ignored")))
            .expect("Validation failed");
        assert_eq!(server.name, "general");
        assert_eq!(server.description, None);
        assert_eq!(server.join_secret, None);
    }

    #[test]
    fn test_private_server_requires_secret() {
        for secret in [None, Some(""), Some("   ")] {
            let result = validate_new_server(request(Visibility::Private, secret));
            assert!(matches!(result, Err(ChatError::Validation(_))));
        }

        let server = validate_new_server(request(Visibility::Private, Some("xyz")))
            .expect("Validation failed");
        assert_eq!(server.join_secret.as_deref(), Some("xyz"));
    }

    #[test]
    fn test_name_bounds() {
        let mut req = request(Visibility::Public, None);
        req.name = "   ".to_string();
        assert!(validate_new_server(req).is_err());

        let mut req = request(Visibility::Public, None);
        req.name = "n".repeat(MAX_SERVER_NAME_CHARS + 1);
        assert!(validate_new_server(req).is_err());

        let mut req = request(Visibility::Public, None);
        req.name = "n".repeat(MAX_SERVER_NAME_CHARS);
        assert!(validate_new_server(req).is_ok());
    }

    #[test]
    fn test_description_bounds() {
        let mut req = request(Visibility::Public, None);
        req.description = Some("d".repeat(MAX_DESCRIPTION_CHARS + 1));
        assert!(validate_new_server(req).is_err());

        let mut req = request(Visibility::Public, None);
        req.description = Some("  hangout  ".to_string());
        let server = validate_new_server(req).unwrap();
        assert_eq!(server.description.as_deref(), Some("hangout"));
    }
}
