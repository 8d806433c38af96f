//! Request and response bodies of the MusBlossom API
//!
//! Every response is an envelope carrying a `success` flag. Rejections come
//! back as `{"success": false, "error": "..."}`, or with an `errors` object
//! mapping field names to messages when registration input fails validation.

use musblossom_core::{TokenPair, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Login request. The server identifies accounts by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Sent as an empty string when not provided
    #[serde(default)]
    pub bio: String,
}

/// Response to login and registration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<JsonValue>,
}

impl AuthResponse {
    /// Issued tokens and profile, if the server accepted the credentials and
    /// sent all three.
    pub fn into_session(self) -> Option<(TokenPair, UserProfile)> {
        if !self.success {
            return None;
        }
        match (self.access_token, self.refresh_token, self.user) {
            (Some(access), Some(refresh), Some(user)) => Some((TokenPair::new(access, refresh), user)),
            _ => None,
        }
    }

    /// Server-supplied reason for a rejection: field errors take precedence
    /// over the general `error` message.
    pub fn rejection_message(&self) -> Option<String> {
        self.errors
            .as_ref()
            .and_then(flatten_field_errors)
            .or_else(|| self.error.clone().filter(|e| !e.is_empty()))
    }
}

fn flatten_field_errors(errors: &JsonValue) -> Option<String> {
    match errors {
        JsonValue::String(message) if !message.is_empty() => Some(message.clone()),
        JsonValue::Object(fields) if !fields.is_empty() => Some(
            fields
                .iter()
                .map(|(field, message)| match message {
                    JsonValue::String(text) => format!("{field}: {text}"),
                    other => format!("{field}: {other}"),
                })
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => None,
    }
}

/// Response to `POST /auth/refresh`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResponse {
    /// The new access token, if the refresh was accepted
    pub fn into_access_token(self) -> Option<String> {
        let success = self.success;
        self.access_token
            .filter(|token| success && !token.is_empty())
    }
}

/// Response to `GET /auth/me`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MeResponse {
    pub fn into_user(self) -> Option<UserProfile> {
        let success = self.success;
        self.user.filter(|_| success)
    }
}

/// Password change request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Account deletion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
}

/// Generic `{success, message, error}` acknowledgement
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_response_into_session() {
        let response: AuthResponse = serde_json::from_value(json!({
            "success": true,
            "access_token": "A1",
            "refresh_token": "R1",
            "user": {"username": "bob"}
        }))
        .unwrap();

        let (tokens, user) = response.into_session().unwrap();
        assert_eq!(tokens, TokenPair::new("A1", "R1"));
        assert_eq!(user.username, "bob");
    }

    #[test]
    fn test_auth_response_missing_tokens_is_not_a_session() {
        let response: AuthResponse = serde_json::from_value(json!({
            "success": true,
            "user": {"username": "bob"}
        }))
        .unwrap();
        assert!(response.into_session().is_none());
    }

    #[test]
    fn test_rejection_prefers_field_errors() {
        let response: AuthResponse = serde_json::from_value(json!({
            "success": false,
            "error": "ignored",
            "errors": {"email": "Invalid email", "username": "Username is taken"}
        }))
        .unwrap();

        assert_eq!(
            response.rejection_message().as_deref(),
            Some("email: Invalid email; username: Username is taken")
        );
    }

    #[test]
    fn test_rejection_falls_back_to_error() {
        let response: AuthResponse =
            serde_json::from_value(json!({"success": false, "error": "Wrong email or password"}))
                .unwrap();
        assert_eq!(
            response.rejection_message().as_deref(),
            Some("Wrong email or password")
        );

        let bare: AuthResponse = serde_json::from_value(json!({"success": false})).unwrap();
        assert!(bare.rejection_message().is_none());
    }

    #[test]
    fn test_refresh_response_requires_success() {
        let rejected = RefreshResponse {
            success: false,
            access_token: Some("A2".into()),
            error: None,
        };
        assert!(rejected.into_access_token().is_none());
    }
}
