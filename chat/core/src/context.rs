//! Session Context
//!
//! Who is chatting and in which conversation. The session takes these values
//! explicitly at construction; nothing is read from ambient globals.

use std::fmt;

use crate::messages::{ConversationId, UserId};

/// Bearer credential for the backend
///
/// `Debug` is redacted so the token cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for request headers and the stream query
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// An authenticated principal
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    /// Credential for backend calls
    pub access_token: AccessToken,
    /// Account id, stamped on messages created locally
    pub user_id: UserId,
}

impl AuthSession {
    /// Create an auth session
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            access_token: AccessToken::new(access_token),
            user_id: UserId::new(user_id),
        }
    }
}

/// Inputs a session is bound to
#[derive(Clone, Debug)]
pub struct SessionContext {
    /// Active conversation
    pub conversation_id: ConversationId,
    /// Current principal; `None` until sign-in completes
    pub auth: Option<AuthSession>,
}

impl SessionContext {
    /// Context for a conversation
    pub fn new(conversation_id: ConversationId, auth: Option<AuthSession>) -> Self {
        Self {
            conversation_id,
            auth,
        }
    }

    /// Owner to stamp on locally created messages
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.auth
            .as_ref()
            .map(|auth| auth.user_id.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_debug_is_redacted() {
        let auth = AuthSession::new("sk-very-secret", "u-1");
        let shown = format!("{auth:?}");
        assert!(!shown.contains("sk-very-secret"));
        assert!(shown.contains("***"));
        assert_eq!(auth.access_token.expose(), "sk-very-secret");
    }

    #[test]
    fn test_user_id_without_auth_is_empty() {
        let ctx = SessionContext::new(ConversationId::new("c"), None);
        assert_eq!(ctx.user_id(), UserId::default());

        let ctx = SessionContext::new(
            ConversationId::new("c"),
            Some(AuthSession::new("t", "u-7")),
        );
        assert_eq!(ctx.user_id(), UserId::new("u-7"));
    }
}
