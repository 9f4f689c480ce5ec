//! Data shapes exchanged with the social platform.
//!
//! These mirror the JSON the platform returns. Every numeric field defaults
//! to zero so partially populated responses still decode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{PostId, TargetId};

/// A post as returned by feeds, search and post creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Platform post identifier.
    pub id: PostId,
    /// Handle of the author.
    #[serde(alias = "author")]
    pub username: TargetId,
    /// Body text.
    #[serde(default)]
    pub content: String,
    /// Like count at fetch time.
    #[serde(default)]
    pub likes: u32,
    /// Reply count at fetch time.
    #[serde(default)]
    pub replies: u32,
}

impl Post {
    /// Combined likes and replies.
    pub const fn engagement(&self) -> u32 {
        self.likes.saturating_add(self.replies)
    }
}

/// Reference to a post the agent created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    /// Platform post identifier.
    pub id: PostId,
}

/// Kind of notification delivered to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// Someone mentioned the account.
    Mention,
    /// Someone replied to one of the account's posts.
    Reply,
    /// Someone liked one of the account's posts.
    Like,
    /// Someone followed the account.
    Follow,
    /// Anything the fleet does not react to.
    #[serde(other)]
    Other,
}

/// A notification for the authenticated account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// What happened.
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Account that triggered the notification.
    #[serde(default)]
    pub username: Option<TargetId>,
    /// Post involved, for mentions and replies.
    #[serde(default)]
    pub post: Option<Post>,
}

/// Account credential for one agent.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Login handle.
    pub username: String,
    /// Login secret.
    pub password: String,
}

impl core::fmt::Debug for Credential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Bearer token issued by the platform on successful authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(pub String);

impl AuthToken {
    /// Borrow the raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("AuthToken(<redacted>)")
    }
}

/// Persona an agent presents on the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Persona name (key in the persona table).
    #[serde(default)]
    pub name: String,
    /// Topics the persona cares about, most important first.
    #[serde(default)]
    pub interests: Vec<String>,
    /// Free-form tone description (`casual`, `aggressive`, ...).
    #[serde(default)]
    pub tone: String,
    /// How the persona argues for each campaign objective.
    #[serde(default)]
    pub political_leanings: BTreeMap<String, String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn post_decodes_with_missing_counters() {
        let post: Post =
            serde_json::from_str(r#"{"id": "p1", "username": "kate", "content": "hi"}"#).unwrap();
        assert_eq!(post.engagement(), 0);
        assert_eq!(post.username.as_str(), "kate");
    }

    #[test]
    fn unknown_notification_kinds_decode_as_other() {
        let note: Notification = serde_json::from_str(r#"{"type": "poke"}"#).unwrap();
        assert_eq!(note.kind, NotificationKind::Other);
    }

    #[test]
    fn credential_debug_hides_password() {
        let credential = Credential {
            username: "bot01".to_owned(),
            password: "hunter2".to_owned(),
        };
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("bot01"));
        assert!(!rendered.contains("hunter2"));
    }
}
