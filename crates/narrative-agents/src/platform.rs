//! The social platform as seen by an agent.
//!
//! [`PlatformClient`] is the seam between the fleet and the platform's HTTP
//! API. Agents never hold a client directly: they hold a [`Session`], which
//! pairs a client with the agent's bearer token and puts every call under
//! the same deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use narrative_limiter::RateLimitHeaders;
use narrative_types::{
    ActionType, AuthToken, Credential, EngagementKind, Notification, Post, PostId, PostRef,
    TargetId,
};
use tokio::time::timeout;

use crate::error::PlatformError;

/// A successful platform response and the rate-limit headers it carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<T> {
    /// Decoded body.
    pub body: T,
    /// Rate-limit headers, empty when the server sent none.
    pub headers: RateLimitHeaders,
}

impl<T> Response<T> {
    /// A response with no rate-limit headers.
    pub fn new(body: T) -> Self {
        Self {
            body,
            headers: RateLimitHeaders::default(),
        }
    }

    /// Attach rate-limit headers.
    #[must_use]
    pub const fn with_headers(mut self, headers: RateLimitHeaders) -> Self {
        self.headers = headers;
        self
    }
}

/// Feeds the platform serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    /// Accounts the agent follows.
    Home,
    /// Platform-curated discovery feed.
    Explore,
    /// Newest posts platform-wide.
    Latest,
}

impl FeedKind {
    /// Path segment used by the platform API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Explore => "explore",
            Self::Latest => "latest",
        }
    }
}

/// Engagements that do not carry text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reaction {
    /// Like a post.
    Like,
    /// Repost a post.
    Repost,
}

impl Reaction {
    /// The reaction for a non-reply engagement kind.
    pub const fn from_engagement(kind: EngagementKind) -> Option<Self> {
        match kind {
            EngagementKind::Like => Some(Self::Like),
            EngagementKind::Repost => Some(Self::Repost),
            EngagementKind::Reply => None,
        }
    }

    /// Rate-limited resource this reaction consumes.
    pub const fn action_type(self) -> ActionType {
        match self {
            Self::Like => ActionType::Like,
            Self::Repost => ActionType::Repost,
        }
    }

    /// Path segment used by the platform API.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Repost => "repost",
        }
    }
}

/// Operations the fleet needs from the social platform.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Exchange a credential for a bearer token.
    async fn authenticate(&self, credential: &Credential) -> Result<AuthToken, PlatformError>;

    /// Publish a post, or a reply when `parent` is given.
    async fn create_post(
        &self,
        token: &AuthToken,
        content: &str,
        parent: Option<&PostId>,
    ) -> Result<Response<PostRef>, PlatformError>;

    /// Like or repost a post. Already-applied reactions count as success.
    async fn set_engagement(
        &self,
        token: &AuthToken,
        post: &PostId,
        reaction: Reaction,
    ) -> Result<Response<()>, PlatformError>;

    /// Follow an account.
    async fn follow(
        &self,
        token: &AuthToken,
        target: &TargetId,
    ) -> Result<Response<()>, PlatformError>;

    /// Search posts.
    async fn search(
        &self,
        token: &AuthToken,
        query: &str,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError>;

    /// Current trending topics, most prominent first.
    async fn trending(&self, token: &AuthToken) -> Result<Response<Vec<String>>, PlatformError>;

    /// Read a feed.
    async fn feed(
        &self,
        token: &AuthToken,
        kind: FeedKind,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError>;

    /// Notifications for the authenticated account.
    async fn notifications(
        &self,
        token: &AuthToken,
    ) -> Result<Response<Vec<Notification>>, PlatformError>;
}

/// An authenticated view of the platform for one agent.
///
/// Every call is bounded by the session's deadline; an expired deadline
/// surfaces as [`PlatformError::Timeout`].
#[derive(Clone)]
pub struct Session {
    client: Arc<dyn PlatformClient>,
    token: AuthToken,
    deadline: Duration,
}

impl core::fmt::Debug for Session {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Bind a client to a token.
    pub const fn new(
        client: Arc<dyn PlatformClient>,
        token: AuthToken,
        deadline: Duration,
    ) -> Self {
        Self {
            client,
            token,
            deadline,
        }
    }

    /// See [`PlatformClient::create_post`].
    pub async fn create_post(
        &self,
        content: &str,
        parent: Option<&PostId>,
    ) -> Result<Response<PostRef>, PlatformError> {
        self.bounded(self.client.create_post(&self.token, content, parent))
            .await
    }

    /// See [`PlatformClient::set_engagement`].
    pub async fn react(
        &self,
        post: &PostId,
        reaction: Reaction,
    ) -> Result<Response<()>, PlatformError> {
        self.bounded(self.client.set_engagement(&self.token, post, reaction))
            .await
    }

    /// See [`PlatformClient::follow`].
    pub async fn follow(&self, target: &TargetId) -> Result<Response<()>, PlatformError> {
        self.bounded(self.client.follow(&self.token, target)).await
    }

    /// See [`PlatformClient::search`].
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError> {
        self.bounded(self.client.search(&self.token, query, limit))
            .await
    }

    /// See [`PlatformClient::trending`].
    pub async fn trending(&self) -> Result<Response<Vec<String>>, PlatformError> {
        self.bounded(self.client.trending(&self.token)).await
    }

    /// See [`PlatformClient::feed`].
    pub async fn feed(
        &self,
        kind: FeedKind,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError> {
        self.bounded(self.client.feed(&self.token, kind, limit)).await
    }

    /// See [`PlatformClient::notifications`].
    pub async fn notifications(&self) -> Result<Response<Vec<Notification>>, PlatformError> {
        self.bounded(self.client.notifications(&self.token)).await
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<Response<T>, PlatformError>>,
    ) -> Result<Response<T>, PlatformError> {
        match timeout(self.deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(PlatformError::Timeout),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::MockPlatform;

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_latency(Duration::from_secs(10));
        let session = Session::new(
            platform,
            AuthToken("token-1".to_owned()),
            Duration::from_secs(2),
        );
        assert_eq!(session.trending().await, Err(PlatformError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_calls_pass_through() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_trending(vec!["election".to_owned()]);
        let session = Session::new(
            platform,
            AuthToken("token-1".to_owned()),
            Duration::from_secs(2),
        );
        assert_eq!(session.trending().await.unwrap().body, vec!["election"]);
    }
}
