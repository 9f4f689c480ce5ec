//! In-memory platform and generator for tests.
//!
//! [`MockPlatform`] records every write and serves whatever feeds, search
//! results and notifications a test loads into it. Tokens are issued as
//! `token-1`, `token-2`, ... so tests can revoke the first few sessions and
//! watch an agent re-authenticate.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use narrative_types::{AuthToken, Credential, Notification, Post, PostId, PostRef, TargetId};

use crate::error::PlatformError;
use crate::platform::{FeedKind, PlatformClient, Reaction, Response};
use crate::textgen::{GenerationRequest, TextGenerator};

/// Platform operations a test can make fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    /// `authenticate`
    Authenticate,
    /// `create_post`
    CreatePost,
    /// `set_engagement`
    React,
    /// `follow`
    Follow,
    /// `search`
    Search,
    /// `trending`
    Trending,
    /// `feed`
    Feed,
    /// `notifications`
    Notifications,
}

/// A post or reply the mock accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPost {
    /// Token the post was made with.
    pub token: String,
    /// Body text.
    pub content: String,
    /// Parent post for replies.
    pub parent: Option<PostId>,
}

#[derive(Debug, Default)]
struct MockState {
    latency: Duration,
    trending: Vec<String>,
    feeds: HashMap<FeedKind, Vec<Post>>,
    search_results: Vec<Post>,
    search_by_query: HashMap<String, Vec<Post>>,
    notifications: Vec<Notification>,
    failing: HashSet<MockCall>,
    reject_tokens_through: u32,
    auth_calls: u32,
    posts: Vec<CreatedPost>,
    reactions: Vec<(PostId, Reaction)>,
    follows: Vec<TargetId>,
    searches: Vec<String>,
}

/// In-memory [`PlatformClient`].
#[derive(Debug, Default)]
pub struct MockPlatform {
    state: Mutex<MockState>,
}

impl MockPlatform {
    /// An empty platform that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.with_state(|s| s.latency = latency);
    }

    /// Topics returned by `trending`.
    pub fn set_trending(&self, topics: Vec<String>) {
        self.with_state(|s| s.trending = topics);
    }

    /// Posts returned by a feed.
    pub fn set_feed(&self, kind: FeedKind, posts: Vec<Post>) {
        self.with_state(|s| {
            s.feeds.insert(kind, posts);
        });
    }

    /// Posts returned by any search without a query-specific result.
    pub fn set_search_results(&self, posts: Vec<Post>) {
        self.with_state(|s| s.search_results = posts);
    }

    /// Posts returned for one exact query.
    pub fn set_search_for(&self, query: &str, posts: Vec<Post>) {
        self.with_state(|s| {
            s.search_by_query.insert(query.to_owned(), posts);
        });
    }

    /// Notifications returned by `notifications`.
    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        self.with_state(|s| s.notifications = notifications);
    }

    /// Make a call fail from now on.
    pub fn fail(&self, call: MockCall) {
        self.with_state(|s| {
            s.failing.insert(call);
        });
    }

    /// Make a failing call succeed again.
    pub fn recover(&self, call: MockCall) {
        self.with_state(|s| {
            s.failing.remove(&call);
        });
    }

    /// Treat tokens `token-1` through `token-{n}` as revoked.
    pub fn reject_tokens_through(&self, n: u32) {
        self.with_state(|s| s.reject_tokens_through = n);
    }

    /// Number of `authenticate` calls so far.
    pub fn auth_calls(&self) -> u32 {
        self.with_state(|s| s.auth_calls)
    }

    /// Posts and replies accepted so far.
    pub fn posts_created(&self) -> Vec<CreatedPost> {
        self.with_state(|s| s.posts.clone())
    }

    /// Reactions accepted so far.
    pub fn reactions(&self) -> Vec<(PostId, Reaction)> {
        self.with_state(|s| s.reactions.clone())
    }

    /// Follows accepted so far.
    pub fn follows(&self) -> Vec<TargetId> {
        self.with_state(|s| s.follows.clone())
    }

    /// Search queries received so far.
    pub fn searches(&self) -> Vec<String> {
        self.with_state(|s| s.searches.clone())
    }

    /// Sleep for the configured latency, then check the token and the
    /// failure set.
    async fn enter(&self, call: MockCall, token: &AuthToken) -> Result<(), PlatformError> {
        let latency = self.with_state(|s| s.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.with_state(|s| {
            let revoked = token
                .expose()
                .strip_prefix("token-")
                .and_then(|n| n.parse::<u32>().ok())
                .is_some_and(|n| n <= s.reject_tokens_through);
            if revoked {
                return Err(PlatformError::Unauthorized);
            }
            if s.failing.contains(&call) {
                return Err(PlatformError::Status { status: 500 });
            }
            Ok(())
        })
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    async fn authenticate(&self, _credential: &Credential) -> Result<AuthToken, PlatformError> {
        let latency = self.with_state(|s| s.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.with_state(|s| {
            s.auth_calls = s.auth_calls.saturating_add(1);
            if s.failing.contains(&MockCall::Authenticate) {
                return Err(PlatformError::Unauthorized);
            }
            Ok(AuthToken(format!("token-{}", s.auth_calls)))
        })
    }

    async fn create_post(
        &self,
        token: &AuthToken,
        content: &str,
        parent: Option<&PostId>,
    ) -> Result<Response<PostRef>, PlatformError> {
        self.enter(MockCall::CreatePost, token).await?;
        let id = self.with_state(|s| {
            s.posts.push(CreatedPost {
                token: token.expose().to_owned(),
                content: content.to_owned(),
                parent: parent.cloned(),
            });
            PostId::new(format!("created-{}", s.posts.len()))
        });
        Ok(Response::new(PostRef { id }))
    }

    async fn set_engagement(
        &self,
        token: &AuthToken,
        post: &PostId,
        reaction: Reaction,
    ) -> Result<Response<()>, PlatformError> {
        self.enter(MockCall::React, token).await?;
        self.with_state(|s| s.reactions.push((post.clone(), reaction)));
        Ok(Response::new(()))
    }

    async fn follow(
        &self,
        token: &AuthToken,
        target: &TargetId,
    ) -> Result<Response<()>, PlatformError> {
        self.enter(MockCall::Follow, token).await?;
        self.with_state(|s| s.follows.push(target.clone()));
        Ok(Response::new(()))
    }

    async fn search(
        &self,
        token: &AuthToken,
        query: &str,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError> {
        self.enter(MockCall::Search, token).await?;
        let posts = self.with_state(|s| {
            s.searches.push(query.to_owned());
            s.search_by_query
                .get(query)
                .unwrap_or(&s.search_results)
                .iter()
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .cloned()
                .collect()
        });
        Ok(Response::new(posts))
    }

    async fn trending(&self, token: &AuthToken) -> Result<Response<Vec<String>>, PlatformError> {
        self.enter(MockCall::Trending, token).await?;
        Ok(Response::new(self.with_state(|s| s.trending.clone())))
    }

    async fn feed(
        &self,
        token: &AuthToken,
        kind: FeedKind,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError> {
        self.enter(MockCall::Feed, token).await?;
        let posts = self.with_state(|s| {
            s.feeds
                .get(&kind)
                .map(|posts| {
                    posts
                        .iter()
                        .take(usize::try_from(limit).unwrap_or(usize::MAX))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        });
        Ok(Response::new(posts))
    }

    async fn notifications(
        &self,
        token: &AuthToken,
    ) -> Result<Response<Vec<Notification>>, PlatformError> {
        self.enter(MockCall::Notifications, token).await?;
        Ok(Response::new(self.with_state(|s| s.notifications.clone())))
    }
}

/// Build a post.
pub fn post(id: &str, author: &str, content: &str, likes: u32, replies: u32) -> Post {
    Post {
        id: PostId::new(id),
        username: TargetId::new(author),
        content: content.to_owned(),
        likes,
        replies,
    }
}

/// Generator that always answers with the same text, or never answers.
#[derive(Debug, Clone, Default)]
pub struct StaticGenerator {
    text: Option<String>,
}

impl StaticGenerator {
    /// Always answer with `text`.
    pub fn new(text: &str) -> Self {
        Self {
            text: Some(text.to_owned()),
        }
    }

    /// Never produce text.
    pub const fn silent() -> Self {
        Self { text: None }
    }
}

#[async_trait]
impl TextGenerator for StaticGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Option<String> {
        self.text.clone()
    }
}
