//! HTTP implementation of [`PlatformClient`].
//!
//! The platform's JSON is loosely shaped: lists arrive bare or wrapped in a
//! named field, trending topics arrive as strings or objects, and tokens
//! arrive under either of two names. Decoding is therefore done on
//! [`serde_json::Value`] by small pure functions that skip what they cannot
//! read instead of failing the whole response.

use async_trait::async_trait;
use narrative_limiter::RateLimitHeaders;
use narrative_types::{
    AuthToken, Credential, Notification, Post, PostId, PostRef, TargetId,
};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::PlatformConfig;
use crate::error::PlatformError;
use crate::platform::{FeedKind, PlatformClient, Reaction, Response};

/// Platform client over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    client: reqwest::Client,
    base_url: String,
}

/// Which statuses besides 2xx a call treats as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accept {
    Success,
    SuccessOrConflict,
}

impl HttpPlatformClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &PlatformConfig) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| PlatformError::Transport(format!("client build failed: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and classify its status.
    async fn send(
        &self,
        request: RequestBuilder,
        accept: Accept,
    ) -> Result<(RateLimitHeaders, reqwest::Response), PlatformError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Timeout
            } else {
                PlatformError::Transport(e.to_string())
            }
        })?;

        let headers = RateLimitHeaders::from_pairs(
            response
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        );

        let status = response.status();
        classify(status, accept, headers)?;
        Ok((headers, response))
    }

    async fn send_json(
        &self,
        request: RequestBuilder,
    ) -> Result<(RateLimitHeaders, Value), PlatformError> {
        let (headers, response) = self.send(request, Accept::Success).await?;
        let body = response
            .json::<Value>()
            .await
            .map_err(|e| PlatformError::Decode(e.to_string()))?;
        Ok((headers, body))
    }
}

/// Map a status onto the platform error taxonomy.
fn classify(
    status: StatusCode,
    accept: Accept,
    headers: RateLimitHeaders,
) -> Result<(), PlatformError> {
    if status.is_success() {
        return Ok(());
    }
    match status {
        StatusCode::CONFLICT if accept == Accept::SuccessOrConflict => Ok(()),
        StatusCode::TOO_MANY_REQUESTS => Err(PlatformError::RateLimited { headers }),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(PlatformError::Unauthorized),
        other => Err(PlatformError::Status {
            status: other.as_u16(),
        }),
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn authenticate(&self, credential: &Credential) -> Result<AuthToken, PlatformError> {
        let request = self.client.post(self.url("/auth/login")).json(&serde_json::json!({
            "username": credential.username,
            "password": credential.password,
        }));
        let (_, body) = self.send_json(request).await?;
        decode_token(&body)
            .map(AuthToken)
            .ok_or_else(|| PlatformError::Decode("login response carried no token".to_owned()))
    }

    async fn create_post(
        &self,
        token: &AuthToken,
        content: &str,
        parent: Option<&PostId>,
    ) -> Result<Response<PostRef>, PlatformError> {
        let mut payload = serde_json::json!({ "content": content });
        if let (Some(parent), Some(map)) = (parent, payload.as_object_mut()) {
            map.insert("parent_id".to_owned(), Value::String(parent.as_str().to_owned()));
        }
        let request = self
            .client
            .post(self.url("/posts"))
            .bearer_auth(token.expose())
            .json(&payload);
        let (headers, body) = self.send_json(request).await?;
        let id = decode_post_id(&body)
            .ok_or_else(|| PlatformError::Decode("post response carried no id".to_owned()))?;
        debug!(post_id = %id, reply = parent.is_some(), "post created");
        Ok(Response::new(PostRef { id }).with_headers(headers))
    }

    async fn set_engagement(
        &self,
        token: &AuthToken,
        post: &PostId,
        reaction: Reaction,
    ) -> Result<Response<()>, PlatformError> {
        let path = format!("/posts/{}/{}", post.as_str(), reaction.as_str());
        let request = self.client.post(self.url(&path)).bearer_auth(token.expose());
        let (headers, _) = self.send(request, Accept::SuccessOrConflict).await?;
        Ok(Response::new(()).with_headers(headers))
    }

    async fn follow(
        &self,
        token: &AuthToken,
        target: &TargetId,
    ) -> Result<Response<()>, PlatformError> {
        let path = format!("/users/{}/follow", target.as_str());
        let request = self.client.post(self.url(&path)).bearer_auth(token.expose());
        let (headers, _) = self.send(request, Accept::Success).await?;
        Ok(Response::new(()).with_headers(headers))
    }

    async fn search(
        &self,
        token: &AuthToken,
        query: &str,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError> {
        let request = self
            .client
            .get(self.url("/search"))
            .bearer_auth(token.expose())
            .query(&[("q", query.to_owned()), ("limit", limit.to_string())]);
        let (headers, body) = self.send_json(request).await?;
        Ok(Response::new(decode_posts(&body)).with_headers(headers))
    }

    async fn trending(&self, token: &AuthToken) -> Result<Response<Vec<String>>, PlatformError> {
        let request = self
            .client
            .get(self.url("/trending"))
            .bearer_auth(token.expose());
        let (headers, body) = self.send_json(request).await?;
        Ok(Response::new(decode_topics(&body)).with_headers(headers))
    }

    async fn feed(
        &self,
        token: &AuthToken,
        kind: FeedKind,
        limit: u32,
    ) -> Result<Response<Vec<Post>>, PlatformError> {
        let path = format!("/feed/{}", kind.as_str());
        let request = self
            .client
            .get(self.url(&path))
            .bearer_auth(token.expose())
            .query(&[("limit", limit.to_string())]);
        let (headers, body) = self.send_json(request).await?;
        Ok(Response::new(decode_posts(&body)).with_headers(headers))
    }

    async fn notifications(
        &self,
        token: &AuthToken,
    ) -> Result<Response<Vec<Notification>>, PlatformError> {
        let request = self
            .client
            .get(self.url("/notifications"))
            .bearer_auth(token.expose());
        let (headers, body) = self.send_json(request).await?;
        Ok(Response::new(decode_notifications(&body)).with_headers(headers))
    }
}

// ---------------------------------------------------------------------------
// Tolerant decoding
// ---------------------------------------------------------------------------

/// The list at `body`, or at `body[field]`.
fn list_at<'a>(body: &'a Value, field: &str) -> &'a [Value] {
    body.as_array()
        .or_else(|| body.get(field).and_then(Value::as_array))
        .map_or(&[], Vec::as_slice)
}

/// Decode every item of a list that has the expected shape.
fn decode_items<'a, T: Deserialize<'a>>(items: &'a [Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| T::deserialize(item).ok())
        .collect()
}

fn decode_posts(body: &Value) -> Vec<Post> {
    decode_items(list_at(body, "posts"))
}

fn decode_notifications(body: &Value) -> Vec<Notification> {
    decode_items(list_at(body, "notifications"))
}

fn decode_topics(body: &Value) -> Vec<String> {
    let items = if body.is_array() {
        list_at(body, "")
    } else if body.get("trending").is_some() {
        list_at(body, "trending")
    } else {
        list_at(body, "topics")
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(topic) => Some(topic.clone()),
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("topic"))
                .and_then(Value::as_str)
                .map(ToOwned::to_owned),
            _ => None,
        })
        .collect()
}

fn decode_token(body: &Value) -> Option<String> {
    body.get("token")
        .or_else(|| body.get("access_token"))
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .map(ToOwned::to_owned)
}

/// Post id from `{"id": ..}` or `{"post": {"id": ..}}`; numeric ids are accepted.
fn decode_post_id(body: &Value) -> Option<PostId> {
    let id = body
        .get("id")
        .or_else(|| body.get("post").and_then(|post| post.get("id")))?;
    match id {
        Value::String(id) => Some(PostId::new(id.clone())),
        Value::Number(id) => Some(PostId::new(id.to_string())),
        _ => None,
    }
}
