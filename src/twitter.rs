//! Twitter/X v2 REST client for posting tweets and reading the signed-in user.
//!
//! The bearer credential is passed to every call and never stored on the client.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::TwitterSettings;
use crate::error::{TwitterError, TwitterResult};

const POST_FAILED: &str = "Failed to post tweet";
const USER_LOOKUP_FAILED: &str = "Failed to get Twitter user information";
const USER_FIELDS: &str = "id,name,username,profile_image_url";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateTweetRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<TweetReply>,
}

impl CreateTweetRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply: None,
        }
    }

    pub fn in_reply_to(mut self, tweet_id: impl Into<String>) -> Self {
        self.reply = Some(TweetReply {
            in_reply_to_tweet_id: tweet_id.into(),
        });
        self
    }

    pub fn reply_to_id(&self) -> Option<&str> {
        self.reply.as_ref().map(|r| r.in_reply_to_tweet_id.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TweetReply {
    pub in_reply_to_tweet_id: String,
}

#[derive(Debug, Deserialize)]
struct TwitterResponse<T> {
    data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreatedTweet {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub name: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
}

/// Where tweets are sent. The publisher only needs this one call.
#[async_trait]
pub trait TweetTransport: Send + Sync {
    async fn create_tweet(
        &self,
        credential: &str,
        request: &CreateTweetRequest,
    ) -> TwitterResult<CreatedTweet>;
}

#[derive(Debug, Clone)]
pub struct TwitterClient {
    client: Client,
    base_url: String,
}

impl TwitterClient {
    pub fn new(settings: &TwitterSettings) -> TwitterResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(format!("autothread/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the account the credential belongs to.
    #[instrument(skip(self, credential))]
    pub async fn get_me(&self, credential: &str) -> TwitterResult<TwitterUser> {
        let response: TwitterResponse<TwitterUser> = self
            .request(
                Method::GET,
                "/2/users/me",
                credential,
                None::<&()>,
                &[("user.fields", USER_FIELDS)],
                USER_LOOKUP_FAILED,
            )
            .await?;
        Ok(response.data)
    }

    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        endpoint: &str,
        credential: &str,
        body: Option<&B>,
        query: &[(&str, &str)],
        fallback_message: &str,
    ) -> TwitterResult<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!(%method, endpoint, "Making Twitter API request");

        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(credential)
            .header("Content-Type", "application/json");

        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req.send().await?;
        handle_response(response, fallback_message).await
    }
}

#[async_trait]
impl TweetTransport for TwitterClient {
    #[instrument(skip(self, credential, request), fields(reply_to = ?request.reply_to_id()))]
    async fn create_tweet(
        &self,
        credential: &str,
        request: &CreateTweetRequest,
    ) -> TwitterResult<CreatedTweet> {
        let response: TwitterResponse<CreatedTweet> = self
            .request(
                Method::POST,
                "/2/tweets",
                credential,
                Some(request),
                &[],
                POST_FAILED,
            )
            .await?;
        Ok(response.data)
    }
}

/// `fallback_message` is used when the error body carries no message.
async fn handle_response<T: DeserializeOwned>(
    response: Response,
    fallback_message: &str,
) -> TwitterResult<T> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = seconds_until_reset(response.headers()).unwrap_or(60);
        warn!(retry_after, "Twitter rate limit hit");
        return Err(TwitterError::RateLimited { retry_after });
    }

    let retry_after = seconds_until_reset(response.headers());
    let bytes = response.bytes().await?;

    if status.is_success() {
        return serde_json::from_slice(&bytes).map_err(TwitterError::from);
    }

    let message = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|body| extract_error_message(&body))
        .unwrap_or_else(|| fallback_message.to_string());

    warn!(status = status.as_u16(), %message, "Twitter API returned an error");
    Err(TwitterError::Api {
        status: status.as_u16(),
        message,
        retry_after,
    })
}

/// Pull a message out of an error body: `errors[0].message`,
/// `errors[0].detail`, `detail`, then `title`.
pub fn extract_error_message(body: &serde_json::Value) -> Option<String> {
    let text = |v: Option<&serde_json::Value>| {
        v.and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(first) = body
        .get("errors")
        .and_then(serde_json::Value::as_array)
        .and_then(|errors| errors.first())
    {
        if let Some(message) = text(first.get("message")).or_else(|| text(first.get("detail"))) {
            return Some(message);
        }
    }

    text(body.get("detail")).or_else(|| text(body.get("title")))
}

fn seconds_until_reset(headers: &HeaderMap) -> Option<u64> {
    let reset: u64 = headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())?;
    let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
    reset.checked_sub(now)
}
