//! Slack Web API client.
//!
//! Covers only the methods the connector needs. Slack reports most
//! failures as HTTP 200 with `{"ok": false, "error": "..."}`, so every
//! response goes through [`check_response`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::common::error::{SlackError, SlackResult};
use crate::slack::resolver::{LookupError, ProfileLookup, UserProfile};

const SLACK_API_URL: &str = "https://slack.com/api";

/// Username and icon the bot posts with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotIdentity {
    pub username: Option<String>,
    pub icon_emoji: Option<String>,
}

/// Outbound chat operations used by the dispatch layer.
#[async_trait]
pub trait ChatOutbound: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> SlackResult<()>;

    /// Post a message only `user` can see.
    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> SlackResult<()>;

    async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> SlackResult<()>;
}

#[derive(Debug, Deserialize)]
struct UsersInfoResponse {
    user: SlackUser,
}

#[derive(Debug, Deserialize)]
struct SlackUser {
    #[serde(default)]
    profile: SlackProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackProfile {
    #[serde(default)]
    display_name_normalized: Option<String>,
    #[serde(default)]
    real_name_normalized: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TeamInfoResponse {
    team: Team,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ConnectionsOpenResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_emoji: Option<&'a str>,
}

/// Slack Web API client holding both tokens.
pub struct SlackWebClient {
    client: reqwest::Client,
    base_url: String,
    bot_token: String,
    app_token: String,
    identity: BotIdentity,
}

impl SlackWebClient {
    pub fn new(bot_token: String, app_token: String, identity: BotIdentity) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: SLACK_API_URL.to_string(),
            bot_token,
            app_token,
            identity,
        }
    }

    /// Id of the workspace the bot token belongs to.
    pub async fn team_id(&self) -> SlackResult<String> {
        let response: TeamInfoResponse = self.get("team.info", &[]).await?;
        Ok(response.team.id)
    }

    /// Request a fresh Socket Mode WebSocket URL.
    pub async fn open_connection(&self) -> SlackResult<String> {
        let method = "apps.connections.open";
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.app_token)
            .send()
            .await?;
        let response: ConnectionsOpenResponse = check_response(method, response.json().await?)?;
        Ok(response.url)
    }

    /// Fetch a user's profile.
    pub async fn user_profile(&self, user_id: &str) -> SlackResult<UserProfile> {
        let response: UsersInfoResponse = self.get("users.info", &[("user", user_id)]).await?;
        let profile = response.user.profile;
        Ok(UserProfile {
            display_name_normalized: profile.display_name_normalized,
            real_name_normalized: profile.real_name_normalized,
        })
    }

    async fn get<T: DeserializeOwned>(&self, method: &str, query: &[(&str, &str)]) -> SlackResult<T> {
        debug!("Slack API call: {}", method);
        let response = self
            .client
            .get(self.url(method))
            .bearer_auth(&self.bot_token)
            .query(query)
            .send()
            .await?;
        check_response(method, response.json().await?)
    }

    async fn post<B: Serialize + ?Sized>(&self, method: &str, body: &B) -> SlackResult<()> {
        debug!("Slack API call: {}", method);
        let response = self
            .client
            .post(self.url(method))
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await?;
        check_response::<Value>(method, response.json().await?)?;
        Ok(())
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    fn message<'a>(&'a self, channel: &'a str, text: &'a str, user: Option<&'a str>) -> PostMessage<'a> {
        PostMessage {
            channel,
            text,
            user,
            username: self.identity.username.as_deref(),
            icon_emoji: self.identity.icon_emoji.as_deref(),
        }
    }
}

#[async_trait]
impl ChatOutbound for SlackWebClient {
    async fn post_message(&self, channel: &str, text: &str) -> SlackResult<()> {
        self.post("chat.postMessage", &self.message(channel, text, None)).await
    }

    async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> SlackResult<()> {
        self.post("chat.postEphemeral", &self.message(channel, text, Some(user)))
            .await
    }

    async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> SlackResult<()> {
        let body = json!({
            "channel": channel,
            "timestamp": timestamp,
            "name": name,
        });
        self.post("reactions.add", &body).await
    }
}

#[async_trait]
impl ProfileLookup for SlackWebClient {
    async fn lookup(&self, user_id: &str) -> Result<UserProfile, LookupError> {
        self.user_profile(user_id).await.map_err(|e| {
            if e.is_not_found() {
                LookupError::NotFound
            } else {
                LookupError::Other(e.to_string())
            }
        })
    }
}

/// Turn a Slack response body into `T`, or the API error it reports.
fn check_response<T: DeserializeOwned>(method: &str, body: Value) -> SlackResult<T> {
    if body.get("ok").and_then(Value::as_bool) != Some(true) {
        let error = body
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown_error")
            .to_string();
        return Err(SlackError::Api {
            method: method.to_string(),
            error,
        });
    }

    serde_json::from_value(body).map_err(|e| SlackError::MalformedResponse {
        method: method.to_string(),
        message: e.to_string(),
    })
}
