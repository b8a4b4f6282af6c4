//! Configuration type definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub slack: SlackConfig,
    pub trivia: TriviaConfig,
    pub bot: BotConfig,
    pub display_names: DisplayNameConfig,
    pub engine: EngineConfig,
}

/// Slack credentials.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// App-level token (`xapp-...`) used to open Socket Mode connections.
    pub app_token: String,
    /// Bot token (`xoxb-...`) used for Web API calls.
    pub bot_token: String,
}

/// Game settings. Everything except `channel` is forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TriviaConfig {
    /// The single group conversation where trivia is played.
    #[serde(skip_serializing)]
    pub channel: String,
    pub database_path: String,
    pub admin_uid: Option<String>,
    pub min_seconds_before_new: u64,
    pub scoreboard_schedule: Vec<serde_json::Value>,
    pub min_matching_characters: u32,
    pub scoreboard_show_incorrect: bool,
    pub scoreboard_show_percent: bool,
}

impl Default for TriviaConfig {
    fn default() -> Self {
        Self {
            channel: String::new(),
            database_path: "trivia.db".to_string(),
            admin_uid: None,
            min_seconds_before_new: 0,
            scoreboard_schedule: Vec::new(),
            min_matching_characters: 5,
            scoreboard_show_incorrect: false,
            scoreboard_show_percent: false,
        }
    }
}

/// How the bot presents itself when posting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub display_name: Option<String>,
    pub icon_emoji: Option<String>,
}

/// Display name cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayNameConfig {
    pub cache_expire_seconds: u64,
}

impl Default for DisplayNameConfig {
    fn default() -> Self {
        Self {
            cache_expire_seconds: 60 * 60 * 6,
        }
    }
}

impl DisplayNameConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_expire_seconds)
    }
}

/// External trivia engine process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "trivia-core".to_string(),
            args: Vec::new(),
        }
    }
}
