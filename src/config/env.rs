//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `SLACK_APP_TOKEN` / `SLACK_BOT_TOKEN` - Slack credentials
//! - `TRIVIA_CHANNEL` - Channel id where trivia is played
//! - `TRIVIA_DATABASE_PATH` - Engine database path
//! - `ADMIN_UID` - Slack user id of the trivia admin
//! - `BOT_DISPLAY_NAME` / `BOT_ICON_EMOJI` - How the bot posts
//! - `DISPLAY_NAME_CACHE_EXPIRE_SECONDS` - Display name cache TTL
//! - `MIN_SECONDS_BEFORE_NEW`, `MIN_MATCHING_CHARACTERS` - Engine tuning
//! - `SCOREBOARD_SCHEDULE` - JSON list of scoreboard times
//! - `SCOREBOARD_SHOW_INCORRECT` / `SCOREBOARD_SHOW_PERCENT` - `0` or `1`
//! - `TRIVIA_ENGINE_COMMAND` - Engine executable

use std::env;
use std::str::FromStr;

use tracing::warn;

use crate::config::types::Config;

/// Apply environment variable overrides to a config.
///
/// This allows tokens to be provided via environment variables instead
/// of the config file.
pub fn apply_env_overrides(config: Config) -> Config {
    apply_overrides_from(config, |key| env::var(key).ok())
}

/// Apply overrides using an arbitrary variable lookup.
pub fn apply_overrides_from<F>(mut config: Config, lookup: F) -> Config
where
    F: Fn(&str) -> Option<String>,
{
    // Slack credentials
    if let Some(token) = lookup("SLACK_APP_TOKEN") {
        config.slack.app_token = token;
    }
    if let Some(token) = lookup("SLACK_BOT_TOKEN") {
        config.slack.bot_token = token;
    }

    // Trivia settings
    if let Some(channel) = lookup("TRIVIA_CHANNEL") {
        config.trivia.channel = channel;
    }
    if let Some(path) = lookup("TRIVIA_DATABASE_PATH") {
        config.trivia.database_path = path;
    }
    if let Some(uid) = lookup("ADMIN_UID") {
        config.trivia.admin_uid = Some(uid);
    }
    if let Some(seconds) = parse_var(&lookup, "MIN_SECONDS_BEFORE_NEW") {
        config.trivia.min_seconds_before_new = seconds;
    }
    if let Some(chars) = parse_var(&lookup, "MIN_MATCHING_CHARACTERS") {
        config.trivia.min_matching_characters = chars;
    }
    if let Some(raw) = lookup("SCOREBOARD_SCHEDULE") {
        match serde_json::from_str(&raw) {
            Ok(schedule) => config.trivia.scoreboard_schedule = schedule,
            Err(e) => warn!("Ignoring SCOREBOARD_SCHEDULE: {}", e),
        }
    }
    if let Some(flag) = parse_flag(&lookup, "SCOREBOARD_SHOW_INCORRECT") {
        config.trivia.scoreboard_show_incorrect = flag;
    }
    if let Some(flag) = parse_flag(&lookup, "SCOREBOARD_SHOW_PERCENT") {
        config.trivia.scoreboard_show_percent = flag;
    }

    // Bot presentation
    if let Some(name) = lookup("BOT_DISPLAY_NAME") {
        config.bot.display_name = Some(name);
    }
    if let Some(emoji) = lookup("BOT_ICON_EMOJI") {
        config.bot.icon_emoji = Some(emoji);
    }

    if let Some(seconds) = parse_var(&lookup, "DISPLAY_NAME_CACHE_EXPIRE_SECONDS") {
        config.display_names.cache_expire_seconds = seconds;
    }

    if let Some(command) = lookup("TRIVIA_ENGINE_COMMAND") {
        config.engine.command = command;
    }

    config
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring {}='{}': {}", key, raw, e);
            None
        }
    }
}

/// Flags are written as integers, any non-zero value is true.
fn parse_flag<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    parse_var::<F, i64>(lookup, key).map(|v| v != 0)
}

/// Get the config file path from environment or use default.
///
/// Checks `CONFIG_FILE_PATH` environment variable, otherwise returns "config.json".
pub fn get_config_path() -> String {
    env::var("CONFIG_FILE_PATH").unwrap_or_else(|_| "config.json".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_no_vars_leaves_config_unchanged() {
        let mut config = Config::default();
        config.slack.bot_token = "xoxb-original".to_string();

        let result = apply_overrides_from(config, lookup_from(&[]));
        assert_eq!(result.slack.bot_token, "xoxb-original");
        assert_eq!(result.display_names.cache_expire_seconds, 21600);
    }

    #[test]
    fn test_overrides_applied() {
        let result = apply_overrides_from(
            Config::default(),
            lookup_from(&[
                ("SLACK_APP_TOKEN", "xapp-env"),
                ("SLACK_BOT_TOKEN", "xoxb-env"),
                ("TRIVIA_CHANNEL", "C777"),
                ("ADMIN_UID", "U1"),
                ("BOT_ICON_EMOJI", ":question:"),
                ("DISPLAY_NAME_CACHE_EXPIRE_SECONDS", "120"),
                ("MIN_MATCHING_CHARACTERS", "4"),
                ("SCOREBOARD_SCHEDULE", r#"["17:00", "23:00"]"#),
                ("SCOREBOARD_SHOW_INCORRECT", "1"),
                ("SCOREBOARD_SHOW_PERCENT", "0"),
            ]),
        );

        assert_eq!(result.slack.app_token, "xapp-env");
        assert_eq!(result.slack.bot_token, "xoxb-env");
        assert_eq!(result.trivia.channel, "C777");
        assert_eq!(result.trivia.admin_uid.as_deref(), Some("U1"));
        assert_eq!(result.bot.icon_emoji.as_deref(), Some(":question:"));
        assert_eq!(result.display_names.cache_expire_seconds, 120);
        assert_eq!(result.trivia.min_matching_characters, 4);
        assert_eq!(result.trivia.scoreboard_schedule.len(), 2);
        assert!(result.trivia.scoreboard_show_incorrect);
        assert!(!result.trivia.scoreboard_show_percent);
    }

    #[test]
    fn test_unparseable_values_ignored() {
        let result = apply_overrides_from(
            Config::default(),
            lookup_from(&[
                ("DISPLAY_NAME_CACHE_EXPIRE_SECONDS", "six hours"),
                ("SCOREBOARD_SCHEDULE", "not json"),
                ("SCOREBOARD_SHOW_PERCENT", "yes"),
            ]),
        );

        assert_eq!(result.display_names.cache_expire_seconds, 21600);
        assert!(result.trivia.scoreboard_schedule.is_empty());
        assert!(!result.trivia.scoreboard_show_percent);
    }
}
