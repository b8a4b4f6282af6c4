//! Slack self-test command (`!slacktest`).
//!
//! Exercises every Slack operation the connector depends on and posts a
//! checklist of the results back to the conversation.

use tracing::{error, info};

use crate::common::CanonicalMessage;
use crate::slack::resolver::DisplayNames;
use crate::slack::web::ChatOutbound;

const SELF_TEST_COMMAND: &str = "!slacktest";

/// Whether a message asks for the self-test. Spaces and case are ignored.
pub fn is_self_test(text: &str) -> bool {
    text.replace(' ', "")
        .to_lowercase()
        .starts_with(SELF_TEST_COMMAND)
}

/// Outcome of one self-test step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn from_result<E: std::fmt::Display>(name: &'static str, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::passed(name, String::new()),
            Err(e) => {
                error!("Self-test step '{}' failed: {}", name, e);
                Self {
                    name,
                    passed: false,
                    detail: e.to_string(),
                }
            }
        }
    }

    fn passed(name: &'static str, detail: String) -> Self {
        Self {
            name,
            passed: true,
            detail,
        }
    }
}

/// Run the self-test for `message` and post the checklist.
pub async fn run_self_test(
    outbound: &dyn ChatOutbound,
    names: &dyn DisplayNames,
    message: &CanonicalMessage,
) -> Vec<CheckResult> {
    info!("Running Slack self-test for {}", message.user_id());
    let channel = message.channel_id();
    let mut results = Vec::with_capacity(4);

    results.push(CheckResult::from_result(
        "Reaction Add",
        outbound
            .add_reaction(channel, message.timestamp(), "white_check_mark")
            .await,
    ));

    // Skip the cache so the lookup itself is tested
    names.forget(message.user_id()).await;
    let display_name = names.display_name(message.user_id()).await;
    results.push(CheckResult::passed(
        "Get Display Name",
        format!("Your display name is \"{}\"", display_name),
    ));

    results.push(CheckResult::from_result(
        "Post Message",
        outbound.post_message(channel, "This is a test!").await,
    ));

    results.push(CheckResult::from_result(
        "Post Ephemeral Message",
        outbound
            .post_ephemeral(channel, message.user_id(), "This is an ephemeral chat test!")
            .await,
    ));

    match outbound.post_message(channel, &summarize(&results)).await {
        Ok(()) => info!("Self-test results: {:?}", results),
        Err(e) => error!("Failed to post self-test results ({}): {:?}", e, results),
    }

    results
}

/// Render results as one checklist line per step.
pub fn summarize(results: &[CheckResult]) -> String {
    results
        .iter()
        .map(|r| {
            let icon = if r.passed {
                ":white_check_mark:"
            } else {
                ":negative_squared_cross_mark:"
            };
            if r.detail.is_empty() {
                format!("{} *{}*", icon, r.name)
            } else {
                format!("{} *{}*: {}", icon, r.name, r.detail)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::{SlackError, SlackResult};
    use crate::common::ChannelKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSlack {
        fail_ephemeral: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChatOutbound for FakeSlack {
        async fn post_message(&self, channel: &str, text: &str) -> SlackResult<()> {
            self.calls.lock().unwrap().push(format!("post {} {}", channel, text));
            Ok(())
        }

        async fn post_ephemeral(&self, channel: &str, user: &str, text: &str) -> SlackResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("ephemeral {} {} {}", channel, user, text));
            if self.fail_ephemeral {
                return Err(SlackError::Api {
                    method: "chat.postEphemeral".to_string(),
                    error: "user_not_in_channel".to_string(),
                });
            }
            Ok(())
        }

        async fn add_reaction(&self, channel: &str, timestamp: &str, name: &str) -> SlackResult<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("react {} {} {}", channel, timestamp, name));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNames {
        forgotten: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DisplayNames for FakeNames {
        async fn display_name(&self, _user_id: &str) -> String {
            "Alice".to_string()
        }

        async fn forget(&self, user_id: &str) {
            self.forgotten.lock().unwrap().push(user_id.to_string());
        }
    }

    fn message() -> CanonicalMessage {
        CanonicalMessage::new("U1", "!slack test", "1.0", "C1", ChannelKind::Channel)
    }

    #[test]
    fn test_is_self_test() {
        assert!(is_self_test("!slacktest"));
        assert!(is_self_test("! Slack Test please"));
        assert!(is_self_test("!SLACKTEST"));
        assert!(!is_self_test("slacktest"));
        assert!(!is_self_test("the answer is !slacktest"));
    }

    #[tokio::test]
    async fn test_all_steps_pass() {
        let slack = FakeSlack::default();
        let names = FakeNames::default();

        let results = run_self_test(&slack, &names, &message()).await;

        assert!(results.iter().all(|r| r.passed));
        assert_eq!(results[1].detail, "Your display name is \"Alice\"");
        assert_eq!(*names.forgotten.lock().unwrap(), vec!["U1".to_string()]);

        let calls = slack.calls.lock().unwrap();
        assert_eq!(calls[0], "react C1 1.0 white_check_mark");
        assert_eq!(calls[1], "post C1 This is a test!");
        assert_eq!(calls[2], "ephemeral C1 U1 This is an ephemeral chat test!");
        assert!(calls[3].starts_with("post C1 :white_check_mark: *Reaction Add*\n"));
    }

    #[tokio::test]
    async fn test_failed_step_reported() {
        let slack = FakeSlack {
            fail_ephemeral: true,
            ..Default::default()
        };
        let names = FakeNames::default();

        let results = run_self_test(&slack, &names, &message()).await;

        let ephemeral = &results[3];
        assert!(!ephemeral.passed);
        assert!(ephemeral.detail.contains("user_not_in_channel"));
    }

    #[test]
    fn test_summarize() {
        let results = vec![
            CheckResult {
                name: "Reaction Add",
                passed: true,
                detail: String::new(),
            },
            CheckResult {
                name: "Post Message",
                passed: false,
                detail: "channel_not_found".to_string(),
            },
        ];

        assert_eq!(
            summarize(&results),
            ":white_check_mark: *Reaction Add*\n:negative_squared_cross_mark: *Post Message*: channel_not_found"
        );
    }
}
