//! Question formatting for display.
//!
//! Renders a finished question as three lines of Slack mrkdwn:
//! the answer (and winner), the clue metadata, and the quoted clue.

use crate::common::QuestionRecord;
use crate::slack::DisplayNames;

/// Format a question record for posting to the trivia channel.
///
/// The winner's id is resolved through `names`, which never fails, so
/// formatting always produces output.
pub async fn format_question(record: &QuestionRecord, names: &dyn DisplayNames) -> String {
    let line1 = match &record.winning_user {
        Some(user) => {
            let username = names.display_name(&user.user_id).await;
            format!(
                "Correct: *{}* -- {} (today: {} #{})",
                record.winning_answer,
                username,
                group_thousands(user.score),
                user.rank
            )
        }
        None => format!("Answer: *{}*", record.winning_answer),
    };

    let mut line2 = format!(
        "({}) *{}* for *{}*",
        record.year, record.category, record.value
    );
    if let Some(comment) = record.comment.as_deref().filter(|c| !c.is_empty()) {
        line2.push_str(&format!(" _{}_", comment));
    }

    let line3 = format!(">{}", record.question_text);

    format!("{}\n{}\n{}", line1, line2, line3)
}

/// Wrap engine text in a code block.
pub fn pre_format(text: &str) -> String {
    format!("```{}```", text)
}

/// Render an integer with `,` between groups of three digits.
pub fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);

    if value < 0 {
        grouped.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}
