//! Win digest formatting (Slack mrkdwn).

use crate::store::WinRecord;

/// Reply for a user with an empty (or absent) win sequence.
pub const EMPTY_SUMMARY: &str =
    "You haven't logged any wins yet! Use `/logthiswin` to log your first win.";

/// Render one user's digest: numbered wins in append order, each with its
/// logged-at stamp, then a total line.
pub fn win_summary(wins: &[WinRecord]) -> String {
    if wins.is_empty() {
        return EMPTY_SUMMARY.to_string();
    }

    let mut summary = String::from("🎉 *Your Wins Summary*\n\n");
    for (i, win) in wins.iter().enumerate() {
        summary.push_str(&format!(
            "{}. *{}*\n   _{}_\n\n",
            i + 1,
            win.message,
            win.timestamp
        ));
    }
    summary.push_str(&format!("Total wins: {} 🏆", wins.len()));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win(message: &str, timestamp: &str) -> WinRecord {
        WinRecord {
            message: message.to_string(),
            timestamp: timestamp.to_string(),
            channel_id: None,
            user_name: None,
        }
    }

    #[test]
    fn empty_wins_prompt_to_log_first() {
        assert_eq!(win_summary(&[]), EMPTY_SUMMARY);
    }

    #[test]
    fn single_win_numbered_from_one() {
        let summary = win_summary(&[win("shipped the importer", "2026-08-01 09:30:00")]);
        assert!(summary.starts_with("🎉 *Your Wins Summary*\n\n"));
        assert!(summary.contains("1. *shipped the importer*\n   _2026-08-01 09:30:00_\n\n"));
        assert!(summary.ends_with("Total wins: 1 🏆"));
    }

    #[test]
    fn wins_keep_append_order() {
        let summary = win_summary(&[
            win("first", "2026-08-01 09:00:00"),
            win("second", "2026-08-02 10:00:00"),
            win("third", "2026-08-03 11:00:00"),
        ]);

        let first = summary.find("1. *first*").unwrap();
        let second = summary.find("2. *second*").unwrap();
        let third = summary.find("3. *third*").unwrap();
        assert!(first < second && second < third);
        assert!(summary.ends_with("Total wins: 3 🏆"));
    }

    #[test]
    fn message_markup_is_not_escaped() {
        // Digest is mrkdwn; user text passes through verbatim.
        let summary = win_summary(&[win("fixed *that* bug", "2026-08-01 09:00:00")]);
        assert!(summary.contains("1. *fixed *that* bug*"));
    }
}
