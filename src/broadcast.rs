//! Summary fan-out: one digest DM per user with at least one win.
//!
//! Works from a log snapshot so no store lock is held across network calls.
//! Failures are per-user: one bad recipient never blocks the rest.

use crate::notify::Notifier;
use crate::store::WinLog;
use crate::summary::win_summary;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Users with a non-empty win sequence.
    pub attempted: usize,
    /// Users whose DM actually went through.
    pub notified: usize,
}

pub async fn send_summaries(log: &WinLog, notifier: &dyn Notifier) -> BroadcastOutcome {
    let mut outcome = BroadcastOutcome::default();
    for (user_id, wins) in log {
        if wins.is_empty() {
            continue;
        }
        outcome.attempted += 1;
        match notifier.send_dm(user_id, &win_summary(wins)).await {
            Ok(()) => {
                outcome.notified += 1;
                tracing::info!("broadcast: summary sent to {user_id}");
            }
            Err(e) => {
                tracing::warn!("broadcast: failed to send summary to {user_id}: {e}");
            }
        }
    }
    outcome
}
