use std::thread;
use std::time::Duration;

use chrono::Local;
use shorts_core::{ActivityEntry, BatchState};
use shorts_engine::{BatchHandle, ItemReport, ProgressSnapshot, ProgressStore};

const RECENT_ACTIVITY: usize = 20;

/// Print new activity and progress until the batch finishes, then return its final state.
pub(crate) fn watch(
    progress: &ProgressStore,
    handle: BatchHandle,
    poll: Duration,
) -> anyhow::Result<BatchState> {
    let id = handle.id();
    let mut last_seen: Option<ActivityEntry> = None;
    loop {
        let finished = handle.is_finished();
        if let Some(snapshot) = progress.snapshot(id, RECENT_ACTIVITY) {
            for entry in unseen(&snapshot.recent_activity, last_seen.as_ref()) {
                let at = entry.timestamp.with_timezone(&Local);
                println!("{}  {}", at.format("%H:%M:%S"), entry.message);
            }
            if let Some(newest) = snapshot.recent_activity.first() {
                last_seen = Some(newest.clone());
            }
            if !finished {
                println!("{}", progress_line(&snapshot));
            }
        }
        if finished {
            break;
        }
        thread::sleep(poll);
    }
    Ok(handle.wait()?)
}

/// Entries newer than `last_seen`, oldest first.
fn unseen<'a>(
    recent: &'a [ActivityEntry],
    last_seen: Option<&ActivityEntry>,
) -> impl Iterator<Item = &'a ActivityEntry> {
    let fresh = recent
        .iter()
        .position(|entry| Some(entry) == last_seen)
        .unwrap_or(recent.len());
    recent[..fresh].iter().rev()
}

fn progress_line(snapshot: &ProgressSnapshot) -> String {
    let state = &snapshot.state;
    let mut line = format!(
        "[{}] {}/{} ({:.1}%) ok {} failed {}",
        state.status, state.processed, state.total, snapshot.percent, state.successful, state.failed
    );
    if let Some(eta) = snapshot.estimated_completion {
        line.push_str(&format!(" eta {}", eta.with_timezone(&Local).format("%H:%M:%S")));
    }
    line
}

pub(crate) fn print_summary(state: &BatchState, items: &[ItemReport]) {
    println!(
        "batch {}: {} succeeded, {} failed of {}",
        state.status, state.successful, state.failed, state.total
    );
    for item in items {
        let outcome = &item.outcome;
        match (&outcome.published, &outcome.failure) {
            (Some(published), _) => println!("  ok      {} -> {}", outcome.url, published.url),
            (None, Some(failure)) => println!(
                "  failed  {} at {} ({:?}, {} attempts): {}",
                outcome.url, failure.stage, failure.class, outcome.attempts, failure.message
            ),
            (None, None) => println!("  {}  {}", outcome.status, outcome.url),
        }
    }
}
