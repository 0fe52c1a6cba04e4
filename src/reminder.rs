//! Reminder scheduler: the hour-gated idempotent sweep and the manual
//! "send now" path.
//!
//! Every schedulable item has two derived windows, day-before and day-of,
//! each markable as sent exactly once via a persisted timestamp on the item.
//! The sent markers are the sole idempotence guard: re-running the sweep
//! within the same trigger hour cannot double-send, and a crash between
//! dispatch and mark is repaired by re-delivery on the next sweep
//! (at-least-once, never at-most-zero).

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use redb::ReadableTable;
use serde::Serialize;

use crate::constants::LOCAL_UTC_OFFSET_HOURS;
use crate::db::{self, tables, Db};
use crate::error::Result;
use crate::linking;
use crate::models::{AccountRecord, PlanItemRecord};
use crate::notify::{Notifier, ReminderNote};

/// One of the two reminder windows of a schedulable item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    DayBefore,
    DayOf,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Window::DayBefore => "day_before",
            Window::DayOf => "day_of",
        }
    }
}

/// Outcome of one sweep invocation
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// False when the sweep was invoked outside its trigger hour and no-oped
    pub ran: bool,
    /// Eligible (item, window) pairs examined
    pub scanned: u64,
    /// Windows dispatched to at least one target and marked sent
    pub sent: u64,
    /// Windows where dispatch or marking failed (retried next sweep)
    pub failed: u64,
    /// Windows skipped because no target has a delivery endpoint configured
    /// (marker left unset, so they stay eligible)
    pub skipped_no_endpoint: u64,
}

/// The fixed reference timezone for all calendar-day math (UTC+9)
fn local_offset() -> FixedOffset {
    FixedOffset::east_opt(LOCAL_UTC_OFFSET_HOURS * 3600).expect("valid fixed offset")
}

/// Calendar date of a Unix timestamp in the reference timezone
pub fn local_date(timestamp: i64) -> NaiveDate {
    DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_else(Utc::now)
        .with_timezone(&local_offset())
        .date_naive()
}

/// Calendar-day difference between a due timestamp and "now":
/// +1 means due tomorrow, 0 means due today
pub fn day_difference(due_at: i64, now: DateTime<Utc>) -> i64 {
    let today = now.with_timezone(&local_offset()).date_naive();
    (local_date(due_at) - today).num_days()
}

/// An (item, window) pair whose trigger has arrived and is not yet marked sent
#[derive(Debug, Clone)]
struct DueWindow {
    item_id: String,
    item: PlanItemRecord,
    window: Window,
}

impl DueWindow {
    fn note(&self) -> ReminderNote {
        ReminderNote {
            item_id: self.item_id.clone(),
            title: self.item.title.clone(),
            category: self.item.category.clone(),
            due_date: self.item.due_at.map(local_date).unwrap_or_default().to_string(),
            window: self.window.as_str().to_string(),
        }
    }
}

/// Scan all items for windows due at `now`.
///
/// A record can contribute both windows on the same scan; items of
/// soft-deleted owners are skipped.
fn collect_due_windows(db: &Db, now: DateTime<Utc>) -> Result<Vec<DueWindow>> {
    let read_txn = db.begin_read()?;
    let items = read_txn.open_table(tables::ITEMS)?;
    let accounts = read_txn.open_table(tables::ACCOUNTS)?;

    let mut due = Vec::new();
    for entry in items.iter()? {
        let (key, value) = entry?;
        let item: PlanItemRecord = db::decode(value.value())?;

        if !item.remind_enabled {
            continue;
        }
        let due_at = match item.due_at {
            Some(due_at) => due_at,
            None => continue,
        };

        let owner: Option<AccountRecord> = accounts
            .get(item.owner_id.as_str())?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?;
        if !owner.map_or(false, |o| o.is_active()) {
            continue;
        }

        let diff = day_difference(due_at, now);
        if diff == 1 && item.reminded_day_before_at.is_none() {
            due.push(DueWindow {
                item_id: key.value().to_string(),
                item: item.clone(),
                window: Window::DayBefore,
            });
        }
        if diff == 0 && item.reminded_day_of_at.is_none() {
            due.push(DueWindow {
                item_id: key.value().to_string(),
                item,
                window: Window::DayOf,
            });
        }
    }
    Ok(due)
}

/// Delivery targets for a record: the owner's visible-account set, filtered to
/// accounts with a configured webhook endpoint. Returns (account_id, url).
fn delivery_targets(db: &Db, owner_id: &str) -> Result<Vec<(String, String)>> {
    let visible = linking::resolve_visible_accounts(db, owner_id)?;

    let read_txn = db.begin_read()?;
    let accounts = read_txn.open_table(tables::ACCOUNTS)?;

    let mut targets = Vec::new();
    for account_id in visible {
        let record: Option<AccountRecord> = accounts
            .get(account_id.as_str())?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?;
        if let Some(record) = record {
            if record.is_active() {
                if let Some(url) = record.webhook_url {
                    targets.push((account_id, url));
                }
            }
        }
    }
    Ok(targets)
}

/// Persist a window's sent marker. A marker already set is left untouched.
pub fn mark_window_sent(db: &Db, item_id: &str, window: Window, now: i64) -> Result<()> {
    let write_txn = db.begin_write()?;
    {
        let mut items = write_txn.open_table(tables::ITEMS)?;
        let record: Option<PlanItemRecord> = items
            .get(item_id)?
            .map(|bytes| db::decode(bytes.value()))
            .transpose()?;
        if let Some(mut record) = record {
            let marker = match window {
                Window::DayBefore => &mut record.reminded_day_before_at,
                Window::DayOf => &mut record.reminded_day_of_at,
            };
            if marker.is_none() {
                *marker = Some(now);
                items.insert(item_id, db::encode(&record)?.as_slice())?;
            }
        }
    }
    write_txn.commit()?;
    Ok(())
}

/// Deliver a note to every target; one failure does not block the others.
/// Returns true if at least one target received it.
async fn dispatch(notifier: &dyn Notifier, targets: &[(String, String)], note: &ReminderNote) -> bool {
    let mut delivered = false;
    for (account_id, url) in targets {
        match notifier.deliver(url, note).await {
            Ok(()) => delivered = true,
            Err(e) => {
                tracing::warn!(
                    "Reminder delivery to account {} failed: {}",
                    account_id,
                    e
                );
            }
        }
    }
    delivered
}

/// Time-triggered sweep over all schedulable records.
///
/// No-ops outside `sweep_hour` (reference timezone) rather than resetting any
/// state. Within the hour it dispatches each due window and sets the sent
/// marker only after at least one target received the notification. Failures
/// for one record never abort processing of the others.
pub async fn run_sweep(
    db: &Db,
    notifier: &dyn Notifier,
    sweep_hour: u32,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    let local_hour = now.with_timezone(&local_offset()).hour();
    if local_hour != sweep_hour {
        tracing::debug!(
            "Sweep invoked at local hour {} (trigger hour {}), no-op",
            local_hour,
            sweep_hour
        );
        return Ok(report);
    }
    report.ran = true;

    let scan_db = db.clone();
    let due = tokio::task::spawn_blocking(move || collect_due_windows(&scan_db, now)).await??;
    report.scanned = due.len() as u64;

    for due_window in due {
        let targets_db = db.clone();
        let owner_id = due_window.item.owner_id.clone();
        let targets =
            match tokio::task::spawn_blocking(move || delivery_targets(&targets_db, &owner_id))
                .await?
            {
                Ok(targets) => targets,
                Err(e) => {
                    tracing::error!(
                        "Failed to resolve targets for item {}: {}",
                        due_window.item_id,
                        e
                    );
                    report.failed += 1;
                    continue;
                }
            };

        if targets.is_empty() {
            // No endpoint anywhere: leave the marker unset so the window stays
            // eligible once an endpoint is configured
            tracing::info!(
                "No delivery endpoint for item {} ({}), skipping",
                due_window.item_id,
                due_window.window.as_str()
            );
            report.skipped_no_endpoint += 1;
            continue;
        }

        let note = due_window.note();
        if !dispatch(notifier, &targets, &note).await {
            report.failed += 1;
            continue;
        }

        let mark_db = db.clone();
        let item_id = due_window.item_id.clone();
        let window = due_window.window;
        match tokio::task::spawn_blocking(move || {
            mark_window_sent(&mark_db, &item_id, window, now.timestamp())
        })
        .await?
        {
            Ok(()) => {
                tracing::info!(
                    "Reminder sent for item {} ({})",
                    due_window.item_id,
                    due_window.window.as_str()
                );
                report.sent += 1;
            }
            Err(e) => {
                // Dispatched but not marked; the next sweep re-delivers
                tracing::error!(
                    "Failed to mark item {} as sent: {}",
                    due_window.item_id,
                    e
                );
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// User-triggered "send now": dispatch reminders for the caller's visible
/// records due today or tomorrow, regardless of sent-marker state.
///
/// This path never reads or writes the markers, so it can be invoked
/// repeatedly without affecting the automatic sweep's idempotence.
pub async fn manual_send(
    db: &Db,
    notifier: &dyn Notifier,
    caller: &str,
    now: DateTime<Utc>,
) -> Result<u64> {
    let scan_db = db.clone();
    let caller_owned = caller.to_string();
    let (rows, targets) = tokio::task::spawn_blocking(move || -> Result<_> {
        let owners = linking::resolve_visible_accounts(&scan_db, &caller_owned)?;
        let rows = crate::items::list_items(&scan_db, &owners, None)?;
        let targets = delivery_targets(&scan_db, &caller_owned)?;
        Ok((rows, targets))
    })
    .await??;

    if targets.is_empty() {
        tracing::info!("Manual send for {}: no delivery endpoint configured", caller);
        return Ok(0);
    }

    let mut sent = 0u64;
    for (item_id, item) in rows {
        let due_at = match item.due_at {
            Some(due_at) => due_at,
            None => continue,
        };
        let window = match day_difference(due_at, now) {
            1 => Window::DayBefore,
            0 => Window::DayOf,
            _ => continue,
        };

        let due_window = DueWindow {
            item_id,
            item,
            window,
        };
        if dispatch(notifier, &targets, &due_window.note()).await {
            sent += 1;
        }
    }

    tracing::info!("Manual send for {}: {} reminders dispatched", caller, sent);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::{create_item, NewItem};
    use crate::notify::RecordingNotifier;
    use chrono::TimeZone;
    use tempfile::TempDir;

    const SWEEP_HOUR: u32 = 9;

    fn test_db() -> (TempDir, Db) {
        let temp_dir = TempDir::new().unwrap();
        let db = crate::db::open_database(temp_dir.path().join("test.db")).unwrap();
        (temp_dir, db)
    }

    fn register(db: &Db, id: &str, webhook: Option<&str>) {
        let write_txn = db.begin_write().unwrap();
        {
            let mut accounts = write_txn.open_table(tables::ACCOUNTS).unwrap();
            let mut record = AccountRecord::new(0);
            record.webhook_url = webhook.map(|s| s.to_string());
            accounts
                .insert(id, db::encode(&record).unwrap().as_slice())
                .unwrap();
        }
        write_txn.commit().unwrap();
    }

    fn set_webhook(db: &Db, id: &str, webhook: &str) {
        let write_txn = db.begin_write().unwrap();
        {
            let mut accounts = write_txn.open_table(tables::ACCOUNTS).unwrap();
            let mut record: AccountRecord =
                db::decode(accounts.get(id).unwrap().unwrap().value()).unwrap();
            record.webhook_url = Some(webhook.to_string());
            accounts
                .insert(id, db::encode(&record).unwrap().as_slice())
                .unwrap();
        }
        write_txn.commit().unwrap();
    }

    fn get_item(db: &Db, item_id: &str) -> PlanItemRecord {
        let read_txn = db.begin_read().unwrap();
        let items = read_txn.open_table(tables::ITEMS).unwrap();
        db::decode(items.get(item_id).unwrap().unwrap().value()).unwrap()
    }

    /// 2025-06-10 00:00 UTC = 09:00 KST, inside the default trigger hour
    fn trigger_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap()
    }

    fn due_item(db: &Db, owner: &str, due_at: i64) -> String {
        let new = NewItem {
            title: "venue visit".to_string(),
            category: "wedding".to_string(),
            due_at: Some(due_at),
            remind_enabled: true,
        };
        let (id, _) = create_item(db, owner, new, trigger_now().timestamp()).unwrap();
        id
    }

    #[test]
    fn test_day_difference_uses_local_calendar_days() {
        // 2025-06-10 14:59 UTC is 23:59 on the 10th locally;
        // 2025-06-10 15:00 UTC is 00:00 on the 11th locally
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 14, 59, 0).unwrap();
        let due_just_past_local_midnight = Utc
            .with_ymd_and_hms(2025, 6, 10, 15, 0, 0)
            .unwrap()
            .timestamp();
        assert_eq!(day_difference(due_just_past_local_midnight, now), 1);
        assert_eq!(day_difference(now.timestamp(), now), 0);
    }

    #[tokio::test]
    async fn test_sweep_outside_trigger_hour_noops() {
        let (_dir, db) = test_db();
        register(&db, "aaa", Some("https://hooks.test/a"));
        let item_id = due_item(&db, "aaa", trigger_now().timestamp() + 86_400);

        // 13:00 local, trigger hour is 9
        let off_hour = Utc.with_ymd_and_hms(2025, 6, 10, 4, 0, 0).unwrap();
        let notifier = RecordingNotifier::new();
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, off_hour).await.unwrap();

        assert!(!report.ran);
        assert_eq!(report.sent, 0);
        assert_eq!(notifier.call_count(), 0);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_none());
    }

    #[tokio::test]
    async fn test_sweep_day_before_is_idempotent_within_hour() {
        let (_dir, db) = test_db();
        register(&db, "aaa", Some("https://hooks.test/a"));
        let item_id = due_item(&db, "aaa", trigger_now().timestamp() + 86_400);

        let notifier = RecordingNotifier::new();
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, trigger_now()).await.unwrap();
        assert!(report.ran);
        assert_eq!(report.sent, 1);
        assert_eq!(notifier.call_count(), 1);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_some());

        // Second invocation within the same trigger hour: marker blocks resend
        let again = Utc.with_ymd_and_hms(2025, 6, 10, 0, 30, 0).unwrap();
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, again).await.unwrap();
        assert!(report.ran);
        assert_eq!(report.sent, 0);
        assert_eq!(report.scanned, 0);
        assert_eq!(notifier.call_count(), 1);
    }

    #[tokio::test]
    async fn test_day_of_fires_independently_after_clock_advance() {
        let (_dir, db) = test_db();
        register(&db, "aaa", Some("https://hooks.test/a"));
        let due_at = trigger_now().timestamp() + 86_400;
        let item_id = due_item(&db, "aaa", due_at);

        let notifier = RecordingNotifier::new();
        run_sweep(&db, &notifier, SWEEP_HOUR, trigger_now()).await.unwrap();
        assert_eq!(notifier.call_count(), 1);

        // Next day, same trigger hour: the day-of window fires exactly once
        let next_day = Utc.with_ymd_and_hms(2025, 6, 11, 0, 0, 0).unwrap();
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, next_day).await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(notifier.call_count(), 2);

        let record = get_item(&db, &item_id);
        assert!(record.reminded_day_before_at.is_some());
        assert!(record.reminded_day_of_at.is_some());

        let windows: Vec<String> = notifier
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, note)| note.window.clone())
            .collect();
        assert_eq!(windows, vec!["day_before", "day_of"]);
    }

    #[tokio::test]
    async fn test_no_endpoint_leaves_window_eligible() {
        let (_dir, db) = test_db();
        register(&db, "aaa", None);
        let item_id = due_item(&db, "aaa", trigger_now().timestamp() + 86_400);

        let notifier = RecordingNotifier::new();
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, trigger_now()).await.unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(report.skipped_no_endpoint, 1);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_none());

        // Endpoint configured afterwards: the same window fires on the next sweep
        set_webhook(&db, "aaa", "https://hooks.test/a");
        let later = Utc.with_ymd_and_hms(2025, 6, 10, 0, 45, 0).unwrap();
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, later).await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(notifier.call_count(), 1);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_some());
    }

    #[tokio::test]
    async fn test_partial_fanout_failure_still_marks_sent() {
        let (_dir, db) = test_db();
        register(&db, "aaa", Some("https://hooks.test/a"));
        register(&db, "bbb", Some("https://hooks.test/b"));
        crate::linking::create_request(&db, "aaa", "bbb", 0).unwrap();
        crate::linking::respond_to_request(
            &db,
            &crate::models::LinkRequestRecord::request_key("aaa", "bbb"),
            "bbb",
            crate::linking::RespondAction::Accept,
            0,
        )
        .unwrap();

        let item_id = due_item(&db, "aaa", trigger_now().timestamp() + 86_400);

        // B's endpoint is down; delivery to A alone still counts as sent
        let notifier = RecordingNotifier::failing(&["https://hooks.test/b"]);
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, trigger_now()).await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(notifier.call_count(), 1);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_some());
    }

    #[tokio::test]
    async fn test_all_targets_failing_counts_as_failed_and_unmarked() {
        let (_dir, db) = test_db();
        register(&db, "aaa", Some("https://hooks.test/a"));
        let item_id = due_item(&db, "aaa", trigger_now().timestamp() + 86_400);

        let notifier = RecordingNotifier::failing(&["https://hooks.test/a"]);
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, trigger_now()).await.unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 1);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_none());
    }

    #[tokio::test]
    async fn test_manual_send_never_touches_markers() {
        let (_dir, db) = test_db();
        register(&db, "aaa", Some("https://hooks.test/a"));
        let item_id = due_item(&db, "aaa", trigger_now().timestamp() + 86_400);

        let notifier = RecordingNotifier::new();
        let sent = manual_send(&db, &notifier, "aaa", trigger_now()).await.unwrap();
        assert_eq!(sent, 1);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_none());

        // Repeat manual sends keep working
        let sent = manual_send(&db, &notifier, "aaa", trigger_now()).await.unwrap();
        assert_eq!(sent, 1);
        assert_eq!(notifier.call_count(), 2);

        // The automatic sweep is unaffected by prior manual sends
        let report = run_sweep(&db, &notifier, SWEEP_HOUR, trigger_now()).await.unwrap();
        assert_eq!(report.sent, 1);
        assert_eq!(notifier.call_count(), 3);
        assert!(get_item(&db, &item_id).reminded_day_before_at.is_some());
    }

    #[tokio::test]
    async fn test_manual_send_skips_items_outside_window() {
        let (_dir, db) = test_db();
        register(&db, "aaa", Some("https://hooks.test/a"));
        // Due in three days: outside today/tomorrow
        due_item(&db, "aaa", trigger_now().timestamp() + 3 * 86_400);

        let notifier = RecordingNotifier::new();
        let sent = manual_send(&db, &notifier, "aaa", trigger_now()).await.unwrap();
        assert_eq!(sent, 0);
        assert_eq!(notifier.call_count(), 0);
    }
}
