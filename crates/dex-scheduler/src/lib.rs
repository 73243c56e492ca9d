//! Long-lived periodic reminder monitor. Every `check_interval`, due
//! reminders are dispatched to every configured notification channel in
//! parallel, then flipped inactive, at-most-once: a channel failure never
//! blocks the flip once persistence can proceed, and a reminder that has
//! fired this process-lifetime never fires again even if the write to
//! disk is delayed.

use dex_notify::{Notification, NotificationPriority, NotifierSet};
use dex_types::{Reminder, ReminderPriority};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn to_notification_priority(priority: ReminderPriority) -> NotificationPriority {
    match priority {
        ReminderPriority::Low => NotificationPriority::Low,
        ReminderPriority::Normal => NotificationPriority::Normal,
        ReminderPriority::High => NotificationPriority::High,
    }
}

/// Checks `store` for due reminders, fires each through `notifier`, and
/// persists the updated `is_active` flags. `fired_this_session` is an
/// in-process guard against double-firing a reminder whose persisted flip
/// has not yet landed on disk.
pub struct ReminderMonitor {
    store: Arc<dex_tools::ReminderStore>,
    notifier: Arc<NotifierSet>,
    check_interval: Duration,
    fired_this_session: HashSet<Uuid>,
}

impl ReminderMonitor {
    pub fn new(store: Arc<dex_tools::ReminderStore>, notifier: Arc<NotifierSet>, check_interval: Duration) -> Self {
        Self { store, notifier, check_interval, fired_this_session: HashSet::new() }
    }

    /// Runs forever, ticking every `check_interval`. Intended to be spawned
    /// as its own task; callers that need to stop it should abort the task
    /// handle, since the loop has no internal cancellation signal of its
    /// own beyond that.
    pub async fn run(mut self) -> ! {
        let mut interval = tokio::time::interval(self.check_interval);
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }

    /// A single check: load reminders, fire the due ones, persist the
    /// result. Public so tests (and a `reminders` CLI subcommand that
    /// wants one-shot behavior) can drive it directly.
    pub async fn tick(&mut self) {
        let mut reminders = match self.store.load().await {
            Ok(r) => r,
            Err(err) => {
                tracing::error!(error = %err, "failed to load reminders");
                return;
            }
        };

        let now = chrono::Utc::now();
        let mut changed = false;

        for reminder in &mut reminders {
            if !reminder.is_active || self.fired_this_session.contains(&reminder.id) {
                continue;
            }
            if !reminder.is_due(now) {
                continue;
            }

            self.fire(reminder).await;
            reminder.is_active = false;
            self.fired_this_session.insert(reminder.id);
            changed = true;
        }

        if changed {
            if let Err(err) = self.store.save_all(&reminders).await {
                tracing::error!(error = %err, "failed to persist reminder state after firing");
            }
        }
    }

    async fn fire(&self, reminder: &Reminder) {
        let notification = Notification {
            title: format!("\u{23f0} Reminder: {}", reminder.message),
            message: reminder.message.clone(),
            priority: to_notification_priority(reminder.priority),
            tag: Some("reminder".to_string()),
            action_url: None,
        };

        let delivered = self.notifier.notify_all(&notification).await;
        if !delivered {
            tracing::warn!(reminder_id = %reminder.id, "no notification channel accepted reminder; flipping inactive anyway");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_config::NotifyConfig;
    use dex_tools::ReminderStore;

    fn empty_notifier() -> Arc<NotifierSet> {
        Arc::new(NotifierSet::from_config(&NotifyConfig { smtp: None, whatsapp: None, user_whatsapp_number: None, webhook_url: None }))
    }

    #[tokio::test]
    async fn due_reminder_is_flipped_inactive_after_one_tick() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReminderStore::new(dir.path().join("reminders.json")));
        let reminder = Reminder::new("water the plants", chrono::Utc::now() - chrono::Duration::seconds(5), ReminderPriority::Normal);
        let id = reminder.id;
        store.add(reminder).await.unwrap();

        let mut monitor = ReminderMonitor::new(store.clone(), empty_notifier(), Duration::from_secs(60));
        monitor.tick().await;

        let reminders = store.list().await.unwrap();
        let fired = reminders.iter().find(|r| r.id == id).unwrap();
        assert!(!fired.is_active);
    }

    #[tokio::test]
    async fn future_reminder_does_not_fire() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReminderStore::new(dir.path().join("reminders.json")));
        let reminder = Reminder::new("future", chrono::Utc::now() + chrono::Duration::hours(1), ReminderPriority::Normal);
        let id = reminder.id;
        store.add(reminder).await.unwrap();

        let mut monitor = ReminderMonitor::new(store.clone(), empty_notifier(), Duration::from_secs(60));
        monitor.tick().await;

        let reminders = store.list().await.unwrap();
        let pending = reminders.iter().find(|r| r.id == id).unwrap();
        assert!(pending.is_active);
    }

    #[tokio::test]
    async fn already_fired_in_session_never_refires_even_if_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ReminderStore::new(dir.path().join("reminders.json")));
        let reminder = Reminder::new("past due", chrono::Utc::now() - chrono::Duration::seconds(5), ReminderPriority::Normal);
        let id = reminder.id;
        store.add(reminder).await.unwrap();

        let mut monitor = ReminderMonitor::new(store.clone(), empty_notifier(), Duration::from_secs(60));
        monitor.tick().await;
        assert!(monitor.fired_this_session.contains(&id));

        // Even if an external writer reset is_active back to true, the
        // in-session guard must still prevent a second fire.
        let mut reminders = store.list().await.unwrap();
        reminders.iter_mut().find(|r| r.id == id).unwrap().is_active = true;
        store.save_all(&reminders).await.unwrap();

        monitor.tick().await;
        let reminders = store.list().await.unwrap();
        assert!(reminders.iter().find(|r| r.id == id).unwrap().is_active);
    }
}
