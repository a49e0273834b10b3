//! Reminder scheduler.
//!
//! A task is reminded once when its due time has arrived, as long as it is
//! still open and the due time is no more than `window` in the past. The
//! trailing window catches due times that passed while nothing was polling.
//! Editing a task re-arms it (see [`TaskStore::update`]).

use crate::notify::Notifier;
use crate::store::TaskStore;
use crate::task::Task;
use chrono::{DateTime, Duration, Local};
use std::time::Instant;

pub const DEFAULT_TICK_INTERVAL: std::time::Duration = std::time::Duration::from_millis(1000);
pub const DEFAULT_WINDOW_MINUTES: i64 = 30;

/// A fired reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub task_id: i64,
    pub text: String,
    pub due: DateTime<Local>,
}

/// Whether `task` should be reminded at `now`: open, not yet reminded, and
/// `now - window < due <= now`.
pub fn is_due(task: &Task, now: DateTime<Local>, window: Duration) -> bool {
    if task.completed || task.notified {
        return false;
    }
    let Some(due) = task.due_date.instant() else {
        return false;
    };
    let diff = due - now;
    diff <= Duration::zero() && diff > -window
}

pub struct ReminderScheduler {
    window: Duration,
    interval: std::time::Duration,
    notifiers: Vec<Box<dyn Notifier>>,
    last_tick: Option<Instant>,
}

impl Default for ReminderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL, Duration::minutes(DEFAULT_WINDOW_MINUTES))
    }
}

impl ReminderScheduler {
    pub fn new(interval: std::time::Duration, window: Duration) -> Self {
        Self {
            window,
            interval,
            notifiers: Vec::new(),
            last_tick: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn interval(&self) -> std::time::Duration {
        self.interval
    }

    /// Time left before the next tick is due; zero before the first tick.
    pub fn until_next_tick(&self) -> std::time::Duration {
        match self.last_tick {
            Some(last) => self.interval.saturating_sub(last.elapsed()),
            None => std::time::Duration::ZERO,
        }
    }

    /// Runs a tick if the interval has elapsed since the previous one.
    pub fn poll(&mut self, store: &mut TaskStore) -> Vec<Reminder> {
        if !self.until_next_tick().is_zero() {
            return Vec::new();
        }
        self.tick(store, Local::now())
    }

    /// One scan over the store. Every due task is marked notified and handed
    /// to each notifier; the store is saved once if anything fired.
    pub fn tick(&mut self, store: &mut TaskStore, now: DateTime<Local>) -> Vec<Reminder> {
        self.last_tick = Some(Instant::now());

        let mut fired = Vec::new();
        for task in store.tasks_mut() {
            if !is_due(task, now, self.window) {
                continue;
            }
            task.notified = true;
            if let Some(due) = task.due_date.instant() {
                fired.push(Reminder {
                    task_id: task.id,
                    text: task.text.clone(),
                    due,
                });
            }
        }
        if fired.is_empty() {
            return fired;
        }

        store.save();
        for reminder in &fired {
            log::info!("Triggering reminder for: {}", reminder.text);
            for notifier in &mut self.notifiers {
                if let Err(err) = notifier.notify(reminder) {
                    log::warn!("Reminder delivery failed: {err}");
                }
            }
        }
        fired
    }

    /// Ticks forever on the configured interval, calling `on_reminder` for
    /// each fired reminder. The store is reloaded before every tick so edits
    /// made by other processes are picked up.
    pub fn run_blocking<F>(&mut self, store: &mut TaskStore, mut on_reminder: F) -> !
    where
        F: FnMut(&Reminder),
    {
        loop {
            store.reload();
            for reminder in self.tick(store, Local::now()) {
                on_reminder(&reminder);
            }
            std::thread::sleep(self.interval);
        }
    }
}
