use crate::config::Config;
use crate::error::{Error, Result};
use crate::notify::{DesktopNotifier, Permission, PermissionOutcome};
use crate::reminder::{Reminder, ReminderScheduler};
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::{DueDate, Priority, Task, TaskFields};
use crate::theme::Theme;
use std::{io::Write, path::Path};

/// Text must be non-empty once trimmed; the store itself accepts anything.
pub fn validate_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(Error::InvalidInput("task text cannot be empty".to_string()));
    }
    Ok(text.to_string())
}

fn describe(task: &Task) -> String {
    format!(
        "[{}] #{} {} ({}, due: {})",
        if task.completed { "x" } else { " " },
        task.id,
        task.text,
        task.priority,
        task.due_date.display()
    )
}

pub fn add(
    store: &mut TaskStore,
    text: &str,
    priority: Option<&str>,
    due: Option<&str>,
    out: &mut impl Write,
) -> Result<i64> {
    let text = validate_text(text)?;
    let priority = priority.map(str::parse::<Priority>).transpose()?.unwrap_or_default();
    let due_date = DueDate::new(due.unwrap_or_default().trim());
    if !due_date.is_empty() && !due_date.is_valid() {
        writeln!(out, "warning: '{}' is not a date; no reminder will fire", due_date.as_str())?;
    }
    let id = store.add(TaskFields::new(text, priority, due_date));
    writeln!(out, "Added task #{id}")?;
    Ok(id)
}

pub fn list(store: &TaskStore, query: &str, out: &mut impl Write) -> Result<()> {
    if store.is_empty() {
        writeln!(out, "No tasks yet")?;
        return Ok(());
    }
    let visible = store.visible_order(query);
    for task in &visible {
        writeln!(out, "{}", describe(task))?;
    }
    if !query.trim().is_empty() {
        writeln!(out, "Showing {} of {} tasks", visible.len(), store.len())?;
    }
    writeln!(out, "{}", store.pending_label())?;
    Ok(())
}

pub fn toggle(store: &mut TaskStore, id: i64, out: &mut impl Write) -> Result<()> {
    if store.toggle_completed(id) {
        let state = match store.get(id) {
            Some(task) if task.completed => "completed",
            _ => "reopened",
        };
        writeln!(out, "Task #{id} {state}")?;
    } else {
        writeln!(out, "No task with id {id}")?;
    }
    Ok(())
}

/// Unspecified fields keep their current values.
pub fn edit(
    store: &mut TaskStore,
    id: i64,
    text: Option<&str>,
    priority: Option<&str>,
    due: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let Some(current) = store.get(id) else {
        writeln!(out, "No task with id {id}")?;
        return Ok(());
    };
    let fields = TaskFields {
        text: match text {
            Some(text) => validate_text(text)?,
            None => current.text.clone(),
        },
        priority: match priority {
            Some(raw) => raw.parse::<Priority>()?,
            None => current.priority,
        },
        due_date: due.map_or_else(|| current.due_date.clone(), |d| DueDate::new(d.trim())),
    };
    store.update(id, fields);
    writeln!(out, "Updated task #{id}")?;
    Ok(())
}

pub fn remove(store: &mut TaskStore, id: i64, out: &mut impl Write) -> Result<()> {
    if store.remove(id) {
        writeln!(out, "Deleted task #{id}")?;
    } else {
        writeln!(out, "No task with id {id}")?;
    }
    Ok(())
}

pub fn clear_completed(store: &mut TaskStore, out: &mut impl Write) -> Result<()> {
    let removed = store.clear_completed();
    writeln!(out, "Cleared {removed} completed task(s)")?;
    Ok(())
}

pub fn format_reminder(reminder: &Reminder) -> String {
    format!(
        "Task Due! It's time to complete: {} (due {})",
        reminder.text,
        reminder.due.format("%b %d %H:%M")
    )
}

pub fn watch(scheduler: &mut ReminderScheduler, store: &mut TaskStore) -> ! {
    log::info!("Watching for due tasks every {:?}", scheduler.interval());
    scheduler.run_blocking(store, |reminder| println!("{}", format_reminder(reminder)))
}

pub fn notify(notifier: &mut DesktopNotifier, deny: bool, out: &mut impl Write) -> Result<()> {
    if deny {
        notifier.set_permission(Permission::Denied);
        writeln!(out, "Desktop notifications disabled")?;
        return Ok(());
    }
    let message = match notifier.request_permission() {
        PermissionOutcome::Unsupported => {
            "This system does not support desktop notifications (need notify-send or osascript)"
        }
        PermissionOutcome::Blocked => {
            "Notifications are blocked. Run `taskminder notify --reset` to allow them again."
        }
        PermissionOutcome::Granted => "Notifications enabled",
    };
    writeln!(out, "{message}")?;
    Ok(())
}

pub fn notification_status(notifier: &DesktopNotifier, out: &mut impl Write) -> Result<()> {
    writeln!(out, "Permission: {}", notifier.permission().as_str())?;
    let backend = if notifier.is_supported() { "available" } else { "not found" };
    writeln!(out, "Notifier: {backend}")?;
    Ok(())
}

pub fn reset_permission(notifier: &mut DesktopNotifier, out: &mut impl Write) -> Result<()> {
    notifier.set_permission(Permission::Default);
    writeln!(out, "Notification permission reset")?;
    Ok(())
}

/// Writes a config file with every default spelled out. An existing file is
/// left alone.
pub fn init_config(path: &Path, out: &mut impl Write) -> Result<()> {
    if path.exists() {
        writeln!(out, "{} already exists", path.display())?;
        return Ok(());
    }
    Config::default().save_to_file(path)?;
    writeln!(out, "Wrote {}", path.display())?;
    Ok(())
}

/// `choice` is `light`, `dark`, `toggle`, or `None` to print the current theme.
pub fn theme(storage: &mut dyn Storage, choice: Option<&str>, out: &mut impl Write) -> Result<()> {
    let current = Theme::load(storage);
    let next = match choice {
        None => {
            writeln!(out, "{}", current.as_str())?;
            return Ok(());
        }
        Some("toggle") => current.toggled(),
        Some(name) => name.parse::<Theme>()?,
    };
    next.save(storage);
    writeln!(out, "Theme set to {}", next.as_str())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn store() -> TaskStore {
        TaskStore::load(Box::new(MemoryStorage::new()))
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn add_rejects_blank_text() {
        let mut store = store();
        let mut out = Vec::new();
        let result = add(&mut store, "   ", None, None, &mut out);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn add_parses_priority_and_warns_on_bad_date() {
        let mut store = store();
        let mut out = Vec::new();
        let id = add(&mut store, " pay rent ", Some("high"), Some("someday"), &mut out)
            .expect("added");
        let task = store.get(id).expect("exists");
        assert_eq!(task.text, "pay rent");
        assert_eq!(task.priority, Priority::High);
        assert!(output(out).contains("not a date"));
    }

    #[test]
    fn list_prints_visible_order_and_pending_label() {
        let mut store = store();
        let mut sink = Vec::new();
        let a = add(&mut store, "alpha", None, Some("2030-01-02T10:00"), &mut sink).expect("add");
        add(&mut store, "beta", None, Some("2030-01-01T10:00"), &mut sink).expect("add");
        store.toggle_completed(a);

        let mut out = Vec::new();
        list(&store, "", &mut out).expect("list");
        let text = output(out);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("[ ]") && lines[0].contains("beta"));
        assert!(lines[1].starts_with("[x]") && lines[1].contains("alpha"));
        assert_eq!(lines[2], "1 task pending");
    }

    #[test]
    fn list_reports_empty_store_and_search_counts() {
        let mut store = store();
        let mut out = Vec::new();
        list(&store, "", &mut out).expect("list");
        assert_eq!(output(out), "No tasks yet\n");

        let mut sink = Vec::new();
        add(&mut store, "walk dog", None, None, &mut sink).expect("add");
        add(&mut store, "feed cat", None, None, &mut sink).expect("add");
        let mut out = Vec::new();
        list(&store, "dog", &mut out).expect("list");
        assert!(output(out).contains("Showing 1 of 2 tasks"));
    }

    #[test]
    fn edit_keeps_unspecified_fields() {
        let mut store = store();
        let mut sink = Vec::new();
        let id = add(&mut store, "gym", Some("low"), Some("2030-01-01T07:00"), &mut sink)
            .expect("add");
        edit(&mut store, id, None, Some("high"), None, &mut sink).expect("edit");
        let task = store.get(id).expect("exists");
        assert_eq!(task.text, "gym");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date.as_str(), "2030-01-01T07:00");
    }

    #[test]
    fn unknown_ids_report_without_error() {
        let mut store = store();
        let mut out = Vec::new();
        toggle(&mut store, 99, &mut out).expect("toggle");
        remove(&mut store, 99, &mut out).expect("remove");
        edit(&mut store, 99, Some("x"), None, None, &mut out).expect("edit");
        assert_eq!(output(out).matches("No task with id 99").count(), 3);
    }

    #[test]
    fn theme_command_toggles_and_sets() {
        let mut storage = MemoryStorage::new();
        let mut out = Vec::new();
        theme(&mut storage, Some("toggle"), &mut out).expect("toggle");
        assert_eq!(Theme::load(&storage), Theme::Dark);
        theme(&mut storage, Some("light"), &mut out).expect("set");
        assert_eq!(Theme::load(&storage), Theme::Light);
        assert!(theme(&mut storage, Some("neon"), &mut out).is_err());
    }

    #[test]
    fn notification_status_reports_stored_permission() {
        let mut storage = MemoryStorage::new();
        storage.set(crate::notify::PERMISSION_KEY, "denied").expect("write");
        let notifier = DesktopNotifier::new(Box::new(storage));
        let mut out = Vec::new();
        notification_status(&notifier, &mut out).expect("status");
        let text = output(out);
        assert!(text.starts_with("Permission: denied\n"));
        assert!(text.contains("Notifier: "));
    }

    #[test]
    fn init_config_writes_defaults_once() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let path = tmp.path().join("taskminder").join("config.toml");
        let mut out = Vec::new();
        init_config(&path, &mut out).expect("first");
        assert_eq!(Config::from_file(&path).expect("load"), Config::default());

        std::fs::write(&path, "audio_cue = false\n").expect("write");
        init_config(&path, &mut out).expect("second");
        assert!(!Config::from_file(&path).expect("load").audio_cue);
        assert!(output(out).contains("already exists"));
    }
}
