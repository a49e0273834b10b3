use crate::storage::Storage;
use crate::task::{Task, TaskFields};
use chrono::Utc;
use std::cmp::Ordering;

pub const TASKS_KEY: &str = "tasks";

/// A value that is not a JSON array reads as empty; inside an array, only
/// the entries that fail to parse are dropped.
fn read_tasks(storage: &dyn Storage) -> Vec<Task> {
    let data = match storage.get(TASKS_KEY) {
        Ok(Some(data)) => data,
        Ok(None) => return Vec::new(),
        Err(err) => {
            log::warn!("Failed to read tasks: {err}");
            return Vec::new();
        }
    };
    let entries: Vec<serde_json::Value> = match serde_json::from_str(&data) {
        Ok(entries) => entries,
        Err(err) => {
            log::warn!("Ignoring malformed task data: {err}");
            return Vec::new();
        }
    };
    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Task>(entry) {
            Ok(task) => Some(task),
            Err(err) => {
                log::warn!("Dropping malformed task at index {index}: {err}");
                None
            }
        })
        .collect()
}

/// Owns the task list. Every mutation is written through to storage before
/// returning.
pub struct TaskStore {
    tasks: Vec<Task>,
    storage: Box<dyn Storage>,
}

impl TaskStore {
    /// Loads the persisted list. A missing, unreadable or malformed value
    /// yields an empty store; malformed entries inside a list are skipped.
    pub fn load(storage: Box<dyn Storage>) -> Self {
        let tasks = read_tasks(storage.as_ref());
        log::debug!("Loaded {} task(s)", tasks.len());
        Self { tasks, storage }
    }

    /// Replaces the in-memory list with what storage currently holds, for
    /// processes that share the data directory with another writer.
    pub fn reload(&mut self) {
        self.tasks = read_tasks(self.storage.as_ref());
    }

    pub fn persist(&mut self) -> crate::error::Result<()> {
        let data = serde_json::to_string(&self.tasks)?;
        self.storage.set(TASKS_KEY, &data)
    }

    pub(crate) fn save(&mut self) {
        if let Err(err) = self.persist() {
            log::error!("Failed to save tasks: {err}");
        }
    }

    pub fn add(&mut self, fields: TaskFields) -> i64 {
        let id = self.fresh_id(Utc::now().timestamp_millis());
        log::debug!("Adding task {id}");
        self.tasks.push(Task::new(id, fields));
        self.save();
        id
    }

    /// Replaces the editable fields and re-arms the reminder.
    pub fn update(&mut self, id: i64, fields: TaskFields) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        task.text = fields.text;
        task.priority = fields.priority;
        task.due_date = fields.due_date;
        task.notified = false;
        log::debug!("Updated task {id}");
        self.save();
        true
    }

    pub fn toggle_completed(&mut self, id: i64) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return false;
        };
        task.completed = !task.completed;
        log::debug!("Task {id} completed={}", task.completed);
        self.save();
        true
    }

    pub fn remove(&mut self, id: i64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return false;
        }
        log::debug!("Removed task {id}");
        self.save();
        true
    }

    pub fn clear_completed(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.completed);
        let removed = before - self.tasks.len();
        if removed > 0 {
            log::debug!("Cleared {removed} completed task(s)");
            self.save();
        }
        removed
    }

    /// Tasks whose text contains `query` (case-insensitive), incomplete
    /// first, each group by ascending due time. Undated or unparseable
    /// due dates go last in their group, keeping their stored order.
    pub fn visible_order(&self, query: &str) -> Vec<&Task> {
        let needle = query.trim().to_lowercase();
        let mut visible: Vec<(&Task, _)> = self
            .tasks
            .iter()
            .filter(|t| t.matches(&needle))
            .map(|t| (t, t.due_date.instant()))
            .collect();
        visible.sort_by(|(a, a_due), (b, b_due)| {
            a.completed
                .cmp(&b.completed)
                .then_with(|| match (a_due, b_due) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                })
        });
        visible.into_iter().map(|(t, _)| t).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.completed).count()
    }

    pub fn pending_label(&self) -> String {
        let count = self.pending_count();
        let plural = if count == 1 { "" } else { "s" };
        format!("{count} task{plural} pending")
    }

    pub fn get(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Raw access for the reminder scheduler, the only non-user writer.
    pub(crate) fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }

    fn fresh_id(&self, candidate: i64) -> i64 {
        let taken = |id: i64| self.tasks.iter().any(|t| t.id == id);
        if !taken(candidate) {
            return candidate;
        }
        let above = self
            .tasks
            .iter()
            .map(|t| t.id)
            .max()
            .and_then(|max| max.checked_add(1));
        above
            .or_else(|| (i64::MIN..candidate).rev().find(|id| !taken(*id)))
            .unwrap_or(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{FileStorage, MemoryStorage};
    use crate::task::{DueDate, Priority};
    use chrono::{Duration, Local};

    fn store() -> (MemoryStorage, TaskStore) {
        let storage = MemoryStorage::new();
        let store = TaskStore::load(Box::new(storage.clone()));
        (storage, store)
    }

    fn fields(text: &str, due: &str) -> TaskFields {
        TaskFields::new(text, Priority::Medium, due)
    }

    fn texts(tasks: &[&Task]) -> Vec<String> {
        tasks.iter().map(|t| t.text.clone()).collect()
    }

    #[test]
    fn add_assigns_unique_ids_and_writes_through() {
        let (storage, mut store) = store();
        let ids: Vec<i64> = (0..20).map(|i| store.add(fields(&format!("t{i}"), ""))).collect();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());

        let raw = storage.raw(TASKS_KEY).expect("persisted");
        let persisted: Vec<Task> = serde_json::from_str(&raw).expect("valid json");
        assert_eq!(persisted.len(), 20);
        assert!(persisted.iter().all(|t| !t.completed && !t.notified));
    }

    #[test]
    fn update_resets_notified() {
        let (_storage, mut store) = store();
        let id = store.add(fields("call bob", "2020-01-01T10:00"));
        store.tasks_mut()[0].notified = true;

        assert!(store.update(id, TaskFields::new("call bob", Priority::High, "2030-01-01T10:00")));
        let task = store.get(id).expect("task exists");
        assert!(!task.notified);
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, DueDate::new("2030-01-01T10:00"));
    }

    #[test]
    fn missing_ids_are_no_ops() {
        let (storage, mut store) = store();
        assert!(!store.update(7, fields("x", "")));
        assert!(!store.toggle_completed(7));
        assert!(!store.remove(7));
        assert_eq!(store.clear_completed(), 0);
        assert!(storage.raw(TASKS_KEY).is_none());
    }

    #[test]
    fn toggle_remove_and_clear_completed() {
        let (_storage, mut store) = store();
        let a = store.add(fields("a", ""));
        let b = store.add(fields("b", ""));
        let c = store.add(fields("c", ""));
        assert!(store.toggle_completed(a));
        assert!(store.toggle_completed(b));
        assert!(store.toggle_completed(b));
        assert_eq!(store.pending_label(), "2 tasks pending");

        assert!(store.remove(c));
        assert_eq!(store.pending_label(), "1 task pending");
        assert_eq!(store.clear_completed(), 1);
        assert_eq!(store.iter().map(|t| t.id).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn visible_order_groups_then_sorts_by_due() {
        let (_storage, mut store) = store();
        let now = Local::now();
        let late = DueDate::from_instant(now + Duration::hours(3));
        let early = DueDate::from_instant(now + Duration::hours(1));
        store.add(fields("done early", early.as_str()));
        store.add(fields("late", late.as_str()));
        store.add(fields("no date", ""));
        store.add(fields("early", early.as_str()));
        store.add(fields("garbage", "whenever"));
        let done = store.iter().find(|t| t.text == "done early").map(|t| t.id);
        store.toggle_completed(done.expect("added"));

        let order = store.visible_order("");
        assert_eq!(order.len(), store.len());
        assert_eq!(texts(&order), ["early", "late", "no date", "garbage", "done early"]);
    }

    #[test]
    fn visible_order_filters_case_insensitively_without_mutating() {
        let (_storage, mut store) = store();
        store.add(fields("Buy MILK", ""));
        store.add(fields("walk dog", ""));
        store.add(fields("milkshake", ""));

        assert_eq!(texts(&store.visible_order("milk")), ["Buy MILK", "milkshake"]);
        assert_eq!(texts(&store.visible_order("  DOG ")), ["walk dog"]);
        assert!(store.visible_order("cat").is_empty());
        assert_eq!(
            store.iter().map(|t| t.text.as_str()).collect::<Vec<_>>(),
            ["Buy MILK", "walk dog", "milkshake"]
        );
    }

    #[test]
    fn persist_then_load_round_trips() {
        let tmp = tempfile::TempDir::new().expect("tempdir");
        let mut store = TaskStore::load(Box::new(FileStorage::new(tmp.path())));
        let a = store.add(TaskFields::new("ünïcode \"quoted\"", Priority::Low, "2025-03-04T09:30"));
        store.add(TaskFields::new("bad date", Priority::High, "not a date"));
        store.toggle_completed(a);
        store.tasks_mut()[1].notified = true;
        store.persist().expect("persist");

        let reloaded = TaskStore::load(Box::new(FileStorage::new(tmp.path())));
        assert_eq!(
            reloaded.iter().collect::<Vec<_>>(),
            store.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn corrupt_data_loads_empty() {
        let mut storage = MemoryStorage::new();
        storage.set(TASKS_KEY, "{not json").expect("write");
        let store = TaskStore::load(Box::new(storage));
        assert!(store.is_empty());
    }

    #[test]
    fn reload_sees_other_writers() {
        let (storage, mut store) = store();
        let mut other = TaskStore::load(Box::new(storage.clone()));
        other.add(fields("from elsewhere", ""));

        assert!(store.is_empty());
        store.reload();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn one_bad_entry_does_not_drop_the_rest() {
        let mut storage = MemoryStorage::new();
        storage
            .set(
                TASKS_KEY,
                r#"[{"id":1,"text":"keep me","priority":"low","dueDate":"2030-01-01T10:00","completed":false,"notified":false},
                    {"id":2,"text":"null date","priority":"high","dueDate":null,"completed":false,"notified":false},
                    {"id":3,"priority":"urgent"}]"#,
            )
            .expect("write");
        let mut store = TaskStore::load(Box::new(storage.clone()));
        assert_eq!(store.len(), 2);
        assert!(store.get(2).expect("kept").due_date.is_empty());

        store.add(fields("new", ""));
        let reloaded = TaskStore::load(Box::new(storage));
        assert_eq!(reloaded.len(), 3);
        assert!(reloaded.get(1).is_some());
    }

    #[test]
    fn fresh_id_never_overflows() {
        let (_storage, mut store) = store();
        store.add(fields("a", ""));
        store.add(fields("b", ""));
        store.tasks_mut()[0].id = i64::MAX;
        store.tasks_mut()[1].id = 5;
        assert_eq!(store.fresh_id(5), 4);
        assert_eq!(store.fresh_id(i64::MAX), i64::MAX - 1);
    }

    #[test]
    fn fresh_id_skips_taken_values() {
        let (_storage, mut store) = store();
        let first = store.add(fields("a", ""));
        assert_eq!(store.fresh_id(first), first + 1);
        assert_eq!(store.fresh_id(first - 10), first - 10);
    }
}
