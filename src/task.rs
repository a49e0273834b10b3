use crate::error::Error;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

/// Local date-time layouts accepted for a due date, tried in order.
const LOCAL_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Cycles low -> medium -> high -> low. Used by the edit prompt.
    pub fn next(self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        };
        f.write_str(label)
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "l" => Ok(Priority::Low),
            "medium" | "med" | "m" => Ok(Priority::Medium),
            "high" | "h" => Ok(Priority::High),
            other => Err(Error::InvalidInput(format!(
                "unknown priority '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

/// A due date exactly as the user typed it.
///
/// The raw text is what gets persisted; [`DueDate::instant`] parses it on
/// demand. A value that does not parse is kept as-is and treated as "no
/// usable due time": it is never reminded and sorts after dated tasks.
/// A stored `null` reads back as an empty due date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DueDate(String);

impl<'de> Deserialize<'de> for DueDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self(raw.unwrap_or_default()))
    }
}

impl DueDate {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[cfg(test)]
    pub fn from_instant(instant: DateTime<Local>) -> Self {
        Self(instant.format("%Y-%m-%dT%H:%M:%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub fn instant(&self) -> Option<DateTime<Local>> {
        let raw = self.0.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
            return Some(instant.with_timezone(&Local));
        }
        for format in LOCAL_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                // Nonexistent local times (DST gap) yield None, ambiguous ones the earlier instant.
                return Local.from_local_datetime(&naive).earliest();
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .and_then(|naive| Local.from_local_datetime(&naive).earliest())
    }

    pub fn is_valid(&self) -> bool {
        self.instant().is_some()
    }

    /// Short human form, e.g. `Mar 04 09:30`.
    pub fn display(&self) -> String {
        match self.instant() {
            Some(instant) => instant.format("%b %d %H:%M").to_string(),
            None if self.is_empty() => "no date".to_string(),
            None => "invalid date".to_string(),
        }
    }
}

impl From<&str> for DueDate {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// The user-editable part of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub text: String,
    pub priority: Priority,
    pub due_date: DueDate,
}

impl TaskFields {
    pub fn new(text: impl Into<String>, priority: Priority, due_date: impl Into<DueDate>) -> Self {
        Self {
            text: text.into(),
            priority,
            due_date: due_date.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64, // creation time, ms since epoch
    pub text: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: DueDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub notified: bool,
}

impl Task {
    pub fn new(id: i64, fields: TaskFields) -> Self {
        Self {
            id,
            text: fields.text,
            priority: fields.priority,
            due_date: fields.due_date,
            completed: false,
            notified: false,
        }
    }

    pub fn matches(&self, needle_lowercase: &str) -> bool {
        needle_lowercase.is_empty() || self.text.to_lowercase().contains(needle_lowercase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_datetime_local_input() {
        let due = DueDate::new("2025-03-04T09:30");
        let instant = due.instant().expect("valid date");
        assert_eq!((instant.year(), instant.month(), instant.day()), (2025, 3, 4));
        assert_eq!((instant.hour(), instant.minute()), (9, 30));
    }

    #[test]
    fn parses_other_accepted_forms() {
        assert!(DueDate::new("2025-03-04T09:30:15").is_valid());
        assert!(DueDate::new("2025-03-04 09:30").is_valid());
        assert!(DueDate::new("2025-03-04T09:30:00+02:00").is_valid());
        assert!(DueDate::new(" 2025-03-04 ").is_valid());
    }

    #[test]
    fn garbage_and_empty_are_not_instants() {
        assert_eq!(DueDate::new("tomorrow-ish").instant(), None);
        assert_eq!(DueDate::new("").instant(), None);
        assert_eq!(DueDate::new("2025-13-40T99:99").instant(), None);
        assert_eq!(DueDate::new("").display(), "no date");
        assert_eq!(DueDate::new("nope").display(), "invalid date");
    }

    #[test]
    fn from_instant_parses_back_to_same_second() {
        let now = Local::now().with_nanosecond(0).expect("valid nanos");
        let due = DueDate::from_instant(now);
        assert_eq!(due.instant(), Some(now));
    }

    #[test]
    fn priority_parsing() {
        assert_eq!("HIGH".parse::<Priority>().ok(), Some(Priority::High));
        assert_eq!("m".parse::<Priority>().ok(), Some(Priority::Medium));
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::High.next(), Priority::Low);
    }

    #[test]
    fn serializes_browser_field_names() {
        let task = Task::new(42, TaskFields::new("Buy milk", Priority::High, "2025-03-04T09:30"));
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["dueDate"], "2025-03-04T09:30");
        assert_eq!(json["priority"], "high");
        assert_eq!(json["notified"], false);
    }

    #[test]
    fn null_or_missing_due_date_reads_as_empty() {
        let json = r#"{"id":1,"text":"x","priority":"low","dueDate":null,"completed":false,"notified":false}"#;
        let task: Task = serde_json::from_str(json).expect("null due date");
        assert!(task.due_date.is_empty());

        let task: Task = serde_json::from_str(r#"{"id":2,"text":"y"}"#).expect("missing fields");
        assert!(task.due_date.is_empty());
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn deserializes_invalid_due_date_without_error() {
        let json = r#"{"id":1,"text":"x","priority":"low","dueDate":"soonish","completed":false,"notified":false}"#;
        let task: Task = serde_json::from_str(json).expect("deserialize");
        assert_eq!(task.due_date.as_str(), "soonish");
        assert!(!task.due_date.is_valid());
    }
}
