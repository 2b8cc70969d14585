use chrono::{Duration, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::store::Record;

/// Category used when a task is created without an explicit one.
pub const DEFAULT_CATEGORY: &str = "仕事";

/// Category assigned to tasks created from dictated text.
pub const PERSONAL_CATEGORY: &str = "個人";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub due_date: String, // ISO 8601, local wall-clock when no offset is given
    pub completed: bool,
    pub category: String,
}

/// A task that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub completed: bool,
    pub category: String,
}

impl NewTask {
    pub fn new(title: String, due_date: String) -> Self {
        Self {
            title,
            description: String::new(),
            due_date,
            completed: false,
            category: DEFAULT_CATEGORY.to_string(),
        }
    }

    /// Build a task from dictated text: due tomorrow at 09:00, filed as personal.
    /// Returns `None` when nothing was dictated.
    pub fn from_dictation(text: &str, now: NaiveDateTime) -> Option<Self> {
        let title = text.trim();
        if title.is_empty() {
            return None;
        }
        let due = (now.date() + Duration::days(1)).and_time(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default());
        Some(Self {
            title: title.to_string(),
            description: "音声入力から作成されたタスク".to_string(),
            due_date: due.format("%Y-%m-%dT%H:%M:%S").to_string(),
            completed: false,
            category: PERSONAL_CATEGORY.to_string(),
        })
    }
}

impl Record for Task {
    type Id = i64;
    type Draft = NewTask;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn numeric_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn from_draft(draft: NewTask, id: i64) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            due_date: draft.due_date,
            completed: draft.completed,
            category: draft.category,
        }
    }
}

/// Event ids are numbers when created through the store and strings when
/// synthesized for display (e.g. `task-3`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(i64),
    Text(String),
}

impl EventId {
    /// Numeric value of the id, if it has one. Text ids holding a plain
    /// integer count as numeric.
    pub fn as_number(&self) -> Option<i64> {
        match self {
            EventId::Number(n) => Some(*n),
            EventId::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{}", n),
            EventId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EventId {
    fn from(n: i64) -> Self {
        EventId::Number(n)
    }
}

impl FromStr for EventId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(n) => EventId::Number(n),
            Err(_) => EventId::Text(s.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_task: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: String,
    pub end_time: String,
    pub location: String,
    pub category: String,
}

impl NewEvent {
    pub fn new(title: String, start_time: String, end_time: String) -> Self {
        Self {
            title,
            description: None,
            start_time,
            end_time,
            location: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

impl Record for Event {
    type Id = EventId;
    type Draft = NewEvent;

    fn id(&self) -> &EventId {
        &self.id
    }

    fn numeric_id(&self) -> Option<i64> {
        self.id.as_number()
    }

    fn from_draft(draft: NewEvent, id: i64) -> Self {
        Self {
            id: EventId::Number(id),
            title: draft.title,
            description: draft.description,
            start_time: draft.start_time,
            end_time: draft.end_time,
            location: draft.location,
            category: draft.category,
            is_task: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Task,
    Schedule,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Task => "task",
            NotificationKind::Schedule => "schedule",
            NotificationKind::System => "system",
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown notification type: {0} (expected task, schedule or system)")]
pub struct UnknownNotificationKind(String);

impl FromStr for NotificationKind {
    type Err = UnknownNotificationKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(NotificationKind::Task),
            "schedule" => Ok(NotificationKind::Schedule),
            "system" => Ok(NotificationKind::System),
            other => Err(UnknownNotificationKind(other.to_string())),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub title: String,
    pub message: String,
    pub timestamp: String,
    pub read: bool,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
}

/// A notification before the store stamps its id, timestamp and read flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
}

impl NewNotification {
    pub fn new(title: impl Into<String>, message: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            kind,
        }
    }

    /// Reminder that a task's due date is approaching.
    pub fn task_reminder(task_title: &str) -> Self {
        Self::new(
            "タスクのリマインダー",
            format!("「{}」の期限が近づいています", task_title),
            NotificationKind::Task,
        )
    }

    /// Notice that a scheduled event has started.
    pub fn schedule_notice(event_title: &str) -> Self {
        Self::new(
            "予定の通知",
            format!("{}の時間になりました", event_title),
            NotificationKind::Schedule,
        )
    }

    pub fn system(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(title, message, NotificationKind::System)
    }
}

impl Record for Notification {
    type Id = i64;
    type Draft = NewNotification;

    fn id(&self) -> &i64 {
        &self.id
    }

    fn numeric_id(&self) -> Option<i64> {
        Some(self.id)
    }

    fn from_draft(draft: NewNotification, id: i64) -> Self {
        Self {
            id,
            title: draft.title,
            message: draft.message,
            timestamp: now_timestamp(),
            read: false,
            kind: draft.kind,
        }
    }
}

/// Current instant as an RFC 3339 UTC timestamp with millisecond precision.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
