//! Read-only transforms over loaded records, used to build list and calendar
//! displays. Nothing here writes to storage.

use chrono::{Datelike, Local, NaiveDate, TimeZone, Timelike};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::models::{Event, EventId, Task};
use crate::preferences::Language;
use crate::utils::parse_timestamp_in;

/// Hours shown as rows in the day view.
pub const DAY_VIEW_HOURS: RangeInclusive<u32> = 8..=21;

/// Records that sit at a point in time on the calendar.
pub trait Scheduled {
    /// Start time for events, due date for tasks.
    fn scheduled_at(&self) -> &str;
}

impl Scheduled for Task {
    fn scheduled_at(&self) -> &str {
        &self.due_date
    }
}

impl Scheduled for Event {
    fn scheduled_at(&self) -> &str {
        &self.start_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub category: String,
    pub tasks: Vec<Task>,
}

/// Group tasks by category, groups ordered by first appearance.
pub fn group_by_category(tasks: &[Task]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    for task in tasks {
        match groups.iter_mut().find(|g| g.category == task.category) {
            Some(group) => group.tasks.push(task.clone()),
            None => groups.push(CategoryGroup {
                category: task.category.clone(),
                tasks: vec![task.clone()],
            }),
        }
    }
    groups
}

pub fn filter_by_day<T: Scheduled + Clone>(items: &[T], day: NaiveDate) -> Vec<T> {
    filter_by_day_in(items, day, &Local)
}

pub fn filter_by_day_in<T, Tz>(items: &[T], day: NaiveDate, tz: &Tz) -> Vec<T>
where
    T: Scheduled + Clone,
    Tz: TimeZone,
{
    items
        .iter()
        .filter(|item| parse_timestamp_in(item.scheduled_at(), tz).is_some_and(|dt| dt.date() == day))
        .cloned()
        .collect()
}

pub fn filter_by_hour<T: Scheduled + Clone>(items: &[T], hour: u32) -> Vec<T> {
    filter_by_hour_in(items, hour, &Local)
}

pub fn filter_by_hour_in<T, Tz>(items: &[T], hour: u32, tz: &Tz) -> Vec<T>
where
    T: Scheduled + Clone,
    Tz: TimeZone,
{
    items
        .iter()
        .filter(|item| parse_timestamp_in(item.scheduled_at(), tz).is_some_and(|dt| dt.hour() == hour))
        .cloned()
        .collect()
}

/// Items whose timestamp falls in the given month (1-12).
pub fn filter_by_month<T: Scheduled + Clone>(items: &[T], year: i32, month: u32) -> Vec<T> {
    items
        .iter()
        .filter(|item| {
            parse_timestamp_in(item.scheduled_at(), &Local)
                .is_some_and(|dt| dt.year() == year && dt.month() == month)
        })
        .cloned()
        .collect()
}

pub fn count_by_date<T: Scheduled>(items: &[T]) -> BTreeMap<NaiveDate, usize> {
    count_by_date_in(items, &Local)
}

/// Per-day item counts. Items with unreadable timestamps are not counted.
pub fn count_by_date_in<T: Scheduled, Tz: TimeZone>(items: &[T], tz: &Tz) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for dt in items.iter().filter_map(|item| parse_timestamp_in(item.scheduled_at(), tz)) {
        *counts.entry(dt.date()).or_insert(0) += 1;
    }
    counts
}

/// Event-shaped copies of tasks for the calendar. These are never stored.
pub fn tasks_as_events(tasks: &[Task]) -> Vec<Event> {
    tasks
        .iter()
        .map(|task| Event {
            id: EventId::Text(format!("task-{}", task.id)),
            title: task.title.clone(),
            description: None,
            start_time: task.due_date.clone(),
            end_time: task.due_date.clone(),
            location: String::new(),
            category: task.category.clone(),
            is_task: Some(true),
        })
        .collect()
}

/// Stored events followed by the calendar copies of `tasks`.
pub fn calendar_items(events: &[Event], tasks: &[Task]) -> Vec<Event> {
    let mut items = events.to_vec();
    items.extend(tasks_as_events(tasks));
    items
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HourSlot {
    pub hour: u32,
    pub items: Vec<Event>,
}

/// One row per hour in `hours` holding that day's items starting in it.
pub fn day_schedule(items: &[Event], day: NaiveDate, hours: RangeInclusive<u32>) -> Vec<HourSlot> {
    day_schedule_in(items, day, hours, &Local)
}

pub fn day_schedule_in<Tz: TimeZone>(
    items: &[Event],
    day: NaiveDate,
    hours: RangeInclusive<u32>,
    tz: &Tz,
) -> Vec<HourSlot> {
    let day_items = filter_by_day_in(items, day, tz);
    hours
        .map(|hour| HourSlot {
            hour,
            items: filter_by_hour_in(&day_items, hour, tz),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskSummary {
    pub completed: usize,
    pub incomplete: usize,
}

pub fn task_summary(tasks: &[Task]) -> TaskSummary {
    let completed = tasks.iter().filter(|t| t.completed).count();
    TaskSummary {
        completed,
        incomplete: tasks.len() - completed,
    }
}

/// Display name of a built-in category. Unknown categories, and every
/// category outside English, are returned unchanged.
pub fn translate_category(category: &str, language: Language) -> &str {
    if language != Language::En {
        return category;
    }
    match category {
        "仕事" => "Work",
        "家事" => "Household",
        "個人" => "Personal",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(id: i64, due: &str, category: &str) -> Task {
        Task {
            id,
            title: format!("task {}", id),
            description: String::new(),
            due_date: due.to_string(),
            completed: false,
            category: category.to_string(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn groups_keep_first_appearance_order() {
        let tasks = vec![
            task(1, "2025-03-03T09:00:00", "家事"),
            task(2, "2025-03-03T10:00:00", "仕事"),
            task(3, "2025-03-03T11:00:00", "家事"),
            task(4, "2025-03-03T12:00:00", "家事 "),
        ];
        let groups = group_by_category(&tasks);
        let names: Vec<&str> = groups.iter().map(|g| g.category.as_str()).collect();
        assert_eq!(names, vec!["家事", "仕事", "家事 "]);
        assert_eq!(groups[0].tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn day_and_hour_filters() {
        let tasks = vec![
            task(1, "2025-03-03T09:30:00", "仕事"),
            task(2, "2025-03-03T18:00:00", "家事"),
            task(3, "2025-03-04T09:00:00", "仕事"),
            task(4, "not a date", "仕事"),
        ];
        let on_day = filter_by_day_in(&tasks, date(2025, 3, 3), &Utc);
        assert_eq!(on_day.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);

        let nine = filter_by_hour_in(&tasks, 9, &Utc);
        assert_eq!(nine.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn counts_use_local_calendar_date() {
        let tasks = vec![
            task(1, "2025-03-03T09:00:00", "仕事"),
            task(2, "2025-03-03T23:59:59", "仕事"),
            task(3, "2025-03-04T00:00:00", "仕事"),
            task(4, "garbage", "仕事"),
        ];
        let counts = count_by_date_in(&tasks, &Utc);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&date(2025, 3, 3)], 2);
        assert_eq!(counts[&date(2025, 3, 4)], 1);
    }

    #[test]
    fn tasks_become_calendar_events() {
        let mut done = task(7, "2025-03-05T18:00:00", "家事");
        done.completed = true;
        let events = tasks_as_events(&[done]);
        assert_eq!(events[0].id, EventId::Text("task-7".to_string()));
        assert_eq!(events[0].start_time, events[0].end_time);
        assert_eq!(events[0].is_task, Some(true));
        assert_eq!(events[0].location, "");
    }

    #[test]
    fn day_schedule_buckets_by_hour() {
        let events = calendar_items(&[], &[task(1, "2025-03-03T08:15:00", "仕事"), task(2, "2025-03-03T23:00:00", "仕事")]);
        let slots = day_schedule_in(&events, date(2025, 3, 3), DAY_VIEW_HOURS, &Utc);
        assert_eq!(slots.len(), 14);
        assert_eq!(slots[0].hour, 8);
        assert_eq!(slots[0].items.len(), 1);
        // 23:00 is outside the displayed range.
        assert_eq!(slots.iter().map(|s| s.items.len()).sum::<usize>(), 1);
    }

    #[test]
    fn summary_and_translation() {
        let mut tasks = vec![task(1, "2025-03-03", "仕事"), task(2, "2025-03-03", "個人")];
        tasks[0].completed = true;
        assert_eq!(task_summary(&tasks), TaskSummary { completed: 1, incomplete: 1 });

        assert_eq!(translate_category("家事", Language::En), "Household");
        assert_eq!(translate_category("家事", Language::Ja), "家事");
        assert_eq!(translate_category("Hobby", Language::En), "Hobby");
    }
}
