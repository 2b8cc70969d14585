use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use std::sync::mpsc;
use thiserror::Error;

use crate::config::Config;
use crate::models::{Event, EventId, NewEvent, NewNotification, NewTask, Notification, NotificationKind, Task, DEFAULT_CATEGORY};
use crate::notifications::NotificationStore;
use crate::poller::NotificationPoller;
use crate::preferences::{Language, LanguageApply, Theme};
use crate::utils::{local_now, parse_date, parse_local_timestamp, today};
use crate::views;
use crate::workspace::Workspace;

#[derive(Parser)]
#[command(name = "lifeflow")]
#[command(about = "LifeFlow - tasks, schedule and notifications kept on this machine")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show today's overview (default if no subcommand)
    Summary,
    /// Manage tasks
    #[command(subcommand)]
    Tasks(TaskCommand),
    /// Manage calendar events
    #[command(subcommand)]
    Events(EventCommand),
    /// Manage notifications
    #[command(subcommand)]
    Notifications(NotificationCommand),
    /// Calendar views over events and tasks
    #[command(subcommand)]
    Calendar(CalendarCommand),
    /// Show or change the theme (light, dark, system)
    Theme {
        value: Option<Theme>,
    },
    /// Show or change the language (ja, en, zh)
    Language {
        value: Option<Language>,
        /// Notify listeners without requesting a reload
        #[arg(long)]
        no_reload: bool,
    },
    /// Delete all tasks, events and notifications
    Reset,
}

#[derive(Subcommand)]
pub enum TaskCommand {
    /// List tasks
    List {
        /// Group tasks by category
        #[arg(long)]
        by_category: bool,
    },
    /// Add a task
    Add {
        title: String,
        /// Due date and time (YYYY-MM-DDTHH:MM[:SS] or YYYY-MM-DD)
        #[arg(long)]
        due: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,
    },
    /// Add a task from dictated text (due tomorrow at 09:00)
    Dictate {
        text: String,
    },
    /// Toggle a task between done and not done
    Toggle {
        id: i64,
    },
    /// Delete a task
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum EventCommand {
    /// List events, optionally only those on one day
    List {
        /// Day to show (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Add an event
    Add {
        title: String,
        /// Start time (YYYY-MM-DDTHH:MM[:SS])
        #[arg(long)]
        start: String,
        /// End time, defaults to the start time
        #[arg(long)]
        end: Option<String>,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = DEFAULT_CATEGORY)]
        category: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete an event
    Delete {
        id: EventId,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommand {
    /// List notifications, newest first
    List,
    /// Add a notification
    Add {
        title: String,
        message: String,
        /// task, schedule or system
        #[arg(long, default_value = "system")]
        kind: NotificationKind,
    },
    /// Add a reminder for a task's approaching due date
    Remind {
        task_title: String,
    },
    /// Mark one notification as read
    Read {
        id: i64,
    },
    /// Mark every notification as read
    ReadAll,
    /// Delete a notification
    Delete {
        id: i64,
    },
    /// Print the number of unread notifications
    Unread,
    /// Keep printing the unread count as it changes
    Watch {
        /// Stop after this many refreshes
        #[arg(long)]
        polls: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum CalendarCommand {
    /// Hour-by-hour schedule for one day (defaults to today)
    Day {
        date: Option<String>,
    },
    /// Number of events and tasks per day
    Counts {
        #[arg(long)]
        year: Option<i32>,
        /// Month (1-12); requires --year or uses the current year
        #[arg(long)]
        month: Option<u32>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Failed to start notification poller: {0}")]
    PollerError(#[from] std::io::Error),
}

/// Dispatch a parsed command against the workspace
pub fn run(command: Commands, workspace: &Workspace, config: &Config) -> Result<(), CliError> {
    match command {
        Commands::Summary => handle_summary(workspace),
        Commands::Tasks(cmd) => handle_task_command(cmd, workspace),
        Commands::Events(cmd) => handle_event_command(cmd, workspace),
        Commands::Notifications(cmd) => handle_notification_command(cmd, workspace, config),
        Commands::Calendar(cmd) => handle_calendar_command(cmd, workspace, config),
        Commands::Theme { value } => {
            handle_theme(value, workspace);
            Ok(())
        }
        Commands::Language { value, no_reload } => {
            handle_language(value, no_reload, workspace);
            Ok(())
        }
        Commands::Reset => {
            workspace.clear_all();
            println!("All tasks, events and notifications deleted");
            Ok(())
        }
    }
}

fn validate_timestamp(raw: &str) -> Result<(), CliError> {
    parse_local_timestamp(raw)
        .map(|_| ())
        .ok_or_else(|| CliError::DateParseError(format!("Invalid date/time '{}'", raw)))
}

fn parse_day(raw: &str) -> Result<NaiveDate, CliError> {
    parse_date(raw).map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", raw, e)))
}

fn print_task(task: &Task, language: Language) {
    let mark = if task.completed { "x" } else { " " };
    println!(
        "[{}] {:>3}  {}  {}  ({})",
        mark,
        task.id,
        task.due_date,
        task.title,
        views::translate_category(&task.category, language)
    );
}

fn print_event(event: &Event, language: Language) {
    let kind = if event.is_task == Some(true) { "task " } else { "event" };
    println!(
        "{} {:>8}  {} - {}  {}  ({}){}",
        kind,
        event.id,
        event.start_time,
        event.end_time,
        event.title,
        views::translate_category(&event.category, language),
        if event.location.is_empty() {
            String::new()
        } else {
            format!(" @ {}", event.location)
        }
    );
}

/// Unread count as stored, so a write that failed still shows up.
fn unread_summary(notifications: &NotificationStore) -> String {
    format!("Unread notifications: {}", notifications.unread_count())
}

fn print_notification(notification: &Notification) {
    let mark = if notification.read { " " } else { "*" };
    println!(
        "{} {:>3}  [{}] {}  {}: {}",
        mark, notification.id, notification.kind, notification.timestamp, notification.title, notification.message
    );
}

/// Handle the summary command
pub fn handle_summary(workspace: &Workspace) -> Result<(), CliError> {
    let tasks = workspace.tasks.load();
    let summary = views::task_summary(&tasks);
    let todays_events = views::filter_by_day(&workspace.events.load(), today()).len();
    let unread = workspace.notifications.unread_count();

    println!("Tasks: {} open, {} done", summary.incomplete, summary.completed);
    println!("Events today: {}", todays_events);
    println!("Unread notifications: {}", unread);
    Ok(())
}

pub fn handle_task_command(cmd: TaskCommand, workspace: &Workspace) -> Result<(), CliError> {
    let language = workspace.preferences.language();
    match cmd {
        TaskCommand::List { by_category } => {
            let tasks = workspace.tasks.load();
            if by_category {
                for group in views::group_by_category(&tasks) {
                    println!("{}", views::translate_category(&group.category, language));
                    for task in &group.tasks {
                        print_task(task, language);
                    }
                }
            } else {
                for task in &tasks {
                    print_task(task, language);
                }
            }
        }
        TaskCommand::Add {
            title,
            due,
            description,
            category,
        } => {
            validate_timestamp(&due)?;
            let task = workspace.tasks.add_task(NewTask {
                title,
                description,
                due_date: due,
                completed: false,
                category,
            });
            println!("Task created successfully (ID: {})", task.id);
        }
        TaskCommand::Dictate { text } => match NewTask::from_dictation(&text, local_now()) {
            Some(draft) => {
                let task = workspace.tasks.add_task(draft);
                println!("Task created successfully (ID: {}, due {})", task.id, task.due_date);
            }
            None => println!("Nothing dictated, no task created"),
        },
        TaskCommand::Toggle { id } => {
            let tasks = workspace.tasks.toggle_completion(id);
            match tasks.iter().find(|t| t.id == id) {
                Some(task) => print_task(task, language),
                None => println!("No task with ID {}", id),
            }
        }
        TaskCommand::Delete { id } => {
            let remaining = workspace.tasks.delete_task(id);
            println!("{} task(s) remaining", remaining.len());
        }
    }
    Ok(())
}

pub fn handle_event_command(cmd: EventCommand, workspace: &Workspace) -> Result<(), CliError> {
    let language = workspace.preferences.language();
    match cmd {
        EventCommand::List { date } => {
            let events = workspace.events.load();
            let events = match date {
                Some(raw) => views::filter_by_day(&events, parse_day(&raw)?),
                None => events,
            };
            for event in &events {
                print_event(event, language);
            }
        }
        EventCommand::Add {
            title,
            start,
            end,
            location,
            category,
            description,
        } => {
            validate_timestamp(&start)?;
            let end = end.unwrap_or_else(|| start.clone());
            validate_timestamp(&end)?;
            let event = workspace.events.add_event(NewEvent {
                title,
                description,
                start_time: start,
                end_time: end,
                location,
                category,
            });
            println!("Event created successfully (ID: {})", event.id);
        }
        EventCommand::Delete { id } => {
            let remaining = workspace.events.delete_event(&id);
            println!("{} event(s) remaining", remaining.len());
        }
    }
    Ok(())
}

pub fn handle_notification_command(
    cmd: NotificationCommand,
    workspace: &Workspace,
    config: &Config,
) -> Result<(), CliError> {
    let notifications = &workspace.notifications;
    match cmd {
        NotificationCommand::List => {
            for notification in &notifications.load() {
                print_notification(notification);
            }
        }
        NotificationCommand::Add { title, message, kind } => {
            let created = notifications.notify(NewNotification::new(title, message, kind));
            println!("Notification created successfully (ID: {})", created.id);
        }
        NotificationCommand::Remind { task_title } => {
            let created = notifications.notify(NewNotification::task_reminder(&task_title));
            println!("Notification created successfully (ID: {})", created.id);
        }
        NotificationCommand::Read { id } => {
            notifications.mark_as_read(id);
            println!("{}", unread_summary(notifications));
        }
        NotificationCommand::ReadAll => {
            notifications.mark_all_as_read();
            println!("{}", unread_summary(notifications));
        }
        NotificationCommand::Delete { id } => {
            let remaining = notifications.delete_notification(id);
            println!("{} notification(s) remaining", remaining.len());
        }
        NotificationCommand::Unread => {
            println!("{}", notifications.unread_count());
        }
        NotificationCommand::Watch { polls } => {
            let (tx, rx) = mpsc::channel();
            let poller = NotificationPoller::spawn(
                notifications.clone(),
                config.notification_poll_interval(),
                move |snapshot| {
                    // The receiver hangs up once enough polls were printed.
                    let _ = tx.send(snapshot.unread);
                },
            )?;
            for (seen, unread) in rx.iter().enumerate() {
                println!("Unread notifications: {}", unread);
                if polls.is_some_and(|limit| seen + 1 >= limit) {
                    break;
                }
            }
            poller.stop();
        }
    }
    Ok(())
}

pub fn handle_calendar_command(cmd: CalendarCommand, workspace: &Workspace, config: &Config) -> Result<(), CliError> {
    let language = workspace.preferences.language();
    let items = views::calendar_items(&workspace.events.load(), &workspace.tasks.load());
    match cmd {
        CalendarCommand::Day { date } => {
            let day = match date {
                Some(raw) => parse_day(&raw)?,
                None => today(),
            };
            println!("{}", day.format("%Y-%m-%d (%a)"));
            for slot in views::day_schedule(&items, day, config.day_hours()) {
                println!("{:02}:00", slot.hour);
                for item in &slot.items {
                    print!("    ");
                    print_event(item, language);
                }
            }
        }
        CalendarCommand::Counts { year, month } => {
            let items = match month {
                Some(month) => views::filter_by_month(&items, year.unwrap_or_else(|| today().year()), month),
                None => items,
            };
            for (date, count) in views::count_by_date(&items) {
                if year.is_none_or(|y| date.year() == y) {
                    println!("{}  {}", date, count);
                }
            }
        }
    }
    Ok(())
}

/// Handle the theme command
pub fn handle_theme(value: Option<Theme>, workspace: &Workspace) {
    let preferences = &workspace.preferences;
    if let Some(theme) = value {
        preferences.set_theme(theme);
    }
    println!("{} (showing {})", preferences.theme(), preferences.resolved_theme());
}

/// Handle the language command
pub fn handle_language(value: Option<Language>, no_reload: bool, workspace: &Workspace) {
    let preferences = &workspace.preferences;
    if let Some(language) = value {
        let apply = if no_reload {
            LanguageApply::Broadcast
        } else {
            LanguageApply::Reload
        };
        preferences.set_language(language, apply);
    }
    println!("{}", preferences.language());
}
