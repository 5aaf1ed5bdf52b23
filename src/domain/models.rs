use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const MIN_EVENT_DURATION_MINUTES: u32 = 1;
pub const MAX_EVENT_DURATION_MINUTES: u32 = 600;
pub const HABIT_HISTORY_DAYS: usize = 7;
pub const COMPLETED_ARCHIVE_LIMIT: usize = 100;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Plain,
    TaskLink,
    HabitLink,
}

/// A time block on the daily calendar. Non-persistent events carry no date:
/// by convention they are today's transient plan and are purged by the next
/// day rollover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub start_hour: u8,
    pub start_minute: u8,
    pub duration_minutes: u32,
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_item_id: Option<String>,
    #[serde(default)]
    pub persistent: bool,
}

impl CalendarEvent {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "event.id")?;
        validate_wall_clock(self.start_hour, self.start_minute, "event.start")?;
        if self.duration_minutes < MIN_EVENT_DURATION_MINUTES
            || self.duration_minutes > MAX_EVENT_DURATION_MINUTES
        {
            return Err(format!(
                "event.duration_minutes must be within [{MIN_EVENT_DURATION_MINUTES}, {MAX_EVENT_DURATION_MINUTES}]"
            ));
        }
        match self.kind {
            EventKind::Plain => validate_non_empty(&self.title, "event.title")?,
            EventKind::TaskLink | EventKind::HabitLink => {
                let linked = self.linked_item_id.as_deref().unwrap_or_default();
                validate_non_empty(linked, "event.linked_item_id")?;
            }
        }
        Ok(())
    }

    pub fn start_minutes(&self) -> u32 {
        self.start_hour as u32 * 60 + self.start_minute as u32
    }

    pub fn end_minutes(&self) -> u32 {
        self.start_minutes() + self.duration_minutes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HabitDay {
    pub date: String,
    pub done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub history: Vec<HabitDay>,
}

impl Habit {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "habit.id")?;
        validate_non_empty(&self.name, "habit.name")?;
        if self.history.len() > HABIT_HISTORY_DAYS {
            return Err(format!(
                "habit.history must hold at most {HABIT_HISTORY_DAYS} entries"
            ));
        }
        for entry in &self.history {
            validate_date(&entry.date, "habit.history[].date")?;
        }
        Ok(())
    }

    /// Overwrite today's history entry (or append one), then trim the
    /// trailing window to the 7 most recent entries.
    pub fn record_day(&mut self, day_key: &str, done: bool) {
        match self.history.iter_mut().find(|entry| entry.date == day_key) {
            Some(entry) => entry.done = done,
            None => self.history.push(HabitDay {
                date: day_key.to_string(),
                done,
            }),
        }
        if self.history.len() > HABIT_HISTORY_DAYS {
            let excess = self.history.len() - HABIT_HISTORY_DAYS;
            self.history.drain(..excess);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_minutes: Option<u32>,
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        Ok(())
    }
}

/// A completed task after archival, stamped by the rollover that moved it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchivedTask {
    pub id: String,
    pub title: String,
    pub archived_at: NaiveDateTime,
    pub completed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskListId {
    Inbox,
    Today,
    Week,
    Someday,
}

impl TaskListId {
    pub const ALL: [TaskListId; 4] = [
        TaskListId::Inbox,
        TaskListId::Today,
        TaskListId::Week,
        TaskListId::Someday,
    ];
}

/// The four ordered working lists plus the capped completed archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskBoard {
    #[serde(default)]
    pub inbox: Vec<Task>,
    #[serde(default)]
    pub today: Vec<Task>,
    #[serde(default)]
    pub week: Vec<Task>,
    #[serde(default)]
    pub someday: Vec<Task>,
    #[serde(default)]
    pub completed: Vec<ArchivedTask>,
}

impl TaskBoard {
    pub fn list(&self, id: TaskListId) -> &Vec<Task> {
        match id {
            TaskListId::Inbox => &self.inbox,
            TaskListId::Today => &self.today,
            TaskListId::Week => &self.week,
            TaskListId::Someday => &self.someday,
        }
    }

    pub fn list_mut(&mut self, id: TaskListId) -> &mut Vec<Task> {
        match id {
            TaskListId::Inbox => &mut self.inbox,
            TaskListId::Today => &mut self.today,
            TaskListId::Week => &mut self.week,
            TaskListId::Someday => &mut self.someday,
        }
    }

    pub fn find_task(&self, task_id: &str) -> Option<&Task> {
        TaskListId::ALL
            .iter()
            .flat_map(|id| self.list(*id).iter())
            .find(|task| task.id == task_id)
    }

    pub fn find_task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        for id in TaskListId::ALL {
            if self.list(id).iter().any(|task| task.id == task_id) {
                return self
                    .list_mut(id)
                    .iter_mut()
                    .find(|task| task.id == task_id);
            }
        }
        None
    }
}

/// Free-text fields for the day, cleared by the day rollover.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyReflection {
    #[serde(default)]
    pub morning_intention: String,
    #[serde(default)]
    pub evening_note: String,
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_wall_clock(hour: u8, minute: u8, field_name: &str) -> Result<(), String> {
    if hour > 23 || minute > 59 {
        return Err(format!("{field_name} must be a valid wall-clock time"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}
