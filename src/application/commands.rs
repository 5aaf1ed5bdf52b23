use crate::application::bootstrap::bootstrap_workspace;
use crate::application::drag::{
    drop_time, splice_reorder, DragPreview, DragSource, DragState, ReorderState,
    DEFAULT_HABIT_DURATION_MINUTES, DEFAULT_TASK_DURATION_MINUTES,
};
use crate::application::editor::{EditorSession, Meridiem};
use crate::application::rollover::{RolloverService, TickSummary};
use crate::domain::clock;
use crate::domain::models::{
    CalendarEvent, DailyReflection, EventKind, Habit, Task, TaskBoard, TaskListId,
};
use crate::infrastructure::config::{load_grid_config, GridConfig};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::{keys, KeyValueStore, SqliteKeyValueStore};
use chrono::{NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

const DEFAULT_NEW_EVENT_HOUR: u8 = 9;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    let sequence = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}-{}-{sequence}", Utc::now().timestamp_micros())
}

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    store: Arc<SqliteKeyValueStore>,
    runtime: Mutex<RuntimeState>,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self {
            config_dir: workspace_root.join("config"),
            logs_dir: workspace_root.join("logs"),
            store: Arc::new(SqliteKeyValueStore::new(&bootstrap.database_path)),
            runtime: Mutex::new(RuntimeState::default()),
            log_guard: Mutex::new(()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn grid_config(&self) -> GridConfig {
        load_grid_config(&self.config_dir)
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    // A read never throws: a missing, unreadable, or corrupt value yields
    // the default and leaves a trace in the log.
    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.store.read(key) {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => value,
                Err(error) => {
                    self.log_error("kv_read", &format!("corrupt value at {key}: {error}"));
                    T::default()
                }
            },
            Ok(None) => T::default(),
            Err(error) => {
                self.log_error("kv_read", &format!("failed to read {key}: {error}"));
                T::default()
            }
        }
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<(), InfraError> {
        let raw = serde_json::to_string(value)?;
        self.store.write(key, &raw)
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    drag: DragState,
    reorder: ReorderState,
    editor: Option<EditorSession>,
}

/// Run the rollover engine against `now`. Called on mount, from the
/// periodic intervals, on the manual "reset today" action, and at the end
/// of a pull-to-refresh gesture; the ledger markers make every extra call
/// a no-op.
pub fn tick(state: &AppState, now: NaiveDateTime) -> Result<TickSummary, InfraError> {
    let summary = RolloverService::new(Arc::clone(&state.store)).tick(now)?;
    if summary.day_rolled_over || summary.week_rolled_over {
        state.log_info(
            "tick",
            &format!(
                "rolled over day={} week={} archived={} purged={}",
                summary.day_rolled_over,
                summary.week_rolled_over,
                summary.archived_tasks,
                summary.purged_events
            ),
        );
    }
    Ok(summary)
}

/// Pull-to-refresh: run the rollover, then hand back the refreshed events.
pub fn refresh(state: &AppState, now: NaiveDateTime) -> Result<Vec<CalendarEvent>, InfraError> {
    tick(state, now)?;
    list_events(state)
}

pub fn list_events(state: &AppState) -> Result<Vec<CalendarEvent>, InfraError> {
    let mut events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
    events.sort_by(|left, right| {
        left.start_minutes()
            .cmp(&right.start_minutes())
            .then_with(|| left.id.cmp(&right.id))
    });
    Ok(events)
}

/// Events overlapping the configured visible hour window.
pub fn visible_events(state: &AppState) -> Result<Vec<CalendarEvent>, InfraError> {
    let metrics = state.grid_config().metrics;
    let window_start = metrics.start_hour as u32 * 60;
    let window_end = (metrics.start_hour as u32 + metrics.visible_hours as u32) * 60;
    Ok(list_events(state)?
        .into_iter()
        .filter(|event| {
            event.end_minutes() > window_start && event.start_minutes() < window_end
        })
        .collect())
}

pub fn create_event(
    state: &AppState,
    title: String,
    start_hour: u8,
    start_minute: u8,
    duration_minutes: u32,
    kind: EventKind,
    linked_item_id: Option<String>,
    persistent: bool,
) -> Result<CalendarEvent, InfraError> {
    let event = CalendarEvent {
        id: next_id("evt"),
        title: title.trim().to_string(),
        start_hour,
        start_minute,
        duration_minutes,
        kind,
        linked_item_id: linked_item_id
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned),
        persistent,
    };
    event.validate().map_err(InfraError::InvalidInput)?;

    let mut events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
    events.push(event.clone());
    state.persist(keys::EVENTS, &events)?;

    state.log_info("create_event", &format!("created event_id={}", event.id));
    Ok(event)
}

pub fn update_event(state: &AppState, event: CalendarEvent) -> Result<CalendarEvent, InfraError> {
    event.validate().map_err(InfraError::InvalidInput)?;

    let mut events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
    let Some(existing) = events.iter_mut().find(|candidate| candidate.id == event.id) else {
        return Err(InfraError::InvalidInput(format!(
            "event not found: {}",
            event.id
        )));
    };
    *existing = event.clone();
    state.persist(keys::EVENTS, &events)?;

    state.log_info("update_event", &format!("updated event_id={}", event.id));
    Ok(event)
}

pub fn delete_event(state: &AppState, event_id: &str) -> Result<bool, InfraError> {
    let event_id = event_id.trim();
    if event_id.is_empty() {
        return Err(InfraError::InvalidInput(
            "event_id must not be empty".to_string(),
        ));
    }

    let mut events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
    let before = events.len();
    events.retain(|event| event.id != event_id);
    if events.len() == before {
        return Ok(false);
    }
    state.persist(keys::EVENTS, &events)?;

    state.log_info("delete_event", &format!("deleted event_id={event_id}"));
    Ok(true)
}

pub fn begin_drag(state: &AppState, source: DragSource) -> Result<(), InfraError> {
    if let DragSource::Reposition { event_id } = &source {
        let events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
        if !events.iter().any(|event| event.id == *event_id) {
            return Err(InfraError::InvalidInput(format!(
                "event not found: {event_id}"
            )));
        }
    }
    lock_runtime(state)?.drag.begin(source);
    Ok(())
}

/// Recompute the live preview for the current pointer position. Reads the
/// store only; the persisted events stay untouched until `commit_drag`.
pub fn update_drag_preview(state: &AppState, pixel_y: f32) -> Result<DragPreview, InfraError> {
    let metrics = state.grid_config().metrics;
    let mut runtime = lock_runtime(state)?;
    let duration = match runtime.drag.source() {
        Some(source) => drag_duration(state, source),
        None => {
            return Err(InfraError::InvalidInput(
                "no drag in progress".to_string(),
            ));
        }
    };
    runtime
        .drag
        .update_preview(&metrics, duration, pixel_y)
        .ok_or_else(|| InfraError::InvalidInput("no drag in progress".to_string()))
}

pub fn commit_drag(state: &AppState, pixel_y: f32) -> Result<CalendarEvent, InfraError> {
    let metrics = state.grid_config().metrics;
    let source = lock_runtime(state)?
        .drag
        .take()
        .ok_or_else(|| InfraError::InvalidInput("no drag in progress".to_string()))?;

    match source {
        DragSource::Task {
            task_id,
            duration_minutes,
        } => {
            let board: TaskBoard = state.load_or_default(keys::TASKS);
            let Some(task) = board.find_task(&task_id) else {
                return Err(InfraError::InvalidInput(format!(
                    "task not found: {task_id}"
                )));
            };
            let (hour, minute) = drop_time(&metrics, duration_minutes, pixel_y);
            let event = CalendarEvent {
                id: next_id("evt"),
                title: task.title.clone(),
                start_hour: hour,
                start_minute: minute,
                duration_minutes,
                kind: EventKind::TaskLink,
                linked_item_id: Some(task_id),
                persistent: false,
            };
            insert_event(state, event)
        }
        DragSource::Habit { habit_id } => {
            let habits: Vec<Habit> = state.load_or_default(keys::HABITS);
            let Some(habit) = habits.iter().find(|habit| habit.id == habit_id) else {
                return Err(InfraError::InvalidInput(format!(
                    "habit not found: {habit_id}"
                )));
            };
            let (hour, minute) =
                drop_time(&metrics, DEFAULT_HABIT_DURATION_MINUTES, pixel_y);
            let event = CalendarEvent {
                id: next_id("evt"),
                title: habit.name.clone(),
                start_hour: hour,
                start_minute: minute,
                duration_minutes: DEFAULT_HABIT_DURATION_MINUTES,
                kind: EventKind::HabitLink,
                linked_item_id: Some(habit_id),
                persistent: false,
            };
            insert_event(state, event)
        }
        DragSource::Reposition { event_id } => {
            let mut events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
            let Some(event) = events.iter_mut().find(|event| event.id == event_id) else {
                return Err(InfraError::InvalidInput(format!(
                    "event not found: {event_id}"
                )));
            };
            let (hour, minute) = drop_time(&metrics, event.duration_minutes, pixel_y);
            event.start_hour = hour;
            event.start_minute = minute;
            let updated = event.clone();
            state.persist(keys::EVENTS, &events)?;
            state.log_info(
                "commit_drag",
                &format!("moved event_id={} to {hour:02}:{minute:02}", updated.id),
            );
            Ok(updated)
        }
    }
}

pub fn cancel_drag(state: &AppState) -> Result<bool, InfraError> {
    Ok(lock_runtime(state)?.drag.cancel())
}

fn insert_event(state: &AppState, event: CalendarEvent) -> Result<CalendarEvent, InfraError> {
    let mut events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
    events.push(event.clone());
    state.persist(keys::EVENTS, &events)?;
    state.log_info(
        "commit_drag",
        &format!(
            "created event_id={} at {:02}:{:02}",
            event.id, event.start_hour, event.start_minute
        ),
    );
    Ok(event)
}

fn drag_duration(state: &AppState, source: &DragSource) -> u32 {
    match source {
        DragSource::Task {
            duration_minutes, ..
        } => *duration_minutes,
        DragSource::Habit { .. } => DEFAULT_HABIT_DURATION_MINUTES,
        DragSource::Reposition { event_id } => state
            .load_or_default::<Vec<CalendarEvent>>(keys::EVENTS)
            .iter()
            .find(|event| event.id == *event_id)
            .map(|event| event.duration_minutes)
            .unwrap_or(DEFAULT_TASK_DURATION_MINUTES),
    }
}

pub fn begin_habit_reorder(state: &AppState, habit_id: &str) -> Result<(), InfraError> {
    lock_runtime(state)?.reorder.begin(habit_id);
    Ok(())
}

pub fn hover_habit_reorder(state: &AppState, index: usize) -> Result<(), InfraError> {
    lock_runtime(state)?.reorder.hover(index);
    Ok(())
}

pub fn drop_habit_reorder(state: &AppState) -> Result<Vec<Habit>, InfraError> {
    let dropped = lock_runtime(state)?.reorder.take();
    let mut habits: Vec<Habit> = state.load_or_default(keys::HABITS);
    if let Some((habit_id, index)) = dropped {
        splice_reorder(&mut habits, |habit| habit.id == habit_id, index);
        state.persist(keys::HABITS, &habits)?;
        state.log_info(
            "drop_habit_reorder",
            &format!("moved habit_id={habit_id} to index={index}"),
        );
    }
    Ok(habits)
}

pub fn cancel_habit_reorder(state: &AppState) -> Result<(), InfraError> {
    lock_runtime(state)?.reorder.cancel();
    Ok(())
}

pub fn create_habit(state: &AppState, name: String) -> Result<Habit, InfraError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(InfraError::InvalidInput(
            "name must not be empty".to_string(),
        ));
    }

    let habit = Habit {
        id: next_id("hab"),
        name: name.to_string(),
        done: false,
        history: Vec::new(),
    };
    let mut habits: Vec<Habit> = state.load_or_default(keys::HABITS);
    habits.push(habit.clone());
    state.persist(keys::HABITS, &habits)?;

    state.log_info("create_habit", &format!("created habit_id={}", habit.id));
    Ok(habit)
}

pub fn list_habits(state: &AppState) -> Result<Vec<Habit>, InfraError> {
    Ok(state.load_or_default(keys::HABITS))
}

pub fn toggle_habit(
    state: &AppState,
    habit_id: &str,
    now: NaiveDateTime,
) -> Result<Habit, InfraError> {
    let mut habits: Vec<Habit> = state.load_or_default(keys::HABITS);
    let Some(habit) = habits.iter_mut().find(|habit| habit.id == habit_id) else {
        return Err(InfraError::InvalidInput(format!(
            "habit not found: {habit_id}"
        )));
    };

    habit.done = !habit.done;
    let done = habit.done;
    habit.record_day(&clock::day_key(now.date()), done);
    let updated = habit.clone();
    state.persist(keys::HABITS, &habits)?;

    state.log_info(
        "toggle_habit",
        &format!("habit_id={habit_id} done={done}"),
    );
    Ok(updated)
}

pub fn create_task(
    state: &AppState,
    list: TaskListId,
    title: String,
    estimate_minutes: Option<u32>,
    now: NaiveDateTime,
) -> Result<Task, InfraError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(InfraError::InvalidInput(
            "title must not be empty".to_string(),
        ));
    }

    let task = Task {
        id: next_id("tsk"),
        title: title.to_string(),
        done: false,
        estimate_minutes,
        created_at: now,
        completed_at: None,
    };
    let mut board: TaskBoard = state.load_or_default(keys::TASKS);
    board.list_mut(list).push(task.clone());
    state.persist(keys::TASKS, &board)?;

    state.log_info("create_task", &format!("created task_id={}", task.id));
    Ok(task)
}

pub fn task_board(state: &AppState) -> Result<TaskBoard, InfraError> {
    Ok(state.load_or_default(keys::TASKS))
}

pub fn toggle_task(
    state: &AppState,
    task_id: &str,
    now: NaiveDateTime,
) -> Result<Task, InfraError> {
    let mut board: TaskBoard = state.load_or_default(keys::TASKS);
    let Some(task) = board.find_task_mut(task_id) else {
        return Err(InfraError::InvalidInput(format!(
            "task not found: {task_id}"
        )));
    };

    task.done = !task.done;
    task.completed_at = task.done.then_some(now);
    let updated = task.clone();
    state.persist(keys::TASKS, &board)?;

    state.log_info(
        "toggle_task",
        &format!("task_id={task_id} done={}", updated.done),
    );
    Ok(updated)
}

pub fn reflection(state: &AppState) -> Result<DailyReflection, InfraError> {
    Ok(state.load_or_default(keys::REFLECTION))
}

pub fn update_reflection(
    state: &AppState,
    reflection: DailyReflection,
) -> Result<(), InfraError> {
    state.persist(keys::REFLECTION, &reflection)?;
    state.log_info("update_reflection", "updated daily reflection");
    Ok(())
}

pub fn open_event_editor(
    state: &AppState,
    event_id: Option<&str>,
) -> Result<EditorSession, InfraError> {
    let session = match event_id {
        Some(event_id) => {
            let events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
            let Some(event) = events.iter().find(|event| event.id == event_id) else {
                return Err(InfraError::InvalidInput(format!(
                    "event not found: {event_id}"
                )));
            };
            EditorSession::for_event(event)
        }
        None => EditorSession::for_new(DEFAULT_NEW_EVENT_HOUR, 0),
    };

    lock_runtime(state)?.editor = Some(session.clone());
    Ok(session)
}

pub fn set_editor_kind(state: &AppState, kind: EventKind) -> Result<(), InfraError> {
    with_editor(state, |editor| editor.set_kind(kind))
}

pub fn set_editor_title(state: &AppState, title: String) -> Result<(), InfraError> {
    with_editor(state, |editor| editor.set_title(title))
}

pub fn set_editor_linked_item(
    state: &AppState,
    linked_item_id: Option<String>,
) -> Result<(), InfraError> {
    with_editor(state, |editor| editor.set_linked_item(linked_item_id))
}

pub fn set_editor_start(
    state: &AppState,
    hour: u8,
    minute: u8,
    meridiem: Meridiem,
) -> Result<(), InfraError> {
    with_editor(state, |editor| editor.set_start_12h(hour, minute, meridiem))
}

pub fn set_editor_duration(state: &AppState, minutes: u32) -> Result<(), InfraError> {
    with_editor(state, |editor| editor.set_duration(minutes))
}

pub fn set_editor_persistent(state: &AppState, persistent: bool) -> Result<(), InfraError> {
    with_editor(state, |editor| editor.set_persistent(persistent))
}

/// Commit the open editor session. Returns `Ok(None)` without touching the
/// store when no usable title exists yet; the form stays open.
pub fn save_event_editor(state: &AppState) -> Result<Option<CalendarEvent>, InfraError> {
    let Some(session) = lock_runtime(state)?.editor.clone() else {
        return Err(InfraError::InvalidInput(
            "no editor session open".to_string(),
        ));
    };

    let resolved_link_title = match (session.kind(), session.linked_item_id()) {
        (EventKind::TaskLink, Some(task_id)) => state
            .load_or_default::<TaskBoard>(keys::TASKS)
            .find_task(task_id)
            .map(|task| task.title.clone()),
        (EventKind::HabitLink, Some(habit_id)) => state
            .load_or_default::<Vec<Habit>>(keys::HABITS)
            .iter()
            .find(|habit| habit.id == habit_id)
            .map(|habit| habit.name.clone()),
        _ => None,
    };

    let id = session
        .event_id()
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| next_id("evt"));
    let Some(event) = session.build_event(&id, resolved_link_title.as_deref()) else {
        return Ok(None);
    };

    let mut events: Vec<CalendarEvent> = state.load_or_default(keys::EVENTS);
    match events.iter_mut().find(|candidate| candidate.id == event.id) {
        Some(existing) => *existing = event.clone(),
        None => events.push(event.clone()),
    }
    state.persist(keys::EVENTS, &events)?;
    lock_runtime(state)?.editor = None;

    state.log_info(
        "save_event_editor",
        &format!("saved event_id={}", event.id),
    );
    Ok(Some(event))
}

/// Press-to-arm delete for the open session: the first call arms and
/// returns false, the second deletes the bound event and closes the form.
pub fn request_editor_delete(state: &AppState) -> Result<bool, InfraError> {
    let (confirmed, event_id) = {
        let mut runtime = lock_runtime(state)?;
        let Some(editor) = runtime.editor.as_mut() else {
            return Err(InfraError::InvalidInput(
                "no editor session open".to_string(),
            ));
        };
        let confirmed = editor.request_delete();
        (confirmed, editor.event_id().map(ToOwned::to_owned))
    };

    if !confirmed {
        return Ok(false);
    }
    if let Some(event_id) = event_id {
        delete_event(state, &event_id)?;
    }
    lock_runtime(state)?.editor = None;
    Ok(true)
}

pub fn close_event_editor(state: &AppState) -> Result<(), InfraError> {
    lock_runtime(state)?.editor = None;
    Ok(())
}

fn with_editor<R>(
    state: &AppState,
    apply: impl FnOnce(&mut EditorSession) -> R,
) -> Result<R, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let Some(editor) = runtime.editor.as_mut() else {
        return Err(InfraError::InvalidInput(
            "no editor session open".to_string(),
        ));
    };
    Ok(apply(editor))
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidInput(format!("runtime lock poisoned: {error}")))
}
