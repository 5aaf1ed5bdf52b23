use crate::domain::clock;
use crate::domain::models::{
    ArchivedTask, CalendarEvent, DailyReflection, Habit, TaskBoard, TaskListId,
    COMPLETED_ARCHIVE_LIMIT,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::kv_store::{keys, KeyValueStore};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub day_rolled_over: bool,
    pub week_rolled_over: bool,
    pub archived_tasks: usize,
    pub purged_events: usize,
}

/// The consolidated boundary processor. Every trigger point (mount, the
/// periodic intervals, manual reset, pull-to-refresh) funnels into `tick`;
/// the persisted day/week markers make repeated calls no-ops once a
/// boundary has been handled.
pub struct RolloverService<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> RolloverService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Compare `now` against the persisted markers and run whichever of the
    /// day/week transactions is due. Markers advance only after their
    /// transaction fully persisted, so a failed write retries on the next
    /// call instead of skipping a boundary. Several missed days or weeks
    /// collapse into a single catch-up pass.
    pub fn tick(&self, now: NaiveDateTime) -> Result<TickSummary, InfraError> {
        let mut summary = TickSummary::default();

        let today_key = clock::day_key(now.date());
        if self.read_marker(keys::LAST_DAY).as_deref() != Some(today_key.as_str()) {
            let (archived, purged) = self.roll_day(now)?;
            self.write_marker(keys::LAST_DAY, &today_key)?;
            summary.day_rolled_over = true;
            summary.archived_tasks = archived;
            summary.purged_events = purged;
        }

        let week_key = clock::iso_week_key(now.date());
        if self.read_marker(keys::LAST_WEEK).as_deref() != Some(week_key.as_str()) {
            self.roll_week()?;
            self.write_marker(keys::LAST_WEEK, &week_key)?;
            summary.week_rolled_over = true;
        }

        Ok(summary)
    }

    fn roll_day(&self, now: NaiveDateTime) -> Result<(usize, usize), InfraError> {
        let mut board: TaskBoard = self.load_or_default(keys::TASKS);
        let archived = archive_completed_tasks(&mut board, now);

        let mut habits: Vec<Habit> = self.load_or_default(keys::HABITS);
        for habit in &mut habits {
            habit.done = false;
        }

        let mut events: Vec<CalendarEvent> = self.load_or_default(keys::EVENTS);
        let before = events.len();
        events.retain(|event| event.persistent);
        let purged = before - events.len();

        self.persist(keys::TASKS, &board)?;
        self.persist(keys::HABITS, &habits)?;
        self.persist(keys::EVENTS, &events)?;
        self.persist(keys::REFLECTION, &DailyReflection::default())?;
        Ok((archived, purged))
    }

    // Runs even when the day transaction already cleared the flags in the
    // same tick; the two boundary checks stay independent.
    fn roll_week(&self) -> Result<(), InfraError> {
        let mut habits: Vec<Habit> = self.load_or_default(keys::HABITS);
        for habit in &mut habits {
            habit.done = false;
        }
        self.persist(keys::HABITS, &habits)
    }

    // An unreadable or unparseable marker reads as "never rolled over",
    // which forces a redundant rollover rather than a silently stale day.
    fn read_marker(&self, key: &str) -> Option<String> {
        let raw = self.store.read(key).ok().flatten()?;
        serde_json::from_str(&raw).ok()
    }

    fn write_marker(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.persist(key, &value)
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.store.read(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            _ => T::default(),
        }
    }

    fn persist<T: Serialize>(&self, key: &str, value: &T) -> Result<(), InfraError> {
        let raw = serde_json::to_string(value)?;
        self.store.write(key, &raw)
    }
}

/// Move every `done` task out of its working list into the completed
/// archive, newest last, trimming to the 100 most recent. Partitioning an
/// already-partitioned board is a no-op, which is what makes a retried day
/// transaction safe.
fn archive_completed_tasks(board: &mut TaskBoard, now: NaiveDateTime) -> usize {
    let mut archived = 0;
    for list_id in TaskListId::ALL {
        let list = std::mem::take(board.list_mut(list_id));
        let mut remaining = Vec::with_capacity(list.len());
        for task in list {
            if task.done {
                board.completed.push(ArchivedTask {
                    id: task.id,
                    title: task.title,
                    archived_at: now,
                    completed_at: task.completed_at.unwrap_or(now),
                });
                archived += 1;
            } else {
                remaining.push(task);
            }
        }
        *board.list_mut(list_id) = remaining;
    }

    if board.completed.len() > COMPLETED_ARCHIVE_LIMIT {
        let excess = board.completed.len() - COMPLETED_ARCHIVE_LIMIT;
        board.completed.drain(..excess);
    }
    archived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EventKind, Task};
    use crate::infrastructure::kv_store::InMemoryKeyValueStore;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn fixed_time(value: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
            .expect("valid datetime")
    }

    fn service() -> (Arc<InMemoryKeyValueStore>, RolloverService<InMemoryKeyValueStore>) {
        let store = Arc::new(InMemoryKeyValueStore::default());
        (Arc::clone(&store), RolloverService::new(store))
    }

    fn seed<T: Serialize>(store: &InMemoryKeyValueStore, key: &str, value: &T) {
        let raw = serde_json::to_string(value).expect("serialize seed value");
        store.write(key, &raw).expect("seed store");
    }

    fn read<T: DeserializeOwned>(store: &InMemoryKeyValueStore, key: &str) -> T {
        let raw = store
            .read(key)
            .expect("read store")
            .expect("value present");
        serde_json::from_str(&raw).expect("deserialize stored value")
    }

    fn sample_event(id: &str, persistent: bool) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            title: format!("Event {id}"),
            start_hour: 9,
            start_minute: 0,
            duration_minutes: 30,
            kind: EventKind::Plain,
            linked_item_id: None,
            persistent,
        }
    }

    fn sample_habit(id: &str, done: bool) -> Habit {
        Habit {
            id: id.to_string(),
            name: format!("Habit {id}"),
            done,
            history: Vec::new(),
        }
    }

    fn sample_task(id: &str, done: bool) -> Task {
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            done,
            estimate_minutes: None,
            created_at: fixed_time("2026-01-18T08:00"),
            completed_at: done.then(|| fixed_time("2026-01-18T17:30")),
        }
    }

    #[test]
    fn stale_ledger_catches_up_in_a_single_tick() {
        let (store, service) = service();
        seed(&store, keys::LAST_DAY, &"2026-01-18");
        seed(&store, keys::LAST_WEEK, &"2026-W03");
        seed(
            &store,
            keys::EVENTS,
            &vec![sample_event("evt-1", false), sample_event("evt-2", true)],
        );
        seed(&store, keys::HABITS, &vec![sample_habit("hab-1", true)]);
        let mut board = TaskBoard::default();
        board.today.push(sample_task("tsk-done", true));
        board.today.push(sample_task("tsk-open", false));
        seed(&store, keys::TASKS, &board);

        let summary = service
            .tick(fixed_time("2026-01-20T09:00"))
            .expect("tick succeeds");

        assert!(summary.day_rolled_over);
        assert_eq!(summary.archived_tasks, 1);
        assert_eq!(summary.purged_events, 1);
        assert_eq!(read::<String>(&store, keys::LAST_DAY), "2026-01-20");

        let events: Vec<CalendarEvent> = read(&store, keys::EVENTS);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "evt-2");

        let habits: Vec<Habit> = read(&store, keys::HABITS);
        assert!(habits.iter().all(|habit| !habit.done));

        let board: TaskBoard = read(&store, keys::TASKS);
        assert_eq!(board.today.len(), 1);
        assert_eq!(board.today[0].id, "tsk-open");
        assert_eq!(board.completed.len(), 1);
        assert_eq!(board.completed[0].id, "tsk-done");
        assert_eq!(
            board.completed[0].completed_at,
            fixed_time("2026-01-18T17:30")
        );
    }

    #[test]
    fn tick_is_idempotent_for_the_same_instant() {
        let (store, service) = service();
        seed(&store, keys::EVENTS, &vec![sample_event("evt-1", false)]);
        seed(&store, keys::HABITS, &vec![sample_habit("hab-1", true)]);

        let now = fixed_time("2026-08-06T07:15");
        let first = service.tick(now).expect("first tick");
        assert!(first.day_rolled_over);
        assert!(first.week_rolled_over);

        let snapshot: Vec<CalendarEvent> = read(&store, keys::EVENTS);
        let second = service.tick(now).expect("second tick");

        assert_eq!(second, TickSummary::default());
        assert_eq!(read::<Vec<CalendarEvent>>(&store, keys::EVENTS), snapshot);
        assert_eq!(read::<String>(&store, keys::LAST_DAY), "2026-08-06");
        assert_eq!(read::<String>(&store, keys::LAST_WEEK), "2026-W32");
    }

    #[test]
    fn persistent_events_survive_repeated_rollovers() {
        let (store, service) = service();
        seed(&store, keys::EVENTS, &vec![sample_event("evt-keep", true)]);

        for day in ["2026-08-04T06:00", "2026-08-05T06:00", "2026-08-06T06:00"] {
            service.tick(fixed_time(day)).expect("tick succeeds");
        }

        let events: Vec<CalendarEvent> = read(&store, keys::EVENTS);
        assert_eq!(events, vec![sample_event("evt-keep", true)]);
    }

    #[test]
    fn week_boundary_fires_independently_of_the_day_boundary() {
        let (store, service) = service();
        let now = fixed_time("2026-08-10T00:30");
        seed(&store, keys::LAST_DAY, &"2026-08-10");
        seed(&store, keys::LAST_WEEK, &"2026-W32");
        seed(&store, keys::HABITS, &vec![sample_habit("hab-1", true)]);
        seed(&store, keys::EVENTS, &vec![sample_event("evt-1", false)]);

        let summary = service.tick(now).expect("tick succeeds");

        assert!(!summary.day_rolled_over);
        assert!(summary.week_rolled_over);
        assert_eq!(read::<String>(&store, keys::LAST_WEEK), "2026-W33");
        let habits: Vec<Habit> = read(&store, keys::HABITS);
        assert!(!habits[0].done);
        // The day transaction did not run, so ephemeral events stay.
        let events: Vec<CalendarEvent> = read(&store, keys::EVENTS);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn corrupt_markers_read_as_never_rolled_over() {
        let (store, service) = service();
        store.write(keys::LAST_DAY, "{not json").expect("seed corrupt marker");
        store.write(keys::LAST_WEEK, "42").expect("seed wrong-type marker");
        seed(&store, keys::HABITS, &vec![sample_habit("hab-1", true)]);

        let summary = service
            .tick(fixed_time("2026-08-06T12:00"))
            .expect("tick succeeds");

        assert!(summary.day_rolled_over);
        assert!(summary.week_rolled_over);
        assert_eq!(read::<String>(&store, keys::LAST_DAY), "2026-08-06");
        assert_eq!(read::<String>(&store, keys::LAST_WEEK), "2026-W32");
    }

    #[test]
    fn reflection_is_cleared_by_the_day_rollover() {
        let (store, service) = service();
        seed(
            &store,
            keys::REFLECTION,
            &DailyReflection {
                morning_intention: "Ship the report".to_string(),
                evening_note: "Went fine".to_string(),
            },
        );

        service
            .tick(fixed_time("2026-08-06T05:00"))
            .expect("tick succeeds");

        assert_eq!(
            read::<DailyReflection>(&store, keys::REFLECTION),
            DailyReflection::default()
        );
    }

    struct FlakyStore {
        inner: InMemoryKeyValueStore,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn new() -> Self {
            Self {
                inner: InMemoryKeyValueStore::default(),
                fail_writes: AtomicBool::new(false),
            }
        }
    }

    impl KeyValueStore for FlakyStore {
        fn read(&self, key: &str) -> Result<Option<String>, InfraError> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), InfraError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(InfraError::InvalidInput(format!(
                    "simulated write failure for {key}"
                )));
            }
            self.inner.write(key, value)
        }
    }

    #[test]
    fn failed_writes_leave_the_ledger_behind_so_the_next_tick_retries() {
        let store = Arc::new(FlakyStore::new());
        let service = RolloverService::new(Arc::clone(&store));
        seed(&store.inner, keys::HABITS, &vec![sample_habit("hab-1", true)]);
        seed(&store.inner, keys::EVENTS, &vec![sample_event("evt-1", false)]);

        store.fail_writes.store(true, Ordering::SeqCst);
        let now = fixed_time("2026-08-06T09:00");
        assert!(service.tick(now).is_err());
        assert_eq!(store.inner.read(keys::LAST_DAY).expect("read"), None);
        assert_eq!(store.inner.read(keys::LAST_WEEK).expect("read"), None);

        store.fail_writes.store(false, Ordering::SeqCst);
        let summary = service.tick(now).expect("retry succeeds");
        assert!(summary.day_rolled_over);
        assert!(summary.week_rolled_over);
        assert_eq!(read::<String>(&store.inner, keys::LAST_DAY), "2026-08-06");
        let events: Vec<CalendarEvent> = read(&store.inner, keys::EVENTS);
        assert!(events.is_empty());
    }

    proptest! {
        #[test]
        fn completed_archive_keeps_the_newest_hundred(
            already_archived in 0usize..130,
            newly_done in 1usize..40
        ) {
            let (store, service) = service();
            let mut board = TaskBoard::default();
            for index in 0..already_archived {
                board.completed.push(ArchivedTask {
                    id: format!("old-{index}"),
                    title: format!("Old {index}"),
                    archived_at: fixed_time("2026-08-01T00:00"),
                    completed_at: fixed_time("2026-08-01T00:00"),
                });
            }
            for index in 0..newly_done {
                board.inbox.push(sample_task(&format!("new-{index}"), true));
            }
            seed(&store, keys::TASKS, &board);

            let summary = service
                .tick(fixed_time("2026-08-06T04:00"))
                .expect("tick succeeds");
            prop_assert_eq!(summary.archived_tasks, newly_done);

            let rolled: TaskBoard = read(&store, keys::TASKS);
            let total = already_archived + newly_done;
            prop_assert_eq!(rolled.completed.len(), total.min(COMPLETED_ARCHIVE_LIMIT));
            // Newest entries always survive; eviction removes the oldest.
            let last = rolled.completed.last().expect("archive is non-empty");
            let expected_last = format!("new-{}", newly_done - 1);
            prop_assert_eq!(last.id.as_str(), expected_last.as_str());
            if total > COMPLETED_ARCHIVE_LIMIT {
                let first = rolled.completed.first().expect("archive is non-empty");
                let expected_first = format!("old-{}", total - COMPLETED_ARCHIVE_LIMIT);
                prop_assert_eq!(first.id.as_str(), expected_first.as_str());
            }
        }
    }
}
