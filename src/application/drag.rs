use crate::domain::clock::{format_hhmm, hour_minute_from_minutes, minutes_of_day};
use crate::domain::geometry::{self, GridMetrics};
use crate::domain::models::{Habit, Task, MINUTES_PER_DAY};

pub const DEFAULT_TASK_DURATION_MINUTES: u32 = 30;
pub const DEFAULT_HABIT_DURATION_MINUTES: u32 = 15;

/// What is being dragged, decoded once at the drop boundary rather than
/// parsed ad hoc per handler. External sources create a new event on drop;
/// `Reposition` moves an existing one, keeping identity and duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragSource {
    Task { task_id: String, duration_minutes: u32 },
    Habit { habit_id: String },
    Reposition { event_id: String },
}

impl DragSource {
    pub fn for_task(task: &Task) -> Self {
        DragSource::Task {
            task_id: task.id.clone(),
            duration_minutes: task
                .estimate_minutes
                .unwrap_or(DEFAULT_TASK_DURATION_MINUTES),
        }
    }

    pub fn for_habit(habit: &Habit) -> Self {
        DragSource::Habit {
            habit_id: habit.id.clone(),
        }
    }

    pub fn reposition(event_id: impl Into<String>) -> Self {
        DragSource::Reposition {
            event_id: event_id.into(),
        }
    }
}

/// Render-time preview of the dragged block. Recomputed on every pointer
/// move; never written to the event store.
#[derive(Debug, Clone, PartialEq)]
pub struct DragPreview {
    pub hour: u8,
    pub minute: u8,
    pub top_offset: f32,
    pub height: f32,
    pub time_label: String,
}

#[derive(Debug, Default, PartialEq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging {
        source: DragSource,
        preview: Option<DragPreview>,
    },
}

impl DragState {
    pub fn begin(&mut self, source: DragSource) {
        *self = DragState::Dragging {
            source,
            preview: None,
        };
    }

    pub fn source(&self) -> Option<&DragSource> {
        match self {
            DragState::Idle => None,
            DragState::Dragging { source, .. } => Some(source),
        }
    }

    /// Recompute the live preview for the current pointer position. Returns
    /// `None` when no drag is in progress.
    pub fn update_preview(
        &mut self,
        metrics: &GridMetrics,
        duration_minutes: u32,
        pixel_y: f32,
    ) -> Option<DragPreview> {
        let DragState::Dragging { preview, .. } = self else {
            return None;
        };
        let next = preview_at(metrics, duration_minutes, pixel_y);
        *preview = Some(next.clone());
        Some(next)
    }

    /// Consume the drag on drop, handing the source back for the commit.
    pub fn take(&mut self) -> Option<DragSource> {
        match std::mem::take(self) {
            DragState::Idle => None,
            DragState::Dragging { source, .. } => Some(source),
        }
    }

    /// Discard the drag without committing. Returns whether one was active.
    pub fn cancel(&mut self) -> bool {
        let was_dragging = !matches!(self, DragState::Idle);
        *self = DragState::Idle;
        was_dragging
    }
}

/// Resolve a pointer position to the dropped start time, clamped so the
/// block still ends within the day.
pub fn drop_time(metrics: &GridMetrics, duration_minutes: u32, pixel_y: f32) -> (u8, u8) {
    let (hour, minute) = geometry::time_from_offset(metrics, pixel_y);
    let start = minutes_of_day(hour, minute);
    let latest_start = MINUTES_PER_DAY.saturating_sub(duration_minutes);
    let clamped = start.min(latest_start);
    hour_minute_from_minutes(clamped)
}

fn preview_at(metrics: &GridMetrics, duration_minutes: u32, pixel_y: f32) -> DragPreview {
    let (hour, minute) = drop_time(metrics, duration_minutes, pixel_y);
    DragPreview {
        hour,
        minute,
        top_offset: geometry::offset_from_time(metrics, hour, minute),
        height: geometry::block_height(metrics, duration_minutes),
        time_label: format_hhmm(hour, minute),
    }
}

/// The parallel, simpler machine for reordering a flat list (habit priority
/// order). Tracks only the dragged identifier and the hovered target index;
/// no grid geometry involved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReorderState {
    dragged_id: Option<String>,
    hover_index: Option<usize>,
}

impl ReorderState {
    pub fn begin(&mut self, dragged_id: impl Into<String>) {
        self.dragged_id = Some(dragged_id.into());
        self.hover_index = None;
    }

    pub fn hover(&mut self, index: usize) {
        if self.dragged_id.is_some() {
            self.hover_index = Some(index);
        }
    }

    /// Consume the reorder on drop, yielding the dragged id and target
    /// index when both are known.
    pub fn take(&mut self) -> Option<(String, usize)> {
        let dropped = match (self.dragged_id.take(), self.hover_index.take()) {
            (Some(id), Some(index)) => Some((id, index)),
            _ => None,
        };
        *self = ReorderState::default();
        dropped
    }

    pub fn cancel(&mut self) {
        *self = ReorderState::default();
    }
}

/// Remove the matching element and reinsert it at the clamped target index.
pub fn splice_reorder<T, F>(list: &mut Vec<T>, is_dragged: F, target_index: usize)
where
    F: Fn(&T) -> bool,
{
    let Some(from) = list.iter().position(is_dragged) else {
        return;
    };
    let item = list.remove(from);
    let to = target_index.min(list.len());
    list.insert(to, item);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> GridMetrics {
        GridMetrics::default()
    }

    fn offset_for(hour: u8, minute: u8) -> f32 {
        geometry::offset_from_time(&metrics(), hour, minute)
    }

    #[test]
    fn preview_requires_an_active_drag() {
        let mut state = DragState::default();
        assert_eq!(state.update_preview(&metrics(), 30, 100.0), None);
    }

    #[test]
    fn preview_tracks_the_pointer() {
        let mut state = DragState::default();
        state.begin(DragSource::Habit {
            habit_id: "hab-1".to_string(),
        });

        let preview = state
            .update_preview(
                &metrics(),
                DEFAULT_HABIT_DURATION_MINUTES,
                offset_for(14, 15),
            )
            .expect("preview while dragging");

        assert_eq!((preview.hour, preview.minute), (14, 15));
        assert_eq!(preview.time_label, "14:15");
        assert_eq!(preview.top_offset, offset_for(14, 15));
        assert_eq!(
            preview.height,
            geometry::block_height(&metrics(), DEFAULT_HABIT_DURATION_MINUTES)
        );
    }

    #[test]
    fn take_yields_the_source_and_resets_to_idle() {
        let mut state = DragState::default();
        let source = DragSource::Task {
            task_id: "tsk-1".to_string(),
            duration_minutes: 45,
        };
        state.begin(source.clone());

        assert_eq!(state.take(), Some(source));
        assert_eq!(state, DragState::Idle);
        assert_eq!(state.take(), None);
    }

    #[test]
    fn cancel_discards_the_preview() {
        let mut state = DragState::default();
        state.begin(DragSource::Reposition {
            event_id: "evt-1".to_string(),
        });
        let _ = state.update_preview(&metrics(), 30, offset_for(10, 0));

        assert!(state.cancel());
        assert_eq!(state, DragState::Idle);
        assert!(!state.cancel());
    }

    #[test]
    fn drop_time_keeps_the_block_within_the_day() {
        let grid = GridMetrics {
            start_hour: 6,
            visible_hours: 18,
            hour_height: 60.0,
            top_padding: 0.0,
        };
        // Pointer at the very bottom resolves to 23:55; a 10-hour block
        // must still end by midnight.
        assert_eq!(drop_time(&grid, 600, 1e6), (14, 0));
        assert_eq!(drop_time(&grid, 5, 1e6), (23, 55));
    }

    #[test]
    fn reorder_drop_requires_begin_and_hover() {
        let mut state = ReorderState::default();
        assert_eq!(state.take(), None);

        state.begin("hab-2");
        assert_eq!(state.take(), None);

        state.begin("hab-2");
        state.hover(3);
        assert_eq!(state.take(), Some(("hab-2".to_string(), 3)));
        assert_eq!(state, ReorderState::default());
    }

    #[test]
    fn hover_without_begin_is_ignored() {
        let mut state = ReorderState::default();
        state.hover(2);
        assert_eq!(state.take(), None);
    }

    #[test]
    fn splice_moves_and_clamps() {
        let mut list = vec!["a", "b", "c", "d"];
        splice_reorder(&mut list, |item| *item == "a", 2);
        assert_eq!(list, vec!["b", "c", "a", "d"]);

        splice_reorder(&mut list, |item| *item == "b", 99);
        assert_eq!(list, vec!["c", "a", "d", "b"]);

        splice_reorder(&mut list, |item| *item == "missing", 0);
        assert_eq!(list, vec!["c", "a", "d", "b"]);
    }
}
