pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::{self, AppState};
pub use application::drag::{DragPreview, DragSource};
pub use application::editor::{EditorSession, Meridiem};
pub use application::rollover::TickSummary;
pub use domain::geometry::{
    grid_line_offsets, offset_from_time, time_from_offset, GridMetrics,
};
pub use domain::models::{
    CalendarEvent, DailyReflection, EventKind, Habit, Task, TaskBoard, TaskListId,
};
pub use infrastructure::error::InfraError;
