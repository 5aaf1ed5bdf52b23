use crate::domain::models::{
    CalendarEvent, EventKind, MAX_EVENT_DURATION_MINUTES,
};

pub const MIN_EDITOR_DURATION_MINUTES: u32 = 5;
pub const DURATION_PRESETS_MINUTES: [u32; 6] = [15, 30, 45, 60, 120, 240];
const DEFAULT_DURATION_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

/// Transient form state for creating or editing one calendar event. Nothing
/// here touches the event store; `build_event` produces the record the
/// command layer commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSession {
    event_id: Option<String>,
    kind: EventKind,
    title: String,
    linked_item_id: Option<String>,
    start_hour: u8,
    start_minute: u8,
    duration_minutes: u32,
    persistent: bool,
    delete_armed: bool,
}

impl EditorSession {
    pub fn for_new(start_hour: u8, start_minute: u8) -> Self {
        Self {
            event_id: None,
            kind: EventKind::Plain,
            title: String::new(),
            linked_item_id: None,
            start_hour: start_hour.min(23),
            start_minute: start_minute.min(59),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            persistent: false,
            delete_armed: false,
        }
    }

    pub fn for_event(event: &CalendarEvent) -> Self {
        Self {
            event_id: Some(event.id.clone()),
            kind: event.kind,
            title: event.title.clone(),
            linked_item_id: event.linked_item_id.clone(),
            start_hour: event.start_hour,
            start_minute: event.start_minute,
            duration_minutes: event.duration_minutes,
            persistent: event.persistent,
            delete_armed: false,
        }
    }

    pub fn event_id(&self) -> Option<&str> {
        self.event_id.as_deref()
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn linked_item_id(&self) -> Option<&str> {
        self.linked_item_id.as_deref()
    }

    pub fn start_time(&self) -> (u8, u8) {
        (self.start_hour, self.start_minute)
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn persistent(&self) -> bool {
        self.persistent
    }

    pub fn delete_armed(&self) -> bool {
        self.delete_armed
    }

    /// The three kinds are mutually exclusive; switching resets the title
    /// and link fields.
    pub fn set_kind(&mut self, kind: EventKind) {
        self.delete_armed = false;
        if self.kind != kind {
            self.kind = kind;
            self.title.clear();
            self.linked_item_id = None;
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.delete_armed = false;
        self.title = title.into();
    }

    pub fn set_linked_item(&mut self, linked_item_id: Option<String>) {
        self.delete_armed = false;
        self.linked_item_id = linked_item_id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }

    pub fn set_start(&mut self, hour: u8, minute: u8) {
        self.delete_armed = false;
        if hour <= 23 && minute <= 59 {
            self.start_hour = hour;
            self.start_minute = minute;
        }
    }

    /// 12-hour entry helper; hours outside 1..=12 are ignored.
    pub fn set_start_12h(&mut self, hour: u8, minute: u8, meridiem: Meridiem) {
        if hour < 1 || hour > 12 {
            return;
        }
        let hour24 = match (hour, meridiem) {
            (12, Meridiem::Am) => 0,
            (12, Meridiem::Pm) => 12,
            (hour, Meridiem::Am) => hour,
            (hour, Meridiem::Pm) => hour + 12,
        };
        self.set_start(hour24, minute);
    }

    /// Free numeric entry: rounded to the nearest 5 minutes, then clamped
    /// into the editor range. Preset chips go through here too.
    pub fn set_duration(&mut self, minutes: u32) {
        self.delete_armed = false;
        let rounded = (minutes + 2) / 5 * 5;
        self.duration_minutes =
            rounded.clamp(MIN_EDITOR_DURATION_MINUTES, MAX_EVENT_DURATION_MINUTES);
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.delete_armed = false;
        self.persistent = persistent;
    }

    /// Press-to-arm delete: the first request arms and returns false, the
    /// second confirms. Any other edit disarms.
    pub fn request_delete(&mut self) -> bool {
        if self.delete_armed {
            return true;
        }
        self.delete_armed = true;
        false
    }

    pub fn disarm_delete(&mut self) {
        self.delete_armed = false;
    }

    /// Produce the event to commit, or `None` when no usable title exists
    /// (literal text for plain events, a resolved link title otherwise).
    /// The caller surfaces nothing on `None`; the form simply stays open.
    pub fn build_event(&self, id: &str, resolved_link_title: Option<&str>) -> Option<CalendarEvent> {
        let title = match self.kind {
            EventKind::Plain => {
                let trimmed = self.title.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.to_string()
            }
            EventKind::TaskLink | EventKind::HabitLink => {
                self.linked_item_id.as_deref()?;
                let resolved = resolved_link_title.map(str::trim).unwrap_or_default();
                if resolved.is_empty() {
                    return None;
                }
                resolved.to_string()
            }
        };

        Some(CalendarEvent {
            id: id.to_string(),
            title,
            start_hour: self.start_hour,
            start_minute: self.start_minute,
            duration_minutes: self.duration_minutes,
            kind: self.kind,
            linked_item_id: self.linked_item_id.clone(),
            persistent: self.persistent,
        })
    }
}
