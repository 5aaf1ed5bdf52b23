use crate::domain::clock::{hour_minute_from_minutes, minutes_of_day};

/// Fixed resolution for pointer-derived positions. Distinct from the
/// configurable snap increment used for visual grid lines.
pub const POINTER_SNAP_MINUTES: u32 = 5;

/// Pixel layout of the visible calendar surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMetrics {
    pub start_hour: u8,
    pub visible_hours: u8,
    pub hour_height: f32,
    pub top_padding: f32,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self {
            start_hour: 6,
            visible_hours: 17,
            hour_height: 60.0,
            top_padding: 8.0,
        }
    }
}

impl GridMetrics {
    fn window_start_minutes(&self) -> u32 {
        self.start_hour as u32 * 60
    }

    // Exclusive upper bound of the visible window.
    fn window_end_minutes(&self) -> u32 {
        (self.start_hour as u32 + self.visible_hours as u32) * 60
    }
}

/// Resolve a pointer offset within the grid to a wall-clock time, snapped to
/// the 5-minute pointer resolution and clamped into the visible window. A
/// snapped minute of 60 carries into the hour before clamping.
pub fn time_from_offset(metrics: &GridMetrics, pixel_y: f32) -> (u8, u8) {
    let raw_minutes = metrics.window_start_minutes() as f32
        + (pixel_y - metrics.top_padding) / metrics.hour_height * 60.0;
    let snapped = snap_to_increment(raw_minutes, POINTER_SNAP_MINUTES);

    let lower = metrics.window_start_minutes() as i64;
    let upper = metrics.window_end_minutes() as i64 - POINTER_SNAP_MINUTES as i64;
    let clamped = snapped.clamp(lower, upper.max(lower)) as u32;
    hour_minute_from_minutes(clamped)
}

/// Inverse of `time_from_offset` for times inside the visible window.
pub fn offset_from_time(metrics: &GridMetrics, hour: u8, minute: u8) -> f32 {
    let delta = minutes_of_day(hour, minute) as f32 - metrics.window_start_minutes() as f32;
    metrics.top_padding + delta / 60.0 * metrics.hour_height
}

/// Pixel height of a block spanning `duration_minutes`.
pub fn block_height(metrics: &GridMetrics, duration_minutes: u32) -> f32 {
    duration_minutes as f32 / 60.0 * metrics.hour_height
}

/// Offsets of the horizontal grid lines for the configured snap increment,
/// both window boundaries included.
pub fn grid_line_offsets(metrics: &GridMetrics, snap_increment_minutes: u32) -> Vec<f32> {
    let increment = snap_increment_minutes.max(1);
    let mut offsets = Vec::new();
    let mut cursor = metrics.window_start_minutes();
    while cursor <= metrics.window_end_minutes() {
        let (hour, minute) = hour_minute_from_minutes(cursor);
        offsets.push(offset_from_time(metrics, hour, minute));
        cursor += increment;
    }
    offsets
}

fn snap_to_increment(raw_minutes: f32, increment: u32) -> i64 {
    let increment = increment.max(1) as f32;
    (raw_minutes / increment).round() as i64 * increment as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn metrics() -> GridMetrics {
        GridMetrics::default()
    }

    #[test]
    fn offset_at_top_padding_is_window_start() {
        let metrics = metrics();
        assert_eq!(time_from_offset(&metrics, metrics.top_padding), (6, 0));
    }

    #[test]
    fn pointer_above_grid_clamps_to_window_start() {
        assert_eq!(time_from_offset(&metrics(), -500.0), (6, 0));
    }

    #[test]
    fn pointer_below_grid_clamps_to_last_visible_slot() {
        // Window is [6:00, 23:00); the last representable start is 22:55.
        assert_eq!(time_from_offset(&metrics(), 1e6), (22, 55));
    }

    #[test]
    fn pointer_positions_snap_to_five_minutes() {
        let metrics = metrics();
        // 9:32 raw resolves to the nearer 9:30.
        let offset = metrics.top_padding + 3.0 * metrics.hour_height
            + 32.0 / 60.0 * metrics.hour_height;
        assert_eq!(time_from_offset(&metrics, offset), (9, 30));
    }

    #[test]
    fn snapped_minute_sixty_carries_into_hour() {
        let metrics = metrics();
        // 10:58 raw snaps to 11:00, not 10:60.
        let offset = metrics.top_padding + 4.0 * metrics.hour_height
            + 58.0 / 60.0 * metrics.hour_height;
        assert_eq!(time_from_offset(&metrics, offset), (11, 0));
    }

    #[test]
    fn block_height_scales_with_duration() {
        assert_eq!(block_height(&metrics(), 30), 30.0);
        assert_eq!(block_height(&metrics(), 90), 90.0);
    }

    #[test]
    fn grid_lines_cover_the_window_inclusively() {
        let metrics = GridMetrics {
            start_hour: 8,
            visible_hours: 2,
            hour_height: 60.0,
            top_padding: 0.0,
        };
        let offsets = grid_line_offsets(&metrics, 30);
        assert_eq!(offsets, vec![0.0, 30.0, 60.0, 90.0, 120.0]);
    }

    proptest! {
        #[test]
        fn round_trip_holds_on_five_minute_boundaries(
            slot in 0u32..((17 * 60) / POINTER_SNAP_MINUTES),
            hour_height in 20.0f32..200.0,
            top_padding in 0.0f32..40.0
        ) {
            let metrics = GridMetrics {
                start_hour: 6,
                visible_hours: 17,
                hour_height,
                top_padding,
            };
            let total = metrics.start_hour as u32 * 60 + slot * POINTER_SNAP_MINUTES;
            let (hour, minute) = crate::domain::clock::hour_minute_from_minutes(total);

            let offset = offset_from_time(&metrics, hour, minute);
            prop_assert_eq!(time_from_offset(&metrics, offset), (hour, minute));
        }
    }
}
