use crate::domain::geometry::GridMetrics;
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const GRID_JSON: &str = "grid.json";

pub const DEFAULT_SNAP_INCREMENT_MINUTES: u32 = 15;

/// Grid settings handed to the engine at call time; the engine never reads
/// ambient/global state.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub metrics: GridMetrics,
    pub snap_increment_minutes: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            metrics: GridMetrics::default(),
            snap_increment_minutes: DEFAULT_SNAP_INCREMENT_MINUTES,
        }
    }
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "Daymark"
            }),
        ),
        (
            GRID_JSON,
            serde_json::json!({
                "schema": 1,
                "startHour": 6,
                "visibleHours": 17,
                "hourHeightPx": 60.0,
                "topPaddingPx": 8.0,
                "snapIncrementMinutes": DEFAULT_SNAP_INCREMENT_MINUTES
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidInput(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidInput(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

/// Best-effort overlay of grid.json onto the defaults. A missing or
/// unreadable file yields the defaults rather than an error.
pub fn load_grid_config(config_dir: &Path) -> GridConfig {
    let mut config = GridConfig::default();
    let Ok(parsed) = read_config(&config_dir.join(GRID_JSON)) else {
        return config;
    };

    if let Some(value) = parsed.get("startHour").and_then(serde_json::Value::as_u64) {
        if value <= 23 {
            config.metrics.start_hour = value as u8;
        }
    }
    if let Some(value) = parsed
        .get("visibleHours")
        .and_then(serde_json::Value::as_u64)
    {
        let max_span = 24 - config.metrics.start_hour as u64;
        if value >= 1 && value <= max_span {
            config.metrics.visible_hours = value as u8;
        }
    }
    if let Some(value) = parsed
        .get("hourHeightPx")
        .and_then(serde_json::Value::as_f64)
    {
        if value > 0.0 {
            config.metrics.hour_height = value as f32;
        }
    }
    if let Some(value) = parsed
        .get("topPaddingPx")
        .and_then(serde_json::Value::as_f64)
    {
        if value >= 0.0 {
            config.metrics.top_padding = value as f32;
        }
    }
    if let Some(value) = parsed
        .get("snapIncrementMinutes")
        .and_then(serde_json::Value::as_u64)
    {
        if value >= 1 && value <= 60 {
            config.snap_increment_minutes = value as u32;
        }
    }

    config
}
