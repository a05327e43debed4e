//! Location source seam.
//!
//! The platform positioning service drops the latest observed position into
//! `position.json` under the storage root; `PositionFile` reads it on each
//! poll. Tests substitute scripted sources through the same trait.

use chrono::{DateTime, Utc};
use fs_err as fs;
use serde::Deserialize;
use std::path::PathBuf;

/// One raw position as delivered by the positioning service.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    /// When the service stamped the observation; fix construction falls back
    /// to the current time when absent.
    pub timestamp: Option<DateTime<Utc>>,
}

pub trait LocationSource: Send {
    fn poll(&mut self) -> Result<Position, String>;
}

#[derive(Debug, Deserialize)]
struct PositionRecord {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    recorded_at: Option<DateTime<Utc>>,
}

/// Production source backed by the positioning service's drop file.
pub struct PositionFile {
    path: PathBuf,
}

impl PositionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LocationSource for PositionFile {
    fn poll(&mut self) -> Result<Position, String> {
        let data = fs::read_to_string(&self.path)
            .map_err(|err| format!("Failed to read position file: {}", err))?;
        let record: PositionRecord = serde_json::from_str(&data)
            .map_err(|err| format!("Failed to parse position file: {}", err))?;
        Ok(Position {
            latitude: record.latitude,
            longitude: record.longitude,
            timestamp: record.recorded_at,
        })
    }
}
