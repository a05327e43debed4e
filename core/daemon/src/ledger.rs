//! SQLite persistence for the local position ledger.
//!
//! A durable on-device mirror of every recorded fix. The schema matches the
//! remote `location_history` table column for column. Append-only: no update
//! or delete path exists, and no replay of unshipped rows is attempted (the
//! ledger is a mirror, not a queue).
//!
//! Connection-per-call; SQLite serializes concurrent writers from the two
//! trackers natively, so no application-level locking is added.

use rusqlite::{params, Connection};
use std::path::PathBuf;

use fieldtrace_protocol::{DeviceInfo, LocationFix, TrackingType};

pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: PathBuf) -> Result<Self, String> {
        if let Some(parent) = path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|err| format!("Failed to create ledger directory: {}", err))?;
        }
        let ledger = Self { path };
        ledger.ensure_table()?;
        Ok(ledger)
    }

    fn with_connection<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, String>,
    ) -> Result<T, String> {
        let conn = Connection::open(&self.path)
            .map_err(|err| format!("Failed to open ledger database: {}", err))?;
        operation(&conn)
    }

    /// Idempotent schema creation.
    pub fn ensure_table(&self) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS location_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tracking_type TEXT,
                    user_id TEXT,
                    user_name TEXT,
                    lat REAL,
                    lng REAL,
                    createdOn TEXT,
                    mobile_brand TEXT,
                    mobile_model TEXT,
                    mobile_os_name TEXT,
                    mobile_os_version TEXT,
                    mobile_os_internal_buildid TEXT
                )",
                [],
            )
            .map_err(|err| format!("Failed to create location_history table: {}", err))?;
            Ok(())
        })
    }

    pub fn insert(&self, fix: &LocationFix) -> Result<(), String> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO location_history \
                    (tracking_type, user_id, user_name, lat, lng, createdOn, \
                     mobile_brand, mobile_model, mobile_os_name, mobile_os_version, \
                     mobile_os_internal_buildid) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    fix.tracking_type.as_str(),
                    fix.user_id,
                    fix.user_name,
                    fix.latitude,
                    fix.longitude,
                    fix.captured_at,
                    fix.device.brand,
                    fix.device.model,
                    fix.device.os_name,
                    fix.device.os_version,
                    fix.device.build_id,
                ],
            )
            .map_err(|err| format!("Failed to insert location fix: {}", err))?;
            Ok(())
        })
    }

    pub fn select_all(&self) -> Result<Vec<LocationFix>, String> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT tracking_type, user_id, user_name, lat, lng, createdOn, \
                            mobile_brand, mobile_model, mobile_os_name, mobile_os_version, \
                            mobile_os_internal_buildid \
                     FROM location_history ORDER BY id ASC",
                )
                .map_err(|err| format!("Failed to prepare ledger query: {}", err))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        LocationFix {
                            tracking_type: TrackingType::Foreground,
                            user_id: row.get(1)?,
                            user_name: row.get(2)?,
                            latitude: row.get(3)?,
                            longitude: row.get(4)?,
                            captured_at: row.get(5)?,
                            device: DeviceInfo {
                                brand: row.get(6)?,
                                model: row.get(7)?,
                                os_name: row.get(8)?,
                                os_version: row.get(9)?,
                                build_id: row.get(10)?,
                            },
                        },
                    ))
                })
                .map_err(|err| format!("Failed to read ledger rows: {}", err))?;

            let mut fixes = Vec::new();
            for row in rows {
                let (tracking_type, mut fix) =
                    row.map_err(|err| format!("Failed to decode ledger row: {}", err))?;
                fix.tracking_type = parse_tracking_type(&tracking_type)?;
                fixes.push(fix);
            }
            Ok(fixes)
        })
    }

    pub fn count(&self) -> Result<i64, String> {
        self.with_connection(|conn| {
            conn.query_row("SELECT COUNT(*) FROM location_history", [], |row| {
                row.get::<_, i64>(0)
            })
            .map_err(|err| format!("Failed to count ledger rows: {}", err))
        })
    }
}

fn parse_tracking_type(value: &str) -> Result<TrackingType, String> {
    match value {
        "foreground" => Ok(TrackingType::Foreground),
        "background" => Ok(TrackingType::Background),
        other => Err(format!("Unknown tracking type in ledger: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldtrace_protocol::Session;
    use tempfile::TempDir;

    fn ledger() -> (TempDir, Ledger) {
        let dir = TempDir::new().expect("temp dir");
        let ledger = Ledger::new(dir.path().join("agent").join("ledger.db")).expect("ledger init");
        (dir, ledger)
    }

    fn fix(tracking_type: TrackingType) -> LocationFix {
        LocationFix {
            tracking_type,
            user_id: "42".to_string(),
            user_name: "Ada Lovelace".to_string(),
            latitude: 37.422,
            longitude: -122.084,
            captured_at: "2024-01-01T00:00:00+00:00".to_string(),
            device: DeviceInfo {
                brand: Some("acme".to_string()),
                model: Some("rover".to_string()),
                os_name: Some("Linux".to_string()),
                os_version: None,
                build_id: None,
            },
        }
    }

    #[test]
    fn insert_select_round_trips_unchanged() {
        let (_dir, ledger) = ledger();
        let recorded = fix(TrackingType::Foreground);
        ledger.insert(&recorded).expect("insert fix");

        let rows = ledger.select_all().expect("select all");
        assert_eq!(rows, vec![recorded]);
    }

    #[test]
    fn ensure_table_is_idempotent() {
        let (_dir, ledger) = ledger();
        ledger.ensure_table().expect("first ensure");
        ledger.ensure_table().expect("second ensure");
        assert_eq!(ledger.count().expect("count"), 0);
    }

    #[test]
    fn rows_come_back_in_insertion_order() {
        let (_dir, ledger) = ledger();
        ledger.insert(&fix(TrackingType::Foreground)).expect("insert");
        ledger.insert(&fix(TrackingType::Background)).expect("insert");

        let rows = ledger.select_all().expect("select all");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].tracking_type, TrackingType::Foreground);
        assert_eq!(rows[1].tracking_type, TrackingType::Background);
    }

    #[test]
    fn null_metadata_round_trips_as_none() {
        let (_dir, ledger) = ledger();
        let session = Session {
            auth_token: "c".to_string(),
            user_id: "1".to_string(),
            user_name: "n".to_string(),
        };
        let recorded = LocationFix::new(
            TrackingType::Background,
            &session,
            0.0,
            0.0,
            chrono::Utc::now(),
            DeviceInfo::default(),
        );
        ledger.insert(&recorded).expect("insert fix");
        let rows = ledger.select_all().expect("select all");
        assert_eq!(rows[0].device, DeviceInfo::default());
    }
}
