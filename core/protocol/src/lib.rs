//! Shared data and wire types for the fieldtrace agent.
//!
//! This crate is shared by the daemon and the CLI to prevent schema drift.
//! The remote service is the authority on the wire contract; everything here
//! mirrors its exact field names so a serialized row matches what the
//! original endpoint expects byte for byte.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote table every fix is appended to.
pub const REMOTE_TABLE_NAME: &str = "location_history";

/// Identifying headers attached to every authenticated request.
pub const APPHIT_HEADER: &str = "apphit";
pub const APPHIT_VALUE: &str = "view360";
pub const DEVICE_ID_HEADER: &str = "deviceid";

/// Response `error` value signalling this session was superseded by a newer
/// login. The one server-originated error with control-flow consequences.
pub const MULTIPLE_LOGIN: &str = "multipleLogin";

/// Name under which the background tracking task registers with the runner.
pub const BACKGROUND_TASK_NAME: &str = "background-location-task";

/// Which observation channel produced a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingType {
    Foreground,
    Background,
}

impl TrackingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingType::Foreground => "foreground",
            TrackingType::Background => "background",
        }
    }
}

impl std::fmt::Display for TrackingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated identity. All three fields are populated atomically on
/// login and cleared together on logout; a partially-populated session is
/// treated as absent everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub auth_token: String,
    pub user_id: String,
    pub user_name: String,
}

impl Session {
    /// A fix must never ship under an incomplete identity.
    pub fn is_complete(&self) -> bool {
        !self.auth_token.is_empty() && !self.user_id.is_empty() && !self.user_name.is_empty()
    }
}

/// Device metadata attached to every fix. Unavailable values stay `None` and
/// serialize as explicit nulls rather than omitted fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub brand: Option<String>,
    pub model: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub build_id: Option<String>,
}

/// A single recorded GPS coordinate pair with timestamp and context.
/// Immutable once constructed; append-only semantics everywhere downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub tracking_type: TrackingType,
    pub user_id: String,
    pub user_name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// RFC 3339 capture timestamp.
    pub captured_at: String,
    pub device: DeviceInfo,
}

impl LocationFix {
    pub fn new(
        tracking_type: TrackingType,
        session: &Session,
        latitude: f64,
        longitude: f64,
        captured_at: DateTime<Utc>,
        device: DeviceInfo,
    ) -> Self {
        Self {
            tracking_type,
            user_id: session.user_id.clone(),
            user_name: session.user_name.clone(),
            latitude,
            longitude,
            captured_at: captured_at.to_rfc3339(),
            device,
        }
    }
}

/// Permission and service readiness as reported by the platform shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub foreground_granted: bool,
    pub background_granted: bool,
    pub services_enabled: bool,
}

/// Per-tracker activity state. Never persisted; recomputed at each launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerState {
    #[default]
    Inactive,
    Active,
}

/// Coarse status surface for UI clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStatus {
    pub services_enabled: bool,
    pub foreground: TrackerState,
    pub background: TrackerState,
}

/// Outcome of shipping one fix to the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShipReceipt {
    pub accepted: bool,
    pub duplicate_session: bool,
}

impl ShipReceipt {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            duplicate_session: false,
        }
    }

    pub fn rejected() -> Self {
        Self {
            accepted: false,
            duplicate_session: false,
        }
    }

    pub fn superseded() -> Self {
        Self {
            accepted: false,
            duplicate_session: true,
        }
    }
}

/// One row of the remote `location_history` table, using the exact wire
/// field names the endpoint expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub tracking_type: String,
    pub user_id: String,
    pub user_name: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(rename = "createdOn")]
    pub created_on: String,
    pub mobile_brand: Option<String>,
    pub mobile_model: Option<String>,
    pub mobile_os_name: Option<String>,
    pub mobile_os_version: Option<String>,
    pub mobile_os_internal_buildid: Option<String>,
}

impl From<&LocationFix> for TableRow {
    fn from(fix: &LocationFix) -> Self {
        Self {
            tracking_type: fix.tracking_type.as_str().to_string(),
            user_id: fix.user_id.clone(),
            user_name: fix.user_name.clone(),
            lat: fix.latitude,
            lng: fix.longitude,
            created_on: fix.captured_at.clone(),
            mobile_brand: fix.device.brand.clone(),
            mobile_model: fix.device.model.clone(),
            mobile_os_name: fix.device.os_name.clone(),
            mobile_os_version: fix.device.os_version.clone(),
            mobile_os_internal_buildid: fix.device.build_id.clone(),
        }
    }
}

/// Body of `POST database/addTableRow`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AddRowRequest {
    #[serde(rename = "tableName")]
    pub table_name: String,
    #[serde(rename = "tableData")]
    pub table_data: TableRow,
}

impl AddRowRequest {
    pub fn for_fix(fix: &LocationFix) -> Self {
        Self {
            table_name: REMOTE_TABLE_NAME.to_string(),
            table_data: TableRow::from(fix),
        }
    }
}

/// Generic response envelope of the remote data API.
#[derive(Debug, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub status: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn is_duplicate_session(&self) -> bool {
        self.error.as_deref() == Some(MULTIPLE_LOGIN)
    }
}

/// Body of `POST auth/login`.
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "appType")]
    pub app_type: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "Skip2FA")]
    pub skip_2fa: bool,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub firstname: String,
    #[serde(default)]
    pub lastname: String,
}

impl LoginUser {
    /// Display name composed from first and last name, matching what the
    /// remote store expects in `user_name`.
    pub fn full_name(&self) -> String {
        if self.lastname.is_empty() {
            self.firstname.clone()
        } else {
            format!("{} {}", self.firstname, self.lastname)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginData {
    #[serde(default)]
    pub user: LoginUser,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub data: LoginData,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session() -> Session {
        Session {
            auth_token: "cookie".to_string(),
            user_id: "42".to_string(),
            user_name: "Ada Lovelace".to_string(),
        }
    }

    fn fix() -> LocationFix {
        LocationFix::new(
            TrackingType::Foreground,
            &session(),
            37.422,
            -122.084,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            DeviceInfo {
                brand: Some("acme".to_string()),
                model: None,
                os_name: Some("Linux".to_string()),
                os_version: Some("6.1".to_string()),
                build_id: None,
            },
        )
    }

    #[test]
    fn tracking_type_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TrackingType::Foreground).unwrap(),
            "\"foreground\""
        );
        assert_eq!(
            serde_json::to_string(&TrackingType::Background).unwrap(),
            "\"background\""
        );
    }

    #[test]
    fn incomplete_session_is_detected() {
        let mut s = session();
        assert!(s.is_complete());
        s.user_name.clear();
        assert!(!s.is_complete());
    }

    #[test]
    fn add_row_request_uses_exact_wire_names() {
        let request = AddRowRequest::for_fix(&fix());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["tableName"], "location_history");
        let row = &value["tableData"];
        assert_eq!(row["tracking_type"], "foreground");
        assert_eq!(row["user_id"], "42");
        assert_eq!(row["user_name"], "Ada Lovelace");
        assert_eq!(row["lat"], 37.422);
        assert_eq!(row["lng"], -122.084);
        assert_eq!(row["createdOn"], "2024-01-01T00:00:00+00:00");
        // Unavailable metadata serializes as explicit nulls, never omitted.
        assert!(row["mobile_model"].is_null());
        assert!(row["mobile_os_internal_buildid"].is_null());
        assert_eq!(row["mobile_brand"], "acme");
    }

    #[test]
    fn duplicate_session_signal_is_recognized() {
        let body: ApiResponse =
            serde_json::from_str(r#"{"status":false,"error":"multipleLogin"}"#).unwrap();
        assert!(body.is_duplicate_session());

        let body: ApiResponse = serde_json::from_str(r#"{"status":true,"data":{}}"#).unwrap();
        assert!(!body.is_duplicate_session());
    }

    #[test]
    fn login_request_uses_remote_field_names() {
        let request = LoginRequest {
            email: "a@b.c".to_string(),
            password: "pw".to_string(),
            device_id: "dev-1".to_string(),
            app_type: "view360".to_string(),
            kind: "mobile".to_string(),
            skip_2fa: false,
            token: String::new(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["deviceId"], "dev-1");
        assert_eq!(value["appType"], "view360");
        assert_eq!(value["type"], "mobile");
        assert_eq!(value["Skip2FA"], false);
    }

    #[test]
    fn full_name_skips_missing_lastname() {
        let user = LoginUser {
            id: "1".to_string(),
            firstname: "Ada".to_string(),
            lastname: String::new(),
        };
        assert_eq!(user.full_name(), "Ada");

        let user = LoginUser {
            lastname: "Lovelace".to_string(),
            ..user
        };
        assert_eq!(user.full_name(), "Ada Lovelace");
    }
}
