//! Remote sync client.
//!
//! A thin wrapper over the remote HTTP service: login, shipping a fix into
//! the `location_history` table, and fetching a user profile. Every request
//! carries the identifying headers when a device id is configured.
//!
//! Shipping is fire-and-forget: transport failures and non-2xx responses are
//! logged and reported as a rejected receipt, never as an error the caller
//! has to handle. The one response the caller must act on is the
//! `multipleLogin` signal, meaning this session was superseded by a newer
//! login; it surfaces as `duplicate_session` on the receipt and the
//! lifecycle controller turns it into a forced logout.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use fieldtrace_protocol::{
    AddRowRequest, ApiResponse, LocationFix, LoginRequest, LoginResponse, Session, ShipReceipt,
    APPHIT_HEADER, APPHIT_VALUE, DEVICE_ID_HEADER,
};

use crate::config::AgentConfig;
use crate::error::{Result, TrackError};

const LOGIN_KIND: &str = "mobile";

/// Seam between the trackers and the remote store, mockable in tests.
pub trait FixShipper: Send + Sync {
    fn ship(&self, fix: &LocationFix) -> ShipReceipt;
}

pub struct RemoteClient {
    base_url: String,
    app_type: String,
    device_id: Option<String>,
    client: Client,
}

impl RemoteClient {
    pub fn new(config: &AgentConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: config.base_url.clone(),
            app_type: config.app_type.clone(),
            device_id: config.device_id.clone(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn identity_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(device_id) = &self.device_id {
            if let Ok(value) = HeaderValue::from_str(device_id) {
                headers.insert(APPHIT_HEADER, HeaderValue::from_static(APPHIT_VALUE));
                headers.insert(DEVICE_ID_HEADER, value);
            }
        }
        headers
    }

    /// Authenticates against `auth/login` and assembles a complete session
    /// from the response body and the session-establishing cookie header.
    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
            device_id: self.device_id.clone().unwrap_or_default(),
            app_type: self.app_type.clone(),
            kind: LOGIN_KIND.to_string(),
            skip_2fa: false,
            token: String::new(),
        };

        let response = self
            .client
            .post(self.url("auth/login"))
            .headers(self.identity_headers())
            .json(&body)
            .send()
            .map_err(|source| TrackError::Http {
                context: "posting login request".to_string(),
                source,
            })?;

        let status = response.status();
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let text = response.text().map_err(|source| TrackError::Http {
            context: "reading login response".to_string(),
            source,
        })?;
        let parsed: LoginResponse = serde_json::from_str(&text).unwrap_or_default();

        if !status.is_success() {
            let message = parsed
                .message
                .unwrap_or_else(|| format!("login failed with HTTP {}", status.as_u16()));
            return Err(TrackError::LoginRejected(message));
        }

        let auth_token = cookie.ok_or(TrackError::SessionCookieMissing)?;
        let user = parsed.data.user;

        Ok(Session {
            auth_token,
            user_id: user.id.clone(),
            user_name: user.full_name(),
        })
    }

    /// Fetches profile fields for a user (`GET user/{id}`).
    pub fn fetch_user(&self, user_id: &str) -> Result<Value> {
        let response = self
            .client
            .get(self.url(&format!("user/{}", user_id)))
            .headers(self.identity_headers())
            .send()
            .map_err(|source| TrackError::Http {
                context: "fetching user profile".to_string(),
                source,
            })?;

        let body: ApiResponse = response.json().map_err(|source| TrackError::Http {
            context: "reading user profile response".to_string(),
            source,
        })?;
        Ok(body.data)
    }
}

impl FixShipper for RemoteClient {
    fn ship(&self, fix: &LocationFix) -> ShipReceipt {
        let body = AddRowRequest::for_fix(fix);
        let response = self
            .client
            .post(self.url("database/addTableRow"))
            .headers(self.identity_headers())
            .json(&body)
            .send();

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Failed to ship location fix");
                return ShipReceipt::rejected();
            }
        };

        let status = response.status();
        let text = match response.text() {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "Failed to read ship response body");
                return ShipReceipt::rejected();
            }
        };

        let receipt = interpret_ship_response(status, &text);
        debug!(
            accepted = receipt.accepted,
            duplicate_session = receipt.duplicate_session,
            tracking_type = %fix.tracking_type,
            "Location fix shipped"
        );
        receipt
    }
}

/// Interprets one ship response. Pure so the response contract stays
/// unit-testable without a network.
pub fn interpret_ship_response(status: StatusCode, body: &str) -> ShipReceipt {
    if !status.is_success() {
        warn!(status = status.as_u16(), "Remote store rejected fix");
        return ShipReceipt::rejected();
    }

    let parsed: ApiResponse = match serde_json::from_str(body) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "Ship response was not valid JSON");
            return ShipReceipt::rejected();
        }
    };

    if parsed.is_duplicate_session() {
        return ShipReceipt::superseded();
    }

    if parsed.status {
        ShipReceipt::accepted()
    } else {
        ShipReceipt::rejected()
    }
}
