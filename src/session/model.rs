use chrono::{DateTime, Utc};

/// One logged-in device of one user
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Session {
    pub device_id: String,
    pub user_id: String,
    pub server_name: String,
    pub access_token: String,
    /// `None` for sessions created without refresh support
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: impl Into<String>,
        device_id: impl Into<String>,
        server_name: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            device_id: device_id.into(),
            user_id: user_id.into(),
            server_name: server_name.into(),
            access_token: access_token.into(),
            refresh_token: None,
            created_at: now,
            last_seen_at: now,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(&self.user_id, &self.device_id)
    }
}

/// Identity of a session: a device belongs to exactly one user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceKey {
    pub user_id: String,
    pub device_id: String,
}

impl DeviceKey {
    pub fn new(user_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            device_id: device_id.into(),
        }
    }
}

/// Arguments of a compare-and-swap rotation.
///
/// `old_refresh_token` is the token the client presented, not the one read
/// during lookup; the store only commits if it is still current.
#[derive(Debug, Clone)]
pub struct RotateTokens {
    pub device_id: String,
    pub user_id: String,
    pub old_refresh_token: String,
    pub new_access_token: String,
    pub new_refresh_token: String,
}

impl RotateTokens {
    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(&self.user_id, &self.device_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOutcome {
    Committed,
    /// `old_refresh_token` was no longer current; nothing was written
    LostRace,
}
