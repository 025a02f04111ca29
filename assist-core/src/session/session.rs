use chrono::{DateTime, Utc};
use serde::Serialize;

/// Username recorded when the caller could not be identified
pub const ANONYMOUS: &str = "anonymous";

/// Bookkeeping for one chat session
/// The conversation itself lives with the agent; this only correlates ids to users
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl SessionInfo {
    pub fn new(session_id: String, username: Option<&str>) -> Self {
        let now = Utc::now();
        let username = username
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(ANONYMOUS)
            .to_string();

        Self {
            session_id,
            username,
            created_at: now,
            last_active: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Utc::now();
    }

    pub fn is_idle(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_active > ttl
    }
}
