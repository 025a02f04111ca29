use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::SessionInfo;
use crate::config::SessionSettings;
use crate::error::{AssistError, Result};

/// Configuration for the session registry
#[derive(Clone, Debug, Default)]
pub struct RegistryConfig {
    /// Maximum number of tracked sessions (None = unlimited)
    pub max_sessions: Option<usize>,
    /// Idle time after which a session is evicted (None = never)
    pub idle_ttl: Option<Duration>,
}

impl From<&SessionSettings> for RegistryConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self {
            max_sessions: settings.max_sessions,
            idle_ttl: settings.idle_ttl(),
        }
    }
}

/// Session registry - tracks chat sessions by ID
/// Handles creation, lookup and removal; entries live in process memory only
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, SessionInfo>>>,
    max_sessions: Option<usize>,
    idle_ttl: Option<Duration>,
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            max_sessions: config.max_sessions,
            idle_ttl: config.idle_ttl,
        }
    }

    /// Create a new session owned by `username` and return its id
    pub async fn create_session(&self, username: Option<&str>) -> String {
        let mut sessions = self.sessions.lock().await;
        let info = self.insert_new(&mut sessions, username);
        info.session_id
    }

    /// Return the session for `session_id` if it is known, otherwise create one.
    /// Unknown or absent ids are not an error: they mean "start a new session".
    pub async fn resolve(&self, session_id: Option<&str>, username: Option<&str>) -> SessionInfo {
        let mut sessions = self.sessions.lock().await;

        if let Some(id) = session_id.filter(|id| !id.is_empty()) {
            if let Some(info) = sessions.get_mut(id) {
                info.touch();
                debug!("[{}] Using existing session", id);
                return info.clone();
            }
            debug!("[{}] Unknown session, creating a new one", id);
        }

        self.insert_new(&mut sessions, username)
    }

    pub async fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().await.contains_key(session_id)
    }

    pub async fn get(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Remove a session; fails with `SessionNotFound` if it is not tracked
    pub async fn clear_session(&self, session_id: &str) -> Result<SessionInfo> {
        info!("[{}] Clearing session", session_id);
        self.sessions
            .lock()
            .await
            .remove(session_id)
            .ok_or_else(|| AssistError::session_not_found(session_id))
    }

    /// Get the number of tracked sessions
    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Drop every session idle for longer than the configured TTL.
    /// Returns how many were removed.
    pub async fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let Some(ttl) = self.idle_ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok()) else {
            return 0;
        };

        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, info| !info.is_idle(now, ttl));
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle session(s), {} remaining", evicted, sessions.len());
        }
        evicted
    }

    /// Periodically evict idle sessions until `shutdown` is cancelled
    pub fn spawn_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; nothing can be idle yet
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("Session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.evict_idle(Utc::now()).await;
                    }
                }
            }
        })
    }

    fn insert_new(
        &self,
        sessions: &mut HashMap<String, SessionInfo>,
        username: Option<&str>,
    ) -> SessionInfo {
        if let Some(max) = self.max_sessions {
            while max > 0 && sessions.len() >= max {
                let oldest = sessions
                    .values()
                    .min_by_key(|info| info.last_active)
                    .map(|info| info.session_id.clone());
                match oldest {
                    Some(id) => {
                        sessions.remove(&id);
                        debug!("[{}] Session limit {} reached, evicted least recently used", id, max);
                    }
                    None => break,
                }
            }
        }

        let session_id = Uuid::new_v4().to_string();
        let info = SessionInfo::new(session_id.clone(), username);
        info!("[{}] Created session for {}", session_id, info.username);
        sessions.insert(session_id, info.clone());
        info
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
