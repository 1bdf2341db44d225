//! In-memory conversation store.
//!
//! Sessions hold a short rolling history plus the product the
//! conversation is currently about. The clock is injected so eviction
//! and timestamps are testable without wall-clock waits; eviction runs
//! from a periodic task owned by the server, never inline with a
//! request.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{ProductRef, CURRENT_PRODUCT_LABEL};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    pub product_detected: Option<ProductRef>,
}

impl Message {
    pub fn new(
        role: Role,
        content: impl Into<String>,
        product_detected: Option<ProductRef>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            role,
            content: content.into(),
            product_detected,
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    last_product: Option<String>,
    history: Vec<Message>,
    last_activity: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Messages kept per session.
    pub history_cap: usize,
    /// Messages rendered into the conversation context.
    pub context_window: usize,
    /// Idle time after which a session is evicted.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_cap: 10,
            context_window: 5,
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_messages: usize,
}

pub struct ConversationStore {
    sessions: Mutex<HashMap<String, Session>>,
    config: SessionConfig,
    clock: Clock,
}

impl ConversationStore {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_clock(config, Arc::new(Utc::now))
    }

    pub fn with_clock(config: SessionConfig, clock: Clock) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// Time-and-random composite; collisions are practically impossible.
    pub fn new_session_id(&self) -> String {
        let millis = self.now().timestamp_millis();
        let nonce: u32 = rand::rng().random();
        format!("session_{}_{:08x}", millis, nonce)
    }

    /// Renders the context block fed to product extraction and answer
    /// composition. Creates the session on first use and refreshes its
    /// activity timestamp.
    pub fn get_context(&self, session_id: &str) -> String {
        let now = self.now();
        let mut sessions = self.sessions.lock().unwrap();
        let session = touch(&mut sessions, session_id, now);

        let mut context = String::new();
        if let Some(product) = &session.last_product {
            context.push_str(&format!("{} {}\n", CURRENT_PRODUCT_LABEL, product));
        }

        let recent = recent_window(&session.history, self.config.context_window);
        if !recent.is_empty() {
            context.push_str("Percakapan sebelumnya:\n");
            for msg in recent {
                let role = match msg.role {
                    Role::User => "User",
                    Role::Assistant => "Assistant",
                };
                context.push_str(&format!("{}: {}\n", role, msg.content));
            }
        }

        context
    }

    /// Appends a message, updates the current product and trims history
    /// to the cap. A generic brand detection clears the current product
    /// so the next turn is not falsely scoped.
    pub fn record(&self, session_id: &str, message: Message) {
        let now = self.now();
        let mut sessions = self.sessions.lock().unwrap();
        let session = touch(&mut sessions, session_id, now);

        match &message.product_detected {
            Some(ProductRef::Generic) => {
                tracing::debug!(session = session_id, "generic mention clears current product");
                session.last_product = None;
            }
            Some(ProductRef::Named(name)) => {
                session.last_product = Some(name.clone());
            }
            None => {}
        }

        session.history.push(message);
        let len = session.history.len();
        if len > self.config.history_cap {
            session.history.drain(..len - self.config.history_cap);
        }
    }

    /// Removes sessions idle past the timeout. Returns the eviction
    /// count for logging.
    pub fn evict_expired(&self) -> usize {
        let now = self.now();
        let timeout = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_activity <= timeout);
        before - sessions.len()
    }

    pub fn stats(&self) -> SessionStats {
        let sessions = self.sessions.lock().unwrap();
        SessionStats {
            active_sessions: sessions.len(),
            total_messages: sessions.values().map(|s| s.history.len()).sum(),
        }
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(session_id)
    }
}

fn touch<'a>(
    sessions: &'a mut HashMap<String, Session>,
    session_id: &str,
    now: DateTime<Utc>,
) -> &'a mut Session {
    let session = sessions
        .entry(session_id.to_string())
        .or_insert_with(|| Session {
            last_product: None,
            history: Vec::new(),
            last_activity: now,
        });
    session.last_activity = now;
    session
}

fn recent_window(history: &[Message], window: usize) -> &[Message] {
    let start = history.len().saturating_sub(window);
    &history[start..]
}
