use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents an admin session held by the in-process store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// The opaque token carried in the `admin_token` cookie.
    pub token: String,
    /// The timestamp when the session expires. Slides forward on every use.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a session expiring `ttl` from now.
    pub fn new(token: String, ttl: chrono::Duration) -> Self {
        Self {
            token,
            expires_at: expiry_after(Utc::now(), ttl),
        }
    }

    /// Pushes the expiry to `ttl` after `now`.
    pub fn refresh(&mut self, now: DateTime<Utc>, ttl: chrono::Duration) {
        self.expires_at = expiry_after(now, ttl);
    }

    /// Whether the session is still live at `now`.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// `now + ttl`, saturating at the latest representable instant.
fn expiry_after(now: DateTime<Utc>, ttl: chrono::Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
