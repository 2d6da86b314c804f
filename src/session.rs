//! Authentication session: the provider's session cookie plus the full
//! cookie set it came with, persisted as JSON under the store root.

use crate::store::FileStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fixed storage key of the persisted session
pub const SESSION_KEY: &str = "session.json";

/// Name of the cookie that carries the session token
pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cookie {
    pub fn new(name: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            expires_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub cookies: Vec<Cookie>,
}

impl Session {
    /// Build a session from a cookie jar if it holds a non-empty session cookie.
    /// A session cookie without an expiry gets `fallback_expiry`.
    pub fn from_cookies(cookies: &[Cookie], fallback_expiry: DateTime<Utc>) -> Option<Self> {
        let cookie = cookies
            .iter()
            .find(|c| c.name == SESSION_COOKIE && !c.value.is_empty())?;

        Some(Self {
            token: cookie.value.clone(),
            expires_at: cookie.expires_at.unwrap_or(fallback_expiry),
            cookies: cookies.to_vec(),
        })
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Value for the `Cookie` request header
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Read the persisted session. `Ok(None)` when nothing is saved; a file
    /// that cannot be read or parsed is an `Err`.
    pub fn load(store: &dyn FileStore) -> anyhow::Result<Option<Self>> {
        if !store.exists(SESSION_KEY) {
            return Ok(None);
        }
        let raw = store.read(SESSION_KEY)?;
        if raw.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(None);
        }
        let session: Session = serde_json::from_slice(&raw)?;
        Ok(Some(session))
    }

    /// Persist the session, replacing any previous file
    pub fn save(&self, store: &dyn FileStore) -> anyhow::Result<()> {
        let content = serde_json::to_vec_pretty(self)?;
        store.write(SESSION_KEY, &content)?;
        Ok(())
    }

    pub fn delete(store: &dyn FileStore) -> std::io::Result<()> {
        store.remove(SESSION_KEY)
    }
}
