use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File name of the event log under the storage root
pub const EVENT_LOG: &str = "events.jsonl";

/// Append-only JSONL log of client events
pub struct EventLog {
    pub path: PathBuf,
    run_id: String,
    file: File,
}

#[derive(Serialize)]
struct Event<'a> {
    ts: DateTime<Utc>,
    run_id: &'a str,
    #[serde(rename = "type")]
    event_type: &'a str,
    #[serde(flatten)]
    data: serde_json::Value,
}

impl EventLog {
    pub fn new(path: &Path, run_id: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            run_id: run_id.to_string(),
            file,
        })
    }

    pub fn log(&mut self, event_type: &str, data: serde_json::Value) -> Result<()> {
        let event = Event {
            ts: Utc::now(),
            run_id: &self.run_id,
            event_type,
            data,
        };
        let line = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", line)?;
        self.file.flush()?;
        Ok(())
    }

    pub fn session_reused(&mut self, expires_at: DateTime<Utc>) -> Result<()> {
        self.log("session_reused", json!({ "expires_at": expires_at }))
    }

    pub fn session_expired(&mut self, expires_at: DateTime<Utc>) -> Result<()> {
        self.log("session_expired", json!({ "expires_at": expires_at }))
    }

    pub fn login_attempt(&mut self, attempt: u32) -> Result<()> {
        self.log("login_attempt", json!({ "attempt": attempt }))
    }

    /// `outcome` is "ok", "cancelled", or "max_attempts"
    pub fn login_result(&mut self, outcome: &str) -> Result<()> {
        self.log("login_result", json!({ "outcome": outcome }))
    }

    pub fn fetch(&mut self, url: &str, status: u16) -> Result<()> {
        self.log("fetch", json!({ "url": url, "status": status }))
    }

    pub fn selection(
        &mut self,
        username: &str,
        index: usize,
        available: usize,
        child: Option<usize>,
    ) -> Result<()> {
        self.log(
            "selection",
            json!({
                "username": username,
                "index": index,
                "available": available,
                "child": child,
            }),
        )
    }

    pub fn fetch_error(&mut self, username: &str, kind: &str, error: &str) -> Result<()> {
        self.log(
            "fetch_error",
            json!({ "username": username, "kind": kind, "error": error }),
        )
    }

    pub fn logout(&mut self) -> Result<()> {
        self.log("logout", json!({}))
    }
}
