use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::io::Read;

use crate::session::Cookie;

/// A completed HTTP exchange. Non-2xx statuses are still responses.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub cookies: Vec<Cookie>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
            cookies: Vec::new(),
        }
    }

    pub fn with_cookies(mut self, cookies: Vec<Cookie>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Network failure below the HTTP status level
#[derive(Debug, Clone, thiserror::Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

/// Trait for HTTP transports to allow mocking in tests
pub trait HttpClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;
}

pub struct UreqClient {
    agent: ureq::Agent,
    timeout: Option<std::time::Duration>,
}

const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) \
    AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";

impl UreqClient {
    /// `timeout_ms` of `None` leaves requests unbounded
    pub fn new(timeout_ms: Option<u64>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().user_agent(USER_AGENT).build(),
            timeout: timeout_ms.map(std::time::Duration::from_millis),
        }
    }
}

impl HttpClient for UreqClient {
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        let mut req = self.agent.get(url);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }
        for (name, value) in headers {
            req = req.set(name, value);
        }

        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::Status(_, r)) => r,
            Err(e) => {
                return Err(TransportError {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
        };

        let status = resp.status();
        let now = Utc::now();
        let cookies = resp
            .all("set-cookie")
            .into_iter()
            .filter_map(|h| parse_set_cookie(h, now))
            .collect();

        let mut body = Vec::new();
        resp.into_reader()
            .read_to_end(&mut body)
            .map_err(|e| TransportError {
                url: url.to_string(),
                message: format!("reading body: {}", e),
            })?;

        Ok(HttpResponse::new(status, body).with_cookies(cookies))
    }
}

/// Browsers cap cookie lifetimes at 400 days
const MAX_COOKIE_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// Parse one `Set-Cookie` header value. `Max-Age` wins over `Expires`.
pub fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<Cookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut expires = None;
    let mut max_age = None;
    for attr in parts {
        let Some((key, val)) = attr.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "expires" => expires = parse_cookie_date(val.trim()),
            "max-age" => max_age = val.trim().parse::<i64>().ok(),
            _ => {}
        }
    }

    // A non-positive Max-Age expires the cookie immediately
    let expires_at = match max_age {
        Some(secs) => Some(now + Duration::seconds(secs.clamp(0, MAX_COOKIE_AGE_SECS))),
        None => expires,
    };

    Some(Cookie::new(name, value.trim().trim_matches('"'), expires_at))
}

fn parse_cookie_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Netscape style: "Tue, 19-Oct-2027 10:00:00 GMT"
    NaiveDateTime::parse_from_str(s, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|n| n.and_utc())
}
