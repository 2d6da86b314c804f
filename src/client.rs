//! Content client: session handling and the latest-post fetch.
//!
//! Every capability the client needs (HTTP, storage, the operator, and the
//! random source) is injected, so a run is fully reproducible in tests.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::cache::{ImageCache, IMAGES_DIR};
use crate::config::Config;
use crate::events::{EventLog, EVENT_LOG};
use crate::http::{HttpClient, HttpResponse, TransportError};
use crate::login::{LoginPrompt, LoginSurface};
use crate::provider::{self, widest, LANDING_URL, LOGOUT_URL};
use crate::session::{Cookie, Session, SESSION_KEY};
use crate::store::FileStore;

const LOGIN_NOTICE: &str = "You will now be presented with the Instagram login page.\n\
Authentication happens on the Instagram website and your credentials are neither captured nor stored.";

/// Normalized post, ready for rendering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub username: String,
    pub shortcode: String,
    pub image_url: String,
    pub is_video: bool,
    pub likes: u64,
    pub comments: u64,
}

impl PostRecord {
    pub fn post_url(&self) -> String {
        format!("https://www.instagram.com/p/{}", self.shortcode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("login was cancelled")]
    Cancelled,
    #[error("maximum number of login attempts reached")]
    MaxAttempts,
    #[error("login prompt failed: {0}")]
    Prompt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("not following private user: {0}")]
    AccessDenied(String),
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[from] AuthFailure),
    #[error("no posts found for {0}")]
    EmptyResult(String),
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ContentError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::UserNotFound(_) => "user_not_found",
            Self::AccessDenied(_) => "access_denied",
            Self::AuthenticationFailed(_) => "authentication_failed",
            Self::EmptyResult(_) => "empty_result",
            Self::Storage(_) => "storage",
        }
    }
}

pub struct ContentClient {
    config: Config,
    http: Box<dyn HttpClient>,
    store: Box<dyn FileStore>,
    login: Box<dyn LoginPrompt>,
    rng: Box<dyn RngCore>,
    events: Option<EventLog>,
    verbose: bool,
}

impl ContentClient {
    pub fn new(
        config: Config,
        http: Box<dyn HttpClient>,
        store: Box<dyn FileStore>,
        login: Box<dyn LoginPrompt>,
    ) -> Self {
        Self {
            config,
            http,
            store,
            login,
            rng: Box::new(StdRng::from_entropy()),
            events: None,
            verbose: false,
        }
    }

    pub fn with_rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_event_log(mut self, log: EventLog) -> Self {
        self.events = Some(log);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn note(&self, message: &str) {
        if self.verbose {
            eprintln!("[VERBOSE] {}", message);
        }
    }

    fn event(&mut self, f: impl FnOnce(&mut EventLog) -> anyhow::Result<()>) {
        if let Some(log) = self.events.as_mut() {
            let _ = f(log);
        }
    }

    fn get(&mut self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, ContentError> {
        self.note(&format!("GET {}", url));
        let resp = self.http.get(url, headers)?;
        self.event(|log| log.fetch(url, resp.status));
        Ok(resp)
    }

    /// Return a usable session, logging in if needed. `None` when the
    /// configuration does not require a login.
    pub fn ensure_session(&mut self) -> Result<Option<Session>, ContentError> {
        if !self.config.login_required {
            return Ok(None);
        }

        match Session::load(self.store.as_ref()) {
            Ok(Some(session)) if session.is_valid() => {
                self.note(&format!("reusing session until {}", session.expires_at));
                self.event(|log| log.session_reused(session.expires_at));
                return Ok(Some(session));
            }
            Ok(Some(session)) => {
                self.note("session expired");
                self.event(|log| log.session_expired(session.expires_at));
                self.discard_session();
            }
            Ok(None) => {}
            Err(e) => {
                self.note(&format!("ignoring unreadable session: {}", e));
                self.discard_session();
            }
        }

        self.authenticate().map(Some)
    }

    fn discard_session(&self) {
        if let Err(e) = Session::delete(self.store.as_ref()) {
            self.note(&format!("failed to delete session file: {}", e));
        }
    }

    fn authenticate(&mut self) -> Result<Session, ContentError> {
        let fallback_expiry = Utc::now() + self.config.session_lifetime();

        // The landing page already carries the session cookie when the
        // shared cookie store is logged in.
        let probe = self.get(LANDING_URL, &[])?;
        let mut jar = probe.cookies.clone();
        let mut attempts = 0;

        loop {
            if let Some(session) = Session::from_cookies(&jar, fallback_expiry) {
                if let Err(e) = session.save(self.store.as_ref()) {
                    self.note(&format!("failed to persist session: {}", e));
                }
                self.event(|log| log.login_result("ok"));
                return Ok(session);
            }

            if attempts >= self.config.max_login_attempts {
                self.event(|log| log.login_result("max_attempts"));
                return Err(AuthFailure::MaxAttempts.into());
            }
            attempts += 1;
            self.event(|log| log.login_attempt(attempts));

            let choice = self
                .login
                .choose(LOGIN_NOTICE, &["Proceed", "Cancel"])
                .map_err(|e| AuthFailure::Prompt(e.to_string()))?;
            if choice == 1 {
                self.event(|log| log.login_result("cancelled"));
                return Err(AuthFailure::Cancelled.into());
            }

            let collected = {
                let mut surface = LoginSurface::present(self.login.as_mut(), LANDING_URL)
                    .map_err(|e| AuthFailure::Prompt(e.to_string()))?;
                surface
                    .cookies()
                    .map_err(|e| AuthFailure::Prompt(e.to_string()))?
            };
            jar = merge_cookies(&probe.cookies, collected);
        }
    }

    /// Fetch the profile of `username` and return one of its recent posts,
    /// chosen at random.
    pub fn fetch_latest_post(&mut self, username: &str) -> Result<PostRecord, ContentError> {
        let username = username.trim().trim_start_matches('@').to_string();
        let result = self.fetch_post(&username);
        if let Err(e) = &result {
            let message = e.to_string();
            self.event(|log| log.fetch_error(&username, e.kind(), &message));
        }
        result
    }

    fn fetch_post(&mut self, username: &str) -> Result<PostRecord, ContentError> {
        if username.is_empty() {
            return Err(ContentError::UserNotFound(String::new()));
        }

        let session = self.ensure_session()?;
        let cookie = session.map(|s| s.cookie_header()).unwrap_or_default();

        let endpoint = self.config.endpoint;
        let url = endpoint.user_url(username);
        let mut headers = vec![("Cookie", cookie.as_str())];
        headers.extend(endpoint.headers());

        let resp = self.get(&url, &headers)?;
        if resp.status == 404 {
            return Err(ContentError::UserNotFound(username.to_string()));
        }
        if !resp.is_success() {
            return Err(TransportError {
                url,
                message: format!("HTTP {}", resp.status),
            }
            .into());
        }

        let user = endpoint
            .parse_user(&resp.body)
            .ok_or_else(|| ContentError::UserNotFound(username.to_string()))?;

        if !user.is_accessible() {
            return Err(ContentError::AccessDenied(username.to_string()));
        }

        let media = user.recent_media();
        if media.is_empty() {
            return Err(ContentError::EmptyResult(username.to_string()));
        }

        let max_index = media.len().min(self.config.effective_max_recent()) - 1;
        let index = self.rng.gen_range(0..=max_index);
        let post = media[index];

        let children = post.carousel_children();
        let (chosen, child) = if children.is_empty() {
            (post, None)
        } else {
            let c = self.rng.gen_range(0..children.len());
            (children[c], Some(c))
        };
        self.event(|log| log.selection(username, index, media.len(), child));

        let mut candidates = chosen.candidates();
        if candidates.is_empty() {
            candidates = self.detail_candidates(&post.shortcode, &cookie, child)?;
        }
        let image = widest(&candidates)
            .ok_or_else(|| ContentError::EmptyResult(username.to_string()))?;

        // The provider's spelling of the name, when it reports one
        let username = if user.username.is_empty() {
            username
        } else {
            user.username.as_str()
        };

        Ok(PostRecord {
            username: username.to_string(),
            shortcode: post.shortcode.clone(),
            image_url: image.url.clone(),
            is_video: chosen.is_video,
            likes: post.likes(),
            comments: post.comments(),
        })
    }

    /// Candidates from the post detail endpoint, for feed items that carry
    /// no renditions of their own
    fn detail_candidates(
        &mut self,
        shortcode: &str,
        cookie: &str,
        child: Option<usize>,
    ) -> Result<Vec<provider::Candidate>, ContentError> {
        let url = provider::post_detail_url(shortcode);
        let resp = self.get(&url, &[("Cookie", cookie)])?;
        if !resp.is_success() {
            return Ok(Vec::new());
        }
        let Some(detail) = provider::parse_post_detail(&resp.body) else {
            return Ok(Vec::new());
        };

        let children = detail.carousel_children();
        let media = child.and_then(|c| children.get(c).copied()).unwrap_or(&detail);
        Ok(media.candidates())
    }

    /// Forget the session locally and end it on the provider side
    pub fn logout(&mut self) -> Result<(), ContentError> {
        let had_session = self.store.exists(SESSION_KEY);
        if had_session {
            self.note("deleting session file");
            self.discard_session();
            self.event(|log| log.logout());
        }

        if let Err(e) = self.login.load(LOGOUT_URL) {
            self.note(&format!("failed to open logout page: {}", e));
        }
        Ok(())
    }

    /// Remove the session, cached images, and event log
    pub fn clear_cache(&mut self) -> Result<(), ContentError> {
        for key in [SESSION_KEY, IMAGES_DIR, EVENT_LOG] {
            self.note(&format!("removing {}", key));
            self.store.remove(key)?;
        }
        Ok(())
    }

    /// Download the post image, caching it for offline use
    pub fn fetch_image(&self, url: &str) -> Option<Vec<u8>> {
        ImageCache::new(self.store.as_ref(), self.verbose).fetch(self.http.as_ref(), url)
    }

    pub fn cached_image_path(&self, url: &str) -> Option<std::path::PathBuf> {
        ImageCache::new(self.store.as_ref(), self.verbose).path_of(url)
    }

    /// Any previously cached image, for display when a fetch fails
    pub fn random_cached_image(&mut self) -> Option<std::path::PathBuf> {
        let cache = ImageCache::new(self.store.as_ref(), self.verbose);
        let (key, _) = cache.random_cached(self.rng.as_mut())?;
        Some(self.store.root().join(key))
    }
}

/// Cookies from `later` replace same-named ones from `earlier`
fn merge_cookies(earlier: &[Cookie], later: Vec<Cookie>) -> Vec<Cookie> {
    let mut jar: Vec<Cookie> = earlier
        .iter()
        .filter(|c| !later.iter().any(|l| l.name == c.name))
        .cloned()
        .collect();
    jar.extend(later);
    jar
}
