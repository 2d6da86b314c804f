use anyhow::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::provider::Endpoint;

/// The provider never returns more than this many recent posts per profile
pub const MAX_RECENT_LIMIT: usize = 12;

pub const MAX_SESSION_LIFETIME_DAYS: i64 = 3650;
pub const MAX_REFRESH_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

/// A validation error in the configuration
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.field, self.message)
    }
}

/// Which parts of the status line are shown on the card
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub show_username: bool,
    #[serde(default = "default_true")]
    pub show_likes: bool,
    #[serde(default = "default_true")]
    pub show_comments: bool,
    /// Decimal places for abbreviated counts
    #[serde(default)]
    pub decimals: usize,
}

fn default_true() -> bool {
    true
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_username: true,
            show_likes: true,
            show_comments: true,
            decimals: 0,
        }
    }
}

impl DisplayConfig {
    pub fn shows_status_line(&self) -> bool {
        self.show_username || self.show_likes || self.show_comments
    }
}

/// Resolved configuration, immutable once handed to the client
#[derive(Debug, Clone)]
pub struct Config {
    pub usernames: Vec<String>,
    pub max_recent_posts: usize,
    pub login_required: bool,
    pub refresh_interval_minutes: u64,
    pub display: DisplayConfig,
    pub max_login_attempts: u32,
    pub session_lifetime_days: i64,
    pub endpoint: Endpoint,
    pub request_timeout_ms: Option<u64>,
    pub storage_root: Option<PathBuf>,
    pub update_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            usernames: [
                "beautifuldestinations",
                "natgeotravel",
                "igersmanila",
                "cntraveler",
                "the_philippines",
                "nasachandraxray",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_recent_posts: MAX_RECENT_LIMIT,
            login_required: false,
            refresh_interval_minutes: 5,
            display: DisplayConfig::default(),
            max_login_attempts: 2,
            session_lifetime_days: 365,
            endpoint: Endpoint::default(),
            request_timeout_ms: None,
            storage_root: None,
            update_url: None,
        }
    }
}

/// One layer of configuration as written in a TOML file. Unset keys leave
/// the lower layer untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub usernames: Option<Vec<String>>,
    #[serde(default)]
    pub max_recent_posts: Option<usize>,
    #[serde(default)]
    pub login_required: Option<bool>,
    #[serde(default)]
    pub refresh_interval_minutes: Option<u64>,
    #[serde(default)]
    pub display: Option<DisplayConfig>,
    #[serde(default)]
    pub max_login_attempts: Option<u32>,
    #[serde(default)]
    pub session_lifetime_days: Option<i64>,
    #[serde(default)]
    pub endpoint: Option<Endpoint>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    #[serde(default)]
    pub update_url: Option<String>,
}

impl ConfigFile {
    /// Load one layer from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = toml::from_str(&content)?;
        Ok(file)
    }
}

impl Config {
    /// Load configuration from default paths
    /// Priority: project (.igpost/config.toml) > user (~/.igpost/config.toml) > built-in
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".igpost").join("config.toml");
            if user_config.exists() {
                config.merge(ConfigFile::load_from(&user_config)?);
            }
        }

        let project_config = Path::new(".igpost").join("config.toml");
        if project_config.exists() {
            config.merge(ConfigFile::load_from(&project_config)?);
        }

        Ok(config)
    }

    /// Load built-in defaults overlaid with a single file
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge(ConfigFile::load_from(path)?);
        Ok(config)
    }

    /// Merge a layer into this config (the layer takes priority)
    pub fn merge(&mut self, other: ConfigFile) {
        if let Some(usernames) = other.usernames {
            self.usernames = usernames;
        }
        if let Some(n) = other.max_recent_posts {
            self.max_recent_posts = n;
        }
        if let Some(b) = other.login_required {
            self.login_required = b;
        }
        if let Some(n) = other.refresh_interval_minutes {
            self.refresh_interval_minutes = n;
        }
        if let Some(display) = other.display {
            self.display = display;
        }
        if let Some(n) = other.max_login_attempts {
            self.max_login_attempts = n;
        }
        if let Some(n) = other.session_lifetime_days {
            self.session_lifetime_days = n;
        }
        if let Some(endpoint) = other.endpoint {
            self.endpoint = endpoint;
        }
        if other.request_timeout_ms.is_some() {
            self.request_timeout_ms = other.request_timeout_ms;
        }
        if other.storage_root.is_some() {
            self.storage_root = other.storage_root;
        }
        if other.update_url.is_some() {
            self.update_url = other.update_url;
        }
    }

    /// Apply a widget parameter string:
    /// `users | refresh minutes | max recent | show username,likes,comments`.
    /// Missing or malformed fields keep their current values.
    pub fn apply_widget_parameter(&mut self, param: &str) {
        let fields: Vec<&str> = param.split('|').map(str::trim).collect();

        if let Some(users) = fields.first() {
            let users: Vec<String> = users
                .split(',')
                .map(|u| u.trim().trim_start_matches('@'))
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
            if !users.is_empty() {
                self.usernames = users;
            }
        }

        if let Some(Ok(n)) = fields.get(1).map(|s| s.parse::<u64>()) {
            self.refresh_interval_minutes = n;
        }

        if let Some(Ok(n)) = fields.get(2).map(|s| s.parse::<usize>()) {
            self.max_recent_posts = n;
        }

        if let Some(flags) = fields.get(3) {
            let flags: Vec<Option<bool>> = flags.split(',').map(|f| parse_bool(f.trim())).collect();
            let targets = [
                &mut self.display.show_username,
                &mut self.display.show_likes,
                &mut self.display.show_comments,
            ];
            for (target, flag) in targets.into_iter().zip(flags) {
                if let Some(value) = flag {
                    *target = value;
                }
            }
        }
    }

    /// `max_recent_posts` clamped to what the provider can return
    pub fn effective_max_recent(&self) -> usize {
        self.max_recent_posts.clamp(1, MAX_RECENT_LIMIT)
    }

    /// Expiry assigned to session cookies that carry none
    pub fn session_lifetime(&self) -> Duration {
        Duration::days(self.session_lifetime_days.clamp(1, MAX_SESSION_LIFETIME_DAYS))
    }

    pub fn refresh_interval(&self) -> Duration {
        let minutes = self
            .refresh_interval_minutes
            .clamp(1, MAX_REFRESH_INTERVAL_MINUTES);
        Duration::minutes(minutes as i64)
    }

    /// Directory holding the session, image cache, and event log
    pub fn storage_root(&self) -> PathBuf {
        if let Some(root) = &self.storage_root {
            return root.clone();
        }
        dirs::data_dir()
            .map(|d| d.join("igpost"))
            .unwrap_or_else(|| PathBuf::from(".igpost"))
    }

    /// Validate configuration and return any errors found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.usernames.is_empty() {
            errors.push(ValidationError {
                field: "usernames".to_string(),
                message: "At least one username is required".to_string(),
            });
        }
        for (i, name) in self.usernames.iter().enumerate() {
            if name.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("usernames[{}]", i),
                    message: "Must not be empty".to_string(),
                });
            }
        }

        if self.max_recent_posts == 0 {
            errors.push(ValidationError {
                field: "max_recent_posts".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.refresh_interval_minutes == 0 {
            errors.push(ValidationError {
                field: "refresh_interval_minutes".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        } else if self.refresh_interval_minutes > MAX_REFRESH_INTERVAL_MINUTES {
            errors.push(ValidationError {
                field: "refresh_interval_minutes".to_string(),
                message: format!("Must be at most {}", MAX_REFRESH_INTERVAL_MINUTES),
            });
        }

        if self.max_login_attempts == 0 {
            errors.push(ValidationError {
                field: "max_login_attempts".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.session_lifetime_days <= 0 {
            errors.push(ValidationError {
                field: "session_lifetime_days".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        } else if self.session_lifetime_days > MAX_SESSION_LIFETIME_DAYS {
            errors.push(ValidationError {
                field: "session_lifetime_days".to_string(),
                message: format!("Must be at most {}", MAX_SESSION_LIFETIME_DAYS),
            });
        }

        if let Some(url) = &self.update_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                errors.push(ValidationError {
                    field: "update_url".to_string(),
                    message: format!("Expected an http(s) URL, got '{}'", url),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.effective_max_recent(), 12);
        assert!(!config.login_required);
    }

    #[test]
    fn test_widget_parameter_full() {
        let mut config = Config::default();
        config.apply_widget_parameter("natgeo, @nasa | 30 | 5 | true,false,no");
        assert_eq!(config.usernames, vec!["natgeo", "nasa"]);
        assert_eq!(config.refresh_interval_minutes, 30);
        assert_eq!(config.max_recent_posts, 5);
        assert!(config.display.show_username);
        assert!(!config.display.show_likes);
        assert!(!config.display.show_comments);
    }

    #[test]
    fn test_widget_parameter_partial_keeps_defaults() {
        let mut config = Config::default();
        config.apply_widget_parameter("natgeo");
        assert_eq!(config.usernames, vec!["natgeo"]);
        assert_eq!(config.refresh_interval_minutes, 5);
        assert_eq!(config.max_recent_posts, 12);
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn test_widget_parameter_malformed_fields_ignored() {
        let mut config = Config::default();
        config.apply_widget_parameter(" | soon | many | maybe,false");
        assert_eq!(config.usernames, Config::default().usernames);
        assert_eq!(config.refresh_interval_minutes, 5);
        assert_eq!(config.max_recent_posts, 12);
        assert!(config.display.show_username);
        assert!(!config.display.show_likes);
        assert!(config.display.show_comments);
    }

    #[test]
    fn test_max_recent_clamped() {
        let mut config = Config::default();
        config.max_recent_posts = 50;
        assert_eq!(config.effective_max_recent(), MAX_RECENT_LIMIT);
        config.max_recent_posts = 3;
        assert_eq!(config.effective_max_recent(), 3);
    }

    #[test]
    fn test_lifetimes_bounded() {
        let mut config = Config::default();
        config.session_lifetime_days = 100_000_000;
        config.refresh_interval_minutes = u64::MAX;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "refresh_interval_minutes");
        assert_eq!(errors[1].field, "session_lifetime_days");

        assert_eq!(
            config.session_lifetime(),
            Duration::days(MAX_SESSION_LIFETIME_DAYS)
        );
        assert_eq!(
            config.refresh_interval(),
            Duration::minutes(MAX_REFRESH_INTERVAL_MINUTES as i64)
        );
        assert!(chrono::Utc::now().checked_add_signed(config.session_lifetime()).is_some());

        config.session_lifetime_days = -5;
        config.refresh_interval_minutes = 0;
        assert_eq!(config.session_lifetime(), Duration::days(1));
        assert_eq!(config.refresh_interval(), Duration::minutes(1));
    }

    #[test]
    fn test_validate_errors() {
        let mut config = Config::default();
        config.usernames = vec![];
        config.max_recent_posts = 0;
        config.update_url = Some("ftp://example.com/v.json".to_string());
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].field.contains("usernames"));
        assert!(errors[1].field.contains("max_recent_posts"));
        assert!(errors[2].message.contains("http(s)"));
    }

    #[test]
    fn test_validate_blank_username() {
        let mut config = Config::default();
        config.usernames = vec!["ok".to_string(), "  ".to_string()];
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "usernames[1]");
    }

    #[test]
    fn test_load_from_file_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
usernames = ["natgeo"]
login_required = true
endpoint = "legacy"

[display]
show_comments = false
decimals = 1
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.usernames, vec!["natgeo"]);
        assert!(config.login_required);
        assert_eq!(config.endpoint, Endpoint::Legacy);
        assert!(config.display.show_username);
        assert!(!config.display.show_comments);
        assert_eq!(config.display.decimals, 1);
        // untouched keys keep built-in values
        assert_eq!(config.max_login_attempts, 2);
        assert_eq!(config.refresh_interval_minutes, 5);
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "usernames = natgeo").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_status_line_visibility() {
        let mut display = DisplayConfig::default();
        assert!(display.shows_status_line());
        display.show_username = false;
        display.show_likes = false;
        display.show_comments = false;
        assert!(!display.shows_status_line());
    }
}
