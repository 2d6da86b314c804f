//! Plain text rendering of a post card and of the error fallback.

use chrono::{DateTime, Utc};
use std::path::Path;

use crate::client::{AuthFailure, ContentError, PostRecord};
use crate::config::DisplayConfig;
use crate::format::abbreviate_number;

pub fn render_card(
    post: &PostRecord,
    display: &DisplayConfig,
    image: Option<&Path>,
    next_refresh: DateTime<Utc>,
) -> String {
    let mut lines = vec![post.post_url()];

    match image {
        Some(path) => lines.push(format!("image: {}", path.display())),
        None => lines.push(format!("image: {}", post.image_url)),
    }
    if post.is_video {
        lines.push("(video)".to_string());
    }

    if display.shows_status_line() {
        let mut left = String::new();
        if display.show_username {
            left = format!("@{}", post.username);
        }

        let mut right = Vec::new();
        if display.show_likes {
            right.push(format!("♥ {}", count(post.likes, display.decimals)));
        }
        if display.show_comments {
            right.push(format!("💬 {}", count(post.comments, display.decimals)));
        }

        let status = match (left.is_empty(), right.is_empty()) {
            (false, false) => format!("{}  {}", left, right.join("  ")),
            (true, _) => right.join("  "),
            (false, true) => left,
        };
        lines.push(status);
    }

    lines.push(format!(
        "next refresh after {}",
        next_refresh.format("%Y-%m-%d %H:%M UTC")
    ));
    lines.join("\n")
}

fn count(n: u64, decimals: usize) -> String {
    abbreviate_number(Some(n as f64), decimals).unwrap_or_default()
}

/// Message shown instead of the card, one per error kind
pub fn error_message(err: &ContentError) -> String {
    match err {
        ContentError::UserNotFound(u) if u.is_empty() => "no username given".to_string(),
        ContentError::UserNotFound(u) => format!("user does not exist\n{}", u),
        ContentError::AccessDenied(u) => format!("not following user\n{}", u),
        ContentError::EmptyResult(u) => format!("no posts to show\n{}", u),
        ContentError::AuthenticationFailed(AuthFailure::Cancelled) => {
            "login was cancelled".to_string()
        }
        ContentError::AuthenticationFailed(AuthFailure::MaxAttempts) => {
            "maximum number of login attempts reached\nplease run again".to_string()
        }
        ContentError::AuthenticationFailed(AuthFailure::Prompt(e)) => {
            format!("login unavailable\n{}", e)
        }
        ContentError::Transport(e) => format!("network error\n{}", e.message),
        ContentError::Storage(e) => format!("storage error\n{}", e),
    }
}

pub fn render_error(err: &ContentError, fallback_image: Option<&Path>) -> String {
    let mut out = error_message(err);
    if let Some(path) = fallback_image {
        out.push_str(&format!("\nshowing cached image: {}", path.display()));
    }
    out
}
