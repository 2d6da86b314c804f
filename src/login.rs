//! Interactive login surface.
//!
//! The provider issues its session cookie only after a human logs in on its
//! website. `LoginPrompt` abstracts the two things the client needs from the
//! operator: a yes/no style choice, and a login page whose cookie jar can be
//! read back afterwards.

use anyhow::Result;
use chrono::{Duration, Utc};
use rustyline::DefaultEditor;

use crate::session::Cookie;

/// Operator-facing capability used during authentication and logout
pub trait LoginPrompt {
    /// Show a message with a list of actions and return the chosen index
    fn choose(&mut self, message: &str, actions: &[&str]) -> Result<usize>;

    /// Present the login page at `url` and block until the operator is done
    fn present(&mut self, url: &str) -> Result<()>;

    /// Cookies collected by the currently presented page
    fn cookies(&mut self) -> Result<Vec<Cookie>>;

    /// Close the presented page. Must be safe to call when nothing is shown.
    fn dismiss(&mut self);

    /// Load a page without presenting it (used to end the provider session)
    fn load(&mut self, url: &str) -> Result<()>;
}

/// A presented login page, dismissed when dropped
pub struct LoginSurface<'a> {
    prompt: &'a mut dyn LoginPrompt,
}

impl<'a> LoginSurface<'a> {
    pub fn present(prompt: &'a mut dyn LoginPrompt, url: &str) -> Result<Self> {
        let mut surface = Self { prompt };
        // If presenting fails the guard still dismisses on drop
        surface.prompt.present(url)?;
        Ok(surface)
    }

    pub fn cookies(&mut self) -> Result<Vec<Cookie>> {
        self.prompt.cookies()
    }
}

impl Drop for LoginSurface<'_> {
    fn drop(&mut self) {
        self.prompt.dismiss();
    }
}

/// Terminal implementation: the operator logs in with their own browser and
/// pastes the cookie string back.
pub struct TerminalLogin {
    editor: Option<DefaultEditor>,
    jar: Vec<Cookie>,
    cookie_lifetime: Duration,
}

impl TerminalLogin {
    /// `cookie_lifetime` is the expiry assigned to pasted cookies
    pub fn new(cookie_lifetime: Duration) -> Self {
        Self {
            editor: None,
            jar: Vec::new(),
            cookie_lifetime,
        }
    }

    fn readline(&mut self, prompt: &str) -> Result<String> {
        if self.editor.is_none() {
            self.editor = Some(DefaultEditor::new()?);
        }
        match self.editor.as_mut() {
            Some(editor) => Ok(editor.readline(prompt)?),
            None => Err(anyhow::anyhow!("no terminal available")),
        }
    }
}

impl LoginPrompt for TerminalLogin {
    fn choose(&mut self, message: &str, actions: &[&str]) -> Result<usize> {
        println!("{}", message);
        for (i, action) in actions.iter().enumerate() {
            println!("  [{}] {}", i + 1, action);
        }
        loop {
            let line = self.readline("> ")?;
            if let Ok(n) = line.trim().parse::<usize>() {
                if (1..=actions.len()).contains(&n) {
                    return Ok(n - 1);
                }
            }
            if let Some(i) = actions
                .iter()
                .position(|a| a.eq_ignore_ascii_case(line.trim()))
            {
                return Ok(i);
            }
            println!("Please choose 1-{}", actions.len());
        }
    }

    fn present(&mut self, url: &str) -> Result<()> {
        self.jar.clear();
        println!("Log in at {} in your browser.", url);
        println!("Then copy the Cookie header of any request to the site and paste it here.");
        let line = self.readline("cookies> ")?;
        let expires_at = Utc::now() + self.cookie_lifetime;
        self.jar = parse_cookie_header(&line, Some(expires_at));
        Ok(())
    }

    fn cookies(&mut self) -> Result<Vec<Cookie>> {
        Ok(self.jar.clone())
    }

    fn dismiss(&mut self) {
        self.jar.clear();
    }

    fn load(&mut self, url: &str) -> Result<()> {
        println!("To end the browser session as well, open {}", url);
        Ok(())
    }
}

/// Parse a `Cookie` request header (`a=1; b=2`) into cookies
pub fn parse_cookie_header(
    header: &str,
    expires_at: Option<chrono::DateTime<Utc>>,
) -> Vec<Cookie> {
    let header = header.trim();
    let header = header
        .strip_prefix("Cookie:")
        .or_else(|| header.strip_prefix("cookie:"))
        .unwrap_or(header);

    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Cookie::new(name, value.trim(), expires_at))
        })
        .collect()
}
