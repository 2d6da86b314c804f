mod cache;
mod client;
mod config;
mod events;
mod format;
mod http;
mod login;
mod provider;
mod render;
mod session;
mod store;
mod update;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rand::seq::SliceRandom;
use std::path::PathBuf;

use crate::client::ContentClient;
use crate::config::Config;
use crate::events::{EventLog, EVENT_LOG};
use crate::http::UreqClient;
use crate::login::TerminalLogin;
use crate::provider::Endpoint;
use crate::store::LocalStore;

#[derive(Parser)]
#[command(name = "igpost", about = "Show a random recent Instagram post")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(long, help = "Config file path")]
    pub config: Option<PathBuf>,

    #[arg(long, env = "IGPOST_ROOT", help = "Directory for session, image cache and event log")]
    pub root: Option<PathBuf>,

    #[arg(long, help = "Require a logged-in session")]
    pub login: bool,

    #[arg(long, help = "Profile endpoint: api or legacy")]
    pub endpoint: Option<String>,

    #[arg(long, help = "Verbose output (print requests and cache activity)")]
    pub verbose: bool,

    #[arg(long, help = "Debug output (print resolved settings)")]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch and print a post card (default)
    Show {
        #[arg(short, long, help = "Username to show instead of a random configured one")]
        user: Option<String>,

        #[arg(
            long,
            env = "IGPOST_PARAM",
            help = "Widget parameter: 'users | refresh | max recent | username,likes,comments'"
        )]
        param: Option<String>,
    },
    /// Delete the saved session and end it on the provider
    Logout,
    /// Remove the saved session, cached images and event log
    ClearCache,
    /// Check the configured manifest for a newer release
    CheckUpdate,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut cfg = if let Some(config_path) = &args.config {
        Config::load_from(config_path)?
    } else {
        Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: ignoring unreadable config: {}", e);
            Config::default()
        })
    };

    if let Some(root) = &args.root {
        cfg.storage_root = Some(root.clone());
    }
    if args.login {
        cfg.login_required = true;
    }
    if let Some(name) = &args.endpoint {
        cfg.endpoint = Endpoint::from_str(name)
            .ok_or_else(|| anyhow::anyhow!("unknown endpoint '{}' (expected api or legacy)", name))?;
    }
    let command = args.command.unwrap_or(Command::Show {
        user: None,
        param: None,
    });
    if let Command::Show {
        param: Some(param), ..
    } = &command
    {
        cfg.apply_widget_parameter(param);
    }

    if let Err(errors) = cfg.validate() {
        for error in &errors {
            eprintln!("Config error {}", error);
        }
        return Err(anyhow::anyhow!("invalid configuration"));
    }

    let root = cfg.storage_root();
    if args.debug {
        eprintln!("[DEBUG] Storage root: {}", root.display());
        eprintln!("[DEBUG] Usernames: {:?}", cfg.usernames);
        eprintln!("[DEBUG] Endpoint: {}", cfg.endpoint.as_str());
        eprintln!("[DEBUG] Login required: {}", cfg.login_required);
        eprintln!(
            "[DEBUG] Max recent posts: {} (effective {})",
            cfg.max_recent_posts,
            cfg.effective_max_recent()
        );
    }

    if let Command::CheckUpdate = command {
        return check_update(&cfg);
    }

    let run_id = uuid::Uuid::new_v4().to_string();
    let store = LocalStore::new(&root)?;
    let http = UreqClient::new(cfg.request_timeout_ms);
    let login = TerminalLogin::new(cfg.session_lifetime());
    let verbose = args.verbose || args.debug;

    let mut client = ContentClient::new(cfg, Box::new(http), Box::new(store), Box::new(login))
        .with_verbose(verbose);
    match EventLog::new(&root.join(EVENT_LOG), &run_id) {
        Ok(log) => {
            if args.debug {
                eprintln!("[DEBUG] Event log: {}", log.path.display());
            }
            client = client.with_event_log(log);
        }
        Err(e) => eprintln!("Warning: event log disabled: {}", e),
    }

    match command {
        Command::Show { user, .. } => show(&mut client, user),
        Command::Logout => {
            client.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Command::ClearCache => {
            client.clear_cache()?;
            println!("Cleared {}", root.display());
            Ok(())
        }
        Command::CheckUpdate => Ok(()),
    }
}

fn show(client: &mut ContentClient, user: Option<String>) -> Result<()> {
    let username = match user {
        Some(u) => u,
        None => client
            .config()
            .usernames
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no usernames configured"))?,
    };

    match client.fetch_latest_post(&username) {
        Ok(post) => {
            let cached = client
                .fetch_image(&post.image_url)
                .and_then(|_| client.cached_image_path(&post.image_url));
            let config = client.config();
            let next_refresh = Utc::now() + config.refresh_interval();
            println!(
                "{}",
                render::render_card(&post, &config.display, cached.as_deref(), next_refresh)
            );
        }
        Err(e) => {
            let fallback = client.random_cached_image();
            println!("{}", render::render_error(&e, fallback.as_deref()));
        }
    }
    Ok(())
}

fn check_update(cfg: &Config) -> Result<()> {
    let Some(url) = &cfg.update_url else {
        println!("No update_url configured.");
        return Ok(());
    };

    let http = UreqClient::new(cfg.request_timeout_ms);
    let current = env!("CARGO_PKG_VERSION");
    match update::check_for_update(&http, url, current)? {
        Some(info) => {
            println!("Update available: {} (current {})", info.version, current);
            if let Some(link) = &info.url {
                println!("  {}", link);
            }
            if let Some(notes) = &info.notes {
                println!("  {}", notes);
            }
        }
        None => println!("igpost {} is up to date.", current),
    }
    Ok(())
}
