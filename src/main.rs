//! FriendlyChat terminal demo
//!
//! Architecture:
//! - Main thread: owns the feed controller and prints rows
//! - Backend thread: runs a Tokio runtime against the chat services
//! - Stdin thread: forwards typed lines over a crossbeam channel
//!
//! The services are in-memory, so several runs do not share a feed. Avatar
//! and plain image URLs are fetched over HTTP.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, TryRecvError};
use tracing::{info, warn};

use friendlychat_client::config::{self, Settings};
use friendlychat_client::feed::RenderedRow;
use friendlychat_client::http::HttpImageFetcher;
use friendlychat_client::memory::MemoryServices;
use friendlychat_client::message::{Identity, LocalImageHandle};
use friendlychat_client::{logging, FeedChange, MessageFeedController};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A line typed by the user, parsed
enum Input {
    Say(String),
    Image(String),
    Config,
    SignOut,
    Quit,
}

fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim_end_matches(['\r', '\n']);
    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Say(line.to_string()));
    };
    let (name, arg) = command.split_once(' ').unwrap_or((command, ""));
    match name {
        "image" if !arg.trim().is_empty() => Some(Input::Image(arg.trim().to_string())),
        "config" => Some(Input::Config),
        "signout" => Some(Input::SignOut),
        "quit" | "q" => Some(Input::Quit),
        _ => None,
    }
}

fn content_type_for(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}

fn load_image(path: &str) -> std::io::Result<LocalImageHandle> {
    let path = Path::new(path);
    let bytes = Bytes::from(fs::read(path)?);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("image")
        .to_string();
    Ok(LocalImageHandle::Library {
        bytes,
        content_type: content_type_for(path),
        file_name,
    })
}

fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.clone()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn print_row(row: Option<RenderedRow>) {
    if let Some(row) = row {
        println!("[{}] {} ({:?})", row.index, row.label, row.image);
    }
}

fn print_changes(ctl: &mut MessageFeedController, changes: Vec<FeedChange>) {
    for change in changes {
        match change {
            // Only new rows start an image resolution
            FeedChange::Inserted(index) => print_row(ctl.render(index)),
            FeedChange::RowUpdated(index) => print_row(ctl.feed().row(index)),
            FeedChange::LengthLimitChanged(limit) => {
                println!("* message length limit is now {}", limit);
            }
            FeedChange::SubscriptionFailed => println!("* the feed could not be opened"),
            FeedChange::SignedOut => println!("* signed out"),
        }
    }
}

fn handle_input(ctl: &mut MessageFeedController, input: Input) -> bool {
    match input {
        Input::Say(text) => {
            let end = ctl.input.len_chars();
            if !ctl.edit_input(end..end, &text) {
                println!(
                    "* too long, messages are limited to {} characters",
                    ctl.message_length_limit()
                );
                return true;
            }
            ctl.submit_input();
        }
        Input::Image(path) => match load_image(&path) {
            Ok(image) => {
                ctl.compose_and_send_image(image);
            }
            Err(e) => println!("* cannot read {}: {}", path, e),
        },
        Input::Config => {
            if let Err(e) = ctl.refresh_message_length_limit() {
                warn!(error = %e, "Config refresh not sent");
            }
        }
        Input::SignOut => {
            if let Err(e) = ctl.sign_out() {
                warn!(error = %e, "Sign-out not sent");
            }
        }
        Input::Quit => return false,
    }
    true
}

fn main() {
    let settings = config::load_settings().unwrap_or_else(|e| {
        eprintln!("Using default settings: {}", e);
        Settings::default()
    });
    logging::init(&settings.log_filter);

    // Write the defaults out on first run so they can be edited
    if matches!(config::settings_path(), Ok(path) if !path.exists()) {
        if let Err(e) = config::save_settings(&settings) {
            warn!(error = %e, "Settings not saved");
        }
    }

    let user = std::env::var("USER").unwrap_or_else(|_| "guest".to_string());
    let services = MemoryServices::new(
        &settings.storage_bucket,
        Some(Identity {
            uid: format!("{}-local", user),
            display_name: Some(user.clone()),
            photo_url: None,
        }),
    );
    let mut caps = services.capabilities();
    match HttpImageFetcher::new(settings.fetch_timeout()) {
        Ok(fetcher) => caps.fetcher = Arc::new(fetcher),
        Err(e) => warn!(error = %e, "HTTP client unavailable, image URLs will not load"),
    }

    let mut ctl = MessageFeedController::spawn(caps, settings);
    if let Err(e) = ctl.subscribe() {
        eprintln!("Cannot open the feed: {}", e);
        return;
    }
    info!(user = %user, "FriendlyChat demo started");
    println!("Type a message, or /image <path>, /config, /signout, /quit");

    let lines = spawn_stdin_reader();
    loop {
        match lines.try_recv() {
            Ok(line) => match parse_input(&line) {
                Some(input) => {
                    if !handle_input(&mut ctl, input) {
                        break;
                    }
                }
                None => println!("* unknown command"),
            },
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        let changes = ctl.poll_events(POLL_INTERVAL);
        print_changes(&mut ctl, changes);
        // Any teardown ends the demo
        if !ctl.is_active() {
            break;
        }
    }
}
