//! REPL – Read-Eval-Print Loop for the PathSense AR screen.
//!
//! Supported slash-commands:
//!   /go <place>   – set a destination (bare text works too)
//!   /suggest [n]  – list the quick-pick destinations, or pick number `n`
//!   /pause        – stop walking
//!   /resume       – start walking again
//!   /toggle       – flip between walking and standing
//!   /abort        – drop the current destination
//!   /status       – print the HUD
//!   /settings     – interactively edit `~/.pathsense/config.toml`
//!   /help         – show this list
//!   /back | /quit – leave the AR screen and exit

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pathsense_engine::feedback::FeedbackMode;
use pathsense_runtime::{FrameSnapshot, ScreenCommand, ScreenHandle};
use zeroize::Zeroizing;

use crate::config::{self, Config};

/// Quick-pick destinations offered under the search field.
pub const SUGGESTIONS: [&str; 3] = ["CBM Lab 4", "SSK Cafe", "IT Building Lobby"];

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Go(String),
    /// `None` lists the suggestions; `Some(i)` picks `SUGGESTIONS[i]`.
    Suggest(Option<usize>),
    Pause,
    Resume,
    Toggle,
    Abort,
    Status,
    Settings,
    Help,
    Quit,
    Usage(&'static str),
    Unknown(String),
}

/// Why [`run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    Quit,
    /// Ctrl-C while the prompt had the terminal.
    Interrupted,
    Eof,
    /// The shutdown flag was raised or the screen stopped on its own.
    Shutdown,
}

/// Parse one trimmed, non-empty input line.
pub fn parse(line: &str) -> ReplCommand {
    let line = line.trim();
    if !line.starts_with('/') {
        return ReplCommand::Go(line.to_string());
    }
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };
    match cmd {
        "/go" if arg.is_empty() => ReplCommand::Usage("/go <destination>"),
        "/go" => ReplCommand::Go(arg.to_string()),
        "/suggest" if arg.is_empty() => ReplCommand::Suggest(None),
        "/suggest" => match arg.parse::<usize>() {
            Ok(n) if (1..=SUGGESTIONS.len()).contains(&n) => ReplCommand::Suggest(Some(n - 1)),
            _ => ReplCommand::Usage("/suggest [1-3]"),
        },
        "/pause" => ReplCommand::Pause,
        "/resume" => ReplCommand::Resume,
        "/toggle" => ReplCommand::Toggle,
        "/abort" => ReplCommand::Abort,
        "/status" => ReplCommand::Status,
        "/settings" => ReplCommand::Settings,
        "/help" => ReplCommand::Help,
        "/back" | "/quit" | "/exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(editor: &mut DefaultEditor, handle: &ScreenHandle, shutdown: Arc<AtomicBool>) -> ReplExit {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return ReplExit::Shutdown;
        }

        let line = match editor.readline("pathsense> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => return ReplExit::Interrupted,
            Err(ReadlineError::Eof) => return ReplExit::Eof,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                return ReplExit::Eof;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line);

        let command = match parse(line) {
            ReplCommand::Go(place) => ScreenCommand::Submit(place),
            ReplCommand::Suggest(Some(i)) => ScreenCommand::Submit(SUGGESTIONS[i].to_string()),
            ReplCommand::Suggest(None) => {
                cmd_suggest();
                continue;
            }
            ReplCommand::Pause => ScreenCommand::Pause,
            ReplCommand::Resume => ScreenCommand::Resume,
            ReplCommand::Toggle => ScreenCommand::ToggleMoving,
            ReplCommand::Abort => ScreenCommand::Abort,
            ReplCommand::Status => {
                for row in render_status(&handle.snapshot()) {
                    println!("{row}");
                }
                continue;
            }
            ReplCommand::Settings => {
                cmd_settings(editor);
                continue;
            }
            ReplCommand::Help => {
                cmd_help();
                continue;
            }
            ReplCommand::Quit => {
                println!("{}", "Leaving AR view.".green());
                return ReplExit::Quit;
            }
            ReplCommand::Usage(usage) => {
                println!("{} {}", "Usage:".yellow(), usage.bold());
                continue;
            }
            ReplCommand::Unknown(other) => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
                continue;
            }
        };

        if !handle.blocking_send(command) {
            println!("{}", "The AR screen has stopped.".yellow());
            return ReplExit::Shutdown;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Command handlers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "PathSense Commands".bold().underline());
    println!("  {}   – navigate to a destination (or just type it)", "/go <place>".bold().cyan());
    println!("  {}  – quick-pick destinations", "/suggest [n]".bold().cyan());
    println!("  {}        – stop walking", "/pause".bold().cyan());
    println!("  {}       – start walking again", "/resume".bold().cyan());
    println!("  {}       – walk / stand", "/toggle".bold().cyan());
    println!("  {}        – clear the destination", "/abort".bold().cyan());
    println!("  {}       – show the HUD", "/status".bold().cyan());
    println!("  {}     – edit ~/.pathsense/config.toml", "/settings".bold().cyan());
    println!("  {}  – leave the AR screen", "/back  /quit".bold().cyan());
    println!();
}

fn cmd_suggest() {
    println!("{}", "Suggestions".bold().underline());
    for (i, place) in SUGGESTIONS.iter().enumerate() {
        println!("  {} {}", format!("{})", i + 1).dimmed(), place.bold());
    }
    println!("  Pick one with {}.", "/suggest <n>".bold().cyan());
}

fn cmd_settings(editor: &mut DefaultEditor) {
    let mut cfg = match config::load_stored() {
        Ok(Some(c)) => c,
        Ok(None) => Config::default(),
        Err(e) => {
            println!("{}: {}", "Error loading config".red(), e);
            return;
        }
    };

    println!("{}", "Settings Editor".bold().underline());
    println!("  Press Enter to keep the current value.");
    println!("    minimal – {}", FeedbackMode::Minimal.summary());
    println!("    rich    – {}", FeedbackMode::Rich.summary());

    let mode = prompt_line(
        editor,
        &format!("  Feedback mode (minimal/rich) [{}]: ", cfg.feedback),
        &cfg.feedback.to_string(),
    );
    match mode.parse::<FeedbackMode>() {
        Ok(m) => cfg.feedback = m,
        Err(e) => println!("  {}", e.yellow()),
    }

    cfg.model = prompt_line(editor, &format!("  Model [{}]: ", cfg.model), &cfg.model);

    let key_hint = if cfg.has_api_key() { "set, '-' clears" } else { "not set" };
    let key = prompt_line(editor, &format!("  API key [{key_hint}]: "), "");
    match key.as_str() {
        "" => {}
        "-" => cfg.api_key = Zeroizing::new(String::new()),
        _ => cfg.api_key = Zeroizing::new(key),
    }

    let frame = prompt_line(
        editor,
        &format!("  Frame period ms [{}]: ", cfg.frame_ms),
        &cfg.frame_ms.to_string(),
    );
    match frame.parse::<u64>() {
        Ok(ms) if ms > 0 => cfg.frame_ms = ms,
        _ => println!("  {}", "Invalid frame period; keeping the old value.".yellow()),
    }

    match config::save(&cfg) {
        Ok(()) => println!(
            "  {} Saved.  Changes apply the next time the AR screen opens.",
            "✓".green().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }
}

/// HUD rows for `/status`.
pub fn render_status(s: &FrameSnapshot) -> Vec<String> {
    let mut rows = vec![format!("  {:<12}: {}", "State", s.state.to_string().bold())];
    if let Some(target) = &s.target {
        rows.push(format!("  {:<12}: {}", "Destination", target));
    }
    if let Some(overlay) = &s.overlay {
        let cue = if s.turn_imminent {
            "turn right ahead".yellow().bold().to_string()
        } else {
            "straight".dimmed().to_string()
        };
        rows.push(format!("  {:<12}: {} m  ({})", "Next turn", overlay.distance_readout, cue));
        rows.push(format!(
            "  {:<12}: {} {:.0}%",
            "Progress",
            progress_bar(overlay.progress, 20),
            overlay.minimap.progress_percent
        ));
        let gait = if s.is_moving { "walking" } else { "standing" };
        rows.push(format!("  {:<12}: {:.1} m/s ({gait})", "Speed", s.velocity_mps));
    }
    if let Some(analysis) = &s.analysis {
        rows.push(format!(
            "  {:<12}: {} ({:.0}%)",
            "Location",
            analysis.location_context,
            analysis.confidence * 100.0
        ));
        if !analysis.detected_features.is_empty() {
            rows.push(format!("  {:<12}: {}", "Features", analysis.detected_features.join(", ")));
        }
    }
    if let Some(status) = &s.status {
        rows.push(format!("  {:<12}: {}", "Status", status.cyan()));
    }
    if let Some(err) = &s.video_error {
        rows.push(format!("  {:<12}: {}", "Camera", err.red()));
    }
    rows
}

fn progress_bar(fraction: f32, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f32).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), ".".repeat(width - filled))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn prompt_line(editor: &mut DefaultEditor, msg: &str, default: &str) -> String {
    match editor.readline(msg) {
        Ok(line) => {
            let t = line.trim().to_string();
            if t.is_empty() { default.to_string() } else { t }
        }
        Err(_) => default.to_string(),
    }
}
