//! `pathsense-cli` – PathSense terminal front-end
//!
//! This binary opens the AR navigation screen in a terminal.  It:
//!
//! 1. Checks for `~/.pathsense/config.toml`; runs a **First-Run Wizard** when
//!    the file is absent.
//! 2. Picks the scene classifier: the remote multimodal endpoint when an API
//!    key is configured, the offline mock otherwise.
//! 3. Starts the [`ScreenDriver`] on a Tokio runtime with console speech and
//!    haptics and a simulated rear camera.
//! 4. Drops the user into an **interactive REPL** with slash-commands
//!    (`/go`, `/suggest`, `/status`, `/settings`, `/help`).
//! 5. Intercepts **Ctrl-C** to publish a shutdown alert and close the screen.

mod config;
mod console;
mod repl;

use colored::Colorize;
use rustyline::DefaultEditor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

use pathsense_engine::FeedbackMode;
use pathsense_engine::velocity::JitteredWalk;
use pathsense_hal::SimCamera;
use pathsense_middleware::{EventBus, Topic};
use pathsense_runtime::{
    ArScreen, ScreenCommand, ScreenDevices, ScreenDriver, ScreenHandle, classifier_from_config,
    init_tracing,
};
use pathsense_types::{Event, EventPayload};

use crate::console::{ConsoleHaptics, ConsoleSpeech};
use crate::repl::ReplExit;

/// Grace period for the driver to release the camera after `/back`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() {
    // ── Structured logging ────────────────────────────────────────────────
    // RUST_LOG filters (default "info"); PATHSENSE_LOG_FORMAT=json switches to
    // newline-delimited JSON; OTEL_EXPORTER_OTLP_ENDPOINT enables span export.
    // User-facing output still uses println!.
    let _telemetry = init_tracing("pathsense");

    print_banner();

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Terminal error".red(), e);
            return;
        }
    };

    // ── First-Run Wizard ──────────────────────────────────────────────────
    let cfg = match config::load() {
        Ok(None) => run_first_run_wizard(&mut editor),
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    };
    info!(config = ?cfg, "configuration resolved");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            return;
        }
    };

    // ── AR screen ─────────────────────────────────────────────────────────
    let bus = EventBus::default();
    let printer = runtime.spawn(print_events(bus.clone()));

    let devices = ScreenDevices {
        camera: Box::new(SimCamera::new("rear")),
        speech: Box::new(ConsoleSpeech),
        haptics: Box::new(ConsoleHaptics),
    };
    let screen = ArScreen::enter(
        devices,
        Box::new(JitteredWalk::from_entropy()),
        cfg.screen_options(),
        bus.clone(),
    )
    .on_back(|| println!("{}", "  ✓ Camera released.".green()));

    let classifier = classifier_from_config(&cfg.classifier_settings());
    println!(
        "  Scene classifier: {}  Feedback: {}",
        classifier.name().bold(),
        cfg.feedback.to_string().bold()
    );

    let (driver, handle) = ScreenDriver::new(screen, classifier);
    let driver = runtime.spawn(driver.with_frame_period(cfg.frame_period()).run());

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        let bus = bus.clone();
        let handle = handle.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            println!();
            request_shutdown(&bus, &handle, "operator Ctrl-C");
            shutdown.store(true, Ordering::SeqCst);
        }) {
            warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
        }
    }

    println!();
    println!(
        "  Type a destination, or {} for a list of commands.\n",
        "/help".bold().cyan()
    );

    // ── Interactive REPL ──────────────────────────────────────────────────
    match repl::run(&mut editor, &handle, shutdown) {
        ReplExit::Interrupted => request_shutdown(&bus, &handle, "operator Ctrl-C"),
        ReplExit::Quit | ReplExit::Eof => {
            handle.blocking_send(ScreenCommand::Back);
        }
        ReplExit::Shutdown => {}
    }

    let finished = runtime.block_on(async {
        tokio::time::timeout(SHUTDOWN_GRACE, driver).await
    });
    if finished.is_err() {
        warn!("AR screen did not stop within the grace period");
    }
    printer.abort();
    runtime.shutdown_timeout(Duration::from_millis(200));
    println!("{}", "  ✓ Exiting PathSense.".green());
}

/// Publish a shutdown alert and stop the driver at its next frame.
fn request_shutdown(bus: &EventBus, handle: &ScreenHandle, reason: &str) {
    println!("{}", "⚠  Shutdown requested – closing the AR screen …".yellow().bold());
    let event = Event::new(
        "pathsense-cli",
        EventPayload::Shutdown {
            reason: reason.to_string(),
        },
    );
    let _ = bus.publish_to(Topic::SystemAlerts, event);
    handle.cancel();
}

/// Echo navigation, feedback and alert traffic to the terminal.
async fn print_events(bus: EventBus) {
    let mut navigation = bus.subscribe_to(Topic::Navigation);
    let mut feedback = bus.subscribe_to(Topic::Feedback);
    let mut alerts = bus.subscribe_to(Topic::SystemAlerts);
    drop(bus);

    loop {
        let (event, alert) = tokio::select! {
            Some(e) = navigation.next() => (e, false),
            Some(e) = feedback.next() => (e, false),
            Some(e) = alerts.next() => (e, true),
            else => break,
        };
        // Failed scans land on both topics; show them once.
        if alert && matches!(event.payload, EventPayload::Transition(_)) {
            continue;
        }
        if let Some(line) = console::describe(&event.payload) {
            if alert {
                println!("  {} {}", "!".red().bold(), line.red());
            } else {
                println!("  {} {}", "›".cyan().bold(), line);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// First-Run Wizard
// ─────────────────────────────────────────────────────────────────────────────

fn run_first_run_wizard(editor: &mut DefaultEditor) -> config::Config {
    println!();
    println!("{}", "  ╔══════════════════════════════════════╗".bold().cyan());
    println!("{}", "  ║      PathSense First-Run Wizard      ║".bold().cyan());
    println!("{}", "  ╚══════════════════════════════════════╝".bold().cyan());
    println!();
    println!("  No configuration found.  Let's set up PathSense.\n");

    let mut cfg = config::Config::default();

    println!("  How much should PathSense talk?");
    println!("    1) Minimal – {}  (default)", FeedbackMode::Minimal.summary());
    println!("    2) Rich    – {}", FeedbackMode::Rich.summary());
    let choice = repl::prompt_line(editor, "  Enter choice [1]: ", "1");
    cfg.feedback = match choice.as_str() {
        "2" => FeedbackMode::Rich,
        _ => FeedbackMode::Minimal,
    };

    println!("  Scene recognition uses a multimodal API.  Leave blank to run offline.");
    let key = repl::prompt_line(editor, "  API key []: ", "");
    cfg.api_key = zeroize::Zeroizing::new(key);

    match config::save(&cfg) {
        Ok(()) => println!(
            "\n  {} Config saved to {}\n",
            "✓".green().bold(),
            config::config_path().display().to_string().bold()
        ),
        Err(e) => println!("{}: {}", "Error saving config".red(), e),
    }

    config::apply_env_overrides(&mut cfg);
    cfg
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"    ___       __  __   ____                "#.bold().cyan());
    println!("{}", r#"   / _ \___ _/ /_/ /  / __/__ ___  ___ ___ "#.bold().cyan());
    println!("{}", r#"  / ___/ _ `/ __/ _ \_\ \/ -_) _ \(_-</ -_)"#.bold().cyan());
    println!("{}", r#" /_/   \_,_/\__/_//_/___/\__/_//_/___/\__/ "#.bold().cyan());
    println!();
    println!("  {} {}",
        "PathSense".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  AR indoor navigation");
    println!();
}
