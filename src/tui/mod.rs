//! Interactive habit grid. [app::App] holds the state and turns key presses into
//! [app::Action]s, [render] draws it, and [run_tracker] drives both against a real terminal.

pub mod app;
pub mod render;

use std::{
    io::{self, Stdout},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use app::{Action, App};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};

use crate::{
    habits::{config::load_habits, entities::Habit},
    storage::log_storage::{CsvLogStorage, LogStorage},
    utils::{clock::DefaultClock, dir::ensure_parent_dir},
};

type Term = Terminal<CrosstermBackend<Stdout>>;

pub struct TrackerConfig {
    pub habits_file: PathBuf,
    pub log_file: PathBuf,
    pub days_back: u32,
    pub days_forward: u32,
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Saved,
    Discarded,
}

/// Runs the tracker until the user quits. The log is locked for the whole session.
pub async fn run_tracker(config: TrackerConfig) -> Result<Exit> {
    let habits = load_habits(&config.habits_file).await?;

    ensure_parent_dir(&config.log_file)?;
    let storage = CsvLogStorage::new(config.log_file);
    let lock = storage.lock().await?;

    let result = run_locked(habits, &storage, config.days_back, config.days_forward).await;

    lock.release().await?;
    result
}

async fn run_locked(
    habits: Vec<Habit>,
    storage: &CsvLogStorage,
    days_back: u32,
    days_forward: u32,
) -> Result<Exit> {
    let habits = storage.load(habits).await?;
    let mut app = App::new(habits, &DefaultClock, days_back, days_forward);

    let mut terminal = enter_terminal()?;
    let result = event_loop(&mut terminal, &mut app, storage).await;
    restore_terminal();

    let exit = result?;
    info!("Session ended with {exit:?}");
    Ok(exit)
}

async fn event_loop(terminal: &mut Term, app: &mut App, storage: &CsvLogStorage) -> Result<Exit> {
    let mut events = EventStream::new();
    loop {
        terminal.draw(|f| render::draw(f, app))?;

        let Some(event) = events.next().await else {
            warn!("Terminal event stream closed");
            return Ok(Exit::Discarded);
        };

        let key = match event? {
            Event::Key(key) if key.kind == KeyEventKind::Press => key,
            // Resizes are picked up by the next draw
            _ => continue,
        };

        match app.handle_key(key) {
            Action::None => {}
            Action::Save => {
                save(app, storage).await;
            }
            Action::SaveAndQuit => {
                if save(app, storage).await {
                    return Ok(Exit::Saved);
                }
            }
            Action::Quit => return Ok(Exit::Discarded),
            Action::OpenFile(path) => {
                // The editor needs stdin for itself.
                drop(events);
                let result = open_in_editor(terminal, &path).await;
                events = EventStream::new();
                if let Err(e) = result {
                    error!("Editor failed {e:?}");
                    app.notify(format!("Couldn't open {}: {e}", path.display()));
                }
            }
        }
    }
}

async fn save(app: &mut App, storage: &CsvLogStorage) -> bool {
    match storage.save(app.habits()).await {
        Ok(()) => {
            app.notify(format!("Saved to {}", storage.path().display()));
            true
        }
        Err(e) => {
            error!("Failed to save {e:?}");
            app.notify(format!("Couldn't save: {e}"));
            false
        }
    }
}

fn enter_terminal() -> Result<Term> {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    terminal.hide_cursor()?;
    terminal.clear()?;
    Ok(terminal)
}

/// Restore terminal state. Called on exit and on panic.
fn restore_terminal() {
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
}

/// `$EDITOR` may carry arguments, for example `code -w`.
fn editor_command() -> (String, Vec<String>) {
    let editor = std::env::var("EDITOR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "vi".into());
    let mut parts = editor.split_whitespace().map(String::from);
    let program = parts.next().unwrap_or_else(|| "vi".into());
    (program, parts.collect())
}

async fn open_in_editor(terminal: &mut Term, path: &Path) -> Result<()> {
    let (program, args) = editor_command();
    info!("Opening {path:?} with {program}");

    restore_terminal();
    let status = tokio::process::Command::new(&program)
        .args(&args)
        .arg(path)
        .status()
        .await
        .with_context(|| format!("Couldn't start {program}"));

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    terminal.hide_cursor()?;
    terminal.clear()?;

    let status = status?;
    if !status.success() {
        warn!("{program} exited with {status}");
    }
    Ok(())
}
