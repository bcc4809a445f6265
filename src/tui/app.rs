use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use crate::{
    habits::entities::Habit,
    utils::{
        clock::Clock,
        dir::expand_home,
        time::{date_window, MAX_WINDOW_DAYS},
    },
};

pub const HELP_MESSAGE: &str = "keys: ↑/k up | ↓/j down | ←/h prev day | →/l next day | \
space mark | t today | g/G first/last | H hide done | E edit file | s save | q save+quit | \
Q quit";
pub const CONFIRM_QUIT_MESSAGE: &str = "Do you want to quit without saving? [N/y]";

/// Side effects requested by a key press. They are executed by the event loop, which owns the
/// terminal and the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    Save,
    SaveAndQuit,
    Quit,
    OpenFile(PathBuf),
}

/// State of the tracker screen.
pub struct App {
    habits: Vec<Habit>,
    /// Indexes into `habits` of the habits that are shown.
    visible: Vec<usize>,
    today: NaiveDate,
    selected_date: NaiveDate,
    selected_row: usize,
    hide_completed: bool,
    days_back: u32,
    days_forward: u32,
    confirm_quit: bool,
    message: Option<String>,
}

impl App {
    pub fn new(habits: Vec<Habit>, clock: &impl Clock, days_back: u32, days_forward: u32) -> Self {
        let today = clock.today();
        let visible = habits
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.hidden)
            .map(|(i, _)| i)
            .collect();
        Self {
            habits,
            visible,
            today,
            selected_date: today,
            selected_row: 0,
            hide_completed: false,
            days_back: days_back.min(MAX_WINDOW_DAYS),
            days_forward: days_forward.min(MAX_WINDOW_DAYS),
            confirm_quit: false,
            message: None,
        }
    }

    /// All habits, hidden ones included. This is what gets saved.
    pub fn habits(&self) -> &[Habit] {
        &self.habits
    }

    pub fn visible_habits(&self) -> impl Iterator<Item = &Habit> + '_ {
        self.visible.iter().map(|i| &self.habits[*i])
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn selected_habit(&self) -> Option<&Habit> {
        self.visible.get(self.selected_row).map(|i| &self.habits[*i])
    }

    fn selected_habit_mut(&mut self) -> Option<&mut Habit> {
        self.visible
            .get(self.selected_row)
            .map(|i| &mut self.habits[*i])
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn days_back(&self) -> u32 {
        self.days_back
    }

    pub fn hide_completed(&self) -> bool {
        self.hide_completed
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        date_window(self.selected_date, self.days_back, self.days_forward)
    }

    /// Whether a habit should be drawn dimmed.
    pub fn is_dimmed(&self, habit: &Habit) -> bool {
        self.hide_completed && !habit.is_due(self.selected_date)
    }

    /// Text for the bottom line. Notifications are shown until the next key press.
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or(HELP_MESSAGE)
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Action {
        self.message = None;

        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Action::Quit;
        }

        if self.confirm_quit {
            self.confirm_quit = false;
            return match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => Action::Quit,
                _ => Action::None,
            };
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_row = self.selected_row.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected_row = (self.selected_row + 1).min(self.last_row());
            }
            KeyCode::Left | KeyCode::Char('h') => self.move_date(-1),
            KeyCode::Right | KeyCode::Char('l') => self.move_date(1),
            KeyCode::Char(' ') | KeyCode::Enter => {
                let date = self.selected_date;
                if let Some(habit) = self.selected_habit_mut() {
                    habit.toggle_status(date);
                    debug!("{:?} on {date} is now {:?}", habit.name, habit.status(date));
                }
            }
            KeyCode::Char('t') => self.selected_date = self.today,
            KeyCode::Char('g') => self.selected_row = 0,
            KeyCode::Char('G') => self.selected_row = self.last_row(),
            KeyCode::Char('H') => self.hide_completed = !self.hide_completed,
            KeyCode::Char('s') => return Action::Save,
            KeyCode::Char('q') => return Action::SaveAndQuit,
            KeyCode::Char('Q') => {
                self.confirm_quit = true;
                self.notify(CONFIRM_QUIT_MESSAGE);
            }
            KeyCode::Char('E') => {
                return match self.selected_habit().and_then(|h| h.file.as_deref()) {
                    Some(file) => Action::OpenFile(expand_home(file)),
                    None => {
                        self.notify("No file associated with this habit");
                        Action::None
                    }
                };
            }
            _ => {}
        }
        Action::None
    }

    fn last_row(&self) -> usize {
        self.visible.len().saturating_sub(1)
    }

    fn move_date(&mut self, delta: i64) {
        let days = Days::new(delta.unsigned_abs());
        let moved = if delta < 0 {
            self.selected_date.checked_sub_days(days)
        } else {
            self.selected_date.checked_add_days(days)
        };
        if let Some(date) = moved {
            self.selected_date = date;
        }
    }
}
