//! Minimalistic habit tracker for the terminal.
//! Habits are described in a YAML file, every day they are done (or skipped) is recorded in a
//! CSV log, and both are edited through a small grid of habits and dates.
//!

pub mod cli;
pub mod habits;
pub mod installer;
pub mod storage;
pub mod tui;
pub mod utils;
