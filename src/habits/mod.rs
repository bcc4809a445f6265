//! Habits come from a YAML file written by the user ([config]) and carry the marks recorded in
//! the activity log ([entities::Habit::statuses]).

pub mod config;
pub mod entities;
