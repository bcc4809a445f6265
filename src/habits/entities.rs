use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use anyhow::{anyhow, bail};
use chrono::{Datelike, NaiveDate, Weekday};
use unicode_width::UnicodeWidthChar;

pub const NAME_CUTOFF: usize = 25;
pub const NAME_CUTOFF_CHAR: char = '…';
pub const FILE_MARKER: &str = "[f] ";

/// Mark stored in the activity log for a habit on a certain day. Absence of a mark means the
/// habit wasn't done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    Completed,
    Skipped,
}

impl Status {
    pub fn as_char(self) -> char {
        match self {
            Status::Completed => 'y',
            Status::Skipped => 's',
        }
    }
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for Status {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "y" => Ok(Status::Completed),
            "s" => Ok(Status::Skipped),
            other => Err(anyhow!("Unknown status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayRule {
    Weekday(Weekday),
    MonthDay(u32),
}

impl DayRule {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DayRule::Weekday(weekday) => date.weekday() == *weekday,
            DayRule::MonthDay(day) => date.day() == *day,
        }
    }
}

impl FromStr for DayRule {
    type Err = anyhow::Error;

    /// Anything with a digit in it is a day of the month (`1st`, `15th`, `3`), everything else
    /// has to be a weekday name (`Monday`, `wed`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.chars().any(|c| c.is_ascii_digit()) {
            let digits: String = s
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            let day: u32 = digits.parse()?;
            if !(1..=31).contains(&day) {
                bail!("Day of month {s:?} is out of range");
            }
            Ok(DayRule::MonthDay(day))
        } else {
            s.parse::<Weekday>()
                .map(DayRule::Weekday)
                .map_err(|_| anyhow!("{s:?} is neither a weekday nor a day of month"))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frequency {
    /// Habit is due once this many days have passed since it was last completed. Zero means the
    /// habit is only tracked and never due.
    EveryDays(u32),
    OnDays(Vec<DayRule>),
}

impl Default for Frequency {
    fn default() -> Self {
        Frequency::EveryDays(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Habit {
    pub name: String,
    pub frequency: Frequency,
    pub file: Option<String>,
    statuses: BTreeMap<NaiveDate, Status>,
    /// Habit exists in the log but not in the habits file. Its history is kept so that it
    /// isn't lost on save.
    pub hidden: bool,
}

impl Habit {
    pub fn new(name: impl Into<String>, frequency: Frequency, file: Option<String>) -> Self {
        Self {
            name: name.into(),
            frequency,
            file,
            statuses: BTreeMap::new(),
            hidden: false,
        }
    }

    pub fn hidden(name: impl Into<String>) -> Self {
        Self {
            hidden: true,
            ..Self::new(name, Frequency::EveryDays(0), None)
        }
    }

    pub fn status(&self, date: NaiveDate) -> Option<Status> {
        self.statuses.get(&date).copied()
    }

    pub fn set_status(&mut self, date: NaiveDate, status: Option<Status>) {
        match status {
            Some(status) => {
                self.statuses.insert(date, status);
            }
            None => {
                self.statuses.remove(&date);
            }
        }
    }

    /// Cycles none -> completed -> skipped -> none.
    pub fn toggle_status(&mut self, date: NaiveDate) {
        let next = match self.status(date) {
            None => Some(Status::Completed),
            Some(Status::Completed) => Some(Status::Skipped),
            Some(Status::Skipped) => None,
        };
        self.set_status(date, next);
    }

    /// All marks in ascending date order.
    pub fn statuses(&self) -> impl Iterator<Item = (NaiveDate, Status)> + '_ {
        self.statuses.iter().map(|(d, s)| (*d, *s))
    }

    fn last_completed_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.statuses
            .range(..date)
            .rev()
            .find(|(_, s)| **s == Status::Completed)
            .map(|(d, _)| *d)
    }

    pub fn is_due(&self, date: NaiveDate) -> bool {
        if self.status(date).is_some() {
            return false;
        }
        match &self.frequency {
            Frequency::EveryDays(0) => false,
            Frequency::EveryDays(days) => match self.last_completed_before(date) {
                Some(last) => (date - last).num_days() >= i64::from(*days),
                None => true,
            },
            Frequency::OnDays(rules) => rules.iter().any(|rule| rule.matches(date)),
        }
    }

    /// What is shown in the grid for `date`.
    pub fn cell(&self, date: NaiveDate) -> String {
        match self.status(date) {
            Some(status) => format!("[{status}]"),
            None if self.is_due(date) => "[ ]".into(),
            None => "[o]".into(),
        }
    }

    /// Name as shown in the grid. Habits with a file get a marker and long names are cut so
    /// they fit before the first date column.
    pub fn display_name(&self) -> String {
        let name = match self.file {
            Some(_) => format!("{FILE_MARKER}{}", self.name),
            None => self.name.clone(),
        };
        truncate_to_width(&name, NAME_CUTOFF - 2)
    }
}

fn truncate_to_width(value: &str, max_width: usize) -> String {
    let mut width = 0;
    let mut result = String::new();
    for c in value.chars() {
        width += c.width().unwrap_or(0);
        if width > max_width {
            result.push(NAME_CUTOFF_CHAR);
            return result;
        }
        result.push(c);
    }
    result
}
