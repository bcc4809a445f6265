use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use tracing::{debug, info};

use super::entities::{DayRule, Frequency, Habit};

pub const EXAMPLE_HABITS: &str = "\
# Habits tracked by microhabits.
#
# frequency is one of:
#   - a number: habit is due again that many days after it was last done (default 1)
#   - 0: habit is never due, it is only tracked
#   - a list of weekdays and/or days of the month
# file is optional and can be opened from the tracker with E.

- name: Exercise
  frequency: ['Monday', 'Wednesday', 'Saturday'] # Specific days of the week

- name: Clean House
  frequency: 3 # Every 3 days

- name: Backup
  frequency: ['1st', '15th'] # Every 1st and 15th of every month

- name: Take a long walk on the beach # Example of long name
  # Default frequency daily

- name: Journal
  file: ~/journal.md

- name: Play videogames # Habits that don't need to be done but are tracked
  frequency: 0
";

/// Both layouts have been used historically: a bare list and a list under `habits:`.
/// Entries are kept as plain YAML values so that a broken one can be reported by name.
fn document_entries(document: Value) -> Result<Vec<Value>> {
    match document {
        Value::Null => Ok(vec![]),
        Value::Sequence(entries) => Ok(entries),
        Value::Mapping(mut mapping) => match mapping.remove("habits") {
            Some(Value::Sequence(entries)) => Ok(entries),
            Some(Value::Null) => Ok(vec![]),
            _ => bail!("Expected a list of habits under `habits:`"),
        },
        _ => bail!("Expected a list of habits"),
    }
}

#[derive(Deserialize)]
struct HabitEntry {
    name: String,
    #[serde(default)]
    frequency: Option<FrequencyEntry>,
    #[serde(default)]
    file: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FrequencyEntry {
    Days(u32),
    On(Vec<String>),
}

impl HabitEntry {
    fn into_habit(self) -> Result<Habit> {
        let frequency = match self.frequency {
            None => Frequency::default(),
            Some(FrequencyEntry::Days(days)) => Frequency::EveryDays(days),
            Some(FrequencyEntry::On(rules)) => {
                if rules.is_empty() {
                    bail!("Habit {:?} has an empty frequency list", self.name);
                }
                let rules = rules
                    .iter()
                    .map(|rule| rule.parse::<DayRule>())
                    .collect::<Result<Vec<_>>>()
                    .with_context(|| format!("Invalid frequency for habit {:?}", self.name))?;
                Frequency::OnDays(rules)
            }
        };
        Ok(Habit::new(self.name, frequency, self.file))
    }
}

/// Parses habits in the order they are written. Names must be unique since the log refers to
/// habits by name.
pub fn parse_habits(content: &str) -> Result<Vec<Habit>> {
    let blank = content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'));
    if blank {
        return Ok(vec![]);
    }

    let document = serde_yaml::from_str::<Value>(content).context("Habits file is not valid")?;
    let entries = document_entries(document)?;

    let mut habits: Vec<Habit> = Vec::with_capacity(entries.len());
    for (position, value) in entries.into_iter().enumerate() {
        let label = match value.get("name").and_then(Value::as_str) {
            Some(name) => format!("habit {name:?}"),
            None => format!("habit number {}", position + 1),
        };
        let entry = serde_yaml::from_value::<HabitEntry>(value)
            .with_context(|| format!("Invalid {label}"))?;
        let habit = entry.into_habit()?;
        if habits.iter().any(|h| h.name == habit.name) {
            bail!("Habit {:?} is defined more than once", habit.name);
        }
        habits.push(habit);
    }
    Ok(habits)
}

pub async fn load_habits(path: &Path) -> Result<Vec<Habit>> {
    let content = tokio::fs::read_to_string(path).await.with_context(|| {
        format!(
            "Couldn't read habits file {}. Run `habits init` to create an example",
            path.display()
        )
    })?;
    let habits = parse_habits(&content).with_context(|| format!("In {}", path.display()))?;
    debug!("Loaded {} habits from {path:?}", habits.len());
    Ok(habits)
}

/// Writes [EXAMPLE_HABITS] into `path`. Existing files are never overwritten.
pub async fn write_example_habits(path: &Path) -> Result<()> {
    if tokio::fs::try_exists(path).await? {
        bail!("{} already exists", path.display());
    }
    tokio::fs::write(path, EXAMPLE_HABITS)
        .await
        .with_context(|| format!("Couldn't write {}", path.display()))?;
    info!("Created example habits file {path:?}");
    Ok(())
}
