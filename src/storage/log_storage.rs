use std::{
    collections::HashMap,
    future::Future,
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use fs4::tokio::AsyncFileExt;
use serde::Deserialize;
use tokio::fs::File;
use tracing::{debug, info, warn};

use crate::{
    habits::entities::{Habit, Status},
    utils::time::{date_to_log_field, log_field_to_date},
};

/// Interface for abstracting storage of the activity log.
pub trait LogStorage {
    /// Applies the marks from the log to `habits`. Marks for names missing from `habits` are
    /// attached to hidden habits appended at the end.
    fn load(&self, habits: Vec<Habit>) -> impl Future<Output = Result<Vec<Habit>>>;

    /// Replaces the log with the marks of `habits`.
    fn save(&self, habits: &[Habit]) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> LogStorage for T
where
    T::Target: LogStorage,
{
    fn load(&self, habits: Vec<Habit>) -> impl Future<Output = Result<Vec<Habit>>> {
        self.deref().load(habits)
    }

    fn save(&self, habits: &[Habit]) -> impl Future<Output = Result<()>> {
        self.deref().save(habits)
    }
}

/// One line of the log.
#[derive(Debug, Deserialize)]
struct LogRow {
    date: String,
    name: String,
    status: String,
}

/// The main realization of [LogStorage]. The log is a CSV file with a `date,name,status`
/// header.
pub struct CsvLogStorage {
    path: PathBuf,
}

impl CsvLogStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_content(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No log at {:?} yet", self.path);
                Ok(String::new())
            }
            Err(e) => Err(e).with_context(|| format!("Couldn't read {}", self.path.display())),
        }
    }

    /// Takes an exclusive lock next to the log. Blocks while another session holds it.
    pub async fn lock(&self) -> Result<LogLock> {
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .await
            .with_context(|| format!("Couldn't open lock {}", lock_path.display()))?;
        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() != ErrorKind::WouldBlock {
                return Err(e).with_context(|| format!("Couldn't lock {}", lock_path.display()));
            }
            info!("Waiting for another session to release {lock_path:?}");
            // Blocking lock off the runtime thread.
            let file = tokio::task::spawn_blocking(move || file.lock_exclusive().map(|()| file))
                .await?
                .with_context(|| format!("Couldn't lock {}", lock_path.display()))?;
            return Ok(LogLock { file });
        }
        debug!("Acquired lock {lock_path:?}");
        Ok(LogLock { file })
    }
}

impl LogStorage for CsvLogStorage {
    async fn load(&self, habits: Vec<Habit>) -> Result<Vec<Habit>> {
        let content = self.read_content().await?;
        let habits = apply_log(habits, &content);
        debug!("Loaded log {:?}", self.path);
        Ok(habits)
    }

    async fn save(&self, habits: &[Habit]) -> Result<()> {
        let buffer = serialize_log(habits)?;

        let mut tmp_path = self.path.clone().into_os_string();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, buffer)
            .await
            .with_context(|| format!("Couldn't write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| {
                format!("Couldn't move {} to {}", tmp_path.display(), self.path.display())
            })?;
        info!("Saved log to {:?}", self.path);
        Ok(())
    }
}

/// Held for the duration of a session.
pub struct LogLock {
    file: File,
}

impl LogLock {
    pub async fn release(self) -> Result<()> {
        self.file.unlock_async().await?;
        Ok(())
    }
}

fn apply_log(mut habits: Vec<Habit>, content: &str) -> Vec<Habit> {
    let mut index: HashMap<String, usize> = habits
        .iter()
        .enumerate()
        .map(|(i, h)| (h.name.clone(), i))
        .collect();

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    for (line, row) in reader.deserialize::<LogRow>().enumerate() {
        let parsed = row.map_err(anyhow::Error::from).and_then(|row| {
            let date = log_field_to_date(&row.date)?;
            let status = row.status.parse::<Status>()?;
            Ok((row.name, date, status))
        });
        let (name, date, status) = match parsed {
            Ok(v) => v,
            Err(e) => {
                // Rows written by hand might be broken. They are dropped on the next save.
                warn!("Skipping log row {}: {e}", line + 1);
                continue;
            }
        };

        let position = *index.entry(name.clone()).or_insert_with(|| {
            debug!("Log mentions unknown habit {name:?}");
            habits.push(Habit::hidden(name.clone()));
            habits.len() - 1
        });
        habits[position].set_status(date, Some(status));
    }
    habits
}

fn serialize_log(habits: &[Habit]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    // Writes the header even when there are no rows.
    writer.write_record(["date", "name", "status"])?;
    for habit in habits {
        for (date, status) in habit.statuses() {
            writer.write_record([
                date_to_log_field(date),
                habit.name.clone(),
                status.to_string(),
            ])?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Couldn't flush log: {e}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::{
        habits::entities::{Frequency, Habit, Status},
        utils::logging::TEST_LOGGING,
    };

    use super::{CsvLogStorage, LogStorage};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn configured() -> Vec<Habit> {
        vec![
            Habit::new("Habit every x days", Frequency::EveryDays(3), None),
            Habit::new("Daily", Frequency::default(), None),
        ]
    }

    #[tokio::test]
    async fn loads_statuses_from_log() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("log.csv");
        tokio::fs::write(
            &path,
            "date,name,status\n\
             2024-01-01,Habit every x days,y\n\
             2024-01-04,Habit every x days,s\n\
             2024-01-07,Habit every x days,y\n",
        )
        .await?;

        let habits = CsvLogStorage::new(path).load(configured()).await?;
        let habit = &habits[0];
        assert_eq!(habit.status(date(1)), Some(Status::Completed));
        assert_eq!(habit.status(date(4)), Some(Status::Skipped));
        assert_eq!(habit.status(date(5)), None);
        assert!(!habit.is_due(date(9)));
        assert!(habit.is_due(date(11)));
        assert_eq!(habits.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn missing_and_empty_logs_are_fine() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("log.csv");
        let storage = CsvLogStorage::new(path.clone());

        let habits = storage.load(configured()).await?;
        assert!(habits.iter().all(|h| h.statuses().count() == 0));

        tokio::fs::write(&path, "").await?;
        let habits = storage.load(configured()).await?;
        assert_eq!(habits.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_habits_survive_a_save() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("log.csv");
        tokio::fs::write(
            &path,
            "date,name,status\n2023-12-31,Retired habit,y\n2024-01-02,Daily,y\n",
        )
        .await?;
        let storage = CsvLogStorage::new(path.clone());

        let habits = storage.load(configured()).await?;
        assert_eq!(habits.len(), 3);
        let retired = &habits[2];
        assert!(retired.hidden);
        assert_eq!(
            retired.status(NaiveDate::from_ymd_opt(2023, 12, 31).unwrap()),
            Some(Status::Completed)
        );

        storage.save(&habits).await?;
        let content = tokio::fs::read_to_string(&path).await?;
        assert_eq!(
            content,
            "date,name,status\n2024-01-02,Daily,y\n2023-12-31,Retired habit,y\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn later_duplicates_win_and_broken_rows_are_skipped() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let path = dir.path().join("log.csv");
        tokio::fs::write(
            &path,
            "date,name,status\n\
             2024-01-03,Daily,y\n\
             not a date,Daily,y\n\
             2024-01-04,Daily,maybe\n\
             2024-01-05,Daily\n\
             2024-01-03,Daily,s\n",
        )
        .await?;

        let habits = CsvLogStorage::new(path).load(configured()).await?;
        let daily = &habits[1];
        assert_eq!(daily.status(date(3)), Some(Status::Skipped));
        assert_eq!(daily.statuses().count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn save_then_load_is_stable() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("log.csv");
        let storage = CsvLogStorage::new(path.clone());

        let mut habits = configured();
        habits[0].set_status(date(9), Some(Status::Completed));
        habits[0].set_status(date(2), Some(Status::Skipped));
        habits[1].toggle_status(date(5));
        storage.save(&habits).await?;

        let first = tokio::fs::read_to_string(&path).await?;
        assert_eq!(
            first,
            "date,name,status\n\
             2024-01-02,Habit every x days,s\n\
             2024-01-09,Habit every x days,y\n\
             2024-01-05,Daily,y\n"
        );

        let reloaded = storage.load(configured()).await?;
        assert_eq!(reloaded, habits);
        storage.save(&reloaded).await?;
        assert_eq!(tokio::fs::read_to_string(&path).await?, first);
        assert!(!dir.path().join("log.csv.tmp").exists());
        Ok(())
    }

    #[tokio::test]
    async fn second_session_waits_for_the_lock() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("log.csv");
        let first = CsvLogStorage::new(path.clone()).lock().await?;

        let mut second = tokio::spawn(async move { CsvLogStorage::new(path).lock().await });
        let waited = tokio::time::timeout(Duration::from_millis(200), &mut second).await;
        assert!(waited.is_err(), "lock was taken twice");

        first.release().await?;
        let second = tokio::time::timeout(Duration::from_secs(5), second).await???;
        second.release().await?;
        Ok(())
    }

    #[tokio::test]
    async fn lock_can_be_taken_again_after_release() -> Result<()> {
        let dir = tempdir()?;
        let storage = CsvLogStorage::new(dir.path().join("log.csv"));

        let lock = storage.lock().await?;
        assert!(dir.path().join("log.csv.lock").exists());
        lock.release().await?;

        let lock = storage.lock().await?;
        lock.release().await?;
        Ok(())
    }
}
