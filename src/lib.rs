pub mod calendar;
pub mod db;
pub mod errors;
pub mod expense;
pub mod habit;
pub mod models;
pub mod reading;
pub mod storage;
pub mod store;
pub mod todo;

use crate::db::Database;
use crate::errors::AppResult;
use crate::expense::ExpenseBook;
use crate::habit::HabitTracker;
use crate::models::AppSettings;
use crate::reading::ReadingList;
use crate::storage::SlotStorage;
use crate::todo::TodoList;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;

pub const DB_FILE: &str = "trackers.sqlite";
pub const DATA_DIR_ENV: &str = "DAILY_TRACKERS_DIR";
pub const DEFAULT_DATA_DIR: &str = ".daily-trackers";

static LOG_GUARD: std::sync::OnceLock<WorkerGuard> = std::sync::OnceLock::new();

/// The four trackers sharing one database.
pub struct Trackers {
    db: Arc<Database>,
    settings: AppSettings,
    today: NaiveDate,
    pub expense: ExpenseBook,
    pub todo: TodoList,
    pub habit: HabitTracker,
    pub reading: ReadingList,
}

impl Trackers {
    pub fn open(data_dir: &Path, today: NaiveDate) -> AppResult<Self> {
        let db = Arc::new(Database::new(&data_dir.join(DB_FILE))?);
        Self::with_database(db, today)
    }

    pub fn with_database(db: Arc<Database>, today: NaiveDate) -> AppResult<Self> {
        let settings = db.get_settings()?;
        let storage: Arc<dyn SlotStorage> = db.clone();
        Ok(Self {
            expense: ExpenseBook::open(storage.clone(), today, &settings)?,
            todo: TodoList::open(storage.clone(), today)?,
            habit: HabitTracker::open(storage.clone(), today, &settings)?,
            reading: ReadingList::open(storage, today, &settings)?,
            db,
            settings,
            today,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Merges `update` into the stored settings and reopens every tracker
    /// with them. Viewing state and subscriptions start over.
    pub fn update_settings(&mut self, update: serde_json::Value) -> AppResult<AppSettings> {
        self.db.update_settings(update)?;
        *self = Self::with_database(self.db.clone(), self.today)?;
        Ok(self.settings.clone())
    }
}

/// `--data-dir`, then `DAILY_TRACKERS_DIR`, then `./.daily-trackers`.
pub fn resolve_data_dir(explicit: Option<PathBuf>) -> PathBuf {
    explicit
        .or_else(|| {
            std::env::var_os(DATA_DIR_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// JSON logs in `<data_dir>/logs`, rotated daily. `RUST_LOG` wins over
/// `default_filter`.
pub fn init_tracing(data_dir: &Path, default_filter: &str) -> Result<(), String> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|error| error.to_string())?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "trackers.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_filter))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .with_writer(non_blocking)
        .try_init()
        .map_err(|error| error.to_string())
}

#[cfg(test)]
mod tests {
    use super::{resolve_data_dir, Trackers};
    use crate::models::WeekStart;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    #[test]
    fn explicit_data_dir_wins() {
        let dir = resolve_data_dir(Some(PathBuf::from("/tmp/somewhere")));
        assert_eq!(dir, PathBuf::from("/tmp/somewhere"));
    }

    #[test]
    fn settings_update_reopens_trackers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let today = NaiveDate::from_ymd_opt(2024, 6, 15).expect("date");
        let mut trackers = Trackers::open(dir.path(), today).expect("open");
        trackers.habit.add_habit("Run").expect("add");

        let settings = trackers
            .update_settings(serde_json::json!({ "weekStart": "monday", "defaultGenre": "unspecified" }))
            .expect("update");
        assert_eq!(settings.week_start, WeekStart::Monday);
        assert_eq!(trackers.habit.book().habits.len(), 1);

        let view = trackers.habit.view();
        assert_eq!(view.calendar[0].date, NaiveDate::from_ymd_opt(2024, 5, 27).expect("date"));
    }
}
