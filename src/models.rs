use chrono::{DateTime, NaiveDate, Utc, Weekday};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_GENRE: &str = "미지정";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(default, deserialize_with = "de_record_id")]
    pub id: String,
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub description: String,
    pub amount: Decimal,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Defaults to today when absent.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Higher value sorts first.
    pub fn weight(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(default, deserialize_with = "de_record_id")]
    pub id: String,
    pub text: String,
    #[serde(default, deserialize_with = "de_lenient_option")]
    pub due_date: Option<NaiveDate>,
    /// Stored values outside the known set read as medium.
    #[serde(default, deserialize_with = "de_or_default")]
    pub priority: Priority,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "unix_epoch")]
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// Legacy todos carried a millisecond timestamp as id and no creation time.
    pub(crate) fn normalize(&mut self) {
        if self.created_at == DateTime::<Utc>::UNIX_EPOCH {
            if let Some(created) = self
                .id
                .parse::<i64>()
                .ok()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
            {
                self.created_at = created;
            }
        }
        self.text = self.text.trim().to_string();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTodo {
    pub text: String,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Priority,
}

/// Partial edit; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoUpdate {
    pub text: Option<String>,
    /// `Some(None)` clears the due date.
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    #[serde(default, deserialize_with = "de_record_id")]
    pub id: String,
    pub name: String,
    #[serde(default = "unix_epoch_date")]
    pub created_date: NaiveDate,
}

/// habit id -> date -> practiced
pub type HabitRecords = BTreeMap<String, BTreeMap<NaiveDate, bool>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Wish,
    Reading,
    Completed,
}

impl Default for BookStatus {
    fn default() -> Self {
        Self::Wish
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionStatus {
    Completed,
    Serialized,
}

impl CompletionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Serialized => "serialized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memo {
    #[serde(default, deserialize_with = "de_record_id")]
    pub id: String,
    #[serde(default, deserialize_with = "de_record_id")]
    pub page: String,
    pub content: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default, deserialize_with = "de_lenient_option")]
    pub completion_status: Option<CompletionStatus>,
    #[serde(default, deserialize_with = "de_lenient_option")]
    pub total_chapters: Option<u32>,
    #[serde(default, deserialize_with = "de_lenient_option")]
    pub read_chapters: Option<u32>,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub review: String,
    #[serde(default = "unix_epoch_date")]
    pub added_date: NaiveDate,
    #[serde(default)]
    pub memos: Vec<Memo>,
}

impl Book {
    pub(crate) fn normalize(&mut self, default_genre: &str) {
        if self.genre.trim().is_empty() {
            self.genre = default_genre.to_string();
        }
        self.total_chapters = self.total_chapters.filter(|count| *count > 0);
        self.read_chapters = self.read_chapters.filter(|count| *count > 0);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookInput {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default)]
    pub status: BookStatus,
    pub completion_status: Option<CompletionStatus>,
    pub total_chapters: Option<u32>,
    pub read_chapters: Option<u32>,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub review: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl WeekStart {
    pub fn first_weekday(self) -> Weekday {
        match self {
            Self::Sunday => Weekday::Sun,
            Self::Monday => Weekday::Mon,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub default_genre: String,
    pub week_start: WeekStart,
    pub log_filter: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_genre: DEFAULT_GENRE.to_string(),
            week_start: WeekStart::Sunday,
            log_filter: "info".to_string(),
        }
    }
}

fn unix_epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

pub(crate) fn unix_epoch_date() -> NaiveDate {
    DateTime::<Utc>::UNIX_EPOCH.date_naive()
}

/// Ids were strings, numbers, or missing depending on which app wrote them.
fn de_record_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(raw)) => raw,
        Some(serde_json::Value::Number(raw)) => raw.to_string(),
        _ => String::new(),
    })
}

/// `null`, blank strings and unreadable values all mean "not set".
fn de_lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(raw)) if raw.trim().is_empty() => None,
        Some(other) => serde_json::from_value(other).ok(),
    })
}

fn de_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::{Book, NewTodo, Priority, Todo, TodoUpdate, Transaction, TransactionKind};
    use chrono::{Datelike, NaiveDate};

    #[test]
    fn legacy_expense_without_id_parses() {
        let raw = r#"{"description":"lunch","amount":12000,"category":"food","type":"expense","date":"2024-06-05"}"#;
        let parsed: Transaction = serde_json::from_str(raw).expect("parse");
        assert!(parsed.id.is_empty());
        assert_eq!(parsed.kind, TransactionKind::Expense);
        assert_eq!(parsed.amount, rust_decimal::Decimal::from(12000));
    }

    #[test]
    fn legacy_todo_numeric_id_and_blank_due_date() {
        let raw = r#"{"id":1717171717000,"text":" water plants ","dueDate":"","priority":"high","completed":false}"#;
        let mut parsed: Todo = serde_json::from_str(raw).expect("parse");
        parsed.normalize();
        assert_eq!(parsed.id, "1717171717000");
        assert!(parsed.due_date.is_none());
        assert_eq!(parsed.priority, Priority::High);
        assert_eq!(parsed.text, "water plants");
        assert_eq!(parsed.created_at.timestamp_millis(), 1_717_171_717_000);
    }

    #[test]
    fn unknown_priority_reads_as_medium() {
        let raw = r#"{"id":"a","text":"x","priority":""}"#;
        let parsed: Todo = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.priority, Priority::Medium);

        let raw = r#"{"id":"b","text":"y","priority":"urgent"}"#;
        let parsed: Todo = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.priority, Priority::Medium);
    }

    #[test]
    fn input_priority_must_be_known() {
        assert!(serde_json::from_str::<Priority>("\"urgent\"").is_err());
        assert_eq!(serde_json::from_str::<Priority>("\"low\"").expect("parse"), Priority::Low);

        let raw = r#"{"text":"x","dueDate":null,"priority":"urgent"}"#;
        assert!(serde_json::from_str::<NewTodo>(raw).is_err());
        let raw = r#"{"priority":"urgent"}"#;
        assert!(serde_json::from_str::<TodoUpdate>(raw).is_err());

        let raw = r#"{"text":"x","dueDate":null}"#;
        let parsed: NewTodo = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.priority, Priority::Medium);
    }

    #[test]
    fn legacy_book_nulls_and_blank_genre_normalize() {
        let raw = r#"{"title":"T","author":"A","genre":"","status":"reading","completionStatus":null,
            "totalChapters":null,"readChapters":0,"rating":0,"review":"","addedDate":"2024-02-01"}"#;
        let mut parsed: Book = serde_json::from_str(raw).expect("parse");
        parsed.normalize("미지정");
        assert_eq!(parsed.genre, "미지정");
        assert!(parsed.total_chapters.is_none());
        assert!(parsed.read_chapters.is_none());
        assert!(parsed.memos.is_empty());
        assert_eq!(parsed.added_date, NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"));
        assert_eq!(parsed.added_date.year(), 2024);
    }
}
