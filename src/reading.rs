//! Reading list keyed by title, with memos, genre ranking and a yearly goal.

use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, Book, BookInput, BookStatus, CompletionStatus, Memo};
use crate::storage::{SlotStorage, SlotWrite};
use crate::store::{Presenter, SlotDocument, SlotReader, Store, ViewSink};
use chrono::{Datelike, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const READING_SLOT: &str = "myReadingList";
pub const GOAL_SLOT: &str = "annualReadingGoal";
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Library {
    pub books: Vec<Book>,
    pub annual_goal: u32,
}

impl SlotDocument for Library {
    const APP: &'static str = "reading";

    fn decode(reader: &mut SlotReader<'_>) -> AppResult<Self> {
        let mut books: Vec<Book> = reader.read(READING_SLOT)?;
        for memo in books.iter_mut().flat_map(|book| book.memos.iter_mut()) {
            if memo.id.is_empty() {
                memo.id = Uuid::new_v4().to_string();
                reader.mark_repaired();
            }
        }
        Ok(Self {
            books,
            annual_goal: reader.read(GOAL_SLOT)?,
        })
    }

    fn encode(&self) -> AppResult<Vec<SlotWrite>> {
        Ok(vec![
            SlotWrite::encode(READING_SLOT, &self.books)?,
            SlotWrite::encode(GOAL_SLOT, &self.annual_goal)?,
        ])
    }
}

impl Library {
    fn position(&self, title: &str) -> AppResult<usize> {
        self.books
            .iter()
            .position(|book| book.title == title)
            .ok_or_else(|| AppError::NotFound(format!("No book titled {title:?}")))
    }

    fn contains(&self, title: &str) -> bool {
        self.books.iter().any(|book| book.title == title)
    }
}

/// Inactive when every field is empty. Active fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookFilter {
    pub genre: Option<String>,
    pub completion: Option<CompletionStatus>,
    pub search: Option<String>,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        let genre_ok = match self.genre.as_deref().map(str::trim) {
            Some(genre) if !genre.is_empty() => book.genre == genre,
            _ => true,
        };
        let completion_ok = match self.completion {
            Some(completion) => book.completion_status == Some(completion),
            None => true,
        };
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                book.title.to_lowercase().contains(&term) || book.author.to_lowercase().contains(&term)
            }
            _ => true,
        };
        genre_ok && completion_ok && search_ok
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "addedDate_desc")]
    AddedDateDesc,
    #[serde(rename = "addedDate_asc")]
    AddedDateAsc,
    #[serde(rename = "title_asc")]
    TitleAsc,
    #[serde(rename = "title_desc")]
    TitleDesc,
    #[serde(rename = "author_asc")]
    AuthorAsc,
    #[serde(rename = "author_desc")]
    AuthorDesc,
    #[serde(rename = "rating_desc")]
    RatingDesc,
    #[serde(rename = "rating_asc")]
    RatingAsc,
}

impl SortOrder {
    pub const ALL: [SortOrder; 8] = [
        Self::AddedDateDesc,
        Self::AddedDateAsc,
        Self::TitleAsc,
        Self::TitleDesc,
        Self::AuthorAsc,
        Self::AuthorDesc,
        Self::RatingDesc,
        Self::RatingAsc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AddedDateDesc => "addedDate_desc",
            Self::AddedDateAsc => "addedDate_asc",
            Self::TitleAsc => "title_asc",
            Self::TitleDesc => "title_desc",
            Self::AuthorAsc => "author_asc",
            Self::AuthorDesc => "author_desc",
            Self::RatingDesc => "rating_desc",
            Self::RatingAsc => "rating_asc",
        }
    }

    pub fn compare(self, a: &Book, b: &Book) -> Ordering {
        match self {
            Self::AddedDateDesc => b.added_date.cmp(&a.added_date),
            Self::AddedDateAsc => a.added_date.cmp(&b.added_date),
            Self::TitleAsc => a.title.cmp(&b.title),
            Self::TitleDesc => b.title.cmp(&a.title),
            Self::AuthorAsc => a.author.cmp(&b.author),
            Self::AuthorDesc => b.author.cmp(&a.author),
            Self::RatingDesc => b.rating.cmp(&a.rating),
            Self::RatingAsc => a.rating.cmp(&b.rating),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|order| order.as_str() == raw.trim())
            .ok_or_else(|| format!("unknown sort order {raw:?}"))
    }
}

/// Filtered then sorted; ties keep list order.
pub fn arrange(books: &[Book], filter: &BookFilter, sort: SortOrder) -> Vec<Book> {
    let mut listed: Vec<Book> = books.iter().filter(|book| filter.matches(book)).cloned().collect();
    listed.sort_by(|a, b| sort.compare(a, b));
    listed
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreRank {
    pub rank: usize,
    pub genre: String,
    pub average_rating: f64,
    pub rated_books: usize,
}

/// Unrated books (rating 0) are ignored, so a genre without any rated book
/// never shows up.
pub fn genre_ranking(books: &[Book]) -> Vec<GenreRank> {
    let mut grouped: BTreeMap<&str, (u32, usize)> = BTreeMap::new();
    for book in books.iter().filter(|book| book.rating > 0) {
        let entry = grouped.entry(book.genre.as_str()).or_default();
        entry.0 += u32::from(book.rating);
        entry.1 += 1;
    }

    let mut averaged: Vec<(String, Decimal, usize)> = grouped
        .into_iter()
        .map(|(genre, (sum, count))| {
            let count_dec = Decimal::from(u64::try_from(count).unwrap_or(u64::MAX));
            let average = (Decimal::from(sum) / count_dec)
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
            (genre.to_string(), average, count)
        })
        .collect();
    averaged.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    averaged
        .into_iter()
        .enumerate()
        .map(|(index, (genre, average, rated_books))| GenreRank {
            rank: index + 1,
            genre,
            average_rating: average.to_f64().unwrap_or(0.0),
            rated_books,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub goal: u32,
    pub completed_this_year: usize,
    /// Always within 0..=100, one decimal place.
    pub percent: f64,
}

/// Counts completed books whose added date falls in `today`'s year.
pub fn goal_progress(books: &[Book], goal: u32, today: NaiveDate) -> GoalProgress {
    let completed_this_year = books
        .iter()
        .filter(|book| book.status == BookStatus::Completed && book.added_date.year() == today.year())
        .count();
    let percent = if goal == 0 {
        0.0
    } else {
        let raw = completed_this_year as f64 / f64::from(goal) * 100.0;
        (raw.clamp(0.0, 100.0) * 10.0).round() / 10.0
    };
    GoalProgress {
        goal,
        completed_this_year,
        percent,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoEntry {
    pub book_title: String,
    #[serde(flatten)]
    pub memo: Memo,
}

/// Every memo across the list, newest first.
pub fn all_memos(books: &[Book]) -> Vec<MemoEntry> {
    let mut memos: Vec<MemoEntry> = books
        .iter()
        .flat_map(|book| {
            book.memos.iter().map(|memo| MemoEntry {
                book_title: book.title.clone(),
                memo: memo.clone(),
            })
        })
        .collect();
    memos.sort_by(|a, b| b.memo.date.cmp(&a.memo.date));
    memos
}

pub fn genres(books: &[Book]) -> Vec<String> {
    books
        .iter()
        .map(|book| book.genre.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingView {
    pub filter: BookFilter,
    pub sort: SortOrder,
    pub books: Vec<Book>,
    pub ranking: Vec<GenreRank>,
    pub goal: GoalProgress,
    pub memos: Vec<MemoEntry>,
    pub genres: Vec<String>,
}

pub struct ReadingList {
    store: Store<Library>,
    filter: BookFilter,
    sort: SortOrder,
    today: NaiveDate,
    default_genre: String,
    presenter: Presenter<ReadingView>,
}

impl ReadingList {
    pub fn open(storage: Arc<dyn SlotStorage>, today: NaiveDate, settings: &AppSettings) -> AppResult<Self> {
        let default_genre = settings.default_genre.clone();
        let store = Store::load_with(storage, |library: &mut Library| {
            for book in library.books.iter_mut() {
                book.normalize(&default_genre);
            }
        })?;
        tracing::info!(app = "reading", count = store.document().books.len(), "reading list loaded");
        Ok(Self {
            store,
            filter: BookFilter::default(),
            sort: SortOrder::default(),
            today,
            default_genre,
            presenter: Presenter::default(),
        })
    }

    pub fn subscribe(&mut self, sink: impl ViewSink<ReadingView> + 'static) {
        self.presenter.subscribe(sink);
    }

    pub fn library(&self) -> &Library {
        self.store.document()
    }

    pub fn add_book(&mut self, input: BookInput) -> AppResult<ReadingView> {
        let book = self.validated(input)?;
        let title = book.title.clone();
        self.store.mutate(|library| {
            if library.contains(&book.title) {
                return Err(AppError::Duplicate(format!("book {:?} already exists", book.title)));
            }
            library.books.push(book);
            Ok(())
        })?;
        tracing::info!(app = "reading", title = %title, "book added");
        Ok(self.refresh())
    }

    /// Replaces a book's fields. Memos and the added date carry over, also
    /// across a rename.
    pub fn update_book(&mut self, original_title: &str, input: BookInput) -> AppResult<ReadingView> {
        let updated = self.validated(input)?;
        let title = updated.title.clone();
        self.store.mutate(|library| {
            let index = library.position(original_title)?;
            if updated.title != original_title && library.contains(&updated.title) {
                return Err(AppError::Duplicate(format!("book {:?} already exists", updated.title)));
            }
            let current = &mut library.books[index];
            let memos = std::mem::take(&mut current.memos);
            let added_date = current.added_date;
            *current = Book {
                memos,
                added_date,
                ..updated
            };
            Ok(())
        })?;
        tracing::info!(app = "reading", from = %original_title, title = %title, "book updated");
        Ok(self.refresh())
    }

    pub fn remove_book(&mut self, title: &str) -> AppResult<ReadingView> {
        self.store.mutate(|library| {
            let index = library.position(title)?;
            library.books.remove(index);
            Ok(())
        })?;
        tracing::info!(app = "reading", title = %title, "book removed");
        Ok(self.refresh())
    }

    pub fn add_memo(&mut self, title: &str, page: &str, content: &str) -> AppResult<ReadingView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::validation("memo content cannot be empty"));
        }
        let memo = Memo {
            id: Uuid::new_v4().to_string(),
            page: page.trim().to_string(),
            content: content.to_string(),
            date: self.today,
        };
        let memo_id = memo.id.clone();
        self.store.mutate(|library| {
            let index = library.position(title)?;
            library.books[index].memos.push(memo);
            Ok(())
        })?;
        tracing::info!(app = "reading", title = %title, memo = %memo_id, "memo added");
        Ok(self.refresh())
    }

    pub fn delete_memo(&mut self, title: &str, memo_id: &str) -> AppResult<ReadingView> {
        self.store.mutate(|library| {
            let index = library.position(title)?;
            let memos = &mut library.books[index].memos;
            let before = memos.len();
            memos.retain(|memo| memo.id != memo_id);
            if memos.len() == before {
                return Err(AppError::NotFound(format!("No memo with id {memo_id}")));
            }
            Ok(())
        })?;
        tracing::info!(app = "reading", title = %title, memo = %memo_id, "memo deleted");
        Ok(self.refresh())
    }

    pub fn set_annual_goal(&mut self, goal: u32) -> AppResult<ReadingView> {
        self.store.mutate(|library| {
            library.annual_goal = goal;
            Ok(())
        })?;
        tracing::info!(app = "reading", goal, "annual goal set");
        Ok(self.refresh())
    }

    pub fn set_filter(&mut self, filter: BookFilter) -> ReadingView {
        self.filter = filter;
        self.refresh()
    }

    pub fn set_sort(&mut self, sort: SortOrder) -> ReadingView {
        self.sort = sort;
        self.refresh()
    }

    pub fn view(&self) -> ReadingView {
        let library = self.library();
        ReadingView {
            filter: self.filter.clone(),
            sort: self.sort,
            books: arrange(&library.books, &self.filter, self.sort),
            ranking: genre_ranking(&library.books),
            goal: goal_progress(&library.books, library.annual_goal, self.today),
            memos: all_memos(&library.books),
            genres: genres(&library.books),
        }
    }

    fn refresh(&mut self) -> ReadingView {
        let view = self.view();
        self.presenter.present(&view);
        view
    }

    fn validated(&self, input: BookInput) -> AppResult<Book> {
        let title = input.title.trim().to_string();
        let author = input.author.trim().to_string();
        if title.is_empty() || author.is_empty() {
            return Err(AppError::validation("title and author are required"));
        }
        if input.rating > MAX_RATING {
            return Err(AppError::validation(format!("rating must be between 0 and {MAX_RATING}")));
        }
        if let (Some(read), Some(total)) = (input.read_chapters, input.total_chapters) {
            if read > total {
                return Err(AppError::validation("read chapters cannot exceed total chapters"));
            }
        }

        let mut book = Book {
            title,
            author,
            genre: input.genre.trim().to_string(),
            status: input.status,
            completion_status: input.completion_status,
            total_chapters: input.total_chapters,
            read_chapters: input.read_chapters,
            rating: input.rating,
            review: input.review.trim().to_string(),
            added_date: self.today,
            memos: Vec::new(),
        };
        book.normalize(&self.default_genre);
        Ok(book)
    }
}
