//! Habits, their per-day practice records, streaks and the month calendar.

use crate::calendar::{calendar_cells, CalendarCell, ViewingContext, YearMonth};
use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, Habit, HabitRecords};
use crate::storage::{SlotStorage, SlotWrite};
use crate::store::{Presenter, SlotDocument, SlotReader, Store, ViewSink};
use chrono::{NaiveDate, Weekday};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

pub const HABITS_SLOT: &str = "habits";
pub const HABIT_RECORDS_SLOT: &str = "habitRecords";

/// Habits and records always travel together so a cascade is one write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HabitBook {
    pub habits: Vec<Habit>,
    pub records: HabitRecords,
}

impl SlotDocument for HabitBook {
    const APP: &'static str = "habit";

    fn decode(reader: &mut SlotReader<'_>) -> AppResult<Self> {
        let mut habits: Vec<Habit> = reader.read(HABITS_SLOT)?;
        let mut records: HabitRecords = reader.read(HABIT_RECORDS_SLOT)?;
        for habit in habits.iter_mut().filter(|habit| habit.id.is_empty()) {
            habit.id = Uuid::new_v4().to_string();
            reader.mark_repaired();
        }

        // Without a readable habit list there is no telling which records are
        // orphans, so they are kept as they are and copied aside.
        if reader.was_quarantined(HABITS_SLOT) {
            reader.keep_copy(HABIT_RECORDS_SLOT)?;
            return Ok(Self { habits, records });
        }

        let known: BTreeSet<&str> = habits.iter().map(|habit| habit.id.as_str()).collect();
        let before = records.len();
        records.retain(|habit_id, _| known.contains(habit_id.as_str()));
        if records.len() != before {
            tracing::warn!(app = Self::APP, dropped = before - records.len(), "dropping orphaned habit records");
            reader.keep_copy(HABIT_RECORDS_SLOT)?;
            reader.mark_repaired();
        }
        Ok(Self { habits, records })
    }

    fn encode(&self) -> AppResult<Vec<SlotWrite>> {
        Ok(vec![
            SlotWrite::encode(HABITS_SLOT, &self.habits)?,
            SlotWrite::encode(HABIT_RECORDS_SLOT, &self.records)?,
        ])
    }
}

impl HabitBook {
    pub fn practiced(&self, habit_id: &str, date: NaiveDate) -> bool {
        self.records
            .get(habit_id)
            .and_then(|days| days.get(&date))
            .copied()
            .unwrap_or(false)
    }

    pub fn practiced_dates(&self, habit_id: &str) -> BTreeSet<NaiveDate> {
        self.records
            .get(habit_id)
            .map(|days| {
                days.iter()
                    .filter(|(_, practiced)| **practiced)
                    .map(|(date, _)| *date)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn habit_mut(&mut self, id: &str) -> AppResult<&mut Habit> {
        self.habits
            .iter_mut()
            .find(|habit| habit.id == id)
            .ok_or_else(|| AppError::NotFound(format!("No habit with id {id}")))
    }

    fn ensure_unique_name(&self, name: &str, except_id: Option<&str>) -> AppResult<()> {
        let taken = self
            .habits
            .iter()
            .any(|habit| habit.name == name && Some(habit.id.as_str()) != except_id);
        if taken {
            return Err(AppError::Duplicate(format!("habit {name:?} already exists")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakStats {
    pub total: usize,
    pub current: usize,
    pub longest: usize,
    pub last_practiced: Option<NaiveDate>,
}

/// Walks practiced dates in ascending order. A one-day step extends the run,
/// a repeated date is ignored and any larger gap starts a new run.
pub fn streaks(dates: impl IntoIterator<Item = NaiveDate>) -> StreakStats {
    let ordered: BTreeSet<NaiveDate> = dates.into_iter().collect();
    let mut stats = StreakStats {
        total: ordered.len(),
        ..StreakStats::default()
    };

    let mut previous: Option<NaiveDate> = None;
    for date in ordered {
        stats.current = match previous {
            Some(prev) if prev.succ_opt() == Some(date) => stats.current + 1,
            _ => 1,
        };
        stats.longest = stats.longest.max(stats.current);
        previous = Some(date);
    }
    stats.last_practiced = previous;
    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DayCompletion {
    Full,
    Partial,
    Empty,
}

pub fn day_completion(book: &HabitBook, date: NaiveDate) -> DayCompletion {
    let done = book
        .habits
        .iter()
        .filter(|habit| book.practiced(&habit.id, date))
        .count();
    match done {
        0 => DayCompletion::Empty,
        n if n == book.habits.len() => DayCompletion::Full,
        _ => DayCompletion::Partial,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    pub habit: Habit,
    pub streak: StreakStats,
    /// Practiced days inside the viewed month.
    pub month_count: usize,
}

pub fn habit_stats(book: &HabitBook, month: YearMonth) -> Vec<HabitStats> {
    book.habits
        .iter()
        .map(|habit| {
            let dates = book.practiced_dates(&habit.id);
            let month_count = dates.iter().filter(|date| month.contains(**date)).count();
            HabitStats {
                habit: habit.clone(),
                streak: streaks(dates),
                month_count,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitDayStatus {
    pub habit_id: String,
    pub name: String,
    pub practiced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitView {
    pub context: ViewingContext,
    pub habits: Vec<HabitStats>,
    pub calendar: Vec<CalendarCell<DayCompletion>>,
    pub selected_day: Option<Vec<HabitDayStatus>>,
}

pub struct HabitTracker {
    store: Store<HabitBook>,
    context: ViewingContext,
    today: NaiveDate,
    week_start: Weekday,
    presenter: Presenter<HabitView>,
}

impl HabitTracker {
    pub fn open(storage: Arc<dyn SlotStorage>, today: NaiveDate, settings: &AppSettings) -> AppResult<Self> {
        let store: Store<HabitBook> = Store::load(storage)?;
        tracing::info!(app = "habit", count = store.document().habits.len(), "habits loaded");
        Ok(Self {
            store,
            context: ViewingContext::new(today),
            today,
            week_start: settings.week_start.first_weekday(),
            presenter: Presenter::default(),
        })
    }

    pub fn subscribe(&mut self, sink: impl ViewSink<HabitView> + 'static) {
        self.presenter.subscribe(sink);
    }

    pub fn book(&self) -> &HabitBook {
        self.store.document()
    }

    pub fn add_habit(&mut self, name: &str) -> AppResult<HabitView> {
        let name = required_name(name)?;
        let habit = Habit {
            id: Uuid::new_v4().to_string(),
            name,
            created_date: self.today,
        };
        let id = habit.id.clone();
        self.store.mutate(|book| {
            book.ensure_unique_name(&habit.name, None)?;
            book.habits.push(habit);
            Ok(())
        })?;
        tracing::info!(app = "habit", id = %id, "habit added");
        Ok(self.refresh())
    }

    pub fn rename_habit(&mut self, id: &str, name: &str) -> AppResult<HabitView> {
        let name = required_name(name)?;
        self.store.mutate(|book| {
            book.ensure_unique_name(&name, Some(id))?;
            book.habit_mut(id)?.name = name;
            Ok(())
        })?;
        tracing::info!(app = "habit", id = %id, "habit renamed");
        Ok(self.refresh())
    }

    /// Removes the habit and every record that points at it.
    pub fn delete_habit(&mut self, id: &str) -> AppResult<HabitView> {
        let removed = self.store.mutate(|book| {
            let before = book.habits.len();
            book.habits.retain(|habit| habit.id != id);
            if book.habits.len() == before {
                return Err(AppError::NotFound(format!("No habit with id {id}")));
            }
            Ok(book.records.remove(id).map(|days| days.len()).unwrap_or(0))
        })?;
        tracing::info!(app = "habit", id = %id, records = removed, "habit deleted");
        Ok(self.refresh())
    }

    pub fn set_record(&mut self, id: &str, date: NaiveDate, practiced: bool) -> AppResult<HabitView> {
        self.store.mutate(|book| {
            book.habit_mut(id)?;
            if practiced {
                book.records.entry(id.to_string()).or_default().insert(date, true);
            } else if let Some(days) = book.records.get_mut(id) {
                days.remove(&date);
                if days.is_empty() {
                    book.records.remove(id);
                }
            }
            Ok(())
        })?;
        tracing::debug!(app = "habit", id = %id, %date, practiced, "habit record set");
        Ok(self.refresh())
    }

    pub fn toggle_record(&mut self, id: &str, date: NaiveDate) -> AppResult<HabitView> {
        let practiced = self.book().practiced(id, date);
        self.set_record(id, date, !practiced)
    }

    pub fn previous_month(&mut self) -> HabitView {
        self.context.previous_month();
        self.refresh()
    }

    pub fn next_month(&mut self) -> HabitView {
        self.context.next_month();
        self.refresh()
    }

    pub fn go_to_month(&mut self, month: YearMonth) -> HabitView {
        self.context.go_to(month);
        self.refresh()
    }

    pub fn select_date(&mut self, date: NaiveDate) -> HabitView {
        self.context.select_date(date);
        self.refresh()
    }

    pub fn clear_selection(&mut self) -> HabitView {
        self.context.clear_selection();
        self.refresh()
    }

    pub fn view(&self) -> HabitView {
        let book = self.book();
        let selected_day = self.context.selected_date.map(|date| {
            book.habits
                .iter()
                .map(|habit| HabitDayStatus {
                    habit_id: habit.id.clone(),
                    name: habit.name.clone(),
                    practiced: book.practiced(&habit.id, date),
                })
                .collect()
        });
        HabitView {
            context: self.context,
            habits: habit_stats(book, self.context.month),
            calendar: calendar_cells(&self.context, self.week_start, |date| day_completion(book, date)),
            selected_day,
        }
    }

    fn refresh(&mut self) -> HabitView {
        let view = self.view();
        self.presenter.present(&view);
        view
    }
}

fn required_name(raw: &str) -> AppResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::validation("habit name cannot be empty"));
    }
    Ok(name.to_string())
}
