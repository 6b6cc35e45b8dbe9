//! Income/expense ledger and its monthly, per-day and per-category views.

use crate::calendar::{calendar_cells, CalendarCell, DateWindow, ViewingContext, YearMonth};
use crate::errors::{AppError, AppResult};
use crate::models::{AppSettings, NewTransaction, Transaction, TransactionKind};
use crate::storage::{SlotStorage, SlotWrite};
use crate::store::{Presenter, SlotDocument, SlotReader, Store, ViewSink};
use chrono::{NaiveDate, Weekday};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

pub const EXPENSES_SLOT: &str = "expenses";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    pub transactions: Vec<Transaction>,
}

impl SlotDocument for Ledger {
    const APP: &'static str = "expense";

    fn decode(reader: &mut SlotReader<'_>) -> AppResult<Self> {
        let mut transactions: Vec<Transaction> = reader.read(EXPENSES_SLOT)?;
        for transaction in transactions.iter_mut().filter(|tx| tx.id.is_empty()) {
            transaction.id = Uuid::new_v4().to_string();
            reader.mark_repaired();
        }
        Ok(Self { transactions })
    }

    fn encode(&self) -> AppResult<Vec<SlotWrite>> {
        Ok(vec![SlotWrite::encode(EXPENSES_SLOT, &self.transactions)?])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub income: Decimal,
    pub expense: Decimal,
    pub balance: Decimal,
}

impl Totals {
    fn record(&mut self, transaction: &Transaction) {
        match transaction.kind {
            TransactionKind::Income => self.income += transaction.amount,
            TransactionKind::Expense => self.expense += transaction.amount,
        }
        self.balance = self.income - self.expense;
    }
}

/// `Empty` means nothing fell in the window, as opposed to sums that are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum WindowSummary {
    Empty,
    Populated(Totals),
}

impl WindowSummary {
    pub fn totals(&self) -> Totals {
        match self {
            Self::Empty => Totals::default(),
            Self::Populated(totals) => *totals,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryTotals {
    pub category: String,
    pub income: Decimal,
    pub expense: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "state")]
pub enum CategorySummary {
    Empty,
    Populated { categories: Vec<CategoryTotals> },
}

impl CategorySummary {
    pub fn get(&self, category: &str) -> Option<&CategoryTotals> {
        match self {
            Self::Empty => None,
            Self::Populated { categories } => categories.iter().find(|entry| entry.category == category),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotals {
    pub income: Decimal,
    pub expense: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    pub category: String,
    pub amount: Decimal,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseView {
    pub context: ViewingContext,
    pub summary: WindowSummary,
    pub categories: CategorySummary,
    pub calendar: Vec<CalendarCell<DayTotals>>,
    pub transactions: Vec<Transaction>,
    pub expense_shares: Vec<CategoryShare>,
}

pub fn window_summary(transactions: &[Transaction], window: DateWindow) -> WindowSummary {
    let mut totals = Totals::default();
    let mut seen = false;
    for transaction in transactions.iter().filter(|tx| window.contains(tx.date)) {
        totals.record(transaction);
        seen = true;
    }
    if seen {
        WindowSummary::Populated(totals)
    } else {
        WindowSummary::Empty
    }
}

pub fn category_summary(transactions: &[Transaction], window: DateWindow) -> CategorySummary {
    let mut in_window = transactions.iter().filter(|tx| window.contains(tx.date)).peekable();
    if in_window.peek().is_none() {
        return CategorySummary::Empty;
    }

    let mut grouped: BTreeMap<&str, DayTotals> = BTreeMap::new();
    for transaction in in_window {
        let entry = grouped.entry(transaction.category.as_str()).or_default();
        match transaction.kind {
            TransactionKind::Income => entry.income += transaction.amount,
            TransactionKind::Expense => entry.expense += transaction.amount,
        }
    }

    let categories = grouped
        .into_iter()
        .filter(|(_, sums)| !sums.income.is_zero() || !sums.expense.is_zero())
        .map(|(category, sums)| CategoryTotals {
            category: category.to_string(),
            income: sums.income,
            expense: sums.expense,
        })
        .collect();
    CategorySummary::Populated { categories }
}

pub fn day_totals(transactions: &[Transaction], date: NaiveDate) -> DayTotals {
    transactions
        .iter()
        .filter(|tx| tx.date == date)
        .fold(DayTotals::default(), |mut acc, tx| {
            match tx.kind {
                TransactionKind::Income => acc.income += tx.amount,
                TransactionKind::Expense => acc.expense += tx.amount,
            }
            acc
        })
}

/// Newest first; same-day entries keep insertion order.
pub fn window_transactions(transactions: &[Transaction], window: DateWindow) -> Vec<Transaction> {
    let mut listed: Vec<Transaction> = transactions
        .iter()
        .filter(|tx| window.contains(tx.date))
        .cloned()
        .collect();
    listed.sort_by(|a, b| b.date.cmp(&a.date));
    listed
}

/// Expense-only amounts per category with their share of the window total.
pub fn expense_shares(transactions: &[Transaction], window: DateWindow) -> Vec<CategoryShare> {
    let mut grouped: BTreeMap<&str, Decimal> = BTreeMap::new();
    for transaction in transactions
        .iter()
        .filter(|tx| tx.kind == TransactionKind::Expense && window.contains(tx.date))
    {
        *grouped.entry(transaction.category.as_str()).or_default() += transaction.amount;
    }

    let total: Decimal = grouped.values().copied().sum();
    grouped
        .into_iter()
        .map(|(category, amount)| {
            let percent = if total.is_zero() {
                0.0
            } else {
                (amount / total * Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
                    .to_f64()
                    .unwrap_or(0.0)
            };
            CategoryShare {
                category: category.to_string(),
                amount,
                percent,
            }
        })
        .collect()
}

pub struct ExpenseBook {
    store: Store<Ledger>,
    context: ViewingContext,
    today: NaiveDate,
    week_start: Weekday,
    presenter: Presenter<ExpenseView>,
}

impl ExpenseBook {
    pub fn open(storage: Arc<dyn SlotStorage>, today: NaiveDate, settings: &AppSettings) -> AppResult<Self> {
        let store: Store<Ledger> = Store::load(storage)?;
        tracing::info!(
            app = "expense",
            count = store.document().transactions.len(),
            "ledger loaded"
        );
        Ok(Self {
            store,
            context: ViewingContext::new(today),
            today,
            week_start: settings.week_start.first_weekday(),
            presenter: Presenter::default(),
        })
    }

    pub fn subscribe(&mut self, sink: impl ViewSink<ExpenseView> + 'static) {
        self.presenter.subscribe(sink);
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.store.document().transactions
    }

    pub fn context(&self) -> &ViewingContext {
        &self.context
    }

    pub fn add(&mut self, payload: NewTransaction) -> AppResult<ExpenseView> {
        let description = payload.description.trim().to_string();
        let category = payload.category.trim().to_string();
        if description.is_empty() {
            return Err(AppError::validation("description cannot be empty"));
        }
        if category.is_empty() {
            return Err(AppError::validation("category cannot be empty"));
        }
        if payload.amount <= Decimal::ZERO {
            return Err(AppError::validation("amount must be greater than zero"));
        }

        let transaction = Transaction {
            id: Uuid::new_v4().to_string(),
            description,
            amount: payload.amount,
            category,
            kind: payload.kind,
            date: payload.date.unwrap_or(self.today),
        };
        let id = transaction.id.clone();
        self.store.mutate(|ledger| {
            ledger.transactions.push(transaction);
            Ok(())
        })?;
        tracing::info!(app = "expense", id = %id, "transaction added");
        Ok(self.refresh())
    }

    pub fn delete(&mut self, id: &str) -> AppResult<ExpenseView> {
        self.store.mutate(|ledger| {
            let before = ledger.transactions.len();
            ledger.transactions.retain(|tx| tx.id != id);
            if ledger.transactions.len() == before {
                return Err(AppError::NotFound(format!("No transaction with id {id}")));
            }
            Ok(())
        })?;
        tracing::info!(app = "expense", id = %id, "transaction deleted");
        Ok(self.refresh())
    }

    pub fn previous_month(&mut self) -> ExpenseView {
        self.context.previous_month();
        self.refresh()
    }

    pub fn next_month(&mut self) -> ExpenseView {
        self.context.next_month();
        self.refresh()
    }

    pub fn go_to_month(&mut self, month: YearMonth) -> ExpenseView {
        self.context.go_to(month);
        self.refresh()
    }

    pub fn select_date(&mut self, date: NaiveDate) -> ExpenseView {
        self.context.select_date(date);
        self.refresh()
    }

    pub fn clear_selection(&mut self) -> ExpenseView {
        self.context.clear_selection();
        self.refresh()
    }

    pub fn view(&self) -> ExpenseView {
        let transactions = self.transactions();
        let window = self.context.window();
        ExpenseView {
            context: self.context,
            summary: window_summary(transactions, window),
            categories: category_summary(transactions, window),
            calendar: calendar_cells(&self.context, self.week_start, |date| day_totals(transactions, date)),
            transactions: window_transactions(transactions, window),
            expense_shares: expense_shares(transactions, window),
        }
    }

    fn refresh(&mut self) -> ExpenseView {
        let view = self.view();
        self.presenter.present(&view);
        view
    }
}

#[cfg(test)]
mod tests {
    use super::{category_summary, expense_shares, window_summary, ExpenseBook, WindowSummary, EXPENSES_SLOT};
    use crate::calendar::{DateWindow, YearMonth};
    use crate::models::{AppSettings, NewTransaction, Transaction, TransactionKind};
    use crate::storage::{MemorySlots, SlotStorage};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn tx(category: &str, kind: TransactionKind, amount: i64, on: NaiveDate) -> Transaction {
        Transaction {
            id: format!("{category}-{amount}"),
            description: category.to_string(),
            amount: Decimal::from(amount),
            category: category.to_string(),
            kind,
            date: on,
        }
    }

    fn payload(description: &str, amount: i64, category: &str, kind: TransactionKind, on: NaiveDate) -> NewTransaction {
        NewTransaction {
            description: description.to_string(),
            amount: Decimal::from(amount),
            category: category.to_string(),
            kind,
            date: Some(on),
        }
    }

    fn open_book(storage: Arc<dyn SlotStorage>) -> ExpenseBook {
        ExpenseBook::open(storage, date(2024, 6, 20), &AppSettings::default()).expect("open")
    }

    #[test]
    fn lunch_scenario_summarizes_june() {
        let mut book = open_book(Arc::new(MemorySlots::new()));
        let view = book
            .add(payload("lunch", 12000, "food", TransactionKind::Expense, date(2024, 6, 5)))
            .expect("add");

        let totals = view.summary.totals();
        assert_eq!(totals.income, Decimal::ZERO);
        assert_eq!(totals.expense, Decimal::from(12000));
        assert_eq!(totals.balance, Decimal::from(-12000));

        let food = view.categories.get("food").expect("food category");
        assert_eq!(food.income, Decimal::ZERO);
        assert_eq!(food.expense, Decimal::from(12000));
    }

    #[test]
    fn empty_window_is_distinct_from_zero() {
        let june = DateWindow::Month(YearMonth::new(2024, 6).expect("month"));
        let summary = window_summary(&[], june);
        assert!(summary.is_empty());
        assert_eq!(summary.totals().balance, Decimal::ZERO);
        assert!(matches!(category_summary(&[], june), super::CategorySummary::Empty));
    }

    #[test]
    fn balance_is_income_minus_expense() {
        let rows = vec![
            tx("salary", TransactionKind::Income, 3_000_000, date(2024, 6, 1)),
            tx("food", TransactionKind::Expense, 12_000, date(2024, 6, 5)),
            tx("rent", TransactionKind::Expense, 800_000, date(2024, 6, 25)),
            tx("food", TransactionKind::Expense, 9_000, date(2024, 7, 1)),
        ];
        let june = DateWindow::Month(YearMonth::new(2024, 6).expect("month"));
        let WindowSummary::Populated(totals) = window_summary(&rows, june) else {
            panic!("june has rows");
        };
        assert_eq!(totals.income, Decimal::from(3_000_000));
        assert_eq!(totals.expense, Decimal::from(812_000));
        assert_eq!(totals.balance, totals.income - totals.expense);
    }

    #[test]
    fn zero_sum_categories_are_omitted() {
        let mut zero = tx("gift", TransactionKind::Income, 0, date(2024, 6, 3));
        zero.amount = Decimal::ZERO;
        let rows = vec![zero, tx("food", TransactionKind::Expense, 5_000, date(2024, 6, 3))];
        let summary = category_summary(&rows, DateWindow::Day(date(2024, 6, 3)));
        assert!(summary.get("gift").is_none());
        assert!(summary.get("food").is_some());
    }

    #[test]
    fn selected_date_narrows_the_window() {
        let mut book = open_book(Arc::new(MemorySlots::new()));
        book.add(payload("bus", 1_500, "transport", TransactionKind::Expense, date(2024, 6, 4)))
            .expect("add");
        book.add(payload("lunch", 12_000, "food", TransactionKind::Expense, date(2024, 6, 5)))
            .expect("add");

        let view = book.select_date(date(2024, 6, 5));
        assert_eq!(view.summary.totals().expense, Decimal::from(12_000));
        assert_eq!(view.transactions.len(), 1);
        assert!(view.calendar.iter().any(|cell| cell.selected && cell.date == date(2024, 6, 5)));

        let view = book.previous_month();
        assert_eq!(view.context.selected_date, None);
        assert_eq!(view.context.month, YearMonth::new(2024, 5).expect("month"));
        assert!(view.summary.is_empty());
    }

    #[test]
    fn calendar_cells_carry_daily_totals() {
        let mut book = open_book(Arc::new(MemorySlots::new()));
        book.add(payload("pay", 50_000, "salary", TransactionKind::Income, date(2024, 6, 5)))
            .expect("add");
        let view = book
            .add(payload("lunch", 12_000, "food", TransactionKind::Expense, date(2024, 6, 5)))
            .expect("add");

        let cell = view
            .calendar
            .iter()
            .find(|cell| cell.date == date(2024, 6, 5))
            .expect("cell");
        let detail = cell.detail.expect("in month");
        assert_eq!(detail.income, Decimal::from(50_000));
        assert_eq!(detail.expense, Decimal::from(12_000));
        assert!(view.calendar.iter().filter(|cell| !cell.in_month).all(|cell| cell.detail.is_none()));
    }

    #[test]
    fn invalid_input_is_rejected_without_writing() {
        let storage = Arc::new(MemorySlots::new());
        let mut book = open_book(storage.clone());
        let error = book
            .add(payload("free", 0, "misc", TransactionKind::Expense, date(2024, 6, 1)))
            .expect_err("zero amount");
        assert!(error.is_rejection());
        assert!(book
            .add(payload("  ", 10, "misc", TransactionKind::Expense, date(2024, 6, 1)))
            .is_err());
        assert!(storage.read_slot(EXPENSES_SLOT).expect("read").is_none());
    }

    #[test]
    fn delete_by_id_and_unknown_id() {
        let storage: Arc<dyn SlotStorage> = Arc::new(MemorySlots::new());
        let mut book = open_book(storage.clone());
        let view = book
            .add(payload("lunch", 12_000, "food", TransactionKind::Expense, date(2024, 6, 5)))
            .expect("add");
        let id = view.transactions[0].id.clone();

        assert!(book.delete("missing").is_err());
        assert_eq!(book.transactions().len(), 1);

        let view = book.delete(&id).expect("delete");
        assert!(view.summary.is_empty());
        assert!(open_book(storage).transactions().is_empty());
    }

    #[test]
    fn shares_are_rounded_to_one_decimal() {
        let rows = vec![
            tx("food", TransactionKind::Expense, 1, date(2024, 6, 1)),
            tx("rent", TransactionKind::Expense, 2, date(2024, 6, 2)),
            tx("salary", TransactionKind::Income, 100, date(2024, 6, 2)),
        ];
        let shares = expense_shares(&rows, DateWindow::Month(YearMonth::new(2024, 6).expect("month")));
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].category, "food");
        assert_eq!(shares[0].percent, 33.3);
        assert_eq!(shares[1].percent, 66.7);
    }

    #[test]
    fn legacy_row_ids_survive_reopen_and_can_be_deleted() {
        let storage: Arc<dyn SlotStorage> = Arc::new(MemorySlots::with_raw(
            EXPENSES_SLOT,
            r#"[{"description":"lunch","amount":12000,"category":"food","type":"expense","date":"2024-06-05"}]"#,
        ));
        let first = open_book(storage.clone());
        let id = first.transactions()[0].id.clone();
        assert!(!id.is_empty());

        let mut second = open_book(storage.clone());
        assert_eq!(second.transactions()[0].id, id);
        second.delete(&id).expect("delete by the id seen on the first load");
        assert!(open_book(storage).transactions().is_empty());
    }
}
