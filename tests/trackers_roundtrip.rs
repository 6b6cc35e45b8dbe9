use chrono::NaiveDate;
use daily_trackers_lib::db::Database;
use daily_trackers_lib::expense::EXPENSES_SLOT;
use daily_trackers_lib::models::{BookInput, BookStatus, NewTodo, NewTransaction, Priority, Transaction, TransactionKind};
use daily_trackers_lib::storage::{decode_slot, SlotStorage, SlotWrite};
use daily_trackers_lib::todo::{DueStatus, TODOS_SLOT};
use daily_trackers_lib::{Trackers, DB_FILE};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn lunch() -> NewTransaction {
    NewTransaction {
        description: "lunch".to_string(),
        amount: Decimal::from(12000),
        category: "food".to_string(),
        kind: TransactionKind::Expense,
        date: Some(date(2024, 6, 5)),
    }
}

fn seed_legacy_fixture(data_dir: &Path) {
    let raw = std::fs::read_to_string("tests/fixtures/legacy-local-storage.json").expect("read fixture");
    let slots: BTreeMap<String, String> = serde_json::from_str(&raw).expect("parse fixture");
    let writes: Vec<SlotWrite> = slots
        .into_iter()
        .map(|(key, value)| SlotWrite { key, value })
        .collect();
    let db = Database::new(&data_dir.join(DB_FILE)).expect("db");
    db.write_slots(&writes).expect("seed");
}

#[test]
fn lunch_scenario_monthly_and_category_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut trackers = Trackers::open(dir.path(), date(2024, 6, 20)).expect("open");
    let view = trackers.expense.add(lunch()).expect("add");

    let totals = view.summary.totals();
    assert_eq!(totals.income, Decimal::ZERO);
    assert_eq!(totals.expense, Decimal::from(12000));
    assert_eq!(totals.balance, Decimal::from(-12000));
    let food = view.categories.get("food").expect("food");
    assert_eq!(food.income, Decimal::ZERO);
    assert_eq!(food.expense, Decimal::from(12000));
}

#[test]
fn every_tracker_reloads_what_it_persisted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let today = date(2024, 6, 10);
    let mut trackers = Trackers::open(dir.path(), today).expect("open");

    trackers.expense.add(lunch()).expect("expense");
    trackers
        .todo
        .add(NewTodo {
            text: "pay rent".to_string(),
            due_date: Some(today),
            priority: Priority::High,
        })
        .expect("todo");
    let habit_view = trackers.habit.add_habit("Run").expect("habit");
    let habit_id = habit_view.habits[0].habit.id.clone();
    trackers.habit.set_record(&habit_id, today, true).expect("record");
    trackers
        .reading
        .add_book(BookInput {
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            status: BookStatus::Completed,
            rating: 5,
            ..BookInput::default()
        })
        .expect("book");
    trackers.reading.add_memo("Dune", "12", "spice").expect("memo");
    trackers.reading.set_annual_goal(10).expect("goal");

    let reopened = Trackers::open(dir.path(), today).expect("reopen");
    assert_eq!(reopened.expense.transactions(), trackers.expense.transactions());
    assert_eq!(reopened.todo.todos(), trackers.todo.todos());
    assert_eq!(reopened.habit.book(), trackers.habit.book());
    assert_eq!(reopened.reading.library(), trackers.reading.library());
}

#[test]
fn views_are_presented_only_after_the_write() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Arc::new(Database::new(&dir.path().join(DB_FILE)).expect("db"));
    let mut trackers = Trackers::with_database(db.clone(), date(2024, 6, 10)).expect("open");

    let observed = Arc::new(Mutex::new(Vec::new()));
    {
        let observed = observed.clone();
        let db = db.clone();
        trackers.expense.subscribe(move |view: &daily_trackers_lib::expense::ExpenseView| {
            let raw = db.read_slot(EXPENSES_SLOT).expect("read").expect("slot written");
            let persisted: Vec<Transaction> = decode_slot(&raw).expect("decode");
            observed
                .lock()
                .expect("lock")
                .push((persisted.len(), view.transactions.len()));
        });
    }

    trackers.expense.add(lunch()).expect("first");
    trackers.expense.add(lunch()).expect("second");
    assert!(trackers.expense.add(NewTransaction {
        amount: Decimal::ZERO,
        ..lunch()
    })
    .is_err());

    assert_eq!(*observed.lock().expect("lock"), vec![(1, 1), (2, 2)]);
}

#[test]
fn month_navigation_rolls_over_the_year() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut trackers = Trackers::open(dir.path(), date(2024, 1, 15)).expect("open");

    let view = trackers.expense.previous_month();
    assert_eq!(view.context.month.to_string(), "2023-12");
    let view = trackers.expense.next_month();
    assert_eq!(view.context.month.to_string(), "2024-01");

    let view = trackers.habit.previous_month();
    assert_eq!(view.context.month.to_string(), "2023-12");
}

#[test]
fn corrupt_blob_degrades_to_empty_and_is_kept_aside() {
    let dir = tempfile::tempdir().expect("tempdir");
    {
        let db = Database::new(&dir.path().join(DB_FILE)).expect("db");
        db.write_slots(&[SlotWrite {
            key: TODOS_SLOT.to_string(),
            value: "[{\"id\": broken".to_string(),
        }])
        .expect("seed");
    }

    let mut trackers = Trackers::open(dir.path(), date(2024, 6, 10)).expect("open despite corrupt slot");
    assert!(trackers.todo.todos().is_empty());
    let quarantined = trackers
        .database()
        .read_slot(&format!("{TODOS_SLOT}.corrupt"))
        .expect("read");
    assert_eq!(quarantined.as_deref(), Some("[{\"id\": broken"));

    trackers
        .todo
        .add(NewTodo {
            text: "start over".to_string(),
            due_date: None,
            priority: Priority::Medium,
        })
        .expect("add after recovery");
    let reopened = Trackers::open(dir.path(), date(2024, 6, 10)).expect("reopen");
    assert_eq!(reopened.todo.todos().len(), 1);
}

#[test]
fn legacy_browser_data_loads() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_legacy_fixture(dir.path());
    let trackers = Trackers::open(dir.path(), date(2024, 6, 10)).expect("open");

    let expense = trackers.expense.view();
    assert_eq!(expense.summary.totals().balance, Decimal::from(2_988_000));
    assert!(expense.transactions.iter().all(|tx| !tx.id.is_empty()));

    let todos = trackers.todo.view();
    assert_eq!(todos.items[0].todo.text, "pay rent");
    assert_eq!(todos.items[0].due_status, Some(DueStatus::Overdue));
    assert_eq!(todos.items[1].due_status, None);

    let habits = trackers.habit.view();
    assert_eq!(habits.habits.len(), 1);
    assert_eq!(habits.habits[0].streak.total, 3);
    assert_eq!(habits.habits[0].streak.current, 1);
    assert_eq!(habits.habits[0].streak.longest, 2);
    assert_eq!(trackers.habit.book().records.len(), 1);

    let reading = trackers.reading.view();
    assert_eq!(reading.books[0].title, "Emma");
    assert_eq!(reading.ranking.len(), 1);
    assert_eq!(reading.ranking[0].genre, "미지정");
    assert_eq!(reading.goal.goal, 4);
    assert_eq!(reading.goal.percent, 25.0);
    assert_eq!(reading.memos[0].memo.id, "m1706745600000");
}

#[test]
fn legacy_ids_assigned_on_load_are_stable_across_opens() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_legacy_fixture(dir.path());
    let first = Trackers::open(dir.path(), date(2024, 6, 10)).expect("open");
    let ids: Vec<String> = first.expense.transactions().iter().map(|tx| tx.id.clone()).collect();
    drop(first);

    let mut second = Trackers::open(dir.path(), date(2024, 6, 10)).expect("reopen");
    let reopened: Vec<String> = second.expense.transactions().iter().map(|tx| tx.id.clone()).collect();
    assert_eq!(reopened, ids);
    second.expense.delete(&ids[0]).expect("delete by an id from the earlier open");
    assert_eq!(second.expense.transactions().len(), 1);
}
