use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use daily_trackers_lib::calendar::YearMonth;
use daily_trackers_lib::db::Database;
use daily_trackers_lib::models::{
    BookInput, BookStatus, CompletionStatus, NewTodo, NewTransaction, Priority, TodoUpdate, TransactionKind,
};
use daily_trackers_lib::reading::{BookFilter, SortOrder};
use daily_trackers_lib::todo::TodoFilter;
use daily_trackers_lib::{init_tracing, resolve_data_dir, Trackers, DB_FILE};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "daily-trackers")]
#[command(about = "Expense, todo, habit and reading-list trackers backed by a local database")]
struct Cli {
    /// Defaults to $DAILY_TRACKERS_DIR, then ./.daily-trackers
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Overrides today's date, for backfilling
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[command(subcommand)]
    Expense(ExpenseCommand),
    #[command(subcommand)]
    Todo(TodoCommand),
    #[command(subcommand)]
    Habit(HabitCommand),
    #[command(subcommand)]
    Book(BookCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum ExpenseCommand {
    Add {
        #[arg(long)]
        description: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        category: String,
        #[arg(long, value_parser = parse_enum::<TransactionKind>, default_value = "expense")]
        kind: TransactionKind,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Delete {
        id: String,
    },
    Show {
        #[arg(long)]
        month: Option<YearMonth>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum TodoCommand {
    Add {
        text: String,
        #[arg(long)]
        due: Option<NaiveDate>,
        #[arg(long, value_parser = parse_enum::<Priority>, default_value = "medium")]
        priority: Priority,
    },
    Done {
        id: String,
        #[arg(long)]
        undo: bool,
    },
    Edit {
        id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        #[arg(long)]
        clear_due: bool,
        #[arg(long, value_parser = parse_enum::<Priority>)]
        priority: Option<Priority>,
    },
    Delete {
        id: String,
    },
    List {
        #[arg(long, default_value = "all")]
        filter: TodoFilter,
    },
}

#[derive(Subcommand)]
enum HabitCommand {
    Add {
        name: String,
    },
    Rename {
        id: String,
        name: String,
    },
    Delete {
        id: String,
    },
    /// Flips the record for a day (today by default)
    Check {
        id: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    Show {
        #[arg(long)]
        month: Option<YearMonth>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(clap::Args)]
struct BookArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    author: String,
    #[arg(long, default_value = "")]
    genre: String,
    #[arg(long, value_parser = parse_enum::<BookStatus>, default_value = "wish")]
    status: BookStatus,
    #[arg(long, value_parser = parse_enum::<CompletionStatus>)]
    completion: Option<CompletionStatus>,
    #[arg(long)]
    total_chapters: Option<u32>,
    #[arg(long)]
    read_chapters: Option<u32>,
    #[arg(long, default_value_t = 0)]
    rating: u8,
    #[arg(long, default_value = "")]
    review: String,
}

impl From<BookArgs> for BookInput {
    fn from(args: BookArgs) -> Self {
        Self {
            title: args.title,
            author: args.author,
            genre: args.genre,
            status: args.status,
            completion_status: args.completion,
            total_chapters: args.total_chapters,
            read_chapters: args.read_chapters,
            rating: args.rating,
            review: args.review,
        }
    }
}

#[derive(Subcommand)]
enum BookCommand {
    Add(BookArgs),
    Update {
        original_title: String,
        #[command(flatten)]
        book: BookArgs,
    },
    Remove {
        title: String,
    },
    Memo {
        title: String,
        content: String,
        #[arg(long, default_value = "")]
        page: String,
    },
    DeleteMemo {
        title: String,
        memo_id: String,
    },
    Goal {
        books: u32,
    },
    List {
        #[arg(long)]
        genre: Option<String>,
        #[arg(long, value_parser = parse_enum::<CompletionStatus>)]
        completion: Option<CompletionStatus>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "addedDate_desc")]
        sort: SortOrder,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    /// Merges a JSON object into the stored settings
    Set {
        json: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir);
    let db = Arc::new(
        Database::new(&data_dir.join(DB_FILE))
            .with_context(|| format!("Failed to open database in '{}'", data_dir.display()))?,
    );
    let settings = db.get_settings()?;
    if let Err(error) = init_tracing(&data_dir, &settings.log_filter) {
        eprintln!("logging disabled: {error}");
    }

    let today = cli.today.unwrap_or_else(|| chrono::Local::now().date_naive());
    let mut trackers = Trackers::with_database(db, today)?;

    match cli.command {
        Command::Expense(command) => run_expense(&mut trackers, command),
        Command::Todo(command) => run_todo(&mut trackers, command),
        Command::Habit(command) => run_habit(&mut trackers, command, today),
        Command::Book(command) => run_book(&mut trackers, command),
        Command::Settings(command) => match command {
            SettingsCommand::Show => print_json(trackers.settings()),
            SettingsCommand::Set { json } => {
                let update: serde_json::Value = serde_json::from_str(&json).context("settings must be JSON")?;
                print_json(&trackers.update_settings(update)?)
            }
        },
    }
}

fn run_expense(trackers: &mut Trackers, command: ExpenseCommand) -> Result<()> {
    let book = &mut trackers.expense;
    let view = match command {
        ExpenseCommand::Add {
            description,
            amount,
            category,
            kind,
            date,
        } => book.add(NewTransaction {
            description,
            amount,
            category,
            kind,
            date,
        })?,
        ExpenseCommand::Delete { id } => book.delete(&id)?,
        ExpenseCommand::Show { month, date } => {
            if let Some(month) = month {
                book.go_to_month(month);
            }
            match date {
                Some(date) => book.select_date(date),
                None => book.view(),
            }
        }
    };
    print_json(&view)
}

fn run_todo(trackers: &mut Trackers, command: TodoCommand) -> Result<()> {
    let list = &mut trackers.todo;
    let view = match command {
        TodoCommand::Add { text, due, priority } => list.add(NewTodo {
            text,
            due_date: due,
            priority,
        })?,
        TodoCommand::Done { id, undo } => list.set_completed(&id, !undo)?,
        TodoCommand::Edit {
            id,
            text,
            due,
            clear_due,
            priority,
        } => {
            let due_date = if clear_due { Some(None) } else { due.map(Some) };
            list.edit(
                &id,
                TodoUpdate {
                    text,
                    due_date,
                    priority,
                },
            )?
        }
        TodoCommand::Delete { id } => list.delete(&id)?,
        TodoCommand::List { filter } => list.set_filter(filter),
    };
    print_json(&view)
}

fn run_habit(trackers: &mut Trackers, command: HabitCommand, today: NaiveDate) -> Result<()> {
    let tracker = &mut trackers.habit;
    let view = match command {
        HabitCommand::Add { name } => tracker.add_habit(&name)?,
        HabitCommand::Rename { id, name } => tracker.rename_habit(&id, &name)?,
        HabitCommand::Delete { id } => tracker.delete_habit(&id)?,
        HabitCommand::Check { id, date } => tracker.toggle_record(&id, date.unwrap_or(today))?,
        HabitCommand::Show { month, date } => {
            if let Some(month) = month {
                tracker.go_to_month(month);
            }
            match date {
                Some(date) => tracker.select_date(date),
                None => tracker.view(),
            }
        }
    };
    print_json(&view)
}

fn run_book(trackers: &mut Trackers, command: BookCommand) -> Result<()> {
    let list = &mut trackers.reading;
    let view = match command {
        BookCommand::Add(args) => list.add_book(args.into())?,
        BookCommand::Update { original_title, book } => list.update_book(&original_title, book.into())?,
        BookCommand::Remove { title } => list.remove_book(&title)?,
        BookCommand::Memo { title, content, page } => list.add_memo(&title, &page, &content)?,
        BookCommand::DeleteMemo { title, memo_id } => list.delete_memo(&title, &memo_id)?,
        BookCommand::Goal { books } => list.set_annual_goal(books)?,
        BookCommand::List {
            genre,
            completion,
            search,
            sort,
        } => {
            list.set_sort(sort);
            list.set_filter(BookFilter {
                genre,
                completion,
                search,
            })
        }
    };
    print_json(&view)
}

fn parse_enum<T: DeserializeOwned>(raw: &str) -> std::result::Result<T, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase())).map_err(|error| error.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
