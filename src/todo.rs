//! To-do list with a fixed total order.

use crate::errors::{AppError, AppResult};
use crate::models::{NewTodo, Todo, TodoUpdate};
use crate::storage::{SlotStorage, SlotWrite};
use crate::store::{Presenter, SlotDocument, SlotReader, Store, ViewSink};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

pub const TODOS_SLOT: &str = "todos";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoItems {
    pub todos: Vec<Todo>,
}

impl SlotDocument for TodoItems {
    const APP: &'static str = "todo";

    fn decode(reader: &mut SlotReader<'_>) -> AppResult<Self> {
        let mut todos: Vec<Todo> = reader.read(TODOS_SLOT)?;
        for todo in todos.iter_mut() {
            todo.normalize();
            if todo.id.is_empty() {
                todo.id = Uuid::new_v4().to_string();
                reader.mark_repaired();
            }
        }
        Ok(Self { todos })
    }

    fn encode(&self) -> AppResult<Vec<SlotWrite>> {
        Ok(vec![SlotWrite::encode(TODOS_SLOT, &self.todos)?])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl TodoFilter {
    pub fn matches(self, todo: &Todo) -> bool {
        match self {
            Self::All => true,
            Self::Active => !todo.completed,
            Self::Completed => todo.completed,
        }
    }
}

impl FromStr for TodoFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim() {
            "all" => Ok(Self::All),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown filter {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DueStatus {
    Overdue,
    DueToday,
    Upcoming,
}

pub fn due_status(todo: &Todo, today: NaiveDate) -> Option<DueStatus> {
    if todo.completed {
        return None;
    }
    let due = todo.due_date?;
    Some(match due.cmp(&today) {
        Ordering::Less => DueStatus::Overdue,
        Ordering::Equal => DueStatus::DueToday,
        Ordering::Greater => DueStatus::Upcoming,
    })
}

/// Open before done, then earlier due date (dated before undated), then
/// higher priority, then newest first. Id settles anything left.
pub fn compare_todos(a: &Todo, b: &Todo) -> Ordering {
    a.completed
        .cmp(&b.completed)
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(left), Some(right)) => left.cmp(&right),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| b.priority.weight().cmp(&a.priority.weight()))
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn arrange(todos: &[Todo], filter: TodoFilter) -> Vec<Todo> {
    let mut listed: Vec<Todo> = todos.iter().filter(|todo| filter.matches(todo)).cloned().collect();
    listed.sort_by(compare_todos);
    listed
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoEntry {
    #[serde(flatten)]
    pub todo: Todo,
    pub due_status: Option<DueStatus>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoCounts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoView {
    pub filter: TodoFilter,
    pub items: Vec<TodoEntry>,
    pub counts: TodoCounts,
}

pub struct TodoList {
    store: Store<TodoItems>,
    filter: TodoFilter,
    today: NaiveDate,
    presenter: Presenter<TodoView>,
}

impl TodoList {
    pub fn open(storage: Arc<dyn SlotStorage>, today: NaiveDate) -> AppResult<Self> {
        let store: Store<TodoItems> = Store::load(storage)?;
        tracing::info!(app = "todo", count = store.document().todos.len(), "todos loaded");
        Ok(Self {
            store,
            filter: TodoFilter::All,
            today,
            presenter: Presenter::default(),
        })
    }

    pub fn subscribe(&mut self, sink: impl ViewSink<TodoView> + 'static) {
        self.presenter.subscribe(sink);
    }

    pub fn todos(&self) -> &[Todo] {
        &self.store.document().todos
    }

    pub fn add(&mut self, payload: NewTodo) -> AppResult<TodoView> {
        let text = payload.text.trim().to_string();
        if text.is_empty() {
            return Err(AppError::validation("todo text cannot be empty"));
        }
        let todo = Todo {
            id: Uuid::new_v4().to_string(),
            text,
            due_date: payload.due_date,
            priority: payload.priority,
            completed: false,
            created_at: Utc::now(),
        };
        let id = todo.id.clone();
        self.store.mutate(|items| {
            items.todos.push(todo);
            Ok(())
        })?;
        tracing::info!(app = "todo", id = %id, "todo added");
        Ok(self.refresh())
    }

    pub fn set_completed(&mut self, id: &str, completed: bool) -> AppResult<TodoView> {
        self.store.mutate(|items| {
            find_mut(&mut items.todos, id)?.completed = completed;
            Ok(())
        })?;
        tracing::info!(app = "todo", id = %id, completed, "todo toggled");
        Ok(self.refresh())
    }

    pub fn edit(&mut self, id: &str, update: TodoUpdate) -> AppResult<TodoView> {
        let text = match update.text {
            Some(raw) => {
                let trimmed = raw.trim().to_string();
                if trimmed.is_empty() {
                    return Err(AppError::validation("todo text cannot be empty"));
                }
                Some(trimmed)
            }
            None => None,
        };
        self.store.mutate(|items| {
            let todo = find_mut(&mut items.todos, id)?;
            if let Some(text) = text {
                todo.text = text;
            }
            if let Some(due_date) = update.due_date {
                todo.due_date = due_date;
            }
            if let Some(priority) = update.priority {
                todo.priority = priority;
            }
            Ok(())
        })?;
        tracing::info!(app = "todo", id = %id, "todo edited");
        Ok(self.refresh())
    }

    pub fn delete(&mut self, id: &str) -> AppResult<TodoView> {
        self.store.mutate(|items| {
            let before = items.todos.len();
            items.todos.retain(|todo| todo.id != id);
            if items.todos.len() == before {
                return Err(AppError::NotFound(format!("No todo with id {id}")));
            }
            Ok(())
        })?;
        tracing::info!(app = "todo", id = %id, "todo deleted");
        Ok(self.refresh())
    }

    pub fn set_filter(&mut self, filter: TodoFilter) -> TodoView {
        self.filter = filter;
        self.refresh()
    }

    pub fn view(&self) -> TodoView {
        let todos = self.todos();
        let completed = todos.iter().filter(|todo| todo.completed).count();
        TodoView {
            filter: self.filter,
            items: arrange(todos, self.filter)
                .into_iter()
                .map(|todo| TodoEntry {
                    due_status: due_status(&todo, self.today),
                    todo,
                })
                .collect(),
            counts: TodoCounts {
                total: todos.len(),
                active: todos.len() - completed,
                completed,
            },
        }
    }

    fn refresh(&mut self) -> TodoView {
        let view = self.view();
        self.presenter.present(&view);
        view
    }
}

fn find_mut<'a>(todos: &'a mut [Todo], id: &str) -> AppResult<&'a mut Todo> {
    todos
        .iter_mut()
        .find(|todo| todo.id == id)
        .ok_or_else(|| AppError::NotFound(format!("No todo with id {id}")))
}
