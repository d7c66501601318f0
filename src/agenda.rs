use crate::calendar::{compute_day, compute_week, index_of_today, Week};
use crate::focus::{clamp, transition, ColumnCounts, FocusState, Intent, Layout};
use crate::model::{normalize_text, DateKey, NewTodo, Todo, TodoId};
use crate::store::{StoreResult, TodoStore};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What part of the calendar is on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week { offset: i64 },
    Day { date: NaiveDate },
}

/// The view model behind the TUI: visible columns, their todos and the focus.
///
/// Every mutating call writes through to the store first, then re-reads the
/// visible columns, then moves focus, so counts handed to the focus machine
/// are never stale.
pub struct Agenda<S: TodoStore> {
    store: S,
    today: NaiveDate,
    period: Period,
    columns: Vec<DateKey>,
    todos: BTreeMap<DateKey, Vec<Todo>>,
    focus: FocusState,
}

impl<S: TodoStore> Agenda<S> {
    pub fn week(store: S, today: NaiveDate, offset: i64) -> StoreResult<Self> {
        let mut agenda = Agenda::empty(store, today, Period::Week { offset });
        agenda.reload()?;
        agenda.focus = FocusState::for_week(index_of_today(&agenda.columns, today));
        Ok(agenda)
    }

    pub fn day(store: S, today: NaiveDate, date: NaiveDate) -> StoreResult<Self> {
        let mut agenda = Agenda::empty(store, today, Period::Day { date });
        agenda.reload()?;
        agenda.focus = FocusState::for_day(agenda.counts().get(0));
        Ok(agenda)
    }

    fn empty(store: S, today: NaiveDate, period: Period) -> Self {
        Agenda {
            store,
            today,
            period,
            columns: Vec::new(),
            todos: BTreeMap::new(),
            focus: FocusState::default(),
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn layout(&self) -> Layout {
        match self.period {
            Period::Week { .. } => Layout::Week,
            Period::Day { .. } => Layout::Day,
        }
    }

    pub fn visible_week(&self) -> Option<Week> {
        match self.period {
            Period::Week { offset } => Some(compute_week(self.today, offset)),
            Period::Day { .. } => None,
        }
    }

    pub fn columns(&self) -> &[DateKey] {
        &self.columns
    }

    pub fn focus(&self) -> FocusState {
        self.focus
    }

    pub fn focused_key(&self) -> Option<DateKey> {
        self.columns.get(self.focus.column).copied()
    }

    pub fn todos_in(&self, column: usize) -> &[Todo] {
        self.columns
            .get(column)
            .and_then(|key| self.todos.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn counts(&self) -> ColumnCounts {
        ColumnCounts::from_lists((0..self.columns.len()).map(|idx| self.todos_in(idx)))
    }

    pub fn focused_todo(&self) -> Option<&Todo> {
        let idx = self.focus.todo_index()?;
        self.todos_in(self.focus.column).get(idx)
    }

    /// Applies a navigation intent. Returns whether focus moved.
    pub fn navigate(&mut self, intent: Intent) -> bool {
        let next = transition(self.focus, intent, self.layout(), &self.counts());
        let moved = next != self.focus;
        if moved {
            debug!(?intent, from = ?self.focus, to = ?next, "focus moved");
        }
        self.focus = next;
        moved
    }

    /// Moves the visible window by `delta` weeks (week view) or days (day view).
    pub fn shift_period(&mut self, delta: i64) -> StoreResult<()> {
        self.period = match self.period {
            Period::Week { offset } => Period::Week {
                offset: offset.saturating_add(delta),
            },
            Period::Day { date } => Period::Day {
                date: compute_day(date, delta),
            },
        };
        info!(period = ?self.period, "changed period");
        self.reload()
    }

    pub fn open_day(&mut self, date: NaiveDate) -> StoreResult<()> {
        self.period = Period::Day { date };
        self.reload()?;
        self.focus = FocusState::for_day(self.counts().get(0));
        Ok(())
    }

    /// Returns to the week containing the current day (or this week).
    pub fn open_week(&mut self) -> StoreResult<()> {
        let anchor = match self.period {
            Period::Day { date } => date,
            Period::Week { .. } => return Ok(()),
        };
        let offset = (compute_week(anchor, 0).start - compute_week(self.today, 0).start)
            .num_weeks();
        self.period = Period::Week { offset };
        self.reload()?;
        let column = index_of_today(&self.columns, anchor);
        self.focus = FocusState::for_week(column);
        Ok(())
    }

    /// Adds a todo to the focused column. Blank text is ignored.
    pub fn add_todo(&mut self, text: &str) -> StoreResult<Option<Todo>> {
        let column = self.focus.column;
        self.add_todo_to(column, text)
    }

    pub fn add_todo_to(&mut self, column: usize, text: &str) -> StoreResult<Option<Todo>> {
        let (Some(text), Some(key)) = (normalize_text(text), self.columns.get(column).copied())
        else {
            return Ok(None);
        };
        let created = self.store.create(NewTodo::new(text, Some(key)))?;
        info!(id = created.id, date = %key, "added todo");
        self.reload()?;
        Ok(Some(created))
    }

    pub fn toggle_focused(&mut self) -> StoreResult<Option<Todo>> {
        let Some(id) = self.focused_todo().map(|t| t.id) else {
            return Ok(None);
        };
        let toggled = self.store.toggle_complete(id)?;
        if let Some(todo) = &toggled {
            info!(id, completed = todo.is_completed(), "toggled todo");
        }
        self.reload()?;
        Ok(toggled)
    }

    /// Deletes the focused todo and moves focus up one row.
    pub fn delete_focused(&mut self) -> StoreResult<Option<TodoId>> {
        let Some(id) = self.focused_todo().map(|t| t.id) else {
            return Ok(None);
        };
        self.delete_by_id(id)
    }

    /// Deletes any todo. Focus only steps up when the deleted todo was the
    /// focused one; otherwise it is just clamped to the new counts.
    pub fn delete_by_id(&mut self, id: TodoId) -> StoreResult<Option<TodoId>> {
        let was_focused = self.focused_todo().map(|t| t.id) == Some(id);
        let deleted = self.store.delete(id)?;
        self.load_columns()?;
        let result = if deleted {
            info!(id, "deleted todo");
            if was_focused {
                self.navigate(Intent::MoveUp);
            }
            Some(id)
        } else {
            None
        };
        self.focus = clamp(self.focus, self.layout(), &self.counts());
        Ok(result)
    }

    /// Re-reads every visible column and clamps focus to the new counts.
    pub fn reload(&mut self) -> StoreResult<()> {
        self.load_columns()?;
        self.focus = clamp(self.focus, self.layout(), &self.counts());
        Ok(())
    }

    fn load_columns(&mut self) -> StoreResult<()> {
        self.columns = match self.period {
            Period::Week { offset } => compute_week(self.today, offset).columns(),
            Period::Day { date } => vec![DateKey::Date(date)],
        };
        self.todos = self.store.list_range(&self.columns)?;
        Ok(())
    }
}
