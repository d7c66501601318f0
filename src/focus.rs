//! Keyboard focus for the week and day views.
//!
//! Focus is a `(column, row)` pair. Row 0 is the column's add-todo input and
//! row `n` is the n-th todo. In the week layout columns 0..=6 are Monday to
//! Sunday and column 7 is the someday bucket, which is only reachable
//! vertically. Saturday and Sunday are drawn stacked, so moving down off the
//! bottom of Saturday lands on Sunday rather than in someday.
//!
//! Every transition is a pure function of the current state, the intent and
//! a snapshot of how many todos each column holds.

use crate::calendar::{SOMEDAY_COLUMN, WEEK_COLUMNS};
use crate::model::Todo;

pub const INPUT_ROW: usize = 0;

const MONDAY: usize = 0;
const SATURDAY: usize = 5;
const SUNDAY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Seven weekday columns plus someday.
    Week,
    /// A single date column, no someday.
    Day,
}

impl Layout {
    pub fn column_count(self) -> usize {
        match self {
            Layout::Week => WEEK_COLUMNS,
            Layout::Day => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    MoveDown,
    MoveUp,
    MoveLeft,
    MoveRight,
    JumpToSomeday,
    JumpFromSomeday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusState {
    pub column: usize,
    pub row: usize,
    /// Weekday column to return to when leaving someday. Monday when unset.
    pub last_weekday: Option<usize>,
    /// Row that was focused when someday was entered.
    pub last_weekday_row: usize,
}

impl FocusState {
    pub fn for_week(today_column: usize) -> Self {
        let column = if today_column < SOMEDAY_COLUMN {
            today_column
        } else {
            MONDAY
        };
        FocusState {
            column,
            row: INPUT_ROW,
            last_weekday: Some(column),
            last_weekday_row: INPUT_ROW,
        }
    }

    pub fn for_day(todo_count: usize) -> Self {
        FocusState {
            row: todo_count.min(1),
            ..Default::default()
        }
    }

    pub fn is_input(&self) -> bool {
        self.row == INPUT_ROW
    }

    /// Zero-based position of the focused todo within its column.
    pub fn todo_index(&self) -> Option<usize> {
        self.row.checked_sub(1)
    }
}

/// Number of todos per column, indexed like the visible columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnCounts(Vec<usize>);

impl ColumnCounts {
    pub fn new(counts: Vec<usize>) -> Self {
        ColumnCounts(counts)
    }

    pub fn from_lists<'a>(lists: impl IntoIterator<Item = &'a [Todo]>) -> Self {
        ColumnCounts::new(lists.into_iter().map(<[Todo]>::len).collect())
    }

    /// Missing columns count as empty.
    pub fn get(&self, column: usize) -> usize {
        self.0.get(column).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

pub fn transition(
    state: FocusState,
    intent: Intent,
    layout: Layout,
    counts: &ColumnCounts,
) -> FocusState {
    match layout {
        Layout::Week => week_transition(state, intent, counts),
        Layout::Day => day_transition(state, intent, counts),
    }
}

/// Pulls focus back inside the grid after the counts changed underneath it.
pub fn clamp(state: FocusState, layout: Layout, counts: &ColumnCounts) -> FocusState {
    let column = if state.column < layout.column_count() {
        state.column
    } else {
        MONDAY
    };
    FocusState {
        column,
        row: state.row.min(counts.get(column)),
        ..state
    }
}

fn day_transition(state: FocusState, intent: Intent, counts: &ColumnCounts) -> FocusState {
    match intent {
        Intent::MoveDown if state.row < counts.get(state.column) => FocusState {
            row: state.row + 1,
            ..state
        },
        Intent::MoveUp if state.row > INPUT_ROW => FocusState {
            row: state.row - 1,
            ..state
        },
        _ => state,
    }
}

fn week_transition(state: FocusState, intent: Intent, counts: &ColumnCounts) -> FocusState {
    let column = state.column;
    if column > SOMEDAY_COLUMN {
        return state;
    }
    match intent {
        Intent::MoveDown => {
            if state.row < counts.get(column) {
                return FocusState {
                    row: state.row + 1,
                    ..state
                };
            }
            match column {
                SOMEDAY_COLUMN => state,
                SATURDAY => FocusState {
                    column: SUNDAY,
                    row: INPUT_ROW,
                    last_weekday: Some(SUNDAY),
                    ..state
                },
                _ => enter_someday(state),
            }
        }
        Intent::MoveUp => {
            if state.row > INPUT_ROW {
                return FocusState {
                    row: state.row - 1,
                    ..state
                };
            }
            match column {
                SOMEDAY_COLUMN => {
                    let target = state.last_weekday.unwrap_or(MONDAY);
                    focus_weekday(state, target, counts.get(target))
                }
                SUNDAY => focus_weekday(state, SATURDAY, counts.get(SATURDAY)),
                _ => state,
            }
        }
        Intent::MoveRight => match column {
            MONDAY..=SATURDAY => {
                let next = column + 1;
                focus_weekday(state, next, state.row.min(counts.get(next)))
            }
            _ => state,
        },
        Intent::MoveLeft => match column {
            1..=SUNDAY => {
                let prev = column - 1;
                focus_weekday(state, prev, state.row.min(counts.get(prev)))
            }
            _ => state,
        },
        Intent::JumpToSomeday => match column {
            SOMEDAY_COLUMN => state,
            _ => enter_someday(state),
        },
        Intent::JumpFromSomeday => match column {
            SOMEDAY_COLUMN => {
                let target = state.last_weekday.unwrap_or(MONDAY);
                let row = state.last_weekday_row.min(counts.get(target));
                focus_weekday(state, target, row)
            }
            _ => state,
        },
    }
}

fn enter_someday(state: FocusState) -> FocusState {
    FocusState {
        column: SOMEDAY_COLUMN,
        row: INPUT_ROW,
        last_weekday: Some(state.column),
        last_weekday_row: state.row,
    }
}

fn focus_weekday(state: FocusState, column: usize, row: usize) -> FocusState {
    FocusState {
        column,
        row,
        last_weekday: Some(column),
        ..state
    }
}
