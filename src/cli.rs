use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "todoui", version, about = "Weekly todo planner for the terminal")]
pub struct Cli {
    /// Path to the todo database (overrides config and TODOUI_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    /// Path to the config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a default config file
    Init,
    /// Open the week view
    Week {
        /// Weeks relative to the current one
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        offset: i64,
    },
    /// Open the day view
    Day {
        /// Date to show (YYYY-MM-DD), defaults to today
        date: Option<String>,
    },
    /// List todos
    List {
        #[command(flatten)]
        target: ListTarget,
        /// Print as YAML
        #[arg(long)]
        yaml: bool,
    },
    /// Add a todo (defaults to today)
    Add {
        /// Todo text
        text: String,
        #[command(flatten)]
        target: AssignTarget,
    },
    /// Toggle a todo between done and not done
    Done {
        /// Todo id
        id: i64,
    },
    /// Edit a todo's text or date
    Edit {
        /// Todo id
        id: i64,
        /// New text
        #[arg(long)]
        text: Option<String>,
        #[command(flatten)]
        target: AssignTarget,
        /// Remove the date assignment
        #[arg(long, conflicts_with_all = ["date", "someday"])]
        unassign: bool,
    },
    /// Delete a todo
    Delete {
        /// Todo id
        id: i64,
    },
    /// Launch the interactive TUI
    Tui,
}

#[derive(Args, Debug, Default)]
pub struct AssignTarget {
    /// Date to file the todo under (YYYY-MM-DD)
    #[arg(long, conflicts_with = "someday")]
    pub date: Option<String>,
    /// File the todo under someday
    #[arg(long)]
    pub someday: bool,
}

#[derive(Args, Debug, Default)]
pub struct ListTarget {
    /// Only todos for this date (YYYY-MM-DD)
    #[arg(long, conflicts_with_all = ["someday", "week", "all"])]
    pub date: Option<String>,
    /// Only someday todos
    #[arg(long, conflicts_with_all = ["week", "all"])]
    pub someday: bool,
    /// The week at this offset from the current one, plus someday
    #[arg(long, allow_hyphen_values = true, conflicts_with = "all")]
    pub week: Option<i64>,
    /// Every todo in the database
    #[arg(long)]
    pub all: bool,
}
