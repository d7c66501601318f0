use crate::agenda::{Agenda, Period};
use crate::calendar::{column_title, SOMEDAY_COLUMN};
use crate::focus::{Intent, Layout as FocusLayout, INPUT_ROW};
use crate::model::{DateKey, Todo, TodoId};
use crate::store::{StoreError, TodoStore};
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::collections::BTreeMap;
use std::io::{stdout, Stdout};
use std::time::Duration;
use tracing::warn;

pub fn run<S: TodoStore>(agenda: Agenda<S>) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(agenda);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

/// Abstract request decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Navigate(Intent),
    PreviousPeriod,
    NextPeriod,
    ToggleComplete,
    Delete,
    Add,
    OpenDay,
    OpenWeek,
    ToggleHelp,
    ToggleDebug,
    Cancel,
    Quit,
    Type(char),
    Backspace,
    Submit,
}

struct App<S: TodoStore> {
    agenda: Agenda<S>,
    drafts: BTreeMap<DateKey, FieldValue>,
    status: String,
    mode: Mode,
    show_help: bool,
    show_debug: bool,
    last_action: Option<Action>,
}

enum Mode {
    Normal,
    Adding(FieldValue),
    ConfirmDelete { id: TodoId, text: String },
}

#[derive(Clone, Default)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

/// Maps a key to an action. While a week column's input row is focused,
/// printable keys edit the draft and only arrows navigate.
fn bind_key(key: &KeyEvent, input_focused: bool, layout: FocusLayout) -> Option<Action> {
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }
    let arrow = match key.code {
        KeyCode::Down if shift => Some(Action::Navigate(Intent::JumpToSomeday)),
        KeyCode::Up if shift => Some(Action::Navigate(Intent::JumpFromSomeday)),
        KeyCode::Left if shift => Some(Action::PreviousPeriod),
        KeyCode::Right if shift => Some(Action::NextPeriod),
        KeyCode::Down => Some(Action::Navigate(Intent::MoveDown)),
        KeyCode::Up => Some(Action::Navigate(Intent::MoveUp)),
        KeyCode::Left => Some(Action::Navigate(Intent::MoveLeft)),
        KeyCode::Right => Some(Action::Navigate(Intent::MoveRight)),
        KeyCode::Esc => Some(Action::Cancel),
        _ => None,
    };
    if arrow.is_some() {
        return arrow;
    }
    if input_focused {
        return match key.code {
            KeyCode::Enter => Some(Action::Submit),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Char(_) if key.modifiers.contains(KeyModifiers::ALT) => None,
            KeyCode::Char(c) => Some(Action::Type(c)),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Char('j') => Some(Action::Navigate(Intent::MoveDown)),
        KeyCode::Char('k') => Some(Action::Navigate(Intent::MoveUp)),
        KeyCode::Char('h') => Some(Action::Navigate(Intent::MoveLeft)),
        KeyCode::Char('l') => Some(Action::Navigate(Intent::MoveRight)),
        KeyCode::Char('J') => Some(Action::Navigate(Intent::JumpToSomeday)),
        KeyCode::Char('K') => Some(Action::Navigate(Intent::JumpFromSomeday)),
        KeyCode::Char('H') => Some(Action::PreviousPeriod),
        KeyCode::Char('L') => Some(Action::NextPeriod),
        KeyCode::Char('c') => Some(Action::ToggleComplete),
        KeyCode::Char('d') => Some(Action::Delete),
        KeyCode::Char('a') => Some(Action::Add),
        KeyCode::Char('?') => Some(Action::ToggleHelp),
        KeyCode::Char('t') => Some(Action::ToggleDebug),
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Char('w') if layout == FocusLayout::Day => Some(Action::OpenWeek),
        KeyCode::Char('o') if layout == FocusLayout::Week => Some(Action::OpenDay),
        KeyCode::Enter => match layout {
            FocusLayout::Week => Some(Action::OpenDay),
            FocusLayout::Day => Some(Action::Add),
        },
        _ => None,
    }
}

impl<S: TodoStore> App<S> {
    fn new(agenda: Agenda<S>) -> Self {
        App {
            agenda,
            drafts: BTreeMap::new(),
            status: "Press ? for help".into(),
            mode: Mode::Normal,
            show_help: false,
            show_debug: false,
            last_action: None,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Week inline input is active: week layout and row 0.
    fn input_focused(&self) -> bool {
        self.agenda.layout() == FocusLayout::Week && self.agenda.focus().is_input()
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => {}
            Mode::Adding(_) => return Ok(self.handle_dialog_key(key)),
            Mode::ConfirmDelete { .. } => return Ok(self.handle_confirm_key(key)),
        }
        let Some(action) = bind_key(&key, self.input_focused(), self.agenda.layout()) else {
            return Ok(false);
        };
        self.last_action = Some(action);
        if self.show_help {
            match action {
                Action::ToggleHelp | Action::Cancel => self.show_help = false,
                Action::Quit => return Ok(true),
                _ => {}
            }
            return Ok(false);
        }
        Ok(self.apply(action))
    }

    fn apply(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return true,
            Action::Navigate(intent) => {
                self.agenda.navigate(intent);
            }
            Action::PreviousPeriod => self.shift_period(-1),
            Action::NextPeriod => self.shift_period(1),
            Action::ToggleComplete => match self.agenda.toggle_focused() {
                Ok(Some(todo)) if todo.is_completed() => {
                    self.status = format!("Completed \"{}\"", todo.text)
                }
                Ok(Some(todo)) => self.status = format!("Reopened \"{}\"", todo.text),
                Ok(None) => {}
                Err(err) => self.report("Toggle failed", err),
            },
            Action::Delete => self.request_delete(),
            Action::Add => match self.agenda.layout() {
                FocusLayout::Day => {
                    self.mode = Mode::Adding(FieldValue::default());
                    self.status = "Adding todo (Enter to save, Esc to cancel)".into();
                }
                FocusLayout::Week => {
                    let column = self.agenda.focus().column;
                    self.focus_input(column);
                }
            },
            Action::OpenDay => self.open_day(),
            Action::OpenWeek => {
                if let Err(err) = self.agenda.open_week() {
                    self.report("Could not load week", err);
                }
            }
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::ToggleDebug => self.show_debug = !self.show_debug,
            Action::Cancel => {
                self.show_debug = false;
                if let Some(draft) = self.current_draft_mut() {
                    draft.clear();
                }
            }
            Action::Type(ch) => {
                if let Some(draft) = self.current_draft_mut() {
                    draft.insert_char(ch);
                }
            }
            Action::Backspace => {
                if let Some(draft) = self.current_draft_mut() {
                    draft.backspace();
                }
            }
            Action::Submit => self.submit_draft(),
        }
        false
    }

    fn focus_input(&mut self, column: usize) {
        while self.agenda.focus().column == column && !self.agenda.focus().is_input() {
            if !self.agenda.navigate(Intent::MoveUp) {
                break;
            }
        }
    }

    fn current_draft_mut(&mut self) -> Option<&mut FieldValue> {
        if !self.input_focused() {
            return None;
        }
        let key = self.agenda.focused_key()?;
        Some(self.drafts.entry(key).or_default())
    }

    fn submit_draft(&mut self) {
        let Some(key) = self.agenda.focused_key() else {
            return;
        };
        let text = match self.drafts.get(&key) {
            Some(draft) if !draft.is_blank() => draft.value.clone(),
            _ => return,
        };
        match self.agenda.add_todo(&text) {
            Ok(Some(todo)) => {
                self.status = format!("Added \"{}\" to {}", todo.text, key);
                if let Some(draft) = self.drafts.get_mut(&key) {
                    draft.clear();
                }
            }
            Ok(None) => {}
            Err(err) => self.report("Could not add", err),
        }
    }

    fn request_delete(&mut self) {
        let Some(todo) = self.agenda.focused_todo().cloned() else {
            return;
        };
        match self.agenda.layout() {
            FocusLayout::Day => {
                self.status = "Delete? (Enter/y to confirm, Esc/n to cancel)".into();
                self.mode = Mode::ConfirmDelete {
                    id: todo.id,
                    text: todo.text,
                };
            }
            FocusLayout::Week => match self.agenda.delete_focused() {
                Ok(Some(_)) => self.status = format!("Deleted \"{}\"", todo.text),
                Ok(None) => {}
                Err(err) => self.report("Delete failed", err),
            },
        }
    }

    fn delete(&mut self, id: TodoId, text: &str) {
        match self.agenda.delete_by_id(id) {
            Ok(Some(_)) => self.status = format!("Deleted \"{}\"", text),
            Ok(None) => self.status = format!("\"{}\" was already gone", text),
            Err(err) => self.report("Delete failed", err),
        }
    }

    fn shift_period(&mut self, delta: i64) {
        if let Err(err) = self.agenda.shift_period(delta) {
            self.report("Could not load todos", err);
        }
    }

    fn open_day(&mut self) {
        match self.agenda.focused_key() {
            Some(DateKey::Date(date)) => {
                if let Err(err) = self.agenda.open_day(date) {
                    self.report("Could not load day", err);
                }
            }
            Some(DateKey::Someday) => self.status = "Someday has no day view".into(),
            None => {}
        }
    }

    fn handle_dialog_key(&mut self, key: KeyEvent) -> bool {
        let Mode::Adding(field) = &mut self.mode else {
            return false;
        };
        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                self.status = "Canceled".into();
            }
            KeyCode::Enter => {
                if field.is_blank() {
                    self.status = "Todo text is empty".into();
                    return false;
                }
                let text = field.value.clone();
                self.mode = Mode::Normal;
                match self.agenda.add_todo_to(0, &text) {
                    Ok(Some(todo)) => self.status = format!("Added \"{}\"", todo.text),
                    Ok(None) => {}
                    Err(err) => self.report("Could not add", err),
                }
            }
            KeyCode::Left => field.move_left(),
            KeyCode::Right => field.move_right(),
            KeyCode::Backspace => field.backspace(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    field.insert_char(c);
                }
            }
            _ => {}
        }
        false
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> bool {
        let (id, text) = match &self.mode {
            Mode::ConfirmDelete { id, text } => (*id, text.clone()),
            _ => return false,
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.mode = Mode::Normal;
                self.delete(id, &text);
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        false
    }

    fn report(&mut self, what: &str, err: StoreError) {
        warn!(error = %err, "{}", what);
        self.status = format!("{}: {}", what, err);
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(8),
                Constraint::Length(3),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        match self.agenda.layout() {
            FocusLayout::Week => self.draw_week(f, layout[1]),
            FocusLayout::Day => self.draw_day(f, layout[1]),
        }
        self.draw_footer(f, layout[2]);

        if self.show_debug {
            self.draw_debug(f);
        }
        if self.show_help {
            self.draw_help(f);
        }
        match &self.mode {
            Mode::Adding(field) => self.draw_add_dialog(f, field),
            Mode::ConfirmDelete { text, .. } => self.draw_confirm(f, text),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let range = match self.agenda.period() {
            Period::Week { .. } => self
                .agenda
                .visible_week()
                .map(|w| w.label())
                .unwrap_or_default(),
            Period::Day { date } => date.format("%A, %B %-d, %Y").to_string(),
        };
        let view = match self.agenda.layout() {
            FocusLayout::Week => "week",
            FocusLayout::Day => "day",
        };
        let title = Line::from(vec![
            Span::styled(
                "todoui ",
                Style::default()
                    .fg(Color::LightGreen)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(range, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  •  "),
            Span::styled(format!("{} view", view), Style::default().fg(Color::Magenta)),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        f.render_widget(
            Paragraph::new(title)
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
    }

    fn draw_week(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
            .split(area);
        let days = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 6); 6])
            .split(rows[0]);
        let weekend = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(days[5]);

        for (column, area) in days.iter().take(5).enumerate() {
            self.draw_column(f, *area, column);
        }
        self.draw_column(f, weekend[0], 5);
        self.draw_column(f, weekend[1], 6);
        self.draw_column(f, rows[1], SOMEDAY_COLUMN);
    }

    fn draw_column(&self, f: &mut ratatui::Frame<'_>, area: Rect, column: usize) {
        let columns = self.agenda.columns();
        let Some(key) = columns.get(column).copied() else {
            return;
        };
        let focus = self.agenda.focus();
        let focused = focus.column == column;
        let is_today = key.date() == Some(self.agenda.today());
        let width = area.width.saturating_sub(4) as usize;

        let input = self.drafts.get(&key);
        let input_text = match input {
            Some(draft) if focused && focus.is_input() => format!("> {}", draft.with_caret()),
            Some(draft) if !draft.value.is_empty() => format!("> {}", draft.value),
            _ if focused && focus.is_input() => "> ▌".to_string(),
            _ => "+ Add todo".to_string(),
        };
        let mut items = vec![ListItem::new(truncate_text(&input_text, width))
            .style(Style::default().fg(Color::Gray).bg(Color::Rgb(40, 40, 40)))];
        items.extend(
            self.agenda
                .todos_in(column)
                .iter()
                .map(|todo| todo_item(todo, width)),
        );

        let mut state = ListState::default();
        if focused {
            state.select(Some(focus.row));
        }

        let title = match key {
            DateKey::Date(date) => format!(
                "{} {}",
                &column_title(columns, column)[..3],
                date.format("%b %-d")
            ),
            DateKey::Someday => "Someday".to_string(),
        };
        let accent = if focused {
            Color::LightCyan
        } else if is_today {
            Color::LightGreen
        } else {
            Color::White
        };
        let block = Block::default()
            .title(Span::styled(
                format!("{} ({})", title, self.agenda.todos_in(column).len()),
                Style::default().fg(accent).add_modifier(if focused {
                    Modifier::BOLD | Modifier::UNDERLINED
                } else {
                    Modifier::BOLD
                }),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(accent));
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::White)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_day(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focus = self.agenda.focus();
        let todos = self.agenda.todos_in(0);
        let width = area.width.saturating_sub(4) as usize;
        let mut items = vec![ListItem::new("+ Add todo (a)").style(Style::default().fg(Color::Gray))];
        if todos.is_empty() {
            items.push(
                ListItem::new("No todos for this day. Press 'a' to add one!")
                    .style(Style::default().fg(Color::DarkGray)),
            );
        }
        items.extend(todos.iter().map(|todo| todo_item(todo, width)));

        let mut state = ListState::default();
        state.select(Some(focus.row));
        let block = Block::default()
            .title(Span::styled(
                format!("Todos ({})", todos.len()),
                Style::default()
                    .fg(Color::LightBlue)
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::LightBlue));
        let list = List::new(items).block(block).highlight_style(
            Style::default()
                .bg(Color::White)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(1)])
            .split(area);
        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);
        f.render_widget(
            Paragraph::new(self.status.clone()).style(Style::default().fg(Color::Gray)),
            rows[1],
        );
    }

    fn footer_help_line(&self) -> Line<'static> {
        let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::LightCyan));
        let mut spans = match self.agenda.layout() {
            FocusLayout::Week => vec![
                key("←→hjkl"),
                Span::raw(" navigate  "),
                key("⇧↓"),
                Span::raw(" someday  "),
                key("⇧↑"),
                Span::raw(" from someday  "),
                key("⇧←→"),
                Span::raw(" week  "),
                key("o"),
                Span::raw(" day view  "),
            ],
            FocusLayout::Day => vec![
                key("↑↓jk"),
                Span::raw(" navigate  "),
                key("⇧←→"),
                Span::raw(" day  "),
                key("a"),
                Span::raw(" add  "),
                key("w"),
                Span::raw(" week view  "),
            ],
        };
        spans.extend([
            Span::styled("c", Style::default().fg(Color::LightGreen)),
            Span::raw(" complete  "),
            Span::styled("d", Style::default().fg(Color::LightRed)),
            Span::raw(" delete  "),
            Span::styled("?", Style::default().fg(Color::LightYellow)),
            Span::raw(" help  "),
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ]);
        Line::from(spans)
    }

    fn draw_help(&self, f: &mut ratatui::Frame<'_>) {
        let area = centered_rect(60, 70, f.size());
        let heading = |text: &'static str| {
            Line::from(Span::styled(
                text,
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ))
        };
        let entry = |keys: &'static str, what: &'static str| {
            Line::from(vec![
                Span::styled(format!("  {:<14}", keys), Style::default().fg(Color::LightCyan)),
                Span::styled(what, Style::default().fg(Color::Gray)),
            ])
        };
        let lines = vec![
            heading("Navigation"),
            entry("↑↓ / k j", "Move up/down"),
            entry("←→ / h l", "Move left/right"),
            entry("Shift+↓", "Jump to Someday"),
            entry("Shift+↑", "Jump from Someday"),
            entry("Shift+←→", "Previous/next week or day"),
            Line::from(""),
            heading("Actions"),
            entry("type + Enter", "Add todo on a day's input row"),
            entry("a", "Add todo"),
            entry("c", "Complete/uncomplete todo"),
            entry("d", "Delete todo"),
            entry("o / Enter", "Open the focused day"),
            entry("w", "Back to week view"),
            Line::from(""),
            heading("Other"),
            entry("t", "Toggle debug overlay"),
            entry("?", "Toggle this help"),
            entry("Esc", "Close / cancel"),
            entry("q / Ctrl+C", "Quit"),
        ];
        let dialog = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    "Help - Keyboard Shortcuts",
                    Style::default()
                        .fg(Color::LightGreen)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::LightGreen)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_debug(&self, f: &mut ratatui::Frame<'_>) {
        let full = f.size();
        let width = full.width.min(44);
        let area = Rect::new(full.x + full.width - width, full.y, width, full.height.min(9));
        let focus = self.agenda.focus();
        let counts = self.agenda.counts();
        let counts_text = (0..counts.len())
            .map(|c| counts.get(c).to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let lines = vec![
            Line::from(format!("column {}  row {}", focus.column, focus.row)),
            Line::from(format!(
                "last weekday {:?}  row {}",
                focus.last_weekday, focus.last_weekday_row
            )),
            Line::from(format!("counts [{}]", counts_text)),
            Line::from(format!("period {:?}", self.agenda.period())),
            Line::from(format!("last action {:?}", self.last_action)),
            Line::from(format!("input row {}", focus.row == INPUT_ROW)),
        ];
        let dialog = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title("debug")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_add_dialog(&self, f: &mut ratatui::Frame<'_>, field: &FieldValue) {
        let area = centered_rect(60, 30, f.size());
        let lines = vec![
            Line::from(Span::styled(
                field.with_caret(),
                Style::default().fg(Color::Cyan),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter to add, Esc to cancel",
                Style::default().fg(Color::Gray),
            )),
        ];
        let dialog = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        "Add Todo",
                        Style::default()
                            .fg(Color::LightBlue)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(Color::LightBlue)),
            )
            .wrap(Wrap { trim: true });
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, text: &str) {
        let area = centered_rect(50, 30, f.size());
        let body = vec![
            Line::from("Are you sure you want to delete:"),
            Line::from(Span::styled(
                format!("\"{}\"", text),
                Style::default()
                    .fg(Color::LightYellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press Enter or y to confirm, Esc or n to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Delete Todo",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn todo_item(todo: &Todo, width: usize) -> ListItem<'static> {
    let text = truncate_text(&todo.text, width);
    if todo.is_completed() {
        ListItem::new(text).style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT),
        )
    } else {
        ListItem::new(text).style(Style::default().fg(Color::White))
    }
}

fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    fn wednesday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
    }

    fn week_app() -> App<MemoryStore> {
        App::new(Agenda::week(MemoryStore::new(), wednesday(), 0).unwrap())
    }

    fn day_app() -> App<MemoryStore> {
        App::new(Agenda::day(MemoryStore::new(), wednesday(), wednesday()).unwrap())
    }

    fn press(app: &mut App<MemoryStore>, code: KeyCode) -> bool {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE)).unwrap()
    }

    fn press_shift(app: &mut App<MemoryStore>, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::SHIFT)).unwrap();
    }

    fn type_text(app: &mut App<MemoryStore>, text: &str) {
        for ch in text.chars() {
            press(app, KeyCode::Char(ch));
        }
    }

    fn render(app: &mut App<MemoryStore>) -> String {
        let backend = TestBackend::new(140, 40);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
        let buf = terminal.backend().buffer().clone();
        let width = buf.area.width as usize;
        buf.content
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn shifted_arrows_map_to_jumps_and_paging() {
        let shift = |code| KeyEvent::new(code, KeyModifiers::SHIFT);
        assert_eq!(
            bind_key(&shift(KeyCode::Down), true, FocusLayout::Week),
            Some(Action::Navigate(Intent::JumpToSomeday))
        );
        assert_eq!(
            bind_key(&shift(KeyCode::Up), false, FocusLayout::Week),
            Some(Action::Navigate(Intent::JumpFromSomeday))
        );
        assert_eq!(
            bind_key(&shift(KeyCode::Left), false, FocusLayout::Day),
            Some(Action::PreviousPeriod)
        );
        assert_eq!(
            bind_key(&shift(KeyCode::Right), true, FocusLayout::Week),
            Some(Action::NextPeriod)
        );
    }

    #[test]
    fn letters_type_into_focused_input() {
        let key = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(
            bind_key(&key, true, FocusLayout::Week),
            Some(Action::Type('j'))
        );
        assert_eq!(
            bind_key(&key, false, FocusLayout::Week),
            Some(Action::Navigate(Intent::MoveDown))
        );
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(bind_key(&ctrl_c, true, FocusLayout::Week), Some(Action::Quit));
    }

    #[test]
    fn alt_chords_are_not_typed_into_the_draft() {
        let alt_x = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(bind_key(&alt_x, true, FocusLayout::Week), None);

        let mut app = week_app();
        type_text(&mut app, "ok");
        app.handle_key(alt_x).unwrap();
        let shifted = KeyEvent::new(KeyCode::Char('K'), KeyModifiers::SHIFT);
        app.handle_key(shifted).unwrap();
        assert_eq!(
            app.drafts
                .get(&DateKey::Date(wednesday()))
                .map(|d| d.value.as_str()),
            Some("okK")
        );
    }

    #[test]
    fn typing_and_enter_adds_to_focused_day() {
        let mut app = week_app();
        type_text(&mut app, "hello");
        press(&mut app, KeyCode::Enter);
        let todos = app.agenda.todos_in(2);
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].text, "hello");
        assert_eq!(
            app.drafts
                .get(&DateKey::Date(wednesday()))
                .map(|d| d.value.as_str()),
            Some("")
        );
    }

    #[test]
    fn blank_input_is_not_submitted() {
        let mut app = week_app();
        type_text(&mut app, "   ");
        press(&mut app, KeyCode::Enter);
        assert!(app.agenda.store().list_all().unwrap().is_empty());
    }

    #[test]
    fn complete_and_delete_from_week_view() {
        let mut app = week_app();
        type_text(&mut app, "one");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "two");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);

        press(&mut app, KeyCode::Char('c'));
        assert!(app.agenda.focused_todo().unwrap().is_completed());

        press(&mut app, KeyCode::Char('d'));
        assert_eq!(app.agenda.todos_in(2).len(), 1);
        assert_eq!(app.agenda.focus().row, 1);
        assert_eq!(app.agenda.focused_todo().unwrap().text, "one");
    }

    #[test]
    fn action_keys_are_inert_on_the_input_row() {
        let mut app = week_app();
        press(&mut app, KeyCode::Char('q'));
        press(&mut app, KeyCode::Char('t'));
        assert!(!app.show_debug);
        assert_eq!(
            app.drafts
                .get(&DateKey::Date(wednesday()))
                .map(|d| d.value.as_str()),
            Some("qt")
        );
    }

    #[test]
    fn shift_down_jumps_to_someday() {
        let mut app = week_app();
        press_shift(&mut app, KeyCode::Down);
        assert_eq!(app.agenda.focus().column, SOMEDAY_COLUMN);
        type_text(&mut app, "learn piano");
        press(&mut app, KeyCode::Enter);
        assert_eq!(app.agenda.todos_in(SOMEDAY_COLUMN).len(), 1);
        press_shift(&mut app, KeyCode::Up);
        assert_eq!(app.agenda.focus().column, 2);
    }

    #[test]
    fn day_view_add_dialog_and_confirmed_delete() {
        let mut app = day_app();
        press(&mut app, KeyCode::Char('a'));
        assert!(matches!(app.mode, Mode::Adding(_)));
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Adding(_)));
        type_text(&mut app, "dentist");
        press(&mut app, KeyCode::Enter);
        assert!(matches!(app.mode, Mode::Normal));
        assert_eq!(app.agenda.todos_in(0).len(), 1);

        press(&mut app, KeyCode::Char('j'));
        press(&mut app, KeyCode::Char('d'));
        assert!(matches!(app.mode, Mode::ConfirmDelete { .. }));
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.agenda.todos_in(0).len(), 1);

        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('y'));
        assert!(app.agenda.todos_in(0).is_empty());
        assert_eq!(app.agenda.focus().row, INPUT_ROW);
    }

    #[test]
    fn open_day_and_return_to_week() {
        let mut app = week_app();
        type_text(&mut app, "call mom");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Char('j'));
        assert_eq!(app.agenda.focus().row, 0);
        assert_eq!(
            app.drafts
                .get(&DateKey::Date(wednesday()))
                .map(|d| d.value.as_str()),
            Some("j")
        );
        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Char('o'));
        assert_eq!(app.agenda.layout(), FocusLayout::Day);
        assert_eq!(app.agenda.focused_todo().unwrap().text, "call mom");

        press(&mut app, KeyCode::Char('w'));
        assert_eq!(app.agenda.layout(), FocusLayout::Week);
        assert_eq!(app.agenda.focus().column, 2);
    }

    #[test]
    fn help_overlay_swallows_keys_until_closed() {
        let mut app = day_app();
        press(&mut app, KeyCode::Char('?'));
        assert!(app.show_help);
        press(&mut app, KeyCode::Char('a'));
        assert!(matches!(app.mode, Mode::Normal));
        assert!(app.show_help);
        press(&mut app, KeyCode::Esc);
        assert!(!app.show_help);
        assert!(press(&mut app, KeyCode::Char('q')));
    }

    #[test]
    fn week_render_shows_columns_and_todos() {
        let mut app = week_app();
        type_text(&mut app, "water plants");
        press(&mut app, KeyCode::Enter);
        let screen = render(&mut app);
        assert!(screen.contains("Mon Jun 10"));
        assert!(screen.contains("Sun Jun 16"));
        assert!(screen.contains("Someday"));
        assert!(screen.contains("water plants"));
        assert!(screen.contains("week view"));
    }

    #[test]
    fn day_render_shows_empty_hint() {
        let mut app = day_app();
        let screen = render(&mut app);
        assert!(screen.contains("Wednesday, June 12, 2024"));
        assert!(screen.contains("No todos for this day"));
    }
}
