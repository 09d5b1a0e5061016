use crate::model::{Status, TaskBook, TaskError};
use crate::query::{self, TaskRef, TaskSummary};
use crate::storage::{save_book, StoreLocation};
use anyhow::Result;
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const REFRESH_INTERVAL: Duration = Duration::from_secs(1);
const BLINK_INTERVAL: Duration = Duration::from_millis(500);
const MESSAGE_TTL: Duration = Duration::from_secs(4);

pub fn run(book: TaskBook, location: StoreLocation, recovered: bool) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(book, location, recovered);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

/// Decoded key events, independent of the crossterm types behind them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Enter,
    Backspace,
    Esc,
    Interrupt,
    Char(char),
}

fn decode_key(key: &KeyEvent) -> Option<Key> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Key::Interrupt),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        KeyCode::Enter => Some(Key::Enter),
        KeyCode::Backspace | KeyCode::Delete => Some(Key::Backspace),
        KeyCode::Esc => Some(Key::Esc),
        KeyCode::Char(c) => Some(Key::Char(c)),
        _ => None,
    }
}

/// A committed input line. The first whitespace-delimited token picks the
/// command, case-insensitively; any unrecognized line is a new task name.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start(Option<String>),
    Stop,
    Exit,
    Create(String),
}

fn parse_command(line: &str) -> Option<Command> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or_default().to_lowercase();
    let rest = parts
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    match (head.as_str(), rest) {
        ("start", target) => Some(Command::Start(target)),
        ("stop", None) => Some(Command::Stop),
        ("exit", None) | ("quit", None) => Some(Command::Exit),
        _ => Some(Command::Create(trimmed.to_string())),
    }
}

struct Message {
    text: String,
    expires_at: Instant,
}

struct App {
    book: TaskBook,
    location: StoreLocation,
    rows: Vec<TaskSummary>,
    visible_ids: Vec<u64>,
    selected: usize,
    input: String,
    message: Option<Message>,
    warning: Option<String>,
    cursor_on: bool,
    next_blink: Instant,
    next_refresh: Instant,
}

impl App {
    fn new(book: TaskBook, location: StoreLocation, recovered: bool) -> Self {
        let now = Instant::now();
        let mut app = App {
            book,
            location,
            rows: Vec::new(),
            visible_ids: Vec::new(),
            selected: 0,
            input: String::new(),
            message: None,
            warning: None,
            cursor_on: true,
            next_blink: now + BLINK_INTERVAL,
            next_refresh: now + REFRESH_INTERVAL,
        };
        if recovered {
            app.set_message("task store was unreadable; starting from an empty list".into());
        }
        app.refresh_rows();
        app
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            self.tick(Instant::now());
            let view = self.render_view();
            terminal.draw(|f| draw(f, &view))?;
            let timeout = self
                .next_deadline()
                .saturating_duration_since(Instant::now());
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if let Some(key) = decode_key(&key) {
                        if self.handle_key(key)? {
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Fire whichever cooperative timers are due: cursor blink, the live
    /// refresh while a task is running, and transient-message expiry.
    fn tick(&mut self, now: Instant) {
        if now >= self.next_blink {
            self.cursor_on = !self.cursor_on;
            self.next_blink = now + BLINK_INTERVAL;
        }
        if now >= self.next_refresh {
            self.next_refresh = now + REFRESH_INTERVAL;
            if query::running_task(&self.book).is_some() {
                self.refresh_rows();
            }
        }
        if self.message.as_ref().is_some_and(|m| now >= m.expires_at) {
            self.message = None;
        }
    }

    fn next_deadline(&self) -> Instant {
        let mut deadline = self.next_blink.min(self.next_refresh);
        if let Some(message) = &self.message {
            deadline = deadline.min(message.expires_at);
        }
        deadline
    }

    /// Returns true when the loop should exit.
    fn handle_key(&mut self, key: Key) -> Result<bool> {
        match key {
            Key::Interrupt => return Ok(true),
            Key::Up => {
                self.selected = self.selected.saturating_sub(1);
            }
            Key::Down => {
                if self.selected + 1 < self.rows.len() {
                    self.selected += 1;
                }
            }
            Key::Backspace => {
                self.input.pop();
            }
            Key::Esc => {
                if self.input.is_empty() {
                    return Ok(true);
                }
                self.input.clear();
            }
            Key::Char(c) => {
                if !c.is_control() {
                    self.input.push(c);
                }
            }
            Key::Enter => {
                if self.input.is_empty() {
                    self.toggle_selected()?;
                } else {
                    let line = std::mem::take(&mut self.input);
                    if let Some(command) = parse_command(&line) {
                        if self.run_command(command)? {
                            return Ok(true);
                        }
                    }
                }
            }
        }
        Ok(false)
    }

    fn toggle_selected(&mut self) -> Result<()> {
        let Some(&id) = self.visible_ids.get(self.selected) else {
            return Ok(());
        };
        let outcome = match self.book.get(id).map(|t| t.status) {
            Some(Status::Running) => self.book.pause(id).map(|t| format!("paused '{}'", t.name)),
            _ => self.book.start(id).map(|t| format!("started '{}'", t.name)),
        };
        self.apply(outcome)
    }

    fn run_command(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Exit => return Ok(true),
            Command::Stop => match query::running_task(&self.book).map(|t| t.id) {
                Some(id) => {
                    let outcome = self.book.pause(id).map(|t| format!("paused '{}'", t.name));
                    self.apply(outcome)?;
                }
                None => self.set_message("no task running".into()),
            },
            Command::Start(None) => self.resume_last_active()?,
            Command::Start(Some(target)) => self.start_target(&target)?,
            Command::Create(name) => self.create_and_start(&name)?,
        }
        Ok(false)
    }

    fn resume_last_active(&mut self) -> Result<()> {
        let Some(id) = self.book.last_active_task_id else {
            self.set_message("no recent task to resume".into());
            return Ok(());
        };
        match self.book.get(id).map(|t| t.status) {
            None => self.set_message(format!("task not found: {}", id)),
            Some(Status::Stopped) => {
                self.set_message(format!("task {} is stopped; unstop it first", id));
            }
            Some(Status::Running) => {
                self.set_message(format!("task {} is already running", id));
            }
            Some(_) => {
                let outcome = self.book.start(id).map(|t| format!("resumed '{}'", t.name));
                self.apply(outcome)?;
            }
        }
        Ok(())
    }

    fn start_target(&mut self, target: &str) -> Result<()> {
        if let Some(id) = query::resolve(&self.book, target).map(|t| t.id) {
            let outcome = self.book.start(id).map(|t| format!("started '{}'", t.name));
            return self.apply(outcome);
        }
        match query::parse_ref(target) {
            // Numeric input never silently creates a numbered task.
            TaskRef::ById(_) => {
                self.set_message(format!("task not found: {}", target.trim()));
                Ok(())
            }
            TaskRef::ByName(_) => self.create_and_start(target),
        }
    }

    fn create_and_start(&mut self, name: &str) -> Result<()> {
        match self.book.create_task(name, None).map(|t| t.id) {
            Ok(id) => {
                let outcome = self
                    .book
                    .start(id)
                    .map(|t| format!("tracking new task '{}'", t.name));
                self.apply(outcome)
            }
            Err(err) => {
                self.set_message(err.to_string());
                Ok(())
            }
        }
    }

    /// Every mutation funnels through here: persist, report, re-derive the
    /// visible list. Lifecycle errors become transient messages and the loop
    /// keeps running; a failed save is reported, never retried.
    fn apply(&mut self, outcome: Result<String, TaskError>) -> Result<()> {
        match outcome {
            Ok(text) => {
                if let Err(err) = save_book(&self.location, &self.book) {
                    self.set_message(format!("{} (save failed: {:#})", text, err));
                } else {
                    self.set_message(text);
                }
            }
            Err(err) => self.set_message(err.to_string()),
        }
        self.refresh_rows();
        Ok(())
    }

    fn set_message(&mut self, text: String) {
        self.message = Some(Message {
            text,
            expires_at: Instant::now() + MESSAGE_TTL,
        });
    }

    fn refresh_rows(&mut self) {
        let now = Utc::now();
        let today = query::today(&self.book);
        self.visible_ids = today.iter().map(|t| t.id).collect();
        self.rows = today.iter().map(|t| query::summarize(t, now)).collect();
        if self.rows.is_empty() {
            self.selected = 0;
        } else if self.selected >= self.rows.len() {
            self.selected = self.rows.len() - 1;
        }
        self.warning = (self.book.running_ids().len() > 1)
            .then(|| "store has more than one running task; fix it by hand".to_string());
    }

    fn render_view(&self) -> RenderView<'_> {
        RenderView {
            rows: &self.rows,
            selected: self.selected,
            input: &self.input,
            cursor_on: self.cursor_on,
            message: self.message.as_ref().map(|m| m.text.as_str()),
            warning: self.warning.as_deref(),
            store: self.location.path.display().to_string(),
        }
    }
}

/// Everything the renderer needs for one frame; `draw` keeps no state of its
/// own.
struct RenderView<'a> {
    rows: &'a [TaskSummary],
    selected: usize,
    input: &'a str,
    cursor_on: bool,
    message: Option<&'a str>,
    warning: Option<&'a str>,
    store: String,
}

fn draw(f: &mut ratatui::Frame<'_>, view: &RenderView<'_>) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .split(f.size());

    draw_header(f, layout[0], view);
    draw_tasks(f, layout[1], view);
    draw_input(f, layout[2], view);
    draw_footer(f, layout[3], view);
}

fn draw_header(f: &mut ratatui::Frame<'_>, area: Rect, view: &RenderView<'_>) {
    let mut spans = vec![
        Span::styled(
            "taskclock",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(view.store.clone(), Style::default().fg(Color::DarkGray)),
    ];
    if let Some(warning) = view.warning {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("! {}", warning),
            Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_tasks(f: &mut ratatui::Frame<'_>, area: Rect, view: &RenderView<'_>) {
    let block = Block::default()
        .title(Span::styled(
            format!("Today ({})", view.rows.len()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    if view.rows.is_empty() {
        let empty = Paragraph::new("No tasks yet today. Type a name and press Enter to track one.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let items: Vec<ListItem<'_>> = view.rows.iter().map(task_row).collect();
    let mut state = ListState::default();
    state.select(Some(view.selected.min(view.rows.len() - 1)));
    let list = List::new(items)
        .block(block)
        .highlight_symbol("» ")
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(40, 44, 56))
                .add_modifier(Modifier::BOLD),
        );
    f.render_stateful_widget(list, area, &mut state);
}

fn task_row(row: &TaskSummary) -> ListItem<'static> {
    let (glyph, accent) = match row.status {
        Status::Running => ("▶", Color::Green),
        Status::Paused => ("‖", Color::Yellow),
        Status::Created => ("·", Color::DarkGray),
        Status::Stopped => ("✔", Color::DarkGray),
    };
    let spans = vec![
        Span::styled(format!(" {} ", glyph), Style::default().fg(accent)),
        Span::styled(format!("[{}] ", row.id), Style::default().fg(Color::DarkGray)),
        Span::styled(
            row.name.clone(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(row.elapsed.clone(), Style::default().fg(Color::Cyan)),
        Span::styled(
            format!(
                "  {} · {} session{}",
                row.status.label(),
                row.sessions,
                if row.sessions == 1 { "" } else { "s" }
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    ListItem::new(Line::from(spans))
}

fn draw_input(f: &mut ratatui::Frame<'_>, area: Rect, view: &RenderView<'_>) {
    let caret = if view.cursor_on { "▌" } else { " " };
    let line = Line::from(vec![
        Span::styled("> ", Style::default().fg(Color::Cyan)),
        Span::raw(view.input.to_string()),
        Span::styled(caret, Style::default().fg(Color::Cyan)),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    f.render_widget(Paragraph::new(line).block(block), area);
}

fn draw_footer(f: &mut ratatui::Frame<'_>, area: Rect, view: &RenderView<'_>) {
    let help = Line::from(Span::styled(
        "↑/↓ select · Enter toggle or run command · start/stop/exit · Esc clear/quit",
        Style::default().fg(Color::DarkGray),
    ));
    let status = match view.message {
        Some(text) => Line::from(Span::styled(text.to_string(), Style::default().fg(Color::Yellow))),
        None => Line::default(),
    };
    f.render_widget(Paragraph::new(vec![help, status]), area);
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
