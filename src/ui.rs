use crate::cli::validate_text;
use crate::notify::{DesktopNotifier, PermissionOutcome};
use crate::reminder::{Reminder, ReminderScheduler};
use crate::storage::Storage;
use crate::store::TaskStore;
use crate::task::{DueDate, Priority, Task, TaskFields};
use crate::theme::Theme;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use ratatui::{
    backend::Backend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::{cell::RefCell, collections::VecDeque, io, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Text,
    Priority,
    Due,
}

/// Add/edit form. `editing` is the id being edited, `None` for a new task.
#[derive(Debug, Clone)]
struct TaskForm {
    editing: Option<i64>,
    text: String,
    priority: Priority,
    due: String,
    field: Field,
}

impl TaskForm {
    fn blank() -> Self {
        Self {
            editing: None,
            text: String::new(),
            priority: Priority::default(),
            due: String::new(),
            field: Field::Text,
        }
    }

    fn for_task(task: &Task) -> Self {
        Self {
            editing: Some(task.id),
            text: task.text.clone(),
            priority: task.priority,
            due: task.due_date.as_str().to_string(),
            field: Field::Text,
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            Field::Text => Field::Priority,
            Field::Priority => Field::Due,
            Field::Due => Field::Text,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            Field::Text => Field::Due,
            Field::Priority => Field::Text,
            Field::Due => Field::Priority,
        };
    }
}

#[derive(Debug, Clone)]
enum Mode {
    Normal,
    Search,
    Form(TaskForm),
}

pub struct App {
    store: TaskStore,
    scheduler: ReminderScheduler,
    desktop: Rc<RefCell<DesktopNotifier>>,
    prefs: Box<dyn Storage>,
    theme: Theme,
    query: String,
    selected: usize,
    mode: Mode,
    popups: VecDeque<Reminder>,
    status: Option<String>,
}

impl App {
    pub fn new(
        store: TaskStore,
        scheduler: ReminderScheduler,
        desktop: Rc<RefCell<DesktopNotifier>>,
        prefs: Box<dyn Storage>,
    ) -> Self {
        let theme = Theme::load(prefs.as_ref());
        Self {
            store,
            scheduler,
            desktop,
            prefs,
            theme,
            query: String::new(),
            selected: 0,
            mode: Mode::Normal,
            popups: VecDeque::new(),
            status: None,
        }
    }

    /// Runs a scheduler tick if one is due and queues the popups it fired.
    /// The store is reloaded first so tasks added by `taskminder add` in
    /// another shell show up and get reminded.
    pub fn poll_reminders(&mut self) {
        if !self.scheduler.until_next_tick().is_zero() {
            return;
        }
        self.store.reload();
        self.clamp_selection();
        let fired = self.scheduler.poll(&mut self.store);
        self.popups.extend(fired);
    }

    fn selected_id(&self) -> Option<i64> {
        self.store
            .visible_order(&self.query)
            .get(self.selected)
            .map(|t| t.id)
    }

    fn clamp_selection(&mut self) {
        let len = self.store.visible_order(&self.query).len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    /// Returns `false` when the app should quit.
    pub fn handle_key(&mut self, code: KeyCode) -> bool {
        if !self.popups.is_empty() {
            if matches!(code, KeyCode::Esc | KeyCode::Enter) {
                self.popups.pop_front();
            }
            return true;
        }
        match std::mem::replace(&mut self.mode, Mode::Normal) {
            Mode::Normal => return self.handle_normal(code),
            Mode::Search => self.handle_search(code),
            Mode::Form(form) => self.handle_form(form, code),
        }
        true
    }

    fn handle_normal(&mut self, code: KeyCode) -> bool {
        self.status = None;
        match code {
            KeyCode::Char('q') => return false,
            KeyCode::Char('a') => self.mode = Mode::Form(TaskForm::blank()),
            KeyCode::Char('e') => {
                if let Some(task) = self.selected_id().and_then(|id| self.store.get(id)) {
                    self.mode = Mode::Form(TaskForm::for_task(task));
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    self.store.toggle_completed(id);
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_id() {
                    self.store.remove(id);
                    self.clamp_selection();
                }
            }
            KeyCode::Char('c') => {
                let removed = self.store.clear_completed();
                self.status = Some(format!("Cleared {removed} completed task(s)"));
                self.clamp_selection();
            }
            KeyCode::Char('/') => self.mode = Mode::Search,
            KeyCode::Char('n') => self.request_notifications(),
            KeyCode::Char('t') => {
                self.theme = self.theme.toggled();
                self.theme.save(self.prefs.as_mut());
            }
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.selected += 1;
                self.clamp_selection();
            }
            _ => {}
        }
        true
    }

    fn handle_search(&mut self, code: KeyCode) {
        match code {
            KeyCode::Esc => self.query.clear(),
            KeyCode::Enter => {}
            KeyCode::Backspace => {
                self.query.pop();
                self.mode = Mode::Search;
            }
            KeyCode::Char(c) => {
                self.query.push(c);
                self.mode = Mode::Search;
            }
            _ => self.mode = Mode::Search,
        }
        self.selected = 0;
    }

    fn handle_form(&mut self, mut form: TaskForm, code: KeyCode) {
        match code {
            KeyCode::Esc => return,
            KeyCode::Enter => {
                if self.submit(&form) {
                    return;
                }
            }
            KeyCode::Tab | KeyCode::Down => form.next_field(),
            KeyCode::BackTab | KeyCode::Up => form.prev_field(),
            KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') if form.field == Field::Priority => {
                form.priority = form.priority.next();
            }
            KeyCode::Backspace => match form.field {
                Field::Text => {
                    form.text.pop();
                }
                Field::Due => {
                    form.due.pop();
                }
                Field::Priority => {}
            },
            KeyCode::Char(c) => match form.field {
                Field::Text => form.text.push(c),
                Field::Due => form.due.push(c),
                Field::Priority => {
                    if let Ok(priority) = c.to_string().parse::<Priority>() {
                        form.priority = priority;
                    }
                }
            },
            _ => {}
        }
        self.mode = Mode::Form(form);
    }

    /// Applies the form to the store. Returns `false` if the form stays open.
    fn submit(&mut self, form: &TaskForm) -> bool {
        let text = match validate_text(&form.text) {
            Ok(text) => text,
            Err(err) => {
                self.status = Some(err.to_string());
                return false;
            }
        };
        let due_date = DueDate::new(form.due.trim());
        self.status = (!due_date.is_empty() && !due_date.is_valid())
            .then(|| format!("'{}' is not a date; no reminder will fire", due_date.as_str()));
        let fields = TaskFields::new(text, form.priority, due_date);
        match form.editing {
            Some(id) => {
                self.store.update(id, fields);
            }
            None => {
                self.store.add(fields);
            }
        }
        true
    }

    fn request_notifications(&mut self) {
        let outcome = self.desktop.borrow_mut().request_permission();
        self.status = Some(
            match outcome {
                PermissionOutcome::Unsupported => "Desktop notifications are not supported here",
                PermissionOutcome::Blocked => {
                    "Notifications are blocked. Run `taskminder notify --reset` to allow them."
                }
                PermissionOutcome::Granted => "Notifications enabled",
            }
            .to_string(),
        );
    }
}

pub fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.poll_reminders();
        terminal.draw(|f| draw(f, app))?;

        if event::poll(app.scheduler.until_next_tick())? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !app.handle_key(key.code) {
                    return Ok(());
                }
            }
        }
    }
}

fn draw(f: &mut Frame, app: &App) {
    let palette = app.theme.palette();
    let base = Style::default().fg(palette.text).bg(palette.background);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(vec![
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(f.area());

    let searching = matches!(app.mode, Mode::Search);
    let search = Paragraph::new(Line::from(vec![
        Span::styled("Search: ", Style::default().fg(palette.muted)),
        Span::raw(app.query.as_str()),
        Span::raw(if searching { "_" } else { "" }),
    ]))
    .style(base)
    .block(
        Block::default()
            .title("taskminder")
            .borders(Borders::ALL)
            .border_style(if searching {
                Style::default().fg(palette.accent)
            } else {
                Style::default()
            }),
    );
    f.render_widget(search, chunks[0]);

    let items: Vec<ListItem> = app
        .store
        .visible_order(&app.query)
        .into_iter()
        .map(|t| {
            let text_style = if t.completed {
                Style::default()
                    .fg(palette.muted)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(palette.text)
            };
            ListItem::new(Line::from(vec![
                Span::raw(if t.completed { "[x] " } else { "[ ] " }),
                Span::styled(t.text.as_str(), text_style),
                Span::raw("  "),
                Span::styled("●", Style::default().fg(palette.priority(t.priority))),
                Span::styled(
                    format!(" {} • Due: {}", t.priority, t.due_date.display()),
                    Style::default().fg(palette.muted),
                ),
            ]))
        })
        .collect();
    let list = List::new(items)
        .style(base)
        .block(Block::default().title("Tasks").borders(Borders::ALL))
        .highlight_style(Style::default().fg(palette.accent).add_modifier(Modifier::BOLD));
    let mut state = ListState::default().with_selected(Some(app.selected));
    f.render_stateful_widget(list, chunks[1], &mut state);

    let footer_text = match &app.status {
        Some(status) => format!("{} | {}", app.store.pending_label(), status),
        None => format!(
            "{} | a add  e edit  space done  d delete  c clear  / search  n notify  t theme  q quit",
            app.store.pending_label()
        ),
    };
    let footer = Paragraph::new(footer_text)
        .style(base)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(footer, chunks[2]);

    if let Mode::Form(form) = &app.mode {
        draw_form(f, app, form);
    }
    if let Some(reminder) = app.popups.front() {
        let area = centered(f.area(), 50, 7);
        let popup = Paragraph::new(vec![
            Line::from(format!("It's time to complete: {}", reminder.text)),
            Line::from(""),
            Line::from(Span::styled("Enter/Esc to dismiss", Style::default().fg(palette.muted))),
        ])
        .wrap(Wrap { trim: true })
        .style(base)
        .block(
            Block::default()
                .title("Task Due!")
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.high)),
        );
        f.render_widget(Clear, area);
        f.render_widget(popup, area);
    }
}

fn draw_form(f: &mut Frame, app: &App, form: &TaskForm) {
    let palette = app.theme.palette();
    let row = |field: Field, label: &str, value: String| {
        let style = if form.field == field {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };
        Line::from(vec![
            Span::styled(format!("{label:<10}"), style),
            Span::raw(value),
        ])
    };
    let lines = vec![
        row(Field::Text, "Task", form.text.clone()),
        row(Field::Priority, "Priority", form.priority.to_string()),
        row(Field::Due, "Due", form.due.clone()),
        Line::from(Span::styled(
            "YYYY-MM-DDTHH:MM  Tab next  Enter save  Esc cancel",
            Style::default().fg(palette.muted),
        )),
    ];
    let title = if form.editing.is_some() {
        "Update Task"
    } else {
        "Add Task"
    };
    let area = centered(f.area(), 60, 6);
    let widget = Paragraph::new(lines)
        .style(Style::default().fg(palette.text).bg(palette.background))
        .block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(Clear, area);
    f.render_widget(widget, area);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
