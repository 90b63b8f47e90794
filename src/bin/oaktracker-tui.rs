use anyhow::Context;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use oaktracker::collapse::CollapseState;
use oaktracker::config::{ConfigArgs, TrackerConfig, DEFAULT_EXPORT_FILE};
use oaktracker::loader::load_datasets;
use oaktracker::logging;
use oaktracker::session::Session;
use oaktracker::store::FileStore;
use oaktracker::surface::{Marker, Region, RegionId, RegionTable, Tier, TABLE_COLUMNS};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect as UiRect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph, Tabs, Widget};
use ratatui::{Frame, Terminal};
use std::io::{self, stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// Widths of the location, habitat and sub-category columns. Items take the
/// remaining width.
const HEADER_COLUMN_WIDTHS: [u16; 3] = [24, 18, 16];

type TrackerSession = Session<FileStore>;

#[derive(Parser)]
#[command(name = "oaktracker-tui", about = "Collection tracker in the terminal")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum PromptKind {
    Download,
    Upload,
}

struct Prompt {
    kind: PromptKind,
    input: String,
}

/// `(x, width)` of every table column inside `area`.
fn column_bounds(area: UiRect) -> [(u16, u16); TABLE_COLUMNS as usize] {
    let mut bounds = [(area.x, 0); TABLE_COLUMNS as usize];
    let mut x = area.x;
    let mut remaining = area.width;
    for (i, bound) in bounds.iter_mut().enumerate() {
        let width = HEADER_COLUMN_WIDTHS.get(i).copied().unwrap_or(remaining).min(remaining);
        *bound = (x, width);
        x = x.saturating_add(width);
        remaining -= width;
    }
    bounds
}

fn span_width(bounds: &[(u16, u16)], column: u16, span: u16) -> u16 {
    bounds
        .iter()
        .skip(column as usize)
        .take(span as usize)
        .map(|(_, width)| *width)
        .sum()
}

fn column_at(bounds: &[(u16, u16)], x: u16) -> Option<u16> {
    bounds
        .iter()
        .position(|(x0, width)| x >= *x0 && x < x0.saturating_add(*width))
        .map(|i| i as u16)
}

fn point_in_rect(rect: UiRect, x: u16, y: u16) -> bool {
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}

fn start_session(config: &TrackerConfig) -> oaktracker::Result<TrackerSession> {
    let store = FileStore::open(config.state_file.clone())?;
    let datasets = load_datasets(config)?;
    Ok(Session::start(config, store, &datasets))
}

struct App {
    config: TrackerConfig,
    session: Option<TrackerSession>,
    load_rx: Option<Receiver<Result<TrackerSession, String>>>,
    load_started_at: Option<Instant>,
    status: String,

    table: usize,
    /// Index into the visible rows of the current table.
    cursor: usize,
    focus: u16,
    scroll: usize,
    prompt: Option<Prompt>,
    table_area: Option<UiRect>,

    should_quit: bool,
}

impl App {
    fn new(config: TrackerConfig) -> Self {
        Self {
            config,
            session: None,
            load_rx: None,
            load_started_at: None,
            status: String::new(),
            table: 0,
            cursor: 0,
            focus: 0,
            scroll: 0,
            prompt: None,
            table_area: None,
            should_quit: false,
        }
    }

    fn start_load(&mut self) {
        if self.load_rx.is_some() {
            return;
        }
        self.status = format!("Loading tables from {} ...", self.config.data_dir.display());
        self.load_started_at = Some(Instant::now());

        let (tx, rx) = mpsc::channel();
        self.load_rx = Some(rx);
        let config = self.config.clone();

        thread::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| start_session(&config)));
            let event = match result {
                Ok(Ok(session)) => Ok(session),
                Ok(Err(err)) => Err(err.to_string()),
                Err(_) => Err("Load thread panicked".to_string()),
            };
            let _ = tx.send(event);
        });
    }

    fn poll_load(&mut self) {
        let Some(rx) = self.load_rx.as_ref() else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err("Load channel disconnected".to_string()),
        };
        self.load_rx = None;

        match result {
            Ok(session) => {
                let elapsed = self
                    .load_started_at
                    .map(|t| t.elapsed().as_millis())
                    .unwrap_or_default();
                self.status = format!(
                    "Loaded {} tables in {} ms, progress saved to {}",
                    session.tables().len(),
                    elapsed,
                    session.store().path().display()
                );
                self.session = Some(session);
                self.table = 0;
                self.cursor = 0;
                self.scroll = 0;
            }
            Err(err) => {
                tracing::error!(error = %err, "load failed");
                self.status = format!("Load failed: {}", err);
            }
        }
    }

    fn view(&self) -> Option<&RegionTable> {
        self.session.as_ref()?.tables().get(self.table).map(|t| &t.view)
    }

    fn visible_rows(&self) -> Vec<usize> {
        self.view().map(RegionTable::visible_rows).unwrap_or_default()
    }

    fn focused_region(&self) -> Option<RegionId> {
        let view = self.view()?;
        let row = *self.visible_rows().get(self.cursor)?;
        let cells = view.visible_cells(row);
        cells
            .iter()
            .find(|cell| cell.covers(self.focus))
            .or_else(|| cells.iter().rev().find(|cell| cell.column <= self.focus))
            .map(|cell| cell.region.id.clone())
    }

    fn clamp_cursor(&mut self) {
        let rows = self.visible_rows().len();
        self.cursor = self.cursor.min(rows.saturating_sub(1));
    }

    fn move_cursor(&mut self, delta: isize) {
        let rows = self.visible_rows().len();
        if rows == 0 {
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(rows - 1);
    }

    /// Toggle an item's checkbox or a header's collapse state.
    fn activate(&mut self, region: &RegionId) {
        let table = self.table;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some((tier, clickable, label)) = session
            .tables()
            .get(table)
            .and_then(|t| t.view.region(region))
            .map(|r| (r.tier, r.has(Marker::Clickable), r.label.clone()))
        else {
            return;
        };

        if tier == Tier::Item {
            self.status = match session.toggle_item(table, region) {
                Ok(Some(true)) => format!("Collected {}", label),
                Ok(Some(false)) => format!("Unmarked {}", label),
                Ok(None) => return,
                Err(err) => format!("Could not save: {}", err),
            };
        } else if clickable {
            self.status = match session.toggle_collapse(table, region) {
                Some(CollapseState::Collapsed) => format!("Collapsed {}", label),
                Some(CollapseState::Expanded) => format!("Expanded {}", label),
                None => return,
            };
        }
        self.clamp_cursor();
    }

    fn activate_focused(&mut self) {
        if let Some(region) = self.focused_region() {
            self.activate(&region);
        }
    }

    fn switch_table(&mut self, forward: bool) {
        let Some(count) = self.session.as_ref().map(|s| s.tables().len()).filter(|c| *c > 0) else {
            return;
        };
        self.table = if forward {
            (self.table + 1) % count
        } else {
            (self.table + count - 1) % count
        };
        self.cursor = 0;
        self.scroll = 0;
    }

    fn collapse_all(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.collapse_all();
            self.status = "Collapsed all".to_string();
        }
        self.clamp_cursor();
    }

    fn expand_all(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.expand_all();
            self.status = "Expanded all".to_string();
        }
    }

    fn open_prompt(&mut self, kind: PromptKind) {
        if self.session.is_none() {
            return;
        }
        self.prompt = Some(Prompt {
            kind,
            input: DEFAULT_EXPORT_FILE.to_string(),
        });
    }

    fn submit_prompt(&mut self) {
        let Some(prompt) = self.prompt.take() else {
            return;
        };
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let path = PathBuf::from(prompt.input.trim());
        self.status = match prompt.kind {
            PromptKind::Download => match session.download(&path) {
                Ok(()) => format!("Exported to {}", path.display()),
                Err(err) => format!("Export failed: {}", err),
            },
            PromptKind::Upload => match session.upload(&path) {
                Ok(entries) => format!("Imported {} entries from {}", entries, path.display()),
                Err(err) => format!("Import failed: {}", err),
            },
        };
    }

    fn on_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && matches!(key.code, KeyCode::Char('c')) {
            self.should_quit = true;
            return;
        }

        if self.prompt.is_some() {
            match key.code {
                KeyCode::Enter => self.submit_prompt(),
                KeyCode::Esc => self.prompt = None,
                KeyCode::Backspace => {
                    if let Some(prompt) = self.prompt.as_mut() {
                        prompt.input.pop();
                    }
                }
                KeyCode::Char(ch) => {
                    if let Some(prompt) = self.prompt.as_mut() {
                        prompt.input.push(ch);
                    }
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => self.start_load(),
            KeyCode::Up | KeyCode::Char('k') => self.move_cursor(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_cursor(1),
            KeyCode::PageUp => self.move_cursor(-10),
            KeyCode::PageDown => self.move_cursor(10),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.move_cursor(isize::MAX),
            KeyCode::Left | KeyCode::Char('h') => self.focus = self.focus.saturating_sub(1),
            KeyCode::Right | KeyCode::Char('l') => self.focus = (self.focus + 1).min(TABLE_COLUMNS - 1),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate_focused(),
            KeyCode::Tab => self.switch_table(true),
            KeyCode::BackTab => self.switch_table(false),
            KeyCode::Char('a') => self.collapse_all(),
            KeyCode::Char('e') => self.expand_all(),
            KeyCode::Char('d') => self.open_prompt(PromptKind::Download),
            KeyCode::Char('u') => self.open_prompt(PromptKind::Upload),
            _ => {}
        }
    }

    fn on_mouse(&mut self, event: MouseEvent) {
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {}
            MouseEventKind::ScrollUp => return self.move_cursor(-3),
            MouseEventKind::ScrollDown => return self.move_cursor(3),
            _ => return,
        }
        let Some(area) = self.table_area else {
            return;
        };
        if !point_in_rect(area, event.column, event.row) {
            return;
        }
        let line = self.scroll + (event.row - area.y) as usize;
        if line >= self.visible_rows().len() {
            return;
        }
        let Some(column) = column_at(&column_bounds(area), event.column) else {
            return;
        };
        self.cursor = line;
        self.focus = column;
        self.activate_focused();
    }
}

fn cell_text(region: &Region) -> String {
    if region.tier == Tier::Item {
        let mark = if region.checked { "[x]" } else { "[ ]" };
        return match region.detail.as_deref() {
            Some(detail) => format!("{} {}  {}", mark, region.label, detail),
            None => format!("{} {}", mark, region.label),
        };
    }

    let arrow = if region.has(Marker::Collapsed) { '▸' } else { '▾' };
    match region.badge.as_deref() {
        Some(badge) => format!("{} {} ({})", arrow, region.label, badge),
        None => format!("{} {}", arrow, region.label),
    }
}

fn cell_style(region: &Region, focused: bool, on_cursor: bool) -> Style {
    let fg = if region.has(Marker::Completed) {
        Color::Rgb(120, 200, 120)
    } else if region.has(Marker::Special) {
        Color::Rgb(200, 160, 230)
    } else {
        Color::Rgb(224, 224, 224)
    };
    let bg = if focused {
        Color::Rgb(70, 70, 110)
    } else if on_cursor {
        Color::Rgb(36, 36, 48)
    } else {
        Color::Rgb(18, 18, 20)
    };
    let style = Style::default().fg(fg).bg(bg);
    if region.tier == Tier::Location {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

struct TrackerWidget<'a> {
    view: &'a RegionTable,
    rows: &'a [usize],
    scroll: usize,
    cursor: usize,
    focus: u16,
}

impl Widget for TrackerWidget<'_> {
    fn render(self, area: UiRect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 {
            return;
        }
        let bounds = column_bounds(area);
        let lines = self.rows.iter().skip(self.scroll).take(area.height as usize);

        for (line, &row) in lines.enumerate() {
            let y = area.y + line as u16;
            let on_cursor = self.scroll + line == self.cursor;
            for cell in self.view.visible_cells(row) {
                let (x, _) = bounds[cell.column as usize];
                let width = span_width(&bounds, cell.column, cell.span) as usize;
                if width == 0 {
                    continue;
                }
                // Repeat the label on the top line when its first row is scrolled off.
                let text = if cell.starts || line == 0 {
                    cell_text(cell.region)
                } else {
                    String::new()
                };
                let style = cell_style(cell.region, on_cursor && cell.covers(self.focus), on_cursor);
                buf.set_stringn(x, y, format!("{:width$}", text, width = width), width, style);
            }
        }
    }
}

fn draw_ui(frame: &mut Frame, app: &mut App) {
    let rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(5),
        Constraint::Length(3),
        Constraint::Length(3),
    ])
    .split(frame.area());

    let titles: Vec<Line> = app
        .session
        .as_ref()
        .map(|session| {
            session
                .tables()
                .iter()
                .map(|t| {
                    let leaves: Vec<_> = t.view.regions().filter(|r| r.tier == Tier::Item).collect();
                    let collected = leaves.iter().filter(|r| r.checked).count();
                    Line::from(format!("{} {}/{}", t.name(), collected, leaves.len()))
                })
                .collect()
        })
        .unwrap_or_default();
    frame.render_widget(
        Tabs::new(titles)
            .select(app.table)
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .block(Block::default().title(" OakTracker ").borders(Borders::ALL)),
        rows[0],
    );

    let table_block = Block::default().borders(Borders::ALL);
    let table_inner = table_block.inner(rows[1]);
    frame.render_widget(table_block, rows[1]);
    app.table_area = Some(table_inner);

    let visible = app.visible_rows();
    let height = table_inner.height as usize;
    if app.cursor < app.scroll {
        app.scroll = app.cursor;
    } else if height > 0 && app.cursor >= app.scroll + height {
        app.scroll = app.cursor + 1 - height;
    }

    match app.view() {
        Some(view) if !visible.is_empty() => frame.render_widget(
            TrackerWidget {
                view,
                rows: &visible,
                scroll: app.scroll,
                cursor: app.cursor,
                focus: app.focus,
            },
            table_inner,
        ),
        _ => {
            let message = if app.load_rx.is_some() {
                "Loading..."
            } else {
                "Nothing to show. Press r to reload."
            };
            frame.render_widget(
                Paragraph::new(message).style(Style::default().fg(Color::Gray)),
                table_inner,
            );
        }
    }

    let status = match app.prompt.as_ref() {
        Some(prompt) => {
            let label = match prompt.kind {
                PromptKind::Download => "Export to",
                PromptKind::Upload => "Import from",
            };
            Paragraph::new(format!("{}: {}", label, prompt.input)).style(Style::default().fg(Color::Yellow))
        }
        None => Paragraph::new(app.status.as_str()),
    };
    frame.render_widget(
        status.block(Block::default().title(" Status ").borders(Borders::ALL)),
        rows[2],
    );

    frame.render_widget(
        Paragraph::new(
            "Space/Enter/click: toggle   ←→↑↓: move   Tab: table   a/e: collapse/expand all   d/u: export/import   r: reload   q: quit",
        )
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().title(" Controls ").borders(Borders::ALL)),
        rows[3],
    );
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, config: TrackerConfig) -> io::Result<()> {
    let mut app = App::new(config);
    app.start_load();

    loop {
        app.poll_load();

        terminal.draw(|frame| {
            draw_ui(frame, &mut app);
        })?;

        if app.should_quit {
            break;
        }

        if event::poll(Duration::from_millis(50))? {
            match event::read()? {
                Event::Key(key) => app.on_key(key),
                Event::Mouse(mouse) => app.on_mouse(mouse),
                Event::Resize(_, _) => {}
                Event::FocusGained | Event::FocusLost | Event::Paste(_) => {}
            }
        }
    }

    Ok(())
}

/// The alternate screen owns the terminal, so logs go next to the state file.
fn default_log_file(state_file: &Path) -> PathBuf {
    state_file.with_file_name("oaktracker-tui.log")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config.into_config();
    config.validate()?;

    let log_file = config
        .log_file
        .clone()
        .unwrap_or_else(|| default_log_file(&config.state_file));
    logging::init(Some(log_file.as_path())).context("initialising logging")?;

    enable_raw_mode()?;
    crossterm::execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let app_result = run_app(&mut terminal, config);

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    app_result.context("terminal session failed")
}
