use crate::config::WatchArg;
use crate::monitor::{AlertRecord, ControllerHandle, MonitorEvent, Watch};
use crate::notify::DynError;
use chrono::Local;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Alerts shown on screen; the store keeps more.
pub const HISTORY_DISPLAY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Watches,
    History,
}

/// Everything the dashboard draws, rebuilt from controller events.
#[derive(Debug)]
pub struct DashboardState {
    pub watches: Vec<Watch>,
    pub history: Vec<AlertRecord>,
    pub prices: HashMap<String, Decimal>,
    pub connected: bool,
    pub last_alert: Option<AlertRecord>,
    pub focus: Pane,
    pub selected: usize,
    pub input: Option<String>,
    pub status: Option<String>,
    pub running: bool,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            watches: Vec::new(),
            history: Vec::new(),
            prices: HashMap::new(),
            connected: false,
            last_alert: None,
            focus: Pane::Watches,
            selected: 0,
            input: None,
            status: None,
            running: true,
        }
    }
}

impl DashboardState {
    pub fn apply(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::WatchListChanged(watches) => self.watches = watches,
            MonitorEvent::HistoryChanged(history) => self.history = history,
            MonitorEvent::AlertRaised(record) => self.last_alert = Some(record),
            MonitorEvent::PricesUpdated(prices) => self.prices.extend(prices),
            MonitorEvent::ConnectionChanged(connected) => self.connected = connected,
        }
        self.clamp_selection();
    }

    fn visible_len(&self) -> usize {
        match self.focus {
            Pane::Watches => self.watches.len(),
            Pane::History => self.history.len().min(HISTORY_DISPLAY_LIMIT),
        }
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.visible_len().saturating_sub(1));
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Pane::Watches => Pane::History,
            Pane::History => Pane::Watches,
        };
        self.selected = 0;
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.visible_len() {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn selected_watch(&self) -> Option<&Watch> {
        match self.focus {
            Pane::Watches => self.watches.get(self.selected),
            Pane::History => None,
        }
    }

    pub fn selected_alert_index(&self) -> Option<usize> {
        match self.focus {
            Pane::History if self.selected < self.visible_len() => Some(self.selected),
            _ => None,
        }
    }
}

pub struct Dashboard {
    handle: ControllerHandle,
    events: broadcast::Receiver<MonitorEvent>,
    state: DashboardState,
}

impl Dashboard {
    pub fn new(handle: ControllerHandle, events: broadcast::Receiver<MonitorEvent>) -> Self {
        Self {
            handle,
            events,
            state: DashboardState::default(),
        }
    }

    pub async fn run(mut self) -> Result<(), DynError> {
        self.resync().await?;

        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal).await;

        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), DynError> {
        while self.state.running {
            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key_input(key).await;
                    }
                }
            }

            loop {
                match self.events.try_recv() {
                    Ok(event) => self.state.apply(event),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Lagged(skipped)) => {
                        warn!("Dashboard fell behind by {} events, resyncing", skipped);
                        self.resync().await?;
                    }
                    Err(TryRecvError::Closed) => {
                        self.state.running = false;
                        break;
                    }
                }
            }

            let state = &self.state;
            terminal.draw(|f| render(f, state))?;
        }
        Ok(())
    }

    async fn resync(&mut self) -> Result<(), DynError> {
        self.state.watches = self.handle.list_watches().await?;
        self.state.history = self.handle.list_history().await?;
        self.state.connected = self.handle.is_connected().await?;
        self.state.prices.extend(self.handle.watched_prices().await?);
        self.state.clamp_selection();
        Ok(())
    }

    async fn handle_key_input(&mut self, key: KeyEvent) {
        if let Some(input) = self.state.input.as_mut() {
            match key.code {
                KeyCode::Char(c) => input.push(c),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Esc => self.state.input = None,
                KeyCode::Enter => {
                    let line = self.state.input.take().unwrap_or_default();
                    self.submit_watch(&line).await;
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.state.running = false,
            KeyCode::Tab => self.state.toggle_focus(),
            KeyCode::Up => self.state.select_previous(),
            KeyCode::Down => self.state.select_next(),
            KeyCode::Char('n') => {
                self.state.input = Some(String::new());
                self.state.status = None;
            }
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected().await,
            KeyCode::Char('c') => {
                let outcome = self.handle.clear_history().await;
                self.report(outcome.map(|_| "History cleared".to_string()));
            }
            _ => {}
        }
    }

    async fn submit_watch(&mut self, line: &str) {
        let arg = match line.parse::<WatchArg>() {
            Ok(arg) => arg,
            Err(e) => {
                self.state.status = Some(e);
                return;
            }
        };
        let outcome = self
            .handle
            .add_watch(&arg.symbol, arg.lower, arg.upper)
            .await;
        self.report(outcome.map(|w| format!("Watching {}", w.symbol())));
    }

    async fn delete_selected(&mut self) {
        if let Some(symbol) = self.state.selected_watch().map(|w| w.symbol().to_string()) {
            let outcome = self.handle.remove_watch(&symbol).await;
            self.report(outcome.map(|_| format!("Removed {}", symbol)));
        } else if let Some(index) = self.state.selected_alert_index() {
            let outcome = self.handle.delete_history_entry(index).await;
            self.report(outcome.map(|_| "Alert deleted".to_string()));
        }
    }

    fn report<E: std::fmt::Display>(&mut self, outcome: Result<String, E>) {
        self.state.status = Some(match outcome {
            Ok(message) => message,
            Err(e) => format!("Error: {}", e),
        });
    }
}

fn render(f: &mut Frame<CrosstermBackend<io::Stdout>>, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(2),
            Constraint::Length(2),
        ])
        .split(f.size());

    render_header(f, chunks[0], state);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);
    render_watches(f, panes[0], state);
    render_history(f, panes[1], state);

    render_status(f, chunks[2], state);
    render_footer(f, chunks[3], state);
}

fn selected_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn pane_block(title: &str, focused: bool) -> Block<'_> {
    let block = Block::default().borders(Borders::ALL).title(title);
    if focused {
        block.border_style(Style::default().fg(Color::LightCyan))
    } else {
        block
    }
}

fn render_header(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, state: &DashboardState) {
    let connection_status = if state.connected {
        Span::styled("CONNECTED", Style::default().fg(Color::Green))
    } else {
        Span::styled("DISCONNECTED", Style::default().fg(Color::Red))
    };

    let header = Paragraph::new(Text::from(vec![
        Line::from(vec![
            Span::styled(
                "PRICEWATCH ",
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD),
            ),
            connection_status,
        ]),
        Line::from(Span::styled(
            format!(
                "Last update: {} | Watches: {} | Alerts: {}",
                Local::now().format("%H:%M:%S"),
                state.watches.len(),
                state.history.len()
            ),
            Style::default().fg(Color::Gray),
        )),
    ]))
    .block(Block::default().borders(Borders::BOTTOM));

    f.render_widget(header, area);
}

fn render_watches(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, state: &DashboardState) {
    let focused = state.focus == Pane::Watches;
    let block = pane_block("Watches", focused);
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    if inner_area.height < 2 || inner_area.width < 30 {
        return;
    }

    if state.watches.is_empty() {
        let hint = Paragraph::new("No watches. Press n to add one.")
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(hint, inner_area);
        return;
    }

    let rows = state.watches.iter().enumerate().map(|(i, watch)| {
        let price = state.prices.get(watch.symbol()).copied();
        let price_cell = match price {
            Some(price) if watch.check(price).is_some() => Cell::from(Span::styled(
                format_price(price),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Some(price) => Cell::from(Span::styled(
                format_price(price),
                Style::default().fg(Color::Green),
            )),
            None => Cell::from(Span::styled(
                "waiting...",
                Style::default().fg(Color::DarkGray),
            )),
        };

        Row::new(vec![
            Cell::from(watch.symbol().to_string()),
            price_cell,
            Cell::from(watch.lower().to_string()),
            Cell::from(watch.upper().to_string()),
        ])
        .style(if focused && i == state.selected {
            selected_style()
        } else {
            Style::default()
        })
    });

    let table = Table::new(rows)
        .header(
            Row::new(vec!["Pair", "Price", "Lower", "Upper"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .widths(&[
            Constraint::Length(14),
            Constraint::Length(14),
            Constraint::Length(12),
            Constraint::Length(12),
        ]);

    f.render_widget(table, inner_area);
}

fn render_history(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, state: &DashboardState) {
    let focused = state.focus == Pane::History;
    let block = pane_block("Alert History", focused);
    let inner_area = block.inner(area);
    f.render_widget(block, area);

    if inner_area.height < 2 || inner_area.width < 30 {
        return;
    }

    let rows = state
        .history
        .iter()
        .take(HISTORY_DISPLAY_LIMIT)
        .enumerate()
        .map(|(i, record)| {
            Row::new(vec![
                Cell::from(
                    record
                        .timestamp
                        .with_timezone(&Local)
                        .format("%m-%d %H:%M:%S")
                        .to_string(),
                ),
                Cell::from(record.symbol.clone()),
                Cell::from(record.breach.to_string()),
                Cell::from(Span::styled(
                    format_price(record.price),
                    Style::default().fg(Color::Red),
                )),
            ])
            .style(if focused && i == state.selected {
                selected_style()
            } else {
                Style::default()
            })
        });

    let table = Table::new(rows)
        .header(
            Row::new(vec!["Time", "Pair", "Breach", "Price"])
                .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .widths(&[
            Constraint::Length(15),
            Constraint::Length(12),
            Constraint::Length(18),
            Constraint::Length(14),
        ]);

    f.render_widget(table, inner_area);
}

fn render_status(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, state: &DashboardState) {
    let line = if let Some(input) = &state.input {
        Line::from(vec![
            Span::styled("New watch (SYMBOL LOWER UPPER): ", Style::default().fg(Color::Cyan)),
            Span::raw(input.clone()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ])
    } else if let Some(status) = &state.status {
        Line::from(Span::styled(status.clone(), Style::default().fg(Color::Yellow)))
    } else if let Some(alert) = &state.last_alert {
        Line::from(Span::styled(
            format!(
                "ALERT {} {} at {}",
                alert.symbol,
                alert.breach,
                format_price(alert.price).trim()
            ),
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ))
    } else {
        Line::from("")
    };

    f.render_widget(Paragraph::new(line), area);
}

fn render_footer(f: &mut Frame<CrosstermBackend<io::Stdout>>, area: Rect, state: &DashboardState) {
    let controls = if state.input.is_some() {
        vec![
            Span::styled("Enter", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Add  "),
            Span::styled("Esc", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Cancel"),
        ]
    } else {
        vec![
            Span::raw("Controls: "),
            Span::styled("↑/↓", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Navigate  "),
            Span::styled("Tab", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Switch pane  "),
            Span::styled("n", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" New watch  "),
            Span::styled("d", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Delete  "),
            Span::styled("c", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Clear alerts  "),
            Span::styled("q", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" Quit"),
        ]
    };

    let footer = Paragraph::new(Line::from(controls))
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::TOP));

    f.render_widget(footer, area);
}

fn format_price(price: Decimal) -> String {
    if price > Decimal::from(1000) {
        format!("${:>10.2}", price.round_dp(2))
    } else {
        format!("${:>10.4}", price.round_dp(4))
    }
}
