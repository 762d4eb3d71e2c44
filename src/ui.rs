use agent_ledger::db::{delete_agent, get_transaction, insert_transaction, open_database, update_transaction};
use agent_ledger::listing::{transaction_listing, TransactionRow};
use agent_ledger::reports::{report_data, DateWindow, ReportData, DEFAULT_TRAILING_DAYS};
use agent_ledger::shaping::{
    shape, AgentRow, ReportSummary, RequestGate, RequestTicket, ShapedPage, SortDirection,
    SortKey, ViewState,
};
use agent_ledger::models::{NewTransaction, TransactionUpdate};
use agent_ledger::{LedgerError, LedgerResult, Region};
use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Sparkline, Table, TableState},
    Frame, Terminal,
};
use rusqlite::Connection;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Agents,
    Transactions,
    Report,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Agents => Page::Transactions,
            Page::Transactions => Page::Report,
            Page::Report => Page::Agents,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Agents => Page::Report,
            Page::Transactions => Page::Agents,
            Page::Report => Page::Transactions,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Agents => "Agents",
            Page::Transactions => "Transactions",
            Page::Report => "Report",
        }
    }
}

/// Date windows offered on the Report page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportPreset {
    /// No bounds: all-time bars, trailing daily series
    Default,
    Last7Days,
    Last30Days,
    ThisMonth,
}

impl ReportPreset {
    pub fn title(&self) -> String {
        match self {
            ReportPreset::Default => format!("All time / last {} days", DEFAULT_TRAILING_DAYS),
            ReportPreset::Last7Days => "Last 7 days".to_string(),
            ReportPreset::Last30Days => "Last 30 days".to_string(),
            ReportPreset::ThisMonth => "This month".to_string(),
        }
    }

    pub fn window(&self, today: NaiveDate) -> LedgerResult<DateWindow> {
        match self {
            ReportPreset::Default => Ok(DateWindow::unbounded()),
            ReportPreset::Last7Days => DateWindow::new(today.checked_sub_days(Days::new(6)), Some(today)),
            ReportPreset::Last30Days => DateWindow::new(today.checked_sub_days(Days::new(29)), Some(today)),
            ReportPreset::ThisMonth => DateWindow::new(today.with_day(1), Some(today)),
        }
    }
}

type ReportMessage = (RequestTicket, LedgerResult<ReportData>);

/// What an entered amount is applied to.
#[derive(Debug, Clone, PartialEq)]
pub enum AmountTarget {
    NewTransaction { agent_id: String, agent_name: String },
    EditTransaction { transaction_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmountPrompt {
    pub target: AmountTarget,
    pub input: String,
}

impl AmountPrompt {
    fn label(&self) -> String {
        match &self.target {
            AmountTarget::NewTransaction { agent_name, .. } => format!("New amount for {}", agent_name),
            AmountTarget::EditTransaction { .. } => "Edit amount".to_string(),
        }
    }
}

pub struct App {
    db_path: PathBuf,
    conn: Connection,
    pub agents: Vec<AgentRow>,
    pub transactions: Vec<TransactionRow>,
    pub agent_view: ViewState,
    pub transaction_view: ViewState,
    pub current_page: Page,
    pub state: TableState,
    /// Some while the search prompt is open
    pub search_input: Option<String>,
    pub amount_prompt: Option<AmountPrompt>,
    pub report: ReportData,
    pub report_preset: ReportPreset,
    pub report_error: Option<String>,
    report_gate: RequestGate,
    report_tx: Sender<ReportMessage>,
    report_rx: Receiver<ReportMessage>,
    pub status: Option<String>,
}

impl App {
    pub fn new(db_path: PathBuf) -> LedgerResult<Self> {
        let conn = open_database(&db_path)?;
        let (report_tx, report_rx) = mpsc::channel();

        let mut app = Self {
            db_path,
            conn,
            agents: Vec::new(),
            transactions: Vec::new(),
            agent_view: ViewState::for_agents(),
            transaction_view: ViewState::for_transactions(),
            current_page: Page::Agents,
            state: TableState::default(),
            search_input: None,
            amount_prompt: None,
            report: ReportData::default(),
            report_preset: ReportPreset::Default,
            report_error: None,
            report_gate: RequestGate::new(),
            report_tx,
            report_rx,
            status: None,
        };

        app.reload_listing()?;
        app.request_report();
        Ok(app)
    }

    /// Re-fetch agents and transactions as one snapshot.
    pub fn reload_listing(&mut self) -> LedgerResult<()> {
        let listing = transaction_listing(&mut self.conn)?;
        self.agents = listing.agents.into_iter().map(AgentRow::from).collect();
        self.transactions = listing.transactions;
        self.reset_selection();
        debug!(
            "Listing reloaded: {} agents, {} transactions",
            self.agents.len(),
            self.transactions.len()
        );
        Ok(())
    }

    /// Load the report for the current preset on a worker thread.
    pub fn request_report(&mut self) {
        let ticket = self.report_gate.issue();
        let today = Utc::now().date_naive();
        let window = self.report_preset.window(today);
        let db_path = self.db_path.clone();
        let sender = self.report_tx.clone();

        thread::spawn(move || {
            let result = window.and_then(|window| {
                let mut conn = open_database(&db_path)?;
                report_data(&mut conn, &window, today)
            });
            // The receiver is gone only when the app has exited
            let _ = sender.send((ticket, result));
        });
    }

    /// Apply whatever report responses have arrived; stale ones are dropped.
    pub fn poll_reports(&mut self) {
        while let Ok((ticket, result)) = self.report_rx.try_recv() {
            match self.report_gate.accept(ticket, result) {
                Some(Ok(report)) => {
                    self.report = report;
                    self.report_error = None;
                }
                Some(Err(e)) => {
                    error!("Report failed: {}", e);
                    self.report_error = Some("Report could not be loaded, press r to retry".to_string());
                }
                None => debug!("Dropped superseded report response"),
            }
        }
    }

    pub fn report_loading(&self) -> bool {
        self.report_gate.is_loading()
    }

    pub fn set_report_preset(&mut self, preset: ReportPreset) {
        if self.report_preset != preset {
            self.report_preset = preset;
            self.request_report();
        }
    }

    pub fn agent_page(&self) -> ShapedPage<AgentRow> {
        shape(&self.agents, &self.agent_view)
    }

    pub fn transaction_page(&self) -> ShapedPage<TransactionRow> {
        shape(&self.transactions, &self.transaction_view)
    }

    pub fn report_summary(&self) -> ReportSummary {
        ReportSummary::from_report(&self.report)
    }

    fn active_view(&self) -> Option<&ViewState> {
        match self.current_page {
            Page::Agents => Some(&self.agent_view),
            Page::Transactions => Some(&self.transaction_view),
            Page::Report => None,
        }
    }

    fn update_view(&mut self, f: impl FnOnce(&ViewState) -> ViewState) {
        match self.current_page {
            Page::Agents => self.agent_view = f(&self.agent_view),
            Page::Transactions => self.transaction_view = f(&self.transaction_view),
            Page::Report => return,
        }
        self.reset_selection();
    }

    fn visible_rows(&self) -> usize {
        match self.current_page {
            Page::Agents => self.agent_page().rows.len(),
            Page::Transactions => self.transaction_page().rows.len(),
            Page::Report => 0,
        }
    }

    fn total_pages(&self) -> usize {
        match self.current_page {
            Page::Agents => self.agent_page().total_pages,
            Page::Transactions => self.transaction_page().total_pages,
            Page::Report => 0,
        }
    }

    fn reset_selection(&mut self) {
        let select = if self.visible_rows() > 0 { Some(0) } else { None };
        self.state.select(select);
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
        self.search_input = None;
        self.reset_selection();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
        self.search_input = None;
        self.reset_selection();
    }

    pub fn next(&mut self) {
        let len = self.visible_rows();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.visible_rows();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    pub fn cycle_region_filter(&mut self) {
        if self.current_page != Page::Agents {
            return;
        }
        let next = next_region(self.agent_view.region_filter);
        self.update_view(|view| view.with_region_filter(next));
    }

    fn sort_key_for(&self, digit: char) -> Option<SortKey> {
        match (self.current_page, digit) {
            (Page::Agents, '1') => Some(SortKey::Name),
            (Page::Agents, '2') => Some(SortKey::Region),
            (Page::Agents, '3') => Some(SortKey::Rating),
            (Page::Agents, '4') => Some(SortKey::Fee),
            (Page::Transactions, '1') => Some(SortKey::Name),
            (Page::Transactions, '2') => Some(SortKey::Amount),
            (Page::Transactions, '3') => Some(SortKey::Date),
            _ => None,
        }
    }

    /// Delete the highlighted agent, then re-fetch everything that shows it.
    pub fn delete_selected_agent(&mut self) -> LedgerResult<()> {
        if self.current_page != Page::Agents {
            return Ok(());
        }
        let page = self.agent_page();
        let Some(row) = self.state.selected().and_then(|i| page.rows.get(i)) else {
            return Ok(());
        };

        if delete_agent(&self.conn, &row.agent.id)? {
            info!("Deleted agent {} ({})", row.agent.id, row.display_name);
            self.status = Some(format!("Deleted {}", row.display_name));
        }

        self.reload_listing()?;
        self.request_report();
        Ok(())
    }

    /// Open the amount prompt for the highlighted row: a new transaction on
    /// the Agents page, an amount edit on the Transactions page.
    pub fn open_amount_prompt(&mut self) {
        let selected = self.state.selected();
        let target = match self.current_page {
            Page::Agents => selected
                .and_then(|i| self.agent_page().rows.into_iter().nth(i))
                .map(|row| AmountTarget::NewTransaction {
                    agent_id: row.agent.id,
                    agent_name: row.display_name,
                }),
            Page::Transactions => match selected.and_then(|i| self.transaction_page().rows.into_iter().nth(i)) {
                Some(tx) if tx.agent_id.is_some() => Some(AmountTarget::EditTransaction {
                    transaction_id: tx.id,
                }),
                Some(_) => {
                    self.status = Some("Transaction has no agent, it cannot be edited".to_string());
                    None
                }
                None => None,
            },
            Page::Report => None,
        };

        if let Some(target) = target {
            self.amount_prompt = Some(AmountPrompt {
                target,
                input: String::new(),
            });
        }
    }

    /// Apply the entered amount, then re-fetch everything that shows it.
    pub fn submit_amount(&mut self, prompt: AmountPrompt) -> LedgerResult<()> {
        let amount = prompt
            .input
            .trim()
            .parse::<f64>()
            .map_err(|_| LedgerError::validation("amount", "Amount must be a positive number"))?;

        match prompt.target {
            AmountTarget::NewTransaction { agent_id, agent_name } => {
                let tx = NewTransaction {
                    amount,
                    agent_id,
                    date: None,
                }
                .into_transaction(Utc::now())?;
                insert_transaction(&self.conn, &tx)?;
                info!("Transaction {} inserted ({} for {})", tx.id, tx.amount, agent_name);
                self.status = Some(format!("Added {:.2} for {}", tx.amount, agent_name));
            }
            AmountTarget::EditTransaction { transaction_id } => {
                let current = get_transaction(&self.conn, &transaction_id)?
                    .ok_or_else(|| LedgerError::not_found("transaction", &transaction_id))?;
                let updated = TransactionUpdate {
                    amount,
                    agent_id: current.agent_id.clone(),
                    date: None,
                }
                .apply(&current)?;
                update_transaction(&self.conn, &updated)?;
                info!("Transaction {} updated", updated.id);
                self.status = Some(format!("Amount set to {:.2}", updated.amount));
            }
        }

        self.reload_listing()?;
        self.request_report();
        Ok(())
    }

    fn show_failure(&mut self, action: &str, err: LedgerError) {
        if err.is_client_error() {
            self.status = Some(err.to_string());
        } else {
            error!("{} failed: {}", action, err);
            self.status = Some(format!("{} failed, please try again", action));
        }
    }

    fn refresh(&mut self) {
        match self.reload_listing() {
            Ok(()) => self.status = Some("Reloaded".to_string()),
            Err(e) => {
                error!("Reload failed: {}", e);
                self.status = Some("Reload failed, press r to retry".to_string());
            }
        }
        self.request_report();
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if let Some(prompt) = self.amount_prompt.as_mut() {
            match key.code {
                KeyCode::Esc => self.amount_prompt = None,
                KeyCode::Backspace => {
                    prompt.input.pop();
                }
                KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => prompt.input.push(c),
                KeyCode::Enter => {
                    if let Some(prompt) = self.amount_prompt.take() {
                        if let Err(e) = self.submit_amount(prompt) {
                            self.show_failure("Save", e);
                        }
                    }
                }
                _ => {}
            }
            return false;
        }

        if let Some(input) = self.search_input.as_mut() {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => self.search_input = None,
                KeyCode::Backspace => {
                    input.pop();
                    let term = input.clone();
                    self.update_view(|view| view.with_search_term(term));
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    let term = input.clone();
                    self.update_view(|view| view.with_search_term(term));
                }
                _ => {}
            }
            return false;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.next_page(),
            KeyCode::BackTab => self.previous_page(),
            KeyCode::Char('/') if self.active_view().is_some() => {
                let current = self.active_view().map(|v| v.search_term.clone()).unwrap_or_default();
                self.search_input = Some(current);
            }
            KeyCode::Char('g') => self.cycle_region_filter(),
            KeyCode::Char('v') => self.update_view(|view| view.toggle_view_mode()),
            KeyCode::Char('r') => self.refresh(),
            KeyCode::Char('x') => {
                if let Err(e) = self.delete_selected_agent() {
                    self.show_failure("Delete", e);
                }
            }
            KeyCode::Char('a') => self.open_amount_prompt(),
            KeyCode::Char(c @ '1'..='4') if self.current_page == Page::Report => {
                let preset = match c {
                    '1' => ReportPreset::Default,
                    '2' => ReportPreset::Last7Days,
                    '3' => ReportPreset::Last30Days,
                    _ => ReportPreset::ThisMonth,
                };
                self.set_report_preset(preset);
            }
            KeyCode::Char(c) if self.sort_key_for(c).is_some() => {
                if let Some(sort_key) = self.sort_key_for(c) {
                    self.update_view(|view| view.toggle_sort(sort_key));
                }
            }
            KeyCode::Right | KeyCode::Char('l') => {
                let total = self.total_pages();
                self.update_view(|view| view.next_page(total));
            }
            KeyCode::Left | KeyCode::Char('h') => {
                let total = self.total_pages();
                self.update_view(|view| view.previous_page(total));
            }
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            _ => {}
        }
        false
    }
}

fn next_region(current: Option<Region>) -> Option<Region> {
    match current {
        None => Some(Region::ALL[0]),
        Some(region) => Region::ALL
            .iter()
            .position(|r| *r == region)
            .and_then(|i| Region::ALL.get(i + 1))
            .copied(),
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        app.poll_reports();
        terminal.draw(|f| ui(f, app))?;

        // Poll so report responses are picked up without a key press
        if !event::poll(Duration::from_millis(200))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press && app.handle_key(key) {
                return Ok(());
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Agents => render_agents(f, chunks[1], app),
        Page::Transactions => render_transactions(f, chunks[1], app),
        Page::Report => render_report(f, chunks[1], app),
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Agents, Page::Transactions, Page::Report];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Agents: {}", app.agents.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Transactions: {}", app.transactions.len()),
        Style::default().fg(Color::White),
    ));

    if let Some(input) = &app.search_input {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("Search: {}_", input),
            Style::default().fg(Color::Green),
        ));
    }

    if let Some(prompt) = &app.amount_prompt {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("{}: {}_", prompt.label(), prompt.input),
            Style::default().fg(Color::Magenta),
        ));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row<'a>(titles: &[&'a str]) -> Row<'a> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    });

    Row::new(cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1)
}

fn sort_marker(view: &ViewState, key: SortKey) -> &'static str {
    match view.sort {
        Some(spec) if spec.key == key => match spec.direction {
            SortDirection::Ascending => " ▲",
            SortDirection::Descending => " ▼",
        },
        _ => "",
    }
}

fn table_title(title: &str, view: &ViewState, filtered: usize, current: usize, total: usize) -> String {
    let region = view
        .region_filter
        .map(|r| format!(" [{}]", r))
        .unwrap_or_default();
    let search = if view.search_term.is_empty() {
        String::new()
    } else {
        format!(" \"{}\"", view.search_term)
    };
    format!(
        " {}{}{} - {} matching, page {}/{} ",
        title,
        region,
        search,
        filtered,
        current,
        total.max(1)
    )
}

fn render_agents(f: &mut Frame, area: Rect, app: &mut App) {
    let page = app.agent_page();
    let view = &app.agent_view;

    let titles = [
        format!("Name{}", sort_marker(view, SortKey::Name)),
        format!("Region{}", sort_marker(view, SortKey::Region)),
        format!("Rating{}", sort_marker(view, SortKey::Rating)),
        format!("Fee{}", sort_marker(view, SortKey::Fee)),
    ];
    let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();

    let rows = page.rows.iter().map(|row| {
        Row::new(vec![
            Cell::from(truncate(&row.display_name, 30)),
            Cell::from(row.agent.region.as_str()),
            Cell::from(format!("{:.0}", row.agent.rating)),
            Cell::from(format!("{:.2}", row.agent.fee)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(32),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(12),
        ],
    )
    .header(header_row(&title_refs))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(table_title("Agents", view, page.filtered_count, page.current_page, page.total_pages)),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_transactions(f: &mut Frame, area: Rect, app: &mut App) {
    let page = app.transaction_page();
    let view = &app.transaction_view;

    let titles = [
        format!("Date{}", sort_marker(view, SortKey::Date)),
        format!("Agent{}", sort_marker(view, SortKey::Name)),
        format!("Amount{}", sort_marker(view, SortKey::Amount)),
    ];
    let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();

    let rows = page.rows.iter().map(|tx| {
        let name_style = if tx.agent_id.is_some() {
            Style::default()
        } else {
            Style::default().fg(Color::DarkGray)
        };

        Row::new(vec![
            Cell::from(tx.date.format("%Y-%m-%d %H:%M").to_string()),
            Cell::from(truncate(&tx.agent_name, 30)).style(name_style),
            Cell::from(format!("{:.2}", tx.amount)).style(Style::default().fg(Color::Green)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(18),
            Constraint::Length(32),
            Constraint::Length(14),
        ],
    )
    .header(header_row(&title_refs))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(table_title(
                "Transactions",
                view,
                page.filtered_count,
                page.current_page,
                page.total_pages,
            )),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_report(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),      // Summary
            Constraint::Percentage(55), // Bar chart
            Constraint::Min(5),         // Daily sparkline
        ])
        .split(area);

    let summary = app.report_summary();
    let format_total = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string());

    let mut summary_lines = vec![Line::from(vec![
        Span::styled("Total: ", Style::default().fg(Color::Cyan)),
        Span::raw(format!("{:.2}", summary.total_transactions)),
        Span::raw("   "),
        Span::styled("Highest agent: ", Style::default().fg(Color::Green)),
        Span::raw(format_total(summary.highest_agent_total)),
        Span::raw("   "),
        Span::styled("Lowest agent: ", Style::default().fg(Color::Red)),
        Span::raw(format_total(summary.lowest_agent_total)),
    ])];
    if let Some(err) = &app.report_error {
        summary_lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(Color::Red))));
    } else if app.report_loading() {
        summary_lines.push(Line::from(Span::styled("Loading...", Style::default().fg(Color::Yellow))));
    }

    let summary_widget = Paragraph::new(summary_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Report - {} ", app.report_preset.title())),
    );
    f.render_widget(summary_widget, chunks[0]);

    // Bar chart: one bar per agent
    let bars: Vec<(String, u64)> = app
        .report
        .agent_bar_data
        .iter()
        .map(|d| (truncate(&d.agent_name, 12), d.total_amount.max(0.0).round() as u64))
        .collect();
    let bar_data: Vec<(&str, u64)> = bars.iter().map(|(label, value)| (label.as_str(), *value)).collect();

    let bar_chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" Total Transaction Amount "))
        .data(bar_data.as_slice())
        .bar_width(12)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Cyan))
        .value_style(Style::default().fg(Color::Black).bg(Color::Cyan));
    f.render_widget(bar_chart, chunks[1]);

    // Daily series
    let daily: Vec<u64> = app
        .report
        .transaction_line_data
        .iter()
        .map(|d| d.daily_total.max(0.0).round() as u64)
        .collect();
    let range = match (
        app.report.transaction_line_data.first(),
        app.report.transaction_line_data.last(),
    ) {
        (Some(first), Some(last)) => format!(" Daily Transactions Total ({} .. {}) ", first.date, last.date),
        _ => " Daily Transactions Total (no data) ".to_string(),
    };

    let sparkline = Sparkline::default()
        .block(Block::default().borders(Borders::ALL).title(range))
        .data(&daily)
        .style(Style::default().fg(Color::Green));
    f.render_widget(sparkline, chunks[2]);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![];

    if let Some(view) = app.active_view() {
        status_spans.push(Span::styled(
            format!(" Rows: {} ", view.page_size()),
            Style::default().fg(Color::Cyan),
        ));
        status_spans.push(Span::raw("| "));
    }

    if let Some(message) = &app.status {
        status_spans.push(Span::styled(message.clone(), Style::default().fg(Color::Green)));
        status_spans.push(Span::raw(" | "));
    }

    let hints: &[(&str, &str)] = match app.current_page {
        Page::Agents => &[
            ("/", "Search"),
            ("g", "Region"),
            ("1-4", "Sort"),
            ("v", "View"),
            ("←/→", "Page"),
            ("a", "Add tx"),
            ("x", "Delete"),
        ],
        Page::Transactions => &[
            ("/", "Search"),
            ("1-3", "Sort"),
            ("v", "View"),
            ("←/→", "Page"),
            ("a", "Edit amount"),
        ],
        Page::Report => &[("1-4", "Window"), ("r", "Reload")],
    };

    for (key, label) in hints.iter().chain([("Tab", "Page"), ("q", "Quit")].iter()) {
        let color = if *key == "q" { Color::Red } else { Color::Yellow };
        status_spans.push(Span::styled(*key, Style::default().fg(color)));
        status_spans.push(Span::raw(format!(" {} | ", label)));
    }

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
