// 🔎 Client Shaping Engine - filter → sort → paginate over in-memory records
//
// ViewState is an immutable value. Every user action produces a new
// ViewState, and `shape` is a pure function of (rows, view state): same
// inputs, same visible page.
//
// Order of operations is fixed: search filter, region filter, stable sort,
// pagination. The page number is clamped on the way out so a slice is never
// out of range, whatever the state says.

use crate::listing::TransactionRow;
use crate::models::{Agent, Region};
use crate::reports::ReportData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ============================================================================
// VIEW PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    Name,
    Region,
    Rating,
    Fee,
    Amount,
    Date,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Region => "region",
            SortKey::Rating => "rating",
            SortKey::Fee => "fee",
            SortKey::Amount => "amount",
            SortKey::Date => "date",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    pub direction: SortDirection,
}

/// Paged shows a few rows with page controls; Scroll shows a longer page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ViewMode {
    Paged,
    Scroll,
}

impl ViewMode {
    pub fn page_size(&self) -> usize {
        match self {
            ViewMode::Paged => 5,
            ViewMode::Scroll => 20,
        }
    }

    pub fn toggled(&self) -> ViewMode {
        match self {
            ViewMode::Paged => ViewMode::Scroll,
            ViewMode::Scroll => ViewMode::Paged,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewState {
    pub search_term: String,
    pub region_filter: Option<Region>,
    pub sort: Option<SortSpec>,
    pub view_mode: ViewMode,
    /// 1-based
    pub current_page: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            search_term: String::new(),
            region_filter: None,
            sort: None,
            view_mode: ViewMode::Paged,
            current_page: 1,
        }
    }
}

impl ViewState {
    /// Agent table: insertion order until a column is chosen.
    pub fn for_agents() -> Self {
        Self::default()
    }

    /// Transaction table: newest first.
    pub fn for_transactions() -> Self {
        Self {
            sort: Some(SortSpec {
                key: SortKey::Date,
                direction: SortDirection::Descending,
            }),
            ..Self::default()
        }
    }

    pub fn page_size(&self) -> usize {
        self.view_mode.page_size()
    }

    /// New search term; back to page 1.
    pub fn with_search_term(&self, term: impl Into<String>) -> Self {
        Self {
            search_term: term.into(),
            current_page: 1,
            ..self.clone()
        }
    }

    /// New region filter (None clears it); back to page 1.
    pub fn with_region_filter(&self, region: Option<Region>) -> Self {
        Self {
            region_filter: region,
            current_page: 1,
            ..self.clone()
        }
    }

    /// Click on a column: ascending on the current key flips to descending,
    /// anything else becomes ascending. The page is kept.
    pub fn toggle_sort(&self, key: SortKey) -> Self {
        let direction = match self.sort {
            Some(SortSpec {
                key: current,
                direction: SortDirection::Ascending,
            }) if current == key => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        Self {
            sort: Some(SortSpec { key, direction }),
            ..self.clone()
        }
    }

    /// Switch between paged and scroll mode; back to page 1.
    pub fn toggle_view_mode(&self) -> Self {
        Self {
            view_mode: self.view_mode.toggled(),
            current_page: 1,
            ..self.clone()
        }
    }

    /// Next page if there is one; `total_pages` comes from the last shaped page.
    pub fn next_page(&self, total_pages: usize) -> Self {
        let page = clamp_page(self.current_page, total_pages);
        Self {
            current_page: if page < total_pages { page + 1 } else { page },
            ..self.clone()
        }
    }

    pub fn previous_page(&self, total_pages: usize) -> Self {
        let page = clamp_page(self.current_page, total_pages);
        Self {
            current_page: page.saturating_sub(1).max(1),
            ..self.clone()
        }
    }
}

fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

pub fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

// ============================================================================
// SHAPEABLE ROWS
// ============================================================================

/// A record the shaping engine can filter and sort.
pub trait Shapeable {
    /// String matched by the search term.
    fn search_text(&self) -> &str;

    /// None for rows that have no region; such rows never pass a region filter.
    fn region(&self) -> Option<Region>;

    /// Ascending comparison on `key`. Keys that do not apply compare equal.
    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering;
}

/// Agent plus its cached display name, so sorting and searching do not rebuild it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRow {
    pub agent: Agent,
    pub display_name: String,
}

impl From<Agent> for AgentRow {
    fn from(agent: Agent) -> Self {
        let display_name = agent.display_name();
        Self { agent, display_name }
    }
}

impl Shapeable for AgentRow {
    fn search_text(&self) -> &str {
        &self.display_name
    }

    fn region(&self) -> Option<Region> {
        Some(self.agent.region)
    }

    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name => compare_text(&self.display_name, &other.display_name),
            SortKey::Region => compare_text(self.agent.region.as_str(), other.agent.region.as_str()),
            SortKey::Rating => compare_number(self.agent.rating, other.agent.rating),
            SortKey::Fee => compare_number(self.agent.fee, other.agent.fee),
            SortKey::Amount | SortKey::Date => Ordering::Equal,
        }
    }
}

impl Shapeable for TransactionRow {
    fn search_text(&self) -> &str {
        &self.agent_name
    }

    fn region(&self) -> Option<Region> {
        None
    }

    fn compare_by(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Name => compare_text(&self.agent_name, &other.agent_name),
            SortKey::Amount => compare_number(self.amount, other.amount),
            SortKey::Date => compare_date(&self.date, &other.date),
            SortKey::Region | SortKey::Rating | SortKey::Fee => Ordering::Equal,
        }
    }
}

/// Case-insensitive collation; byte order breaks ties so the order is total.
pub fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

pub fn compare_number(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

pub fn compare_date(a: &DateTime<Utc>, b: &DateTime<Utc>) -> Ordering {
    a.cmp(b)
}

// ============================================================================
// SHAPING
// ============================================================================

/// The visible slice plus what the page controls need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShapedPage<T> {
    pub rows: Vec<T>,
    pub filtered_count: usize,
    pub total_pages: usize,
    /// Clamped into [1, max(total_pages, 1)]
    pub current_page: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

/// Filter, sort and paginate `rows` for `view`.
pub fn shape<T: Shapeable + Clone>(rows: &[T], view: &ViewState) -> ShapedPage<T> {
    let needle = view.search_term.trim().to_lowercase();

    let mut filtered: Vec<&T> = rows
        .iter()
        .filter(|row| needle.is_empty() || row.search_text().to_lowercase().contains(&needle))
        .filter(|row| match view.region_filter {
            Some(region) => row.region() == Some(region),
            None => true,
        })
        .collect();

    // slice::sort_by is stable: ties keep their input order in both directions
    if let Some(spec) = view.sort {
        match spec.direction {
            SortDirection::Ascending => filtered.sort_by(|a, b| a.compare_by(b, spec.key)),
            SortDirection::Descending => filtered.sort_by(|a, b| b.compare_by(a, spec.key)),
        }
    }

    let filtered_count = filtered.len();
    let page_size = view.page_size();
    let total_pages = total_pages(filtered_count, page_size);
    let current_page = clamp_page(view.current_page, total_pages);

    let start = ((current_page - 1) * page_size).min(filtered_count);
    let end = (current_page * page_size).min(filtered_count);

    ShapedPage {
        rows: filtered[start..end].iter().map(|row| (*row).clone()).collect(),
        filtered_count,
        total_pages,
        current_page,
        has_previous: current_page > 1,
        has_next: current_page < total_pages,
    }
}

// ============================================================================
// REPORT SUMMARY
// ============================================================================

/// Headline figures over the loaded report (not the filtered table).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_transactions: f64,
    pub highest_agent_total: Option<f64>,
    pub lowest_agent_total: Option<f64>,
}

impl ReportSummary {
    pub fn from_report(report: &ReportData) -> Self {
        let total_transactions = report
            .transaction_line_data
            .iter()
            .map(|d| d.daily_total)
            .sum();

        let agent_totals = report.agent_bar_data.iter().map(|d| d.total_amount);
        let highest_agent_total = agent_totals.clone().max_by(|a, b| a.total_cmp(b));
        let lowest_agent_total = agent_totals.min_by(|a, b| a.total_cmp(b));

        Self {
            total_transactions,
            highest_agent_total,
            lowest_agent_total,
        }
    }
}

// ============================================================================
// LATEST-RESPONSE GUARD
// ============================================================================

/// Identifies one issued fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket(u64);

/// Applies only the response to the most recently issued request, so a slow
/// response for old parameters cannot overwrite state for newer ones.
#[derive(Debug, Default)]
pub struct RequestGate {
    issued: u64,
    applied: u64,
}

impl RequestGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket for a new request; supersedes every earlier ticket.
    pub fn issue(&mut self) -> RequestTicket {
        self.issued += 1;
        RequestTicket(self.issued)
    }

    /// True while the newest request has not been applied yet.
    pub fn is_loading(&self) -> bool {
        self.applied < self.issued
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        ticket.0 == self.issued
    }

    /// Accept a response if its ticket is the newest one. Returns the value to
    /// apply, or None for a superseded or duplicate response.
    pub fn accept<T>(&mut self, ticket: RequestTicket, value: T) -> Option<T> {
        if self.is_current(ticket) && self.applied < ticket.0 {
            self.applied = ticket.0;
            Some(value)
        } else {
            None
        }
    }
}
