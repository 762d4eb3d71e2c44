// 📊 Aggregation Engine - per-agent and per-day totals over a date window
//
// Bounds are calendar dates and both are inclusive. The line series falls
// back to a trailing window when the caller gives no bounds at all; the bar
// series never does.
//
// Both series are read inside one SQLite transaction: either the caller gets
// both, computed against the same snapshot, or a single error.

use crate::error::{LedgerError, LedgerResult};
use crate::models::{display_name, parse_calendar_date};
use chrono::{Days, NaiveDate};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Length of the default trailing window for the daily series.
pub const DEFAULT_TRAILING_DAYS: u64 = 14;

pub const BAR_DATASET_LABEL: &str = "Total Transaction Amount";
pub const LINE_DATASET_LABEL: &str = "Daily Transactions Total";

// ============================================================================
// DATE WINDOW
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> LedgerResult<Self> {
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(LedgerError::validation(
                    "startDate",
                    format!("startDate {} is after endDate {}", s, e),
                ));
            }
        }
        Ok(Self { start, end })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Parse optional `startDate` / `endDate` query strings. Empty strings count as absent.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> LedgerResult<Self> {
        let mut errors = Vec::new();
        let mut parse = |field: &str, raw: Option<&str>| match raw.map(str::trim) {
            Some(s) if !s.is_empty() => parse_calendar_date(field, s)
                .map_err(|e| errors.push(e))
                .ok(),
            _ => None,
        };
        let start = parse("startDate", start);
        let end = parse("endDate", end);
        if !errors.is_empty() {
            return Err(LedgerError::Validation(errors));
        }
        Self::new(start, end)
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    /// Window actually used for the daily series: the trailing default when unbounded.
    pub fn for_daily_series(&self, today: NaiveDate) -> DateWindow {
        if self.is_unbounded() {
            DateWindow {
                start: today.checked_sub_days(Days::new(DEFAULT_TRAILING_DAYS)),
                end: None,
            }
        } else {
            *self
        }
    }

    fn bounds(&self) -> (Option<String>, Option<String>) {
        (
            self.start.map(|d| d.format("%Y-%m-%d").to_string()),
            self.end.map(|d| d.format("%Y-%m-%d").to_string()),
        )
    }
}

// ============================================================================
// SERIES
// ============================================================================

/// One bar: the total of an agent's transactions in the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTotal {
    pub agent_id: String,
    pub agent_name: String,
    pub total_amount: f64,
}

/// One point of the line: the total of a calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub daily_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub agent_bar_data: Vec<AgentTotal>,
    pub transaction_line_data: Vec<DailyTotal>,
}

/// Operation A: per-agent totals. Agents without qualifying transactions are
/// absent; transactions whose agent no longer exists are excluded.
pub fn agent_totals(conn: &Connection, window: &DateWindow) -> LedgerResult<Vec<AgentTotal>> {
    let (start, end) = window.bounds();

    let mut stmt = conn.prepare(
        "SELECT a.id, a.first_name, a.last_name, SUM(t.amount) AS total
         FROM transactions t
         JOIN agents a ON a.id = t.agent_id
         WHERE (?1 IS NULL OR date(t.occurred_at) >= ?1)
           AND (?2 IS NULL OR date(t.occurred_at) <= ?2)
         GROUP BY a.id, a.first_name, a.last_name",
    )?;

    let totals = stmt
        .query_map(params![start, end], |row| {
            let first_name: String = row.get(1)?;
            let last_name: String = row.get(2)?;
            Ok(AgentTotal {
                agent_id: row.get(0)?,
                agent_name: display_name(&first_name, &last_name),
                total_amount: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

/// Operation B: per-day totals within exactly `window`, ascending by date.
/// Days without transactions are absent.
pub fn daily_totals(conn: &Connection, window: &DateWindow) -> LedgerResult<Vec<DailyTotal>> {
    let (start, end) = window.bounds();

    let mut stmt = conn.prepare(
        "SELECT date(t.occurred_at) AS day, SUM(t.amount) AS total
         FROM transactions t
         WHERE (?1 IS NULL OR date(t.occurred_at) >= ?1)
           AND (?2 IS NULL OR date(t.occurred_at) <= ?2)
         GROUP BY day
         ORDER BY day ASC",
    )?;

    let totals = stmt
        .query_map(params![start, end], |row| {
            let day: String = row.get(0)?;
            let date = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
            })?;
            Ok(DailyTotal {
                date,
                daily_total: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(totals)
}

/// Both series against one snapshot. `today` anchors the trailing default.
pub fn report_data(conn: &mut Connection, window: &DateWindow, today: NaiveDate) -> LedgerResult<ReportData> {
    let snapshot = conn.transaction()?;

    let agent_bar_data = agent_totals(&snapshot, window)?;
    let transaction_line_data = daily_totals(&snapshot, &window.for_daily_series(today))?;

    snapshot.commit()?;

    debug!(
        "Report for {:?}: {} agents, {} days",
        window,
        agent_bar_data.len(),
        transaction_line_data.len()
    );

    Ok(ReportData {
        agent_bar_data,
        transaction_line_data,
    })
}

// ============================================================================
// CHART ADAPTATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
}

/// `{labels, datasets}` as consumed by the chart renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

impl ReportData {
    pub fn bar_chart(&self) -> ChartData {
        ChartData {
            labels: self.agent_bar_data.iter().map(|d| d.agent_name.clone()).collect(),
            datasets: vec![Dataset {
                label: BAR_DATASET_LABEL.to_string(),
                data: self.agent_bar_data.iter().map(|d| d.total_amount).collect(),
            }],
        }
    }

    pub fn line_chart(&self) -> ChartData {
        ChartData {
            labels: self
                .transaction_line_data
                .iter()
                .map(|d| d.date.format("%Y-%m-%d").to_string())
                .collect(),
            datasets: vec![Dataset {
                label: LINE_DATASET_LABEL.to_string(),
                data: self.transaction_line_data.iter().map(|d| d.daily_total).collect(),
            }],
        }
    }
}
