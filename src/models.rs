// 🧑‍💼 Agents & Transactions - typed records validated at the store boundary
//
// Input types (NewAgent, AgentPatch, NewTransaction, TransactionUpdate) are
// what the API and the importer accept. They are validated before any store
// call; the store never sees an out-of-range rating or a non-positive amount.

use crate::error::{FieldError, LedgerError, LedgerResult};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Label used wherever a transaction's agent cannot be resolved.
pub const NO_AGENT_LABEL: &str = "No agent assigned";

// ============================================================================
// REGION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    North,
    South,
    East,
    West,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::North, Region::South, Region::East, Region::West];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::North => "North",
            Region::South => "South",
            Region::East => "East",
            Region::West => "West",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "north" => Ok(Region::North),
            "south" => Ok(Region::South),
            "east" => Ok(Region::East),
            "west" => Ok(Region::West),
            "" => Err(FieldError::new("region", "Region is required")),
            other => Err(FieldError::new(
                "region",
                format!("Unknown region '{}' (expected North, South, East or West)", other),
            )),
        }
    }
}

// ============================================================================
// AGENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub region: Region,
    pub rating: f64,
    pub fee: f64,
}

impl Agent {
    /// "First Last" with each part capitalised.
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, &self.last_name)
    }
}

pub fn display_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", capitalize(first_name), capitalize(last_name))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Payload for creating an agent.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAgent {
    pub first_name: String,
    pub last_name: String,
    pub region: String,
    pub rating: f64,
    pub fee: f64,
}

impl NewAgent {
    /// Validate and assign a fresh identity.
    pub fn into_agent(self) -> LedgerResult<Agent> {
        let region = self.region.parse::<Region>();

        let mut errors = validate_agent_fields(&self.first_name, &self.last_name, self.rating, self.fee);
        if let Err(e) = &region {
            errors.push(e.clone());
        }
        if !errors.is_empty() {
            return Err(LedgerError::Validation(errors));
        }

        Ok(Agent {
            id: uuid::Uuid::new_v4().to_string(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            region: region.map_err(|e| LedgerError::Validation(vec![e]))?,
            rating: self.rating,
            fee: self.fee,
        })
    }
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub region: Option<String>,
    pub rating: Option<f64>,
    pub fee: Option<f64>,
}

impl AgentPatch {
    /// Apply onto an existing agent and validate the merged result.
    pub fn apply(self, current: &Agent) -> LedgerResult<Agent> {
        let first_name = self.first_name.unwrap_or_else(|| current.first_name.clone());
        let last_name = self.last_name.unwrap_or_else(|| current.last_name.clone());
        let rating = self.rating.unwrap_or(current.rating);
        let fee = self.fee.unwrap_or(current.fee);

        let mut errors = validate_agent_fields(&first_name, &last_name, rating, fee);
        let region = match self.region {
            Some(r) => match r.parse::<Region>() {
                Ok(region) => region,
                Err(e) => {
                    errors.push(e);
                    current.region
                }
            },
            None => current.region,
        };
        if !errors.is_empty() {
            return Err(LedgerError::Validation(errors));
        }

        Ok(Agent {
            id: current.id.clone(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            region,
            rating,
            fee,
        })
    }
}

fn validate_agent_fields(first_name: &str, last_name: &str, rating: f64, fee: f64) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for (field, value) in [("first_name", first_name), ("last_name", last_name)] {
        let value = value.trim();
        if value.is_empty() {
            errors.push(FieldError::new(field, "Required field is empty"));
        } else if !value
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '\'' || c == '-')
        {
            errors.push(FieldError::new(
                field,
                "Must contain only letters, hyphens and apostrophes",
            ));
        }
    }

    if !rating.is_finite() || !(0.0..=100.0).contains(&rating) {
        errors.push(FieldError::new("rating", "Rating must be between 0 and 100"));
    }

    if !fee.is_finite() || fee < 0.0 {
        errors.push(FieldError::new("fee", "Fee must not be negative"));
    }

    errors
}

// ============================================================================
// TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub agent_id: String,
    pub date: DateTime<Utc>,
}

/// Payload for creating a transaction. A missing date means "now".
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub amount: f64,
    pub agent_id: String,
    #[serde(default)]
    pub date: Option<String>,
}

impl NewTransaction {
    /// Validate and assign a fresh identity. Agent existence is checked by the store.
    pub fn into_transaction(self, now: DateTime<Utc>) -> LedgerResult<Transaction> {
        let mut errors = Vec::new();
        if let Err(e) = validate_amount(self.amount) {
            errors.push(e);
        }
        if self.agent_id.trim().is_empty() {
            errors.push(FieldError::new("agent_id", "Please select an agent"));
        }
        let date = match self.date.as_deref() {
            Some(raw) if !raw.trim().is_empty() => match parse_timestamp(raw) {
                Ok(date) => Some(date),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            _ => Some(now),
        };
        if !errors.is_empty() {
            return Err(LedgerError::Validation(errors));
        }

        Ok(Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            amount: self.amount,
            agent_id: self.agent_id.trim().to_string(),
            date: date.unwrap_or(now),
        })
    }
}

/// Update payload; amount and agent are required, an absent date keeps the stored one.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionUpdate {
    pub amount: f64,
    pub agent_id: String,
    #[serde(default)]
    pub date: Option<String>,
}

impl TransactionUpdate {
    pub fn apply(self, current: &Transaction) -> LedgerResult<Transaction> {
        let new = NewTransaction {
            amount: self.amount,
            agent_id: self.agent_id,
            date: self.date,
        };
        let mut updated = new.into_transaction(current.date)?;
        updated.id = current.id.clone();
        Ok(updated)
    }
}

pub fn validate_amount(amount: f64) -> Result<(), FieldError> {
    if amount.is_finite() && amount > 0.0 {
        Ok(())
    } else {
        Err(FieldError::new("amount", "Amount must be a positive number"))
    }
}

// ============================================================================
// DATE HELPERS
// ============================================================================

/// Accepts `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, FieldError> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| FieldError::new("date", format!("Invalid date '{}'", raw)))
}

/// Calendar date of a query bound: `YYYY-MM-DD` or an RFC 3339 timestamp truncated to its day.
pub fn parse_calendar_date(field: &str, raw: &str) -> Result<NaiveDate, FieldError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| FieldError::new(field, format!("Invalid date '{}' (expected YYYY-MM-DD)", raw)))
}

/// Storage form: RFC 3339, UTC, second precision. Lexical order == chronological order.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_agent(first: &str, last: &str, region: &str, rating: f64, fee: f64) -> NewAgent {
        NewAgent {
            first_name: first.to_string(),
            last_name: last.to_string(),
            region: region.to_string(),
            rating,
            fee,
        }
    }

    #[test]
    fn test_region_parse_is_case_insensitive() {
        assert_eq!("north".parse::<Region>().unwrap(), Region::North);
        assert_eq!(" WEST ".parse::<Region>().unwrap(), Region::West);
        assert!("Central".parse::<Region>().is_err());
        assert!("".parse::<Region>().is_err());
    }

    #[test]
    fn test_display_name_capitalises_parts() {
        let agent = new_agent("jane", "o'neil", "East", 50.0, 100.0)
            .into_agent()
            .unwrap();
        assert_eq!(agent.display_name(), "Jane O'neil");
    }

    #[test]
    fn test_new_agent_collects_all_errors() {
        let err = new_agent("J4ne", "", "Middle", 101.0, -1.0)
            .into_agent()
            .unwrap_err();

        match err {
            LedgerError::Validation(errors) => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["first_name", "last_name", "rating", "fee", "region"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_rating_bounds_are_inclusive() {
        assert!(new_agent("A", "B", "North", 0.0, 0.0).into_agent().is_ok());
        assert!(new_agent("A", "B", "North", 100.0, 0.0).into_agent().is_ok());
        assert!(new_agent("A", "B", "North", f64::NAN, 0.0).into_agent().is_err());
    }

    #[test]
    fn test_patch_keeps_unset_fields() {
        let agent = new_agent("Ann", "Lee", "South", 70.0, 900.0)
            .into_agent()
            .unwrap();
        let patch = AgentPatch {
            fee: Some(1500.0),
            ..Default::default()
        };

        let updated = patch.apply(&agent).unwrap();
        assert_eq!(updated.id, agent.id);
        assert_eq!(updated.first_name, "Ann");
        assert_eq!(updated.region, Region::South);
        assert_eq!(updated.fee, 1500.0);
    }

    #[test]
    fn test_patch_validates_merged_result() {
        let agent = new_agent("Ann", "Lee", "South", 70.0, 900.0)
            .into_agent()
            .unwrap();
        let patch = AgentPatch {
            rating: Some(150.0),
            ..Default::default()
        };
        assert!(matches!(patch.apply(&agent), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_new_transaction_defaults_date_to_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let tx = NewTransaction {
            amount: 25.0,
            agent_id: "agent-1".to_string(),
            date: None,
        }
        .into_transaction(now)
        .unwrap();

        assert_eq!(tx.date, now);
        assert!(!tx.id.is_empty());
    }

    #[test]
    fn test_new_transaction_rejects_non_positive_amount() {
        let now = Utc::now();
        for amount in [0.0, -5.0, f64::INFINITY] {
            let result = NewTransaction {
                amount,
                agent_id: "agent-1".to_string(),
                date: None,
            }
            .into_transaction(now);
            assert!(matches!(result, Err(LedgerError::Validation(_))), "amount {}", amount);
        }
    }

    #[test]
    fn test_transaction_update_keeps_date_when_absent() {
        let original = Transaction {
            id: "tx-1".to_string(),
            amount: 10.0,
            agent_id: "agent-1".to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
        };
        let updated = TransactionUpdate {
            amount: 20.0,
            agent_id: "agent-2".to_string(),
            date: None,
        }
        .apply(&original)
        .unwrap();

        assert_eq!(updated.id, "tx-1");
        assert_eq!(updated.date, original.date);
        assert_eq!(updated.agent_id, "agent-2");
    }

    #[test]
    fn test_parse_timestamp_accepts_date_and_rfc3339() {
        let day = parse_timestamp("2024-01-03").unwrap();
        assert_eq!(format_timestamp(&day), "2024-01-03T00:00:00Z");

        let ts = parse_timestamp("2024-01-03T15:04:05+02:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-03T13:04:05Z");

        assert!(parse_timestamp("03/01/2024").is_err());
    }

    #[test]
    fn test_parse_calendar_date_truncates_timestamps() {
        assert_eq!(
            parse_calendar_date("startDate", "2024-01-03T23:00:00Z").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        assert!(parse_calendar_date("startDate", "yesterday").is_err());
    }
}
