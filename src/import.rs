// 📥 Seed import - agents and transactions from CSV
//
// Rows are validated one by one; a bad row is logged and skipped, it never
// aborts the file. Transactions carry an idempotency hash so importing the
// same file twice inserts nothing the second time.

use crate::db::{find_agent_by_display_name, insert_agent, insert_transaction_once};
use crate::error::{LedgerError, LedgerResult};
use crate::models::{format_timestamp, NewAgent, NewTransaction};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// `agent,amount,date` - agent is the display name ("First Last").
#[derive(Debug, Deserialize)]
struct TransactionCsvRow {
    agent: String,
    amount: f64,
    #[serde(default)]
    date: Option<String>,
}

/// Duplicate-detection hash over an imported row's own fields. `date` is None
/// for undated rows; the import-time default never enters the hash.
pub fn import_hash(agent_id: &str, amount: f64, date: Option<&DateTime<Utc>>) -> String {
    let date_key = date.map(format_timestamp).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(format!("{}|{}|{}", agent_id, amount, date_key));
    format!("{:x}", hasher.finalize())
}

pub fn import_agents_file(conn: &Connection, path: &Path) -> LedgerResult<ImportSummary> {
    import_agents(conn, File::open(path)?)
}

pub fn import_transactions_file(
    conn: &Connection,
    path: &Path,
    now: DateTime<Utc>,
) -> LedgerResult<ImportSummary> {
    import_transactions(conn, File::open(path)?, now)
}

/// Unreadable headers fail the whole file; missing columns surface per row.
fn check_headers<R: Read>(rdr: &mut csv::Reader<R>, expected: &[&str]) -> LedgerResult<()> {
    let headers = rdr.headers()?;
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect();
    if !missing.is_empty() {
        warn!("CSV is missing columns: {}", missing.join(", "));
    }
    Ok(())
}

pub fn import_agents<R: Read>(conn: &Connection, reader: R) -> LedgerResult<ImportSummary> {
    let mut rdr = csv::Reader::from_reader(reader);
    check_headers(&mut rdr, &["first_name", "last_name", "region", "rating", "fee"])?;
    let mut summary = ImportSummary::default();

    for (line, result) in rdr.deserialize::<NewAgent>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Agent row {}: unreadable: {}", line + 2, e);
                summary.rejected += 1;
                continue;
            }
        };

        match row.into_agent() {
            Ok(agent) => {
                insert_agent(conn, &agent)?;
                summary.inserted += 1;
            }
            Err(LedgerError::Validation(errors)) => {
                warn!("Agent row {}: {}", line + 2, LedgerError::Validation(errors));
                summary.rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!("✓ Agents imported: {} (rejected {})", summary.inserted, summary.rejected);
    Ok(summary)
}

/// `now` is the date given to rows without one.
pub fn import_transactions<R: Read>(
    conn: &Connection,
    reader: R,
    now: DateTime<Utc>,
) -> LedgerResult<ImportSummary> {
    let mut rdr = csv::Reader::from_reader(reader);
    check_headers(&mut rdr, &["agent", "amount", "date"])?;
    let mut summary = ImportSummary::default();

    for (line, result) in rdr.deserialize::<TransactionCsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                warn!("Transaction row {}: unreadable: {}", line + 2, e);
                summary.rejected += 1;
                continue;
            }
        };

        let Some(agent) = find_agent_by_display_name(conn, &row.agent)? else {
            warn!("Transaction row {}: unknown agent '{}'", line + 2, row.agent);
            summary.rejected += 1;
            continue;
        };

        let dated = row.date.as_deref().is_some_and(|d| !d.trim().is_empty());
        let new = NewTransaction {
            amount: row.amount,
            agent_id: agent.id,
            date: row.date,
        };
        let tx = match new.into_transaction(now) {
            Ok(tx) => tx,
            Err(LedgerError::Validation(errors)) => {
                warn!("Transaction row {}: {}", line + 2, LedgerError::Validation(errors));
                summary.rejected += 1;
                continue;
            }
            Err(e) => return Err(e),
        };

        let hash = import_hash(&tx.agent_id, tx.amount, dated.then_some(&tx.date));
        if insert_transaction_once(conn, &tx, &hash)? {
            summary.inserted += 1;
        } else {
            summary.duplicates += 1;
        }
    }

    info!("✓ Transactions imported: {}", summary.inserted);
    info!("✓ Skipped duplicates: {}", summary.duplicates);
    if summary.rejected > 0 {
        warn!("Rejected rows: {}", summary.rejected);
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::test_conn;
    use crate::db::{count_agents, count_transactions};
    use chrono::TimeZone;
    use std::io::Write;

    const AGENTS_CSV: &str = "\
first_name,last_name,region,rating,fee
Maya,Ortiz,North,88,1200
Sam,Reed,east,71,450
Bad1,Name,West,50,100
Kim,Park,Central,50,100
";

    const TRANSACTIONS_CSV: &str = "\
agent,amount,date
Maya Ortiz,250.5,2024-01-03
sam reed,99,2024-01-04T10:30:00Z
Maya Ortiz,-5,2024-01-05
Nobody Here,10,2024-01-05
Sam Reed,12,
";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_import_agents_skips_invalid_rows() {
        let conn = test_conn();
        let summary = import_agents(&conn, AGENTS_CSV.as_bytes()).unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.rejected, 2);
        assert_eq!(count_agents(&conn).unwrap(), 2);
    }

    #[test]
    fn test_import_transactions_is_idempotent() {
        let conn = test_conn();
        import_agents(&conn, AGENTS_CSV.as_bytes()).unwrap();

        // Write to a real file the way the CLI reads it
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TRANSACTIONS_CSV.as_bytes()).unwrap();

        let first = import_transactions_file(&conn, file.path(), now()).unwrap();
        assert_eq!(
            first,
            ImportSummary {
                inserted: 3,
                duplicates: 0,
                rejected: 2
            }
        );

        let second = import_transactions_file(&conn, file.path(), now()).unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 3);
        assert_eq!(count_transactions(&conn).unwrap(), 3);
    }

    #[test]
    fn test_undated_rows_are_not_reimported_on_a_later_run() {
        let conn = test_conn();
        import_agents(&conn, AGENTS_CSV.as_bytes()).unwrap();
        let csv = "agent,amount,date\nSam Reed,12,\n";

        let first = import_transactions(&conn, csv.as_bytes(), now()).unwrap();
        let later = now() + chrono::Duration::seconds(1);
        let second = import_transactions(&conn, csv.as_bytes(), later).unwrap();

        assert_eq!(first.inserted, 1);
        assert_eq!(second.inserted, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(count_transactions(&conn).unwrap(), 1);
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let conn = test_conn();
        let dir = tempfile::tempdir().unwrap();

        let err = import_agents_file(&conn, &dir.path().join("absent.csv")).unwrap_err();
        assert!(matches!(err, LedgerError::Io(_)));
    }

    #[test]
    fn test_unreadable_header_fails_the_file() {
        let conn = test_conn();
        let bytes: &[u8] = b"agent,\xff\xfe,date\nSam Reed,1,\n";

        let err = import_transactions(&conn, bytes, now()).unwrap_err();
        assert!(matches!(err, LedgerError::Csv(_)));
        assert_eq!(count_transactions(&conn).unwrap(), 0);
    }

    #[test]
    fn test_import_hash_is_stable_and_hex() {
        let date = now();
        let hash = import_hash("agent", 10.0, Some(&date));

        assert_eq!(hash.len(), 64);
        assert_eq!(hash, import_hash("agent", 10.0, Some(&date)));
        assert_ne!(hash, import_hash("agent", 10.0, None));
        assert_ne!(hash, import_hash("agent", 11.0, Some(&date)));
    }
}
