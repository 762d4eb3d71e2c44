use crate::error::{LedgerError, LedgerResult};
use crate::models::{format_timestamp, Agent, Region, Transaction};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use tracing::{debug, info};

/// Open (or create) the database at `path` and make sure the schema exists.
pub fn open_database(path: &Path) -> LedgerResult<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    debug!("Database opened: {:?}", path);
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> LedgerResult<()> {
    // Enable WAL mode for crash recovery
    // (in-memory databases report "memory" and that is fine)
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Agents Table
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            region TEXT NOT NULL,
            rating REAL NOT NULL,
            fee REAL NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Transactions Table
    // agent_id is a weak reference: no FOREIGN KEY, deleting an agent
    // leaves its transactions in place.
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS transactions (
            id TEXT PRIMARY KEY,
            amount REAL NOT NULL,
            agent_id TEXT NOT NULL,
            occurred_at TEXT NOT NULL,
            import_hash TEXT UNIQUE,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(occurred_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_transactions_agent ON transactions(agent_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

pub(crate) fn map_agent_row(row: &Row<'_>) -> rusqlite::Result<Agent> {
    let region: String = row.get(3)?;
    let region = region.parse::<Region>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(LedgerError::Validation(vec![e])),
        )
    })?;

    Ok(Agent {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        region,
        rating: row.get(4)?,
        fee: row.get(5)?,
    })
}

pub(crate) fn parse_stored_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn map_transaction_row(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let occurred_at: String = row.get(3)?;

    Ok(Transaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        agent_id: row.get(2)?,
        date: parse_stored_timestamp(3, &occurred_at)?,
    })
}

const AGENT_COLUMNS: &str = "id, first_name, last_name, region, rating, fee";
const TRANSACTION_COLUMNS: &str = "id, amount, agent_id, occurred_at";

// ============================================================================
// AGENTS
// ============================================================================

pub fn insert_agent(conn: &Connection, agent: &Agent) -> LedgerResult<()> {
    conn.execute(
        "INSERT INTO agents (id, first_name, last_name, region, rating, fee)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            agent.id,
            agent.first_name,
            agent.last_name,
            agent.region.as_str(),
            agent.rating,
            agent.fee,
        ],
    )?;

    Ok(())
}

pub fn get_agent(conn: &Connection, id: &str) -> LedgerResult<Option<Agent>> {
    let agent = conn
        .query_row(
            &format!("SELECT {} FROM agents WHERE id = ?1", AGENT_COLUMNS),
            [id],
            map_agent_row,
        )
        .optional()?;

    Ok(agent)
}

/// Like `get_agent`, but absence is an error.
pub fn require_agent(conn: &Connection, id: &str) -> LedgerResult<Agent> {
    get_agent(conn, id)?.ok_or_else(|| LedgerError::not_found("agent", id))
}

pub fn get_all_agents(conn: &Connection) -> LedgerResult<Vec<Agent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM agents ORDER BY created_at, rowid",
        AGENT_COLUMNS
    ))?;

    let agents = stmt
        .query_map([], map_agent_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(agents)
}

/// Overwrite every mutable column. Returns false if the agent does not exist.
pub fn update_agent(conn: &Connection, agent: &Agent) -> LedgerResult<bool> {
    let changed = conn.execute(
        "UPDATE agents
         SET first_name = ?2, last_name = ?3, region = ?4, rating = ?5, fee = ?6
         WHERE id = ?1",
        params![
            agent.id,
            agent.first_name,
            agent.last_name,
            agent.region.as_str(),
            agent.rating,
            agent.fee,
        ],
    )?;

    Ok(changed > 0)
}

/// Immediate, irreversible delete. Transactions referencing the agent are left dangling.
pub fn delete_agent(conn: &Connection, id: &str) -> LedgerResult<bool> {
    let changed = conn.execute("DELETE FROM agents WHERE id = ?1", [id])?;
    if changed > 0 {
        info!("Deleted agent {}", id);
    }
    Ok(changed > 0)
}

pub fn find_agent_by_display_name(conn: &Connection, name: &str) -> LedgerResult<Option<Agent>> {
    let wanted = name.trim().to_lowercase();
    Ok(get_all_agents(conn)?
        .into_iter()
        .find(|agent| agent.display_name().to_lowercase() == wanted))
}

pub fn count_agents(conn: &Connection) -> LedgerResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM agents", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// TRANSACTIONS
// ============================================================================

/// Insert a transaction whose agent must exist right now.
pub fn insert_transaction(conn: &Connection, tx: &Transaction) -> LedgerResult<()> {
    require_agent(conn, &tx.agent_id)?;

    conn.execute(
        "INSERT INTO transactions (id, amount, agent_id, occurred_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![tx.id, tx.amount, tx.agent_id, format_timestamp(&tx.date)],
    )?;

    Ok(())
}

/// Insert keyed by an idempotency hash. Returns false when the hash is already
/// present; any other constraint failure is an error.
pub fn insert_transaction_once(conn: &Connection, tx: &Transaction, hash: &str) -> LedgerResult<bool> {
    require_agent(conn, &tx.agent_id)?;

    let result = conn.execute(
        "INSERT INTO transactions (id, amount, agent_id, occurred_at, import_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![tx.id, tx.amount, tx.agent_id, format_timestamp(&tx.date), hash],
    );

    match result {
        Ok(_) => Ok(true),
        Err(rusqlite::Error::SqliteFailure(err, Some(message)))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                && message.contains("import_hash") =>
        {
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_transaction(conn: &Connection, id: &str) -> LedgerResult<Option<Transaction>> {
    let tx = conn
        .query_row(
            &format!("SELECT {} FROM transactions WHERE id = ?1", TRANSACTION_COLUMNS),
            [id],
            map_transaction_row,
        )
        .optional()?;

    Ok(tx)
}

/// Returns false if the transaction does not exist. The new agent must exist.
pub fn update_transaction(conn: &Connection, tx: &Transaction) -> LedgerResult<bool> {
    require_agent(conn, &tx.agent_id)?;

    let changed = conn.execute(
        "UPDATE transactions SET amount = ?2, agent_id = ?3, occurred_at = ?4 WHERE id = ?1",
        params![tx.id, tx.amount, tx.agent_id, format_timestamp(&tx.date)],
    )?;

    Ok(changed > 0)
}

pub fn count_transactions(conn: &Connection) -> LedgerResult<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM transactions", [], |row| row.get(0))?;
    Ok(count)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::NewAgent;
    use chrono::TimeZone;

    /// Helper: in-memory database with the schema applied
    pub(crate) fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    /// Helper: insert a valid agent and return it
    pub(crate) fn seed_agent(conn: &Connection, first: &str, last: &str, region: &str, fee: f64) -> Agent {
        let agent = NewAgent {
            first_name: first.to_string(),
            last_name: last.to_string(),
            region: region.to_string(),
            rating: 50.0,
            fee,
        }
        .into_agent()
        .unwrap();
        insert_agent(conn, &agent).unwrap();
        agent
    }

    /// Helper: insert a transaction dated at noon UTC on the given day
    pub(crate) fn seed_transaction(conn: &Connection, agent_id: &str, amount: f64, y: i32, m: u32, d: u32) -> Transaction {
        let tx = Transaction {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            agent_id: agent_id.to_string(),
            date: Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap(),
        };
        insert_transaction(conn, &tx).unwrap();
        tx
    }

    #[test]
    fn test_agent_crud_round() {
        let conn = test_conn();
        let mut agent = seed_agent(&conn, "Maya", "Ortiz", "North", 500.0);

        assert_eq!(get_agent(&conn, &agent.id).unwrap(), Some(agent.clone()));

        agent.fee = 750.0;
        assert!(update_agent(&conn, &agent).unwrap());
        assert_eq!(require_agent(&conn, &agent.id).unwrap().fee, 750.0);

        assert!(delete_agent(&conn, &agent.id).unwrap());
        assert!(get_agent(&conn, &agent.id).unwrap().is_none());
        assert!(!delete_agent(&conn, &agent.id).unwrap());
    }

    #[test]
    fn test_require_agent_missing_is_not_found() {
        let conn = test_conn();
        let err = require_agent(&conn, "nope").unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: "agent", .. }));
    }

    #[test]
    fn test_insert_transaction_requires_existing_agent() {
        let conn = test_conn();
        let tx = Transaction {
            id: "tx-1".to_string(),
            amount: 10.0,
            agent_id: "ghost".to_string(),
            date: Utc::now(),
        };

        assert!(matches!(
            insert_transaction(&conn, &tx),
            Err(LedgerError::NotFound { .. })
        ));
        assert_eq!(count_transactions(&conn).unwrap(), 0);
    }

    #[test]
    fn test_delete_agent_does_not_cascade() {
        let conn = test_conn();
        let agent = seed_agent(&conn, "Sam", "Reed", "East", 100.0);
        seed_transaction(&conn, &agent.id, 40.0, 2024, 1, 2);
        let tx = seed_transaction(&conn, &agent.id, 40.0, 2024, 1, 3);

        delete_agent(&conn, &agent.id).unwrap();

        assert_eq!(count_transactions(&conn).unwrap(), 2);
        let remaining = get_transaction(&conn, &tx.id).unwrap().unwrap();
        assert_eq!(remaining.agent_id, agent.id);
    }

    #[test]
    fn test_update_transaction() {
        let conn = test_conn();
        let a = seed_agent(&conn, "Sam", "Reed", "East", 100.0);
        let b = seed_agent(&conn, "Kim", "Park", "West", 100.0);
        let mut tx = seed_transaction(&conn, &a.id, 40.0, 2024, 1, 2);

        tx.amount = 55.5;
        tx.agent_id = b.id.clone();
        assert!(update_transaction(&conn, &tx).unwrap());

        let stored = get_transaction(&conn, &tx.id).unwrap().unwrap();
        assert_eq!(stored, tx);
    }

    #[test]
    fn test_insert_transaction_once_skips_duplicate_hash() {
        let conn = test_conn();
        let agent = seed_agent(&conn, "Sam", "Reed", "East", 100.0);
        let mk = |id: &str| Transaction {
            id: id.to_string(),
            amount: 9.0,
            agent_id: agent.id.clone(),
            date: Utc.with_ymd_and_hms(2024, 5, 5, 0, 0, 0).unwrap(),
        };

        assert!(insert_transaction_once(&conn, &mk("a"), "hash-1").unwrap());
        assert!(!insert_transaction_once(&conn, &mk("b"), "hash-1").unwrap());
        assert_eq!(count_transactions(&conn).unwrap(), 1);
    }

    #[test]
    fn test_insert_transaction_once_reports_other_constraint_failures() {
        let conn = test_conn();
        let agent = seed_agent(&conn, "Sam", "Reed", "East", 100.0);
        let tx = seed_transaction(&conn, &agent.id, 9.0, 2024, 5, 5);

        // Same primary key, fresh hash: not a duplicate import
        let result = insert_transaction_once(&conn, &tx, "hash-2");

        assert!(matches!(result, Err(LedgerError::Store(_))));
        assert_eq!(count_transactions(&conn).unwrap(), 1);
    }

    #[test]
    fn test_find_agent_by_display_name() {
        let conn = test_conn();
        let agent = seed_agent(&conn, "maya", "ortiz", "North", 500.0);

        let found = find_agent_by_display_name(&conn, "Maya Ortiz").unwrap();
        assert_eq!(found.map(|a| a.id), Some(agent.id));
        assert!(find_agent_by_display_name(&conn, "Nobody").unwrap().is_none());
    }
}
