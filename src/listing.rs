// 📋 Listing Service - unpaged transactions + agents as one consistent snapshot
//
// Every embedded agent name is resolved against the agent set returned in
// the same payload. A reference that does not resolve is labelled, never
// fatal.

use crate::db::{get_all_agents, parse_stored_timestamp};
use crate::error::LedgerResult;
use crate::models::{Agent, NO_AGENT_LABEL};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// A transaction ready for display: agent name already resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub id: String,
    pub amount: f64,
    pub date: DateTime<Utc>,
    /// None when the referenced agent no longer exists
    pub agent_id: Option<String>,
    pub agent_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionListing {
    pub transactions: Vec<TransactionRow>,
    pub agents: Vec<Agent>,
}

/// Read agents and transactions in one transaction, newest transactions first.
pub fn transaction_listing(conn: &mut Connection) -> LedgerResult<TransactionListing> {
    let snapshot = conn.transaction()?;

    let agents = get_all_agents(&snapshot)?;

    let transactions = {
        let names: HashMap<&str, String> = agents
            .iter()
            .map(|a| (a.id.as_str(), a.display_name()))
            .collect();

        let mut stmt = snapshot.prepare(
            "SELECT id, amount, agent_id, occurred_at
             FROM transactions
             ORDER BY occurred_at DESC",
        )?;

        let rows = stmt
            .query_map([], |row| {
                let agent_ref: Option<String> = row.get(2)?;
                let occurred_at: String = row.get(3)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?, agent_ref, occurred_at))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let resolved = rows
            .into_iter()
            .map(|(id, amount, agent_ref, occurred_at)| {
                let date = parse_stored_timestamp(3, &occurred_at)?;
                let resolved_name = agent_ref.as_deref().and_then(|r| names.get(r));
                let (agent_id, agent_name) = match resolved_name {
                    Some(name) => (agent_ref.clone(), name.clone()),
                    None => (None, NO_AGENT_LABEL.to_string()),
                };
                Ok(TransactionRow {
                    id,
                    amount,
                    date,
                    agent_id,
                    agent_name,
                })
            })
            .collect::<rusqlite::Result<Vec<_>>>()?;
        resolved
    };

    snapshot.commit()?;

    debug!(
        "Listing: {} transactions, {} agents",
        transactions.len(),
        agents.len()
    );

    Ok(TransactionListing { transactions, agents })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{seed_agent, seed_transaction, test_conn};
    use crate::db::delete_agent;

    #[test]
    fn test_listing_joins_display_names() {
        let mut conn = test_conn();
        let a = seed_agent(&conn, "maya", "ortiz", "North", 500.0);
        seed_transaction(&conn, &a.id, 120.0, 2024, 2, 1);

        let listing = transaction_listing(&mut conn).unwrap();

        assert_eq!(listing.agents.len(), 1);
        assert_eq!(listing.transactions.len(), 1);
        assert_eq!(listing.transactions[0].agent_name, "Maya Ortiz");
        assert_eq!(listing.transactions[0].agent_id.as_deref(), Some(a.id.as_str()));
    }

    #[test]
    fn test_dangling_reference_gets_sentinel_label() {
        let mut conn = test_conn();
        let a = seed_agent(&conn, "Sam", "Reed", "East", 100.0);
        seed_transaction(&conn, &a.id, 10.0, 2024, 2, 1);
        delete_agent(&conn, &a.id).unwrap();

        let listing = transaction_listing(&mut conn).unwrap();

        assert!(listing.agents.is_empty());
        assert_eq!(listing.transactions[0].agent_name, NO_AGENT_LABEL);
        assert_eq!(listing.transactions[0].agent_id, None);
    }

    #[test]
    fn test_every_named_transaction_resolves_in_same_payload() {
        let mut conn = test_conn();
        let a = seed_agent(&conn, "Ann", "Lee", "North", 1.0);
        let b = seed_agent(&conn, "Bob", "Ray", "South", 1.0);
        seed_transaction(&conn, &a.id, 1.0, 2024, 1, 1);
        seed_transaction(&conn, &b.id, 2.0, 2024, 1, 2);
        delete_agent(&conn, &b.id).unwrap();

        let listing = transaction_listing(&mut conn).unwrap();

        for row in &listing.transactions {
            match &row.agent_id {
                Some(id) => {
                    let agent = listing.agents.iter().find(|a| &a.id == id).unwrap();
                    assert_eq!(agent.display_name(), row.agent_name);
                }
                None => assert_eq!(row.agent_name, NO_AGENT_LABEL),
            }
        }
    }

    #[test]
    fn test_listing_is_newest_first_and_unpaged() {
        let mut conn = test_conn();
        let a = seed_agent(&conn, "Ann", "Lee", "North", 1.0);
        for d in 1..=25 {
            seed_transaction(&conn, &a.id, d as f64, 2024, 1, d);
        }

        let listing = transaction_listing(&mut conn).unwrap();

        assert_eq!(listing.transactions.len(), 25);
        assert_eq!(listing.transactions[0].amount, 25.0);
        assert_eq!(listing.transactions[24].amount, 1.0);
    }

    #[test]
    fn test_listing_serializes_camel_case() {
        let row = TransactionRow {
            id: "t".to_string(),
            amount: 1.0,
            date: Utc::now(),
            agent_id: None,
            agent_name: NO_AGENT_LABEL.to_string(),
        };
        let json = serde_json::to_value(&row).unwrap();
        assert!(json["agentId"].is_null());
        assert_eq!(json["agentName"], NO_AGENT_LABEL);
    }
}
