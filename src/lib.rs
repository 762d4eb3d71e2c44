// Agent Ledger - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod error;
pub mod models;
pub mod db;
pub mod reports;   // Aggregation Engine
pub mod listing;   // Listing Service
pub mod shaping;   // Client Shaping Engine
pub mod import;    // CSV seed import

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::{setup_logging, AppConfig};
pub use error::{FieldError, LedgerError, LedgerResult};
pub use models::{
    Agent, AgentPatch, NewAgent, NewTransaction, Region, Transaction, TransactionUpdate,
    NO_AGENT_LABEL,
};
pub use db::{open_database, setup_database};
pub use reports::{
    agent_totals, daily_totals, report_data, AgentTotal, ChartData, DailyTotal, DateWindow,
    ReportData,
};
pub use listing::{transaction_listing, TransactionListing, TransactionRow};
pub use shaping::{
    shape, AgentRow, ReportSummary, RequestGate, RequestTicket, ShapedPage, SortDirection,
    SortKey, SortSpec, ViewMode, ViewState,
};
pub use import::{
    import_agents, import_agents_file, import_transactions, import_transactions_file, ImportSummary,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
