// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use agent_ledger::db::{count_agents, count_transactions, open_database};
use agent_ledger::import::{import_agents_file, import_transactions_file};
use agent_ledger::{setup_logging, AppConfig, VERSION};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = AppConfig::from_env();

    match args.get(1).map(String::as_str) {
        Some("import-agents") => {
            setup_logging(config.log_level);
            run_import(&config, ImportKind::Agents, args.get(2))?;
        }
        Some("import-transactions") => {
            setup_logging(config.log_level);
            run_import(&config, ImportKind::Transactions, args.get(2))?;
        }
        Some(other) => {
            eprintln!("Unknown command: {}", other);
            eprintln!("agent-ledger {}", VERSION);
            eprintln!("Usage: agent-ledger [import-agents <file> | import-transactions <file>]");
            std::process::exit(2);
        }
        // UI mode (default). The terminal owns the screen, so no log output.
        None => run_ui_mode(&config)?,
    }

    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum ImportKind {
    Agents,
    Transactions,
}

fn run_import(config: &AppConfig, kind: ImportKind, file: Option<&String>) -> Result<()> {
    let Some(file) = file else {
        bail!("missing CSV file argument");
    };
    let csv_path = Path::new(file);

    println!("📥 Importing {:?} from {}", kind, csv_path.display());

    let conn = open_database(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;

    let summary = match kind {
        ImportKind::Agents => import_agents_file(&conn, csv_path),
        ImportKind::Transactions => import_transactions_file(&conn, csv_path, Utc::now()),
    }
    .with_context(|| format!("importing {}", csv_path.display()))?;

    println!("✓ Inserted:   {}", summary.inserted);
    println!("✓ Duplicates: {}", summary.duplicates);
    println!("✓ Rejected:   {}", summary.rejected);
    println!(
        "✓ Database now holds {} agents and {} transactions",
        count_agents(&conn)?,
        count_transactions(&conn)?
    );

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig) -> Result<()> {
    println!("🖥️  Loading Agent Ledger from {}...", config.db_path.display());

    let mut app = ui::App::new(config.db_path.clone())
        .with_context(|| format!("opening database {}", config.db_path.display()))?;

    println!("✓ Loaded {} agents, {} transactions", app.agents.len(), app.transactions.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API: cargo run --bin agent-ledger-server --features server");
    std::process::exit(1);
}
