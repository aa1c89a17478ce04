// Timecapsule — CLI Command Handlers
//
// Each function handles one CLI subcommand: resolve the database, build a
// capsule service over it, call one operation, print the outcome. The
// `serve` command hands the same database to the UDS gateway instead.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::capsule::{CapsuleService, CapsuleStatus, KvCapsuleRepository, NewCapsule};
use crate::error::TimecapsuleError;
use crate::gateway::UdsServer;
use crate::open_time::parse_open_at;
use crate::store::{Database, SqliteKvStore};

use super::{Cli, Commands};

/// Default directory for Timecapsule data files.
fn data_dir() -> PathBuf {
    let base = dirs_next::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("timecapsule")
}

/// Path to the database file, honouring `--db` / `TIMECAPSULE_DB`.
fn db_path(overridden: Option<PathBuf>) -> PathBuf {
    overridden.unwrap_or_else(|| data_dir().join("timecapsule.db"))
}

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<(), TimecapsuleError> {
    let path = db_path(cli.db);

    match cli.command {
        Commands::Init => cmd_init(&path),
        Commands::Create {
            owner,
            credential,
            message,
            open_at,
        } => cmd_create(&path, owner, credential, message, open_at),
        Commands::List { owner } => cmd_list(&path, &owner),
        Commands::Unlock { id, credential } => cmd_unlock(&path, &id, &credential),
        Commands::Delete { id, owner } => cmd_delete(&path, &id, &owner),
        Commands::Serve { socket } => cmd_serve(&path, socket).await,
    }
}

// ─── Init ────────────────────────────────────────────────────────────────────

fn cmd_init(path: &Path) -> Result<(), TimecapsuleError> {
    let _db = Database::open(path)
        .map_err(|e| TimecapsuleError::Other(format!("Failed to initialize database: {}", e)))?;

    println!("✓ Timecapsule initialized");
    println!("  Database: {}", path.display());
    println!();
    println!("Next: seal a capsule with `timecapsule create --owner <name> --credential <secret> --message <text> --open-at <time>`");

    Ok(())
}

// ─── Create ──────────────────────────────────────────────────────────────────

fn cmd_create(
    path: &Path,
    owner: String,
    credential: String,
    message: String,
    open_at: String,
) -> Result<(), TimecapsuleError> {
    let db = open_db(path)?;
    let service = CapsuleService::new(KvCapsuleRepository::new(SqliteKvStore::new(&db)));

    let open_at = parse_open_at(&open_at, Utc::now())?;
    let summary = service.create(NewCapsule {
        owner,
        credential,
        message,
        open_at,
    })?;

    println!("✓ Capsule sealed");
    println!("  ID:      {}", summary.id);
    println!("  Owner:   {}", summary.owner);
    println!("  Opens:   {}", summary.open_at.format("%Y-%m-%d %H:%M:%S UTC"));

    Ok(())
}

// ─── List ────────────────────────────────────────────────────────────────────

fn cmd_list(path: &Path, owner: &str) -> Result<(), TimecapsuleError> {
    let db = open_db(path)?;
    let service = CapsuleService::new(KvCapsuleRepository::new(SqliteKvStore::new(&db)));

    let mut summaries = service.list_by_owner(owner)?;

    if summaries.is_empty() {
        println!("No capsules found for '{}'.", owner);
        return Ok(());
    }

    // Display order only; the service makes no ordering promise.
    summaries.sort_by_key(|s| s.open_at);

    let now = Utc::now();
    println!("Capsules for '{}' ({}):\n", owner, summaries.len());
    for summary in &summaries {
        let status = summary.status(now);
        let detail = match (status, summary.time_remaining(now)) {
            (CapsuleStatus::Sealed, Some(left)) => format!("opens in {}", left),
            _ => format!("since {}", summary.open_at.format("%Y-%m-%d %H:%M UTC")),
        };
        println!("  {} │ {:6} │ {}", summary.id, status, detail);
    }

    Ok(())
}

// ─── Unlock ──────────────────────────────────────────────────────────────────

fn cmd_unlock(path: &Path, id: &str, credential: &str) -> Result<(), TimecapsuleError> {
    let db = open_db(path)?;
    let service = CapsuleService::new(KvCapsuleRepository::new(SqliteKvStore::new(&db)));

    let message = service.unlock(id, credential)?;

    println!("✓ Capsule {} opened\n", id);
    println!("{}", message);

    Ok(())
}

// ─── Delete ──────────────────────────────────────────────────────────────────

fn cmd_delete(path: &Path, id: &str, owner: &str) -> Result<(), TimecapsuleError> {
    let db = open_db(path)?;
    let service = CapsuleService::new(KvCapsuleRepository::new(SqliteKvStore::new(&db)));

    service.delete(id, owner)?;
    println!("✓ Capsule {} deleted", id);

    Ok(())
}

// ─── Serve ───────────────────────────────────────────────────────────────────

async fn cmd_serve(path: &Path, socket: Option<PathBuf>) -> Result<(), TimecapsuleError> {
    // Fail fast on a missing or unreadable database before binding the socket.
    drop(open_db(path)?);

    let socket_path = socket.unwrap_or_else(UdsServer::default_socket_path);
    println!("Starting Timecapsule UDS server at {}...", socket_path.display());

    let server = UdsServer::new(path.to_path_buf(), socket_path);
    server
        .run()
        .await
        .map_err(|e| TimecapsuleError::Other(format!("UDS server error: {}", e)))?;

    Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open an existing database; `init` is the only command that creates one.
fn open_db(path: &Path) -> Result<Database, TimecapsuleError> {
    if !path.exists() {
        return Err(TimecapsuleError::Other(format!(
            "Database not found at {}. Run `timecapsule init` first.",
            path.display()
        )));
    }

    Database::open(path)
        .map_err(|e| TimecapsuleError::Other(format!("Failed to open database: {}", e)))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
