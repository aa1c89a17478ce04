// Timecapsule — CLI Module
//
// Command-line interface using clap derive macros.
// Subcommands: init, create, list, unlock, delete, serve.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::execute;

/// Timecapsule — seal a message until a future moment, behind a credential.
#[derive(Parser, Debug)]
#[command(name = "timecapsule")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the capsule database (default: <data dir>/timecapsule/timecapsule.db).
    #[arg(long, global = true, env = "TIMECAPSULE_DB")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and database.
    Init,

    /// Seal a new capsule.
    Create {
        /// Who owns the capsule; required later to list or delete it.
        #[arg(long)]
        owner: String,

        /// Secret required to open the capsule.
        /// For real use, prefer the TIMECAPSULE_CREDENTIAL env var over shell history.
        #[arg(long, env = "TIMECAPSULE_CREDENTIAL", hide_env_values = true)]
        credential: String,

        /// The message to seal.
        #[arg(long)]
        message: String,

        /// When the capsule may be opened: RFC 3339 ("2027-01-01T00:00:00Z"),
        /// naive UTC ("2027-01-01T00:00"), or relative ("+1h", "30m", "7d").
        #[arg(long)]
        open_at: String,
    },

    /// List an owner's capsules (no messages, no credentials).
    List {
        #[arg(long)]
        owner: String,
    },

    /// Reveal a capsule's message once its open time has passed.
    Unlock {
        /// The capsule ID.
        id: String,

        #[arg(long, env = "TIMECAPSULE_CREDENTIAL", hide_env_values = true)]
        credential: String,
    },

    /// Delete a capsule. Only its owner may do this.
    Delete {
        /// The capsule ID.
        id: String,

        #[arg(long)]
        owner: String,
    },

    /// Serve the capsule API as JSON-RPC over a Unix domain socket.
    Serve {
        /// Socket path (default: $XDG_RUNTIME_DIR/timecapsule/timecapsule.sock).
        #[arg(long, env = "TIMECAPSULE_SOCKET")]
        socket: Option<PathBuf>,
    },
}
