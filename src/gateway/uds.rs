// Timecapsule — Unix Domain Socket Server
//
// Listens on a Unix domain socket for newline-delimited JSON-RPC 2.0
// requests. Each connection runs in its own tokio task and each request
// opens its own database handle; the store is the only shared state.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

use crate::capsule::{
    CapsuleError, CapsuleService, Clock, KvCapsuleRepository, NewCapsule, SystemClock,
};
use crate::open_time::parse_open_at;
use crate::store::{Database, SqliteKvStore};

use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
};

type Service<'a, C> = CapsuleService<KvCapsuleRepository<SqliteKvStore<'a>>, C>;

/// Unix Domain Socket server for the capsule API.
pub struct UdsServer {
    db_path: PathBuf,
    socket_path: PathBuf,
}

impl UdsServer {
    pub fn new(db_path: PathBuf, socket_path: PathBuf) -> Self {
        Self {
            db_path,
            socket_path,
        }
    }

    /// Default socket path: `$XDG_RUNTIME_DIR/timecapsule/timecapsule.sock`
    /// Falls back to `/tmp/timecapsule/timecapsule.sock`.
    pub fn default_socket_path() -> PathBuf {
        let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        runtime_dir.join("timecapsule").join("timecapsule.sock")
    }

    /// Start the UDS server. This runs until the process is terminated.
    pub async fn run(&self) -> std::io::Result<()> {
        if let Some(parent) = self.socket_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Remove stale socket file if it exists
        if self.socket_path.exists() {
            tokio::fs::remove_file(&self.socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        tracing::info!(
            socket = %self.socket_path.display(),
            db = %self.db_path.display(),
            "Timecapsule UDS server listening"
        );

        // Owner-only: anyone who can connect can name any owner string.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        loop {
            let (stream, _addr) = listener.accept().await?;
            let db_path = self.db_path.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &db_path).await {
                    tracing::error!("Connection handler error: {}", e);
                }
            });
        }
    }
}

/// Handle a single client connection.
/// Reads newline-delimited JSON-RPC requests and writes responses.
async fn handle_connection(
    stream: tokio::net::UnixStream,
    db_path: &Path,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(cred) = stream.peer_cred() {
            tracing::debug!(pid = ?cred.pid(), uid = cred.uid(), "Client connected");
        }
    }

    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        // SQLite calls block (busy_timeout included); keep them off the reactor.
        let path = db_path.to_path_buf();
        let response =
            tokio::task::spawn_blocking(move || process_request(&line, &path, &SystemClock))
                .await?;
        let mut json = serde_json::to_string(&response)?;
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }

    Ok(())
}

/// Parse and dispatch a single JSON-RPC request.
fn process_request<C: Clock + Clone>(raw: &str, db_path: &Path, clock: &C) -> JsonRpcResponse {
    let request: JsonRpcRequest = match serde_json::from_str(raw) {
        Ok(req) => req,
        Err(e) => return JsonRpcResponse::parse_error(format!("Parse error: {}", e)),
    };

    if let Err(e) = request.validate() {
        return JsonRpcResponse::error(request.id, INVALID_REQUEST, e);
    }

    let db = match Database::open(db_path) {
        Ok(db) => db,
        Err(e) => return JsonRpcResponse::from_capsule_error(request.id, &CapsuleError::Storage(e)),
    };
    let service = CapsuleService::with_clock(
        KvCapsuleRepository::new(SqliteKvStore::new(&db)),
        clock.clone(),
    );

    match request.method.as_str() {
        "create" => handle_create(&service, clock, request.id, &request.params),
        "list" => handle_list(&service, request.id, &request.params),
        "unlock" => handle_unlock(&service, request.id, &request.params),
        "delete" => handle_delete(&service, request.id, &request.params),
        _ => JsonRpcResponse::error(
            request.id,
            METHOD_NOT_FOUND,
            format!("Unknown method: {}", request.method),
        ),
    }
}

// ─── Method Handlers ─────────────────────────────────────────────────────────

fn handle_create<C: Clock>(
    service: &Service<'_, C>,
    clock: &C,
    id: Value,
    params: &Value,
) -> JsonRpcResponse {
    let owner = match extract_str(params, "owner") {
        Ok(o) => o,
        Err(resp) => return resp.with_id(id),
    };
    let credential = match extract_str(params, "credential") {
        Ok(c) => c,
        Err(resp) => return resp.with_id(id),
    };
    let message = match extract_str(params, "message") {
        Ok(m) => m,
        Err(resp) => return resp.with_id(id),
    };
    let raw_open_at = match extract_str(params, "open_at") {
        Ok(t) => t,
        Err(resp) => return resp.with_id(id),
    };

    let open_at = match parse_open_at(raw_open_at, clock.now()) {
        Ok(t) => t,
        Err(e) => return JsonRpcResponse::from_capsule_error(id, &e),
    };

    let input = NewCapsule {
        owner: owner.to_string(),
        credential: credential.to_string(),
        message: message.to_string(),
        open_at,
    };

    match service.create(input) {
        Ok(summary) => {
            let json = serde_json::to_value(&summary).unwrap_or(Value::Null);
            JsonRpcResponse::success(id, json)
        }
        Err(e) => JsonRpcResponse::from_capsule_error(id, &e),
    }
}

fn handle_list<C: Clock>(service: &Service<'_, C>, id: Value, params: &Value) -> JsonRpcResponse {
    let owner = match extract_str(params, "owner") {
        Ok(o) => o,
        Err(resp) => return resp.with_id(id),
    };

    match service.list_by_owner(owner) {
        Ok(summaries) => {
            let json = serde_json::to_value(&summaries).unwrap_or(Value::Null);
            JsonRpcResponse::success(id, json)
        }
        Err(e) => JsonRpcResponse::from_capsule_error(id, &e),
    }
}

fn handle_unlock<C: Clock>(
    service: &Service<'_, C>,
    id: Value,
    params: &Value,
) -> JsonRpcResponse {
    let capsule_id = match extract_str(params, "id") {
        Ok(i) => i,
        Err(resp) => return resp.with_id(id),
    };
    let credential = match extract_str(params, "credential") {
        Ok(c) => c,
        Err(resp) => return resp.with_id(id),
    };

    match service.unlock(capsule_id, credential) {
        Ok(message) => {
            let result = serde_json::json!({ "id": capsule_id, "message": message });
            JsonRpcResponse::success(id, result)
        }
        Err(e) => JsonRpcResponse::from_capsule_error(id, &e),
    }
}

fn handle_delete<C: Clock>(
    service: &Service<'_, C>,
    id: Value,
    params: &Value,
) -> JsonRpcResponse {
    let capsule_id = match extract_str(params, "id") {
        Ok(i) => i,
        Err(resp) => return resp.with_id(id),
    };
    let owner = match extract_str(params, "owner") {
        Ok(o) => o,
        Err(resp) => return resp.with_id(id),
    };

    match service.delete(capsule_id, owner) {
        Ok(()) => {
            let result = serde_json::json!({ "deleted": true, "id": capsule_id });
            JsonRpcResponse::success(id, result)
        }
        Err(e) => JsonRpcResponse::from_capsule_error(id, &e),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn extract_str<'a>(params: &'a Value, name: &str) -> Result<&'a str, JsonRpcResponse> {
    params.get(name).and_then(|v| v.as_str()).ok_or_else(|| {
        JsonRpcResponse::error(
            Value::Null,
            INVALID_PARAMS,
            format!("Missing '{}' parameter", name),
        )
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
