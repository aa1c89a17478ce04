// Timecapsule — Gateway Module
//
// The API boundary: JSON-RPC 2.0 over a Unix domain socket, mapping the
// four capsule operations onto the service.

mod protocol;
mod uds;

pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use uds::UdsServer;
