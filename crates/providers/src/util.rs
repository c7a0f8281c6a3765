//! Shared helpers for provider adapters: mapping transport/HTTP failures
//! onto the domain error taxonomy.

use turnloop_domain::Error;

/// Map an HTTP response status and body into a domain error, per the
/// 429/408/other classification the turn executor's outer catch relies on.
pub fn from_http_status(status: u16, body: impl Into<String>) -> Error {
    Error::from_status(status, body)
}
