//! Completion callbacks.
//!
//! Every façade operation is an `async fn`. Callers that prefer a
//! continuation can hand the future to [`on_complete`], which runs it on the
//! tokio runtime and invokes the callback exactly once with the outcome.

use crate::error::ClientResult;
use mongoose_protocol::Response;
use std::future::Future;
use tokio::task::JoinHandle;

/// Spawns `operation` and calls `callback` with its result.
///
/// The callback receives `Err` first-class: remote failures, transport
/// failures and argument errors all arrive through the same `Result`. Must
/// be called from within a tokio runtime.
///
/// Façade futures borrow their connection, so spawn an owned future:
///
/// ```
/// use mongoose_client::{on_complete, ClientConfig, Connection, MockTransport};
/// use std::sync::Arc;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let conn = Arc::new(Connection::new(ClientConfig::default(), MockTransport::new()));
/// let task = {
///     let conn = Arc::clone(&conn);
///     on_complete(async move { conn.get_shards().await }, |result| {
///         assert!(result.is_ok());
///     })
/// };
/// task.await.unwrap();
/// # });
/// ```
pub fn on_complete<F, C>(operation: F, callback: C) -> JoinHandle<()>
where
    F: Future<Output = ClientResult<Response>> + Send + 'static,
    C: FnOnce(ClientResult<Response>) + Send + 'static,
{
    tokio::spawn(async move {
        let result = operation.await;
        callback(result);
    })
}
