// Panic isolation for worker safety
use std::any::Any;
use std::future::Future;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed
    Success(T),
    /// Execution panicked (or its task was cancelled)
    Panicked(String),
}

/// Run a future on its own tokio task so a panic cannot unwind into the caller
///
/// A worker panic must not take the dispatcher down; the panic is caught at
/// the task boundary and returned as `PanicGuardResult::Panicked`.
///
/// # Example
/// ```text
/// match execute_guarded_async(async { executor.execute(&command).await }).await {
///     PanicGuardResult::Success(result) => { /* map result */ }
///     PanicGuardResult::Panicked(msg) => { /* record failure */ }
/// }
/// ```
pub async fn execute_guarded_async<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn(future).await {
        Ok(value) => PanicGuardResult::Success(value),
        Err(join_err) if join_err.is_panic() => {
            let panic_msg = panic_message(join_err.into_panic());
            error!(panic_msg = %panic_msg, "Worker task panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
        Err(join_err) => {
            error!(error = %join_err, "Worker task cancelled");
            PanicGuardResult::Panicked(format!("task cancelled: {}", join_err))
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
