//! Handle to the result of an operation running on the client's background runtime.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};

use crate::error::{ApiError, ApiResult};

/// Result of an asynchronous operation that has not been collected yet.
///
/// Await it from async code, or use [`wait`](Self::wait) and
/// [`wait_timeout`](Self::wait_timeout) from blocking code. Dropping it does
/// not cancel the operation; the client still runs it to completion and waits
/// for it on shutdown.
#[must_use = "dropping a PendingResult discards the result but not the work"]
pub struct PendingResult<T> {
    rx: oneshot::Receiver<ApiResult<T>>,
    runtime: Handle,
}

impl<T> PendingResult<T> {
    pub(crate) fn new(rx: oneshot::Receiver<ApiResult<T>>, runtime: Handle) -> Self {
        Self { rx, runtime }
    }

    /// Takes the result if the operation has finished.
    ///
    /// Returns `None` while the operation is still running. Once a result has
    /// been returned, the handle is spent.
    pub fn try_take(&mut self) -> Option<ApiResult<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(lost())),
        }
    }

    /// Blocks the current thread until the operation finishes.
    pub fn wait(self) -> ApiResult<T> {
        futures::executor::block_on(self)
    }

    /// Blocks for at most `timeout`.
    ///
    /// Returns the handle back if the operation is still running, so the
    /// caller can wait again later.
    pub fn wait_timeout(mut self, timeout: Duration) -> Result<ApiResult<T>, Self> {
        if let Some(result) = self.try_take() {
            return Ok(result);
        }

        let runtime = self.runtime.clone();
        let _guard = runtime.enter();
        let outcome = futures::executor::block_on(async {
            tokio::time::timeout(timeout, &mut self.rx).await
        });
        match outcome {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Ok(Err(lost())),
            Err(_) => Err(self),
        }
    }
}

impl<T> Future for PendingResult<T> {
    type Output = ApiResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(lost())))
    }
}

impl<T> fmt::Debug for PendingResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResult").finish_non_exhaustive()
    }
}

fn lost() -> ApiError {
    ApiError::TaskFailed("operation dropped before completion".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn test_try_take_before_and_after_completion() {
        let rt = runtime();
        let (tx, rx) = oneshot::channel::<ApiResult<u32>>();
        let mut pending = PendingResult::new(rx, rt.handle().clone());

        assert!(pending.try_take().is_none());
        tx.send(Ok(7)).unwrap();
        assert_eq!(pending.try_take(), Some(Ok(7)));
    }

    #[test]
    fn test_wait_blocks_until_sent() {
        let rt = runtime();
        let (tx, rx) = oneshot::channel::<ApiResult<u32>>();
        let pending = PendingResult::new(rx, rt.handle().clone());

        rt.spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = tx.send(Ok(42));
        });

        assert_eq!(pending.wait(), Ok(42));
    }

    #[test]
    fn test_wait_timeout_returns_handle_then_result() {
        let rt = runtime();
        let (tx, rx) = oneshot::channel::<ApiResult<u32>>();
        let pending = PendingResult::new(rx, rt.handle().clone());

        let pending = pending
            .wait_timeout(Duration::from_millis(10))
            .expect_err("nothing sent yet");

        tx.send(Err(ApiError::Shutdown)).unwrap();
        let result = pending.wait_timeout(Duration::from_millis(10)).unwrap();
        assert_eq!(result, Err(ApiError::Shutdown));
    }

    #[test]
    fn test_dropped_sender_reports_task_failed() {
        let rt = runtime();
        let (tx, rx) = oneshot::channel::<ApiResult<u32>>();
        let pending = PendingResult::new(rx, rt.handle().clone());
        drop(tx);
        assert!(matches!(pending.wait(), Err(ApiError::TaskFailed(_))));
    }

    #[test]
    fn test_awaitable_from_async_code() {
        let rt = runtime();
        let (tx, rx) = oneshot::channel::<ApiResult<&'static str>>();
        let pending = PendingResult::new(rx, rt.handle().clone());
        tx.send(Ok("done")).unwrap();
        assert_eq!(rt.block_on(pending), Ok("done"));
    }
}
