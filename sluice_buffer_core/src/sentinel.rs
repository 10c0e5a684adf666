use std::sync::{Arc, OnceLock};

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::warn;

use crate::error::{IngestError, Result};

/// Holds the first fatal flush error.
///
/// The first failure wins, later ones are logged and dropped. Setting the
/// failure also cancels a token that the scheduler and blocked producers
/// wait on.
#[derive(Debug, Clone, Default)]
pub struct FlushFailure {
    inner: Arc<FailureState>,
}

#[derive(Debug, Default)]
struct FailureState {
    error: OnceLock<IngestError>,
    ct: CancellationToken,
}

impl FlushFailure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `error` as the fatal failure.
    ///
    /// Returns `true` if this call set the failure.
    pub fn fail(&self, error: IngestError) -> bool {
        match self.inner.error.set(error) {
            Ok(()) => {
                self.inner.ct.cancel();
                true
            }
            Err(error) => {
                warn!(error = %error, "ignoring flush failure after the first one");
                false
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        self.inner.error.get().is_some()
    }

    /// Returns the stored failure, if any.
    pub fn check(&self) -> Result<()> {
        match self.inner.error.get() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// Completes once a failure is recorded.
    pub fn failed(&self) -> WaitForCancellationFuture<'_> {
        self.inner.ct.cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal(message: &str) -> IngestError {
        IngestError::Internal {
            message: message.to_string(),
        }
    }

    #[test]
    fn test_first_failure_wins() {
        let failure = FlushFailure::new();
        assert!(failure.check().is_ok());

        assert!(failure.fail(internal("first")));
        assert!(!failure.fail(internal("second")));

        let err = failure.check().unwrap_err();
        assert_eq!(err.to_string(), "internal error: first");
        assert!(failure.is_failed());
    }

    #[tokio::test]
    async fn test_failed_completes() {
        let failure = FlushFailure::new();
        let waiter = tokio::spawn({
            let failure = failure.clone();
            async move { failure.failed().await }
        });

        failure.fail(internal("boom"));
        waiter.await.expect("waiter task");
    }
}
