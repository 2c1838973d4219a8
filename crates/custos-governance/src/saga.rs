//! Generic compensation stack for multi-collaborator writes.
//!
//! Forward steps run in order; each successful step may register a
//! compensating action. When a later step fails, the registered
//! compensations run in reverse order of registration. Three outcomes are
//! distinguished:
//!
//! - step success;
//! - step failure with successful rollback — the original cause is
//!   surfaced, annotated `(rollback successful)`;
//! - step failure with failed rollback — the compensation's own error is
//!   surfaced instead, since an orphaned external resource is the more
//!   urgent operational concern.

use custos_core::error::{CustosError, CustosResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::{error, info};

type CompensationFn = Box<dyn FnOnce() -> BoxFuture<'static, CustosResult<()>> + Send>;

#[derive(Default)]
pub struct CompensationStack {
    compensations: Vec<(&'static str, CompensationFn)>,
}

impl CompensationStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a compensating action for a forward step that succeeded.
    pub fn push<F, Fut>(&mut self, label: &'static str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = CustosResult<()>> + Send + 'static,
    {
        self.compensations
            .push((label, Box::new(move || undo().boxed())));
    }

    /// Run a forward step. On failure, unwind every registered
    /// compensation and translate the outcome.
    pub async fn run<T>(
        &mut self,
        failure: &str,
        step: impl Future<Output = CustosResult<T>>,
    ) -> CustosResult<T> {
        match step.await {
            Ok(value) => Ok(value),
            Err(cause) => Err(self.unwind(failure, cause).await),
        }
    }

    /// Every compensation is attempted even if an earlier one fails; the
    /// first failure (belonging to the most recent forward step) is the
    /// one surfaced.
    async fn unwind(&mut self, failure: &str, cause: CustosError) -> CustosError {
        if self.compensations.is_empty() {
            return cause;
        }

        let mut rollback_failure: Option<CustosError> = None;
        while let Some((label, undo)) = self.compensations.pop() {
            match undo().await {
                Ok(()) => info!(compensation = label, "compensating action applied"),
                Err(e) => {
                    error!(compensation = label, error = %e, "compensating action failed");
                    rollback_failure.get_or_insert(e);
                }
            }
        }

        match rollback_failure {
            None => CustosError::internal(format!("{failure}(rollback successful): {cause}")),
            Some(compensation_error) => CustosError::internal(format!(
                "{failure}, and rollback failed leaving external state behind: \
                 {compensation_error} (original cause: {cause})"
            )),
        }
    }
}
