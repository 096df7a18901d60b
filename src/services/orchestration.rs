//! Helpers shared by the multi-step service operations.
//!
//! Steps with external side effects (Cognito users, Stripe accounts) run
//! before the database writes; when a later step fails the earlier ones
//! are undone in reverse order with [`compensate`]. Database writes that
//! must land together go through one [`TransactionScope`] closed by
//! [`finish`].

use std::future::Future;

use crate::core::errors::AppResult;
use crate::db::scope::TransactionScope;

/// Runs one rollback step. A failing rollback is logged and swallowed so
/// the caller can still return the error that triggered it.
pub async fn compensate<F>(step: &str, undo: F)
where
    F: Future<Output = AppResult<()>>,
{
    log::warn!("Rolling back: {}", step);
    if let Err(e) = undo.await {
        log::error!("Rollback step '{}' failed: {}", step, e);
    }
}

/// Commits `scope` when `result` is `Ok`, aborts it otherwise.
pub async fn finish<T>(mut scope: TransactionScope, result: AppResult<T>) -> AppResult<T> {
    match result {
        Ok(value) => {
            scope.commit().await?;
            Ok(value)
        }
        Err(e) => {
            scope.abort().await;
            Err(e)
        }
    }
}
