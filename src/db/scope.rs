//! Transaction scope (unit of work).
//!
//! A scope is acquired from [`Repositories::begin`](crate::repositories::Repositories::begin),
//! passed by `&mut` into any number of repository calls and finished with
//! an explicit [`commit`](TransactionScope::commit).
//!
//! Repositories never commit. When a repository call made with a scope
//! fails, the repository aborts the scope before returning the mapped
//! error, and every later call with the same scope is rejected.
//!
//! ```rust,ignore
//! let mut scope = repos.begin().await?;
//! let review = repos.reviews.create(review, Some(&mut scope)).await?;
//! repos.health_units.update(changes, Some(&mut scope)).await?;
//! scope.commit().await?;
//! ```

use std::fmt;

use mongodb::ClientSession;
use uuid::Uuid;

use crate::core::errors::{AppError, AppResult};
use crate::db::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Active,
    Committed,
    Aborted,
}

pub struct TransactionScope {
    id: Uuid,
    session: Option<ClientSession>,
    state: ScopeState,
}

impl TransactionScope {
    /// Wraps a client session whose transaction is already started.
    pub(crate) fn with_session(session: ClientSession) -> Self {
        Self {
            id: Uuid::new_v4(),
            session: Some(session),
            state: ScopeState::Active,
        }
    }

    /// Scope without a server session, for stores with no transaction support.
    pub fn detached() -> Self {
        Self {
            id: Uuid::new_v4(),
            session: None,
            state: ScopeState::Active,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> ScopeState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ScopeState::Active
    }

    pub(crate) fn ensure_active(&self) -> Result<(), StoreError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StoreError::ScopeInactive)
        }
    }

    pub(crate) fn session_mut(&mut self) -> Option<&mut ClientSession> {
        self.session.as_mut()
    }

    /// Aborts the transaction and ends the session. Idempotent.
    pub async fn abort(&mut self) {
        if !self.is_active() {
            return;
        }

        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.abort_transaction().await {
                log::warn!("Scope {}: abort_transaction failed: {}", self.id, e);
            }
            // dropping the session ends it
        }

        self.state = ScopeState::Aborted;
        log::debug!("Scope {} aborted", self.id);
    }

    /// Commits the unit of work.
    pub async fn commit(mut self) -> AppResult<()> {
        if !self.is_active() {
            return Err(AppError::InternalError(format!(
                "Scope {} cannot be committed: {}",
                self.id, StoreError::ScopeInactive
            )));
        }

        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.commit_transaction().await {
                self.state = ScopeState::Aborted;
                return Err(AppError::InternalError(format!(
                    "Scope {} commit failed: {}",
                    self.id, e
                )));
            }
        }

        self.state = ScopeState::Committed;
        log::debug!("Scope {} committed", self.id);
        Ok(())
    }
}

impl fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionScope")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("has_session", &self.session.is_some())
            .finish()
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if self.is_active() {
            // the driver aborts an in-progress transaction when its session drops
            log::warn!("Scope {} dropped without commit; transaction discarded", self.id);
        }
    }
}
