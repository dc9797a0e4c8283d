//! Scoped unit-of-work around one engine session.
//!
//! # Responsibility
//! - Guarantee exactly one commit-or-rollback per repository call.
//! - Guarantee the session closes on every exit path.
//!
//! # Invariants
//! - Body success commits before the result is returned.
//! - Any body failure rolls back before it propagates.
//! - The session never outlives this function; dropping the session
//!   closes its connection, which rolls back anything uncommitted
//!   (covering panics in the body).

use crate::engine::{Engine, Session};
use crate::repo::{RepoError, RepoResult};
use log::error;

/// Opens one session on `engine`, runs `body` inside a transaction and
/// commits on success or rolls back on failure.
///
/// A rollback failure after a body error is logged and the body's error
/// propagates; the caller acts on the original failure either way.
pub fn with_session<T>(
    engine: &dyn Engine,
    body: impl FnOnce(&mut dyn Session) -> RepoResult<T>,
) -> RepoResult<T> {
    let mut session = engine.open_session().map_err(RepoError::from)?;
    session.begin().map_err(RepoError::from)?;

    match body(session.as_mut()) {
        Ok(value) => {
            session.commit().map_err(RepoError::from)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback() {
                error!(
                    "event=session_rollback module=session status=error error={rollback_err}"
                );
            }
            Err(err)
        }
    }
}
