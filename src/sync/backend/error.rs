use std::fmt::Debug;

use crate::common::verification::Mismatch;

/// Sync backend error
#[derive(Debug, thiserror::Error)]
pub enum Error<C: Debug, Q: Debug> {
    /// No privileged connection could be taken from the pool
    #[error("failed to get a privileged connection: {0}")]
    Pool(r2d2::Error),
    /// Connecting as the application role failed
    #[error("failed to connect as the application role: {0}")]
    Connection(C),
    /// The server rejected a statement
    #[error("statement failed: {0}")]
    Query(Q),
    /// The target database is the one the privileged connection opens
    #[error("database {0} is the maintenance database and cannot be recreated or dropped")]
    MaintenanceDatabase(String),
    /// The role does not match its configuration
    #[error("verification failed: {0}")]
    Verification(Mismatch),
}

impl<C: Debug, Q: Debug> From<r2d2::Error> for Error<C, Q> {
    fn from(value: r2d2::Error) -> Self {
        Self::Pool(value)
    }
}

impl<C: Debug, Q: Debug> From<Mismatch> for Error<C, Q> {
    fn from(value: Mismatch) -> Self {
        Self::Verification(value)
    }
}
