use std::ops::Deref;

use sqlx::Error;

use crate::r#async::backend::error::Error as BackendError;

/// Error acquiring a privileged connection
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct PoolError(#[from] Error);

impl Deref for PoolError {
    type Target = Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error connecting as the application role
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ConnectionError(#[from] Error);

impl Deref for ConnectionError {
    type Target = Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error executing a statement
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct QueryError(#[from] Error);

impl Deref for QueryError {
    type Target = Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

type BError = BackendError<PoolError, ConnectionError, QueryError>;

impl From<PoolError> for BError {
    fn from(value: PoolError) -> Self {
        Self::Pool(value)
    }
}

impl From<ConnectionError> for BError {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl From<QueryError> for BError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}
