use std::{error::Error as _, fmt::Debug, ops::Deref};

use tokio_postgres::Error;

use crate::r#async::backend::error::Error as BackendError;

/// Includes the server's message, which the driver keeps in its source
pub(crate) fn describe(error: &Error) -> String {
    match error.source() {
        Some(cause) => format!("{error}: {cause}"),
        None => error.to_string(),
    }
}

/// Error connecting as the application role
#[derive(Debug, thiserror::Error)]
#[error("{}", describe(.0))]
pub struct ConnectionError(Error);

impl From<Error> for ConnectionError {
    fn from(value: Error) -> Self {
        Self(value)
    }
}

impl Deref for ConnectionError {
    type Target = Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error executing a statement
#[derive(Debug, thiserror::Error)]
#[error("{}", describe(.0))]
pub struct QueryError(Error);

impl From<Error> for QueryError {
    fn from(value: Error) -> Self {
        Self(value)
    }
}

impl Deref for QueryError {
    type Target = Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<P: Debug> From<ConnectionError> for BackendError<P, ConnectionError, QueryError> {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl<P: Debug> From<QueryError> for BackendError<P, ConnectionError, QueryError> {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}
