use std::fmt::{Debug, Display};

use crate::common::{plan::Report, verification::Verification};

use super::error::Error;

/// Sync backend
pub trait Backend: Sized + Send + Sync + 'static {
    /// Error establishing a connection as the application role
    type ConnectionError: Debug + Display;
    /// Error executing a statement
    type QueryError: Debug + Display;

    /// Terminates sessions, recreates the database and sets up the role
    fn bootstrap(&self) -> Result<Report, Error<Self::ConnectionError, Self::QueryError>>;
    /// Checks the role logs in and carries its defaults and privileges
    fn verify(&self) -> Result<Verification, Error<Self::ConnectionError, Self::QueryError>>;
    /// Terminates sessions and drops the database and the role
    fn teardown(&self) -> Result<Report, Error<Self::ConnectionError, Self::QueryError>>;
}
