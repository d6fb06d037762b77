use std::fmt::{Debug, Display};

use async_trait::async_trait;

use crate::common::{plan::Report, verification::Verification};

use super::error::Error;

/// Async backend
#[async_trait]
pub trait Backend: Sized + Send + Sync + 'static {
    /// Error taking a privileged connection from the pool
    type PoolError: Debug + Display;
    /// Error establishing a connection as the application role
    type ConnectionError: Debug + Display;
    /// Error executing a statement
    type QueryError: Debug + Display;

    /// Terminates sessions, recreates the database and sets up the role
    async fn bootstrap(
        &self,
    ) -> Result<Report, Error<Self::PoolError, Self::ConnectionError, Self::QueryError>>;
    /// Checks the role logs in and carries its defaults and privileges
    async fn verify(
        &self,
    ) -> Result<Verification, Error<Self::PoolError, Self::ConnectionError, Self::QueryError>>;
    /// Terminates sessions and drops the database and the role
    async fn teardown(
        &self,
    ) -> Result<Report, Error<Self::PoolError, Self::ConnectionError, Self::QueryError>>;
}
