use std::{
    fmt::{Debug, Display},
    ops::DerefMut,
};

use async_trait::async_trait;
use tokio_postgres::{Client, Config};

use crate::r#async::backend::{
    common::error::tokio_postgres::{ConnectionError, QueryError},
    error::Error as BackendError,
};

/// Pool used by [`TokioPostgresBackend`](crate::r#async::TokioPostgresBackend) for
/// privileged connections
#[async_trait]
pub trait TokioPostgresPoolAssociation: 'static {
    /// Connection checked out of the pool
    type PooledConnection<'pool>: DerefMut<Target = Client> + Send;

    /// Pool settings, without connection parameters
    type Builder;
    /// Pool
    type Pool: Send + Sync + 'static;

    /// Error building the pool
    type BuildError: Debug + Display + Send;
    /// Error checking a connection out of the pool
    type PoolError: Into<BackendError<Self::PoolError, ConnectionError, QueryError>>
        + Debug
        + Display
        + Send;

    /// Builds a pool connecting with `config`
    async fn build_pool(
        builder: Self::Builder,
        config: Config,
    ) -> Result<Self::Pool, Self::BuildError>;
    /// Checks a connection out of `pool`
    async fn get_connection<'pool>(
        pool: &'pool Self::Pool,
    ) -> Result<Self::PooledConnection<'pool>, Self::PoolError>;
}
