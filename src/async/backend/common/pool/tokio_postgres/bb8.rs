use std::ops::Deref;

use async_trait::async_trait;
use bb8::{Builder, Pool, PooledConnection, RunError};
use bb8_postgres::PostgresConnectionManager;
use tokio_postgres::{Config, Error, NoTls};

use crate::r#async::backend::{
    common::error::tokio_postgres::{describe, ConnectionError, QueryError},
    error::Error as BackendError,
};

use super::r#trait::TokioPostgresPoolAssociation;

type Manager = PostgresConnectionManager<NoTls>;

/// [`tokio-postgres bb8`](https://docs.rs/bb8-postgres/0.8.1/bb8_postgres/) association
/// # Example
/// ```no_run
/// use bb8::Pool;
/// use db_bootstrap::{
///     r#async::{TokioPostgresBackend, TokioPostgresBb8},
///     BootstrapConfig, PrivilegedPostgresConfig,
/// };
///
/// async fn f() {
///     let config = PrivilegedPostgresConfig::from_env().unwrap();
///     let target = BootstrapConfig::from_env().unwrap();
///
///     let backend = TokioPostgresBackend::<TokioPostgresBb8>::new(
///         config.into(),
///         target,
///         || Pool::builder().max_size(1).retry_connection(false),
///     )
///     .await
///     .unwrap();
/// }
/// ```
pub struct TokioPostgresBb8;

#[async_trait]
impl TokioPostgresPoolAssociation for TokioPostgresBb8 {
    type PooledConnection<'pool> = PooledConnection<'pool, Manager>;

    type Builder = Builder<Manager>;
    type Pool = Pool<Manager>;

    type BuildError = BuildError;
    type PoolError = PoolError;

    async fn build_pool(
        builder: Builder<Manager>,
        config: Config,
    ) -> Result<Pool<Manager>, BuildError> {
        let manager = Manager::new(config, NoTls);
        builder.build(manager).await.map_err(Into::into)
    }

    async fn get_connection<'pool>(
        pool: &'pool Pool<Manager>,
    ) -> Result<PooledConnection<'pool, Manager>, PoolError> {
        pool.get().await.map_err(Into::into)
    }
}

/// Error building a [`bb8`](https://docs.rs/bb8/0.8.6/bb8/) pool
#[derive(Debug, thiserror::Error)]
#[error("{}", describe(.0))]
pub struct BuildError(Error);

impl From<Error> for BuildError {
    fn from(value: Error) -> Self {
        Self(value)
    }
}

impl Deref for BuildError {
    type Target = Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error checking a connection out of a [`bb8`](https://docs.rs/bb8/0.8.6/bb8/) pool
///
/// Build the pool with `retry_connection(false)` to get the server's error
/// instead of a timeout when the privileged login fails.
#[derive(Debug, thiserror::Error)]
#[error("{}", match .0 {
    RunError::User(error) => describe(error),
    error => error.to_string(),
})]
pub struct PoolError(RunError<Error>);

impl From<RunError<Error>> for PoolError {
    fn from(value: RunError<Error>) -> Self {
        Self(value)
    }
}

impl Deref for PoolError {
    type Target = RunError<Error>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<PoolError> for BackendError<PoolError, ConnectionError, QueryError> {
    fn from(value: PoolError) -> Self {
        Self::Pool(value)
    }
}
