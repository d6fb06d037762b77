use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use deadpool::{
    managed::{self, BuildError, Object, Pool, PoolConfig},
    Runtime,
};
use deadpool_postgres::Manager;
use tokio_postgres::{Client, Config, Error, NoTls};

use crate::r#async::backend::{
    common::error::tokio_postgres::{describe, ConnectionError, QueryError},
    error::Error as BackendError,
};

use super::r#trait::TokioPostgresPoolAssociation;

/// [`tokio-postgres deadpool`](https://docs.rs/deadpool-postgres/0.14.1/deadpool_postgres/) association
/// # Example
/// ```no_run
/// use db_bootstrap::{
///     r#async::{TokioPostgresBackend, TokioPostgresDeadpool},
///     BootstrapConfig, PrivilegedPostgresConfig,
/// };
/// use deadpool::managed::PoolConfig;
///
/// async fn f() {
///     let config = PrivilegedPostgresConfig::from_env().unwrap();
///     let target = BootstrapConfig::from_env().unwrap();
///
///     let backend = TokioPostgresBackend::<TokioPostgresDeadpool>::new(
///         config.into(),
///         target,
///         || PoolConfig::new(1),
///     )
///     .await
///     .unwrap();
/// }
/// ```
pub struct TokioPostgresDeadpool;

#[async_trait]
impl TokioPostgresPoolAssociation for TokioPostgresDeadpool {
    type PooledConnection<'pool> = PooledConnection;

    type Builder = PoolConfig;
    type Pool = Pool<Manager>;

    type BuildError = BuildError;
    type PoolError = PoolError;

    async fn build_pool(builder: PoolConfig, config: Config) -> Result<Pool<Manager>, BuildError> {
        let manager = Manager::new(config, NoTls);
        Pool::builder(manager)
            .config(builder)
            .runtime(Runtime::Tokio1)
            .build()
    }

    async fn get_connection<'pool>(
        pool: &'pool Pool<Manager>,
    ) -> Result<PooledConnection, PoolError> {
        pool.get().await.map(Into::into).map_err(Into::into)
    }
}

/// Connection checked out of a [`deadpool`](https://docs.rs/deadpool/0.12.2/deadpool/) pool
pub struct PooledConnection(Object<Manager>);

impl From<Object<Manager>> for PooledConnection {
    fn from(value: Object<Manager>) -> Self {
        Self(value)
    }
}

impl Deref for PooledConnection {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Error checking a connection out of a [`deadpool`](https://docs.rs/deadpool/0.12.2/deadpool/) pool
#[derive(Debug, thiserror::Error)]
#[error("{}", match .0 {
    managed::PoolError::Backend(error) => describe(error),
    error => error.to_string(),
})]
pub struct PoolError(managed::PoolError<Error>);

impl From<managed::PoolError<Error>> for PoolError {
    fn from(value: managed::PoolError<Error>) -> Self {
        Self(value)
    }
}

impl Deref for PoolError {
    type Target = managed::PoolError<Error>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<PoolError> for BackendError<PoolError, ConnectionError, QueryError> {
    fn from(value: PoolError) -> Self {
        Self::Pool(value)
    }
}
