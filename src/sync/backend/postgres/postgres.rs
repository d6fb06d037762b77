use std::{error::Error as _, ops::Deref};

use r2d2::{Builder, Pool, PooledConnection};
use r2d2_postgres::{
    postgres::{Client, Config, Error, NoTls},
    PostgresConnectionManager,
};

use crate::common::{
    config::BootstrapConfig, plan::Report, verification::DatabasePrivileges,
    verification::Verification,
};

use super::{
    super::{error::Error as BackendError, r#trait::Backend},
    r#trait::{PostgresBackend as PostgresBackendTrait, PostgresBackendWrapper},
};

type Manager = PostgresConnectionManager<NoTls>;

/// [`Postgres`](https://docs.rs/postgres/0.19.10/postgres/) backend
pub struct PostgresBackend {
    config: Config,
    bootstrap_config: BootstrapConfig,
    privileged_pool: Pool<Manager>,
}

impl PostgresBackend {
    /// Creates a new [`Postgres`](https://docs.rs/postgres/0.19.10/postgres/) backend
    /// # Example
    /// ```no_run
    /// use db_bootstrap::{sync::PostgresBackend, BootstrapConfig, PrivilegedPostgresConfig};
    /// use r2d2::Pool;
    ///
    /// let config = PrivilegedPostgresConfig::from_env().unwrap();
    /// let target = BootstrapConfig::from_env().unwrap();
    ///
    /// let backend = PostgresBackend::new(config.into(), target, || Pool::builder().max_size(1))
    ///     .unwrap();
    /// ```
    pub fn new(
        config: Config,
        bootstrap_config: BootstrapConfig,
        create_privileged_pool: impl Fn() -> Builder<Manager>,
    ) -> Result<Self, r2d2::Error> {
        let manager = Manager::new(config.clone(), NoTls);
        let privileged_pool = create_privileged_pool().build(manager)?;

        Ok(Self {
            config,
            bootstrap_config,
            privileged_pool,
        })
    }
}

impl PostgresBackendTrait for PostgresBackend {
    type ConnectionManager = Manager;
    type ConnectionError = ConnectionError;
    type QueryError = QueryError;

    fn execute(&self, query: &str, conn: &mut Client) -> Result<(), QueryError> {
        conn.execute(query, &[])?;
        Ok(())
    }

    fn terminate_connections(&self, query: &str, conn: &mut Client) -> Result<u64, QueryError> {
        let rows = conn.query(query, &[])?;
        Ok(rows.iter().filter(|row| row.get::<_, bool>(0)).count() as u64)
    }

    fn role_exists(&self, query: &str, conn: &mut Client) -> Result<bool, QueryError> {
        conn.query_one(query, &[])
            .map(|row| row.get(0))
            .map_err(Into::into)
    }

    fn get_role_settings(&self, query: &str, conn: &mut Client) -> Result<Vec<String>, QueryError> {
        conn.query(query, &[])
            .map(|rows| rows.iter().map(|row| row.get(0)).collect())
            .map_err(Into::into)
    }

    fn get_database_privileges(
        &self,
        query: &str,
        conn: &mut Client,
    ) -> Result<DatabasePrivileges, QueryError> {
        let row = conn.query_one(query, &[])?;
        Ok(DatabasePrivileges {
            create: row.get("can_create"),
            connect: row.get("can_connect"),
            temporary: row.get("can_temporary"),
        })
    }

    fn get_privileged_connection(&self) -> Result<PooledConnection<Manager>, r2d2::Error> {
        self.privileged_pool.get()
    }

    fn establish_role_connection(&self) -> Result<Client, ConnectionError> {
        let mut config = self.config.clone();
        config
            .user(self.bootstrap_config.get_role())
            .password(self.bootstrap_config.get_password())
            .dbname(self.bootstrap_config.get_database());
        config.connect(NoTls).map_err(Into::into)
    }

    fn get_maintenance_database(&self) -> &str {
        // the server falls back to the user name
        self.config
            .get_dbname()
            .or_else(|| self.config.get_user())
            .unwrap_or_default()
    }

    fn get_bootstrap_config(&self) -> &BootstrapConfig {
        &self.bootstrap_config
    }
}

/// Includes the server's message, which the driver keeps in its source
fn describe(error: &Error) -> String {
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

impl From<ConnectionError> for BackendError<ConnectionError, QueryError> {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl From<QueryError> for BackendError<ConnectionError, QueryError> {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl Backend for PostgresBackend {
    type ConnectionError = ConnectionError;
    type QueryError = QueryError;

    fn bootstrap(&self) -> Result<Report, BackendError<ConnectionError, QueryError>> {
        PostgresBackendWrapper::new(self).bootstrap()
    }

    fn verify(&self) -> Result<Verification, BackendError<ConnectionError, QueryError>> {
        PostgresBackendWrapper::new(self).verify()
    }

    fn teardown(&self) -> Result<Report, BackendError<ConnectionError, QueryError>> {
        PostgresBackendWrapper::new(self).teardown()
    }
}
