use diesel::{
    pg::PgConnection,
    prelude::*,
    r2d2::ConnectionManager,
    result::Error,
    sql_query,
    sql_types::{Bool, Text},
    ConnectionError, QueryResult, RunQueryDsl,
};
use r2d2::{Builder, Pool, PooledConnection};

use crate::common::{
    config::{BootstrapConfig, PrivilegedPostgresConfig},
    plan::Report,
    verification::{DatabasePrivileges, Verification},
};

use super::{
    super::{error::Error as BackendError, r#trait::Backend},
    r#trait::{PostgresBackend, PostgresBackendWrapper},
};

type Manager = ConnectionManager<PgConnection>;

#[derive(QueryableByName)]
struct Terminated {
    #[diesel(sql_type = Bool)]
    terminated: bool,
}

#[derive(QueryableByName)]
struct RoleExists {
    #[diesel(sql_type = Bool)]
    role_exists: bool,
}

#[derive(QueryableByName)]
struct RoleSetting {
    #[diesel(sql_type = Text)]
    setting: String,
}

#[derive(QueryableByName)]
struct Privileges {
    #[diesel(sql_type = Bool)]
    can_create: bool,
    #[diesel(sql_type = Bool)]
    can_connect: bool,
    #[diesel(sql_type = Bool)]
    can_temporary: bool,
}

/// [`Diesel Postgres`](https://docs.rs/diesel/2.2.11/diesel/pg/struct.PgConnection.html) backend
pub struct DieselPostgresBackend {
    config: PrivilegedPostgresConfig,
    bootstrap_config: BootstrapConfig,
    privileged_pool: Pool<Manager>,
}

impl DieselPostgresBackend {
    /// Creates a new [`Diesel Postgres`](https://docs.rs/diesel/2.2.11/diesel/pg/struct.PgConnection.html) backend
    /// # Example
    /// ```no_run
    /// use db_bootstrap::{sync::DieselPostgresBackend, BootstrapConfig, PrivilegedPostgresConfig};
    /// use r2d2::Pool;
    ///
    /// let config = PrivilegedPostgresConfig::from_env().unwrap();
    /// let target = BootstrapConfig::from_env().unwrap();
    ///
    /// let backend = DieselPostgresBackend::new(config, target, Pool::builder).unwrap();
    /// ```
    pub fn new(
        config: PrivilegedPostgresConfig,
        bootstrap_config: BootstrapConfig,
        create_privileged_pool: impl Fn() -> Builder<Manager>,
    ) -> Result<Self, r2d2::Error> {
        let manager = Manager::new(config.privileged_connection_string());
        let privileged_pool = create_privileged_pool().build(manager)?;

        Ok(Self {
            config,
            bootstrap_config,
            privileged_pool,
        })
    }
}

impl PostgresBackend for DieselPostgresBackend {
    type ConnectionManager = Manager;
    type ConnectionError = ConnectionError;
    type QueryError = Error;

    fn execute(&self, query: &str, conn: &mut PgConnection) -> QueryResult<()> {
        sql_query(query).execute(conn)?;
        Ok(())
    }

    fn terminate_connections(&self, query: &str, conn: &mut PgConnection) -> QueryResult<u64> {
        let rows = sql_query(query).load::<Terminated>(conn)?;
        Ok(rows.iter().filter(|row| row.terminated).count() as u64)
    }

    fn role_exists(&self, query: &str, conn: &mut PgConnection) -> QueryResult<bool> {
        sql_query(query)
            .get_result::<RoleExists>(conn)
            .map(|row| row.role_exists)
    }

    fn get_role_settings(&self, query: &str, conn: &mut PgConnection) -> QueryResult<Vec<String>> {
        sql_query(query)
            .load::<RoleSetting>(conn)
            .map(|rows| rows.into_iter().map(|row| row.setting).collect())
    }

    fn get_database_privileges(
        &self,
        query: &str,
        conn: &mut PgConnection,
    ) -> QueryResult<DatabasePrivileges> {
        sql_query(query)
            .get_result::<Privileges>(conn)
            .map(|row| DatabasePrivileges {
                create: row.can_create,
                connect: row.can_connect,
                temporary: row.can_temporary,
            })
    }

    fn get_privileged_connection(&self) -> Result<PooledConnection<Manager>, r2d2::Error> {
        self.privileged_pool.get()
    }

    fn establish_role_connection(&self) -> ConnectionResult<PgConnection> {
        let database_url = self.config.connection_string(
            self.bootstrap_config.get_role(),
            Some(self.bootstrap_config.get_password()),
            self.bootstrap_config.get_database(),
        );
        PgConnection::establish(database_url.as_str())
    }

    fn get_maintenance_database(&self) -> &str {
        self.config.database.as_str()
    }

    fn get_bootstrap_config(&self) -> &BootstrapConfig {
        &self.bootstrap_config
    }
}

impl From<ConnectionError> for BackendError<ConnectionError, Error> {
    fn from(value: ConnectionError) -> Self {
        Self::Connection(value)
    }
}

impl From<Error> for BackendError<ConnectionError, Error> {
    fn from(value: Error) -> Self {
        Self::Query(value)
    }
}

impl Backend for DieselPostgresBackend {
    type ConnectionError = ConnectionError;
    type QueryError = Error;

    fn bootstrap(&self) -> Result<Report, BackendError<ConnectionError, Error>> {
        PostgresBackendWrapper::new(self).bootstrap()
    }

    fn verify(&self) -> Result<Verification, BackendError<ConnectionError, Error>> {
        PostgresBackendWrapper::new(self).verify()
    }

    fn teardown(&self) -> Result<Report, BackendError<ConnectionError, Error>> {
        PostgresBackendWrapper::new(self).teardown()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use r2d2::Pool;

    use crate::{
        common::config::{BootstrapConfig, ExistingRole, IsolationLevel, SessionDefaults},
        tests::{
            create_bootstrap_config, create_maintenance_target, get_privileged_postgres_config,
        },
    };

    use super::{
        super::r#trait::tests::{
            test_backend_creates_empty_database, test_backend_creates_role_with_session_defaults,
            test_backend_fails_on_existing_role, test_backend_rejects_maintenance_database,
            test_backend_rejects_wrong_defaults, test_backend_tears_down,
            test_backend_terminates_connections,
        },
        DieselPostgresBackend,
    };

    fn create_backend(target: BootstrapConfig) -> DieselPostgresBackend {
        let config = get_privileged_postgres_config().clone();
        DieselPostgresBackend::new(config, target, Pool::builder).unwrap()
    }

    #[test]
    #[ignore = "requires a running PostgreSQL server"]
    fn backend_creates_empty_database() {
        let target = create_bootstrap_config();
        test_backend_creates_empty_database(&create_backend(target.clone()), &target);
    }

    #[test]
    #[ignore = "requires a running PostgreSQL server"]
    fn backend_creates_role_with_session_defaults() {
        let target = create_bootstrap_config();
        test_backend_creates_role_with_session_defaults(&create_backend(target.clone()), &target);
    }

    #[test]
    #[ignore = "requires a running PostgreSQL server"]
    fn backend_terminates_connections() {
        let target = create_bootstrap_config().existing_role(ExistingRole::Update);
        test_backend_terminates_connections(&create_backend(target.clone()), &target);
    }

    #[test]
    #[ignore = "requires a running PostgreSQL server"]
    fn backend_fails_on_existing_role() {
        test_backend_fails_on_existing_role(&create_backend(create_bootstrap_config()));
    }

    #[test]
    #[ignore = "requires a running PostgreSQL server"]
    fn backend_rejects_wrong_defaults() {
        let target = create_bootstrap_config();
        let wrong = target.clone().session_defaults(
            SessionDefaults::new().isolation_level(IsolationLevel::Serializable),
        );
        test_backend_rejects_wrong_defaults(&create_backend(target), &create_backend(wrong));
    }

    #[test]
    #[ignore = "requires a running PostgreSQL server"]
    fn backend_tears_down() {
        let target = create_bootstrap_config();
        test_backend_tears_down(&create_backend(target.clone()), &target);
    }

    #[test]
    #[ignore = "requires a running PostgreSQL server"]
    fn backend_rejects_maintenance_database() {
        let target = create_maintenance_target(get_privileged_postgres_config());
        test_backend_rejects_maintenance_database(&create_backend(target.clone()), &target);
    }
}
