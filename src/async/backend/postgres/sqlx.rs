use async_trait::async_trait;
use sqlx::{
    pool::PoolConnection,
    postgres::{PgConnectOptions, PgPoolOptions},
    Connection, Executor, PgConnection, PgPool, Postgres, Row,
};

use crate::common::{
    config::BootstrapConfig,
    plan::Report,
    verification::{DatabasePrivileges, Verification},
};

use super::{
    super::{
        common::error::sqlx::{ConnectionError, PoolError, QueryError},
        error::Error as BackendError,
        r#trait::Backend,
    },
    r#trait::{PostgresBackend, PostgresBackendWrapper},
};

/// [`sqlx Postgres`](https://docs.rs/sqlx/0.8.6/sqlx/struct.PgConnection.html) backend
pub struct SqlxPostgresBackend {
    privileged_opts: PgConnectOptions,
    bootstrap_config: BootstrapConfig,
    privileged_pool: PgPool,
}

impl SqlxPostgresBackend {
    /// Creates a new [`sqlx Postgres`](https://docs.rs/sqlx/0.8.6/sqlx/struct.PgConnection.html) backend
    ///
    /// The privileged pool connects lazily, so connection errors surface on first use.
    /// # Example
    /// ```no_run
    /// use db_bootstrap::{
    ///     r#async::{Backend, SqlxPostgresBackend},
    ///     BootstrapConfig, PrivilegedPostgresConfig,
    /// };
    /// use sqlx::postgres::PgPoolOptions;
    ///
    /// async fn f() {
    ///     let config = PrivilegedPostgresConfig::from_env().unwrap();
    ///     let target = BootstrapConfig::from_env().unwrap();
    ///
    ///     let backend = SqlxPostgresBackend::new(config.into(), target, || {
    ///         PgPoolOptions::new().max_connections(1)
    ///     });
    ///
    ///     backend.bootstrap().await.unwrap();
    /// }
    /// ```
    #[must_use]
    pub fn new(
        privileged_options: PgConnectOptions,
        bootstrap_config: BootstrapConfig,
        create_privileged_pool: impl Fn() -> PgPoolOptions,
    ) -> Self {
        let pool_opts = create_privileged_pool();
        let privileged_pool = pool_opts.connect_lazy_with(privileged_options.clone());

        Self {
            privileged_opts: privileged_options,
            bootstrap_config,
            privileged_pool,
        }
    }
}

#[async_trait]
impl PostgresBackend for SqlxPostgresBackend {
    type Connection = PgConnection;
    type PooledConnection<'pool> = PoolConnection<Postgres>;

    type PoolError = PoolError;
    type ConnectionError = ConnectionError;
    type QueryError = QueryError;

    async fn execute(&self, query: &str, conn: &mut PgConnection) -> Result<(), QueryError> {
        conn.execute(query).await?;
        Ok(())
    }

    async fn terminate_connections(
        &self,
        query: &str,
        conn: &mut PgConnection,
    ) -> Result<u64, QueryError> {
        let terminated = conn
            .fetch_all(query)
            .await?
            .iter()
            .map(|row| row.try_get::<bool, _>(0))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(terminated.into_iter().filter(|terminated| *terminated).count() as u64)
    }

    async fn role_exists(&self, query: &str, conn: &mut PgConnection) -> Result<bool, QueryError> {
        conn.fetch_one(query)
            .await?
            .try_get(0)
            .map_err(Into::into)
    }

    async fn get_role_settings(
        &self,
        query: &str,
        conn: &mut PgConnection,
    ) -> Result<Vec<String>, QueryError> {
        conn.fetch_all(query)
            .await?
            .iter()
            .map(|row| row.try_get(0))
            .collect::<Result<Vec<_>, _>>()
            .map_err(Into::into)
    }

    async fn get_database_privileges(
        &self,
        query: &str,
        conn: &mut PgConnection,
    ) -> Result<DatabasePrivileges, QueryError> {
        let row = conn.fetch_one(query).await?;
        Ok(DatabasePrivileges {
            create: row.try_get("can_create")?,
            connect: row.try_get("can_connect")?,
            temporary: row.try_get("can_temporary")?,
        })
    }

    async fn get_privileged_connection<'pool>(
        &'pool self,
    ) -> Result<PoolConnection<Postgres>, PoolError> {
        self.privileged_pool.acquire().await.map_err(Into::into)
    }

    async fn establish_role_connection(&self) -> Result<PgConnection, ConnectionError> {
        let opts = self
            .privileged_opts
            .clone()
            .username(self.bootstrap_config.get_role())
            .password(self.bootstrap_config.get_password())
            .database(self.bootstrap_config.get_database());
        PgConnection::connect_with(&opts).await.map_err(Into::into)
    }

    fn get_maintenance_database(&self) -> &str {
        self.privileged_opts
            .get_database()
            .unwrap_or_else(|| self.privileged_opts.get_username())
    }

    fn get_bootstrap_config(&self) -> &BootstrapConfig {
        &self.bootstrap_config
    }
}

type BError = BackendError<PoolError, ConnectionError, QueryError>;

#[async_trait]
impl Backend for SqlxPostgresBackend {
    type PoolError = PoolError;
    type ConnectionError = ConnectionError;
    type QueryError = QueryError;

    async fn bootstrap(&self) -> Result<Report, BError> {
        PostgresBackendWrapper::new(self).bootstrap().await
    }

    async fn verify(&self) -> Result<Verification, BError> {
        PostgresBackendWrapper::new(self).verify().await
    }

    async fn teardown(&self) -> Result<Report, BError> {
        PostgresBackendWrapper::new(self).teardown().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use sqlx::postgres::PgPoolOptions;

    use crate::{
        common::config::{
            BootstrapConfig, ExistingRole, IsolationLevel, PrivilegedPostgresConfig,
            SessionDefaults,
        },
        r#async::backend::{error::Error, r#trait::Backend},
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
        SqlxPostgresBackend,
    };

    fn create_backend(target: BootstrapConfig) -> SqlxPostgresBackend {
        let config = get_privileged_postgres_config().clone();
        SqlxPostgresBackend::new(config.into(), target, || {
            PgPoolOptions::new().max_connections(1)
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a running PostgreSQL server"]
    async fn backend_creates_empty_database() {
        let target = create_bootstrap_config();
        test_backend_creates_empty_database(create_backend(target.clone()), &target).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a running PostgreSQL server"]
    async fn backend_creates_role_with_session_defaults() {
        let target = create_bootstrap_config();
        test_backend_creates_role_with_session_defaults(create_backend(target.clone()), &target)
            .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a running PostgreSQL server"]
    async fn backend_terminates_connections() {
        let target = create_bootstrap_config().existing_role(ExistingRole::Update);
        test_backend_terminates_connections(create_backend(target.clone()), &target).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a running PostgreSQL server"]
    async fn backend_fails_on_existing_role() {
        test_backend_fails_on_existing_role(create_backend(create_bootstrap_config())).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a running PostgreSQL server"]
    async fn backend_rejects_wrong_defaults() {
        let target = create_bootstrap_config();
        let wrong = target
            .clone()
            .session_defaults(SessionDefaults::new().isolation_level(IsolationLevel::Serializable));
        test_backend_rejects_wrong_defaults(create_backend(target), create_backend(wrong)).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a running PostgreSQL server"]
    async fn backend_tears_down() {
        let target = create_bootstrap_config();
        test_backend_tears_down(create_backend(target.clone()), &target).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "requires a running PostgreSQL server"]
    async fn backend_rejects_maintenance_database() {
        let target = create_maintenance_target(get_privileged_postgres_config());
        test_backend_rejects_maintenance_database(create_backend(target.clone()), &target).await;
    }

    #[tokio::test]
    async fn maintenance_database_is_rejected_before_connecting() {
        // nothing listens on this port, so any statement would fail with a pool error
        let config = PrivilegedPostgresConfig::new().port(1);
        let target = create_maintenance_target(&config);
        let backend = SqlxPostgresBackend::new(config.into(), target, || {
            PgPoolOptions::new().max_connections(1)
        });

        assert!(matches!(
            backend.bootstrap().await,
            Err(Error::MaintenanceDatabase(db_name)) if db_name == "postgres"
        ));
        assert!(matches!(
            backend.teardown().await,
            Err(Error::MaintenanceDatabase(_))
        ));
    }
}
