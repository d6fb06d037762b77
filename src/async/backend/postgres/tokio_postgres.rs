use async_trait::async_trait;
use tokio_postgres::{Client, Config, NoTls};
use tracing::warn;

use crate::common::{
    config::BootstrapConfig,
    plan::Report,
    verification::{DatabasePrivileges, Verification},
};

use super::{
    super::{
        common::{
            error::tokio_postgres::{ConnectionError, QueryError},
            pool::tokio_postgres::r#trait::TokioPostgresPoolAssociation,
        },
        error::Error as BackendError,
        r#trait::Backend,
    },
    r#trait::{PostgresBackend, PostgresBackendWrapper},
};

/// ``tokio-postgres`` backend
pub struct TokioPostgresBackend<P>
where
    P: TokioPostgresPoolAssociation,
{
    privileged_config: Config,
    bootstrap_config: BootstrapConfig,
    privileged_pool: P::Pool,
}

impl<P> TokioPostgresBackend<P>
where
    P: TokioPostgresPoolAssociation,
{
    /// Creates a new ``tokio-postgres`` backend
    /// # Example
    /// ```no_run
    /// use bb8::Pool;
    /// use db_bootstrap::{
    ///     r#async::{Backend, TokioPostgresBackend, TokioPostgresBb8},
    ///     BootstrapConfig, PrivilegedPostgresConfig,
    /// };
    /// use dotenvy::dotenv;
    ///
    /// async fn f() {
    ///     dotenv().ok();
    ///
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
    ///
    ///     backend.bootstrap().await.unwrap();
    /// }
    /// ```
    pub async fn new(
        privileged_config: Config,
        bootstrap_config: BootstrapConfig,
        create_privileged_pool: impl Fn() -> P::Builder,
    ) -> Result<Self, P::BuildError> {
        let builder = create_privileged_pool();
        let privileged_pool = P::build_pool(builder, privileged_config.clone()).await?;

        Ok(Self {
            privileged_config,
            bootstrap_config,
            privileged_pool,
        })
    }
}

#[async_trait]
impl<P> PostgresBackend for TokioPostgresBackend<P>
where
    P: TokioPostgresPoolAssociation,
{
    type Connection = Client;
    type PooledConnection<'pool> = P::PooledConnection<'pool>;

    type PoolError = P::PoolError;
    type ConnectionError = ConnectionError;
    type QueryError = QueryError;

    async fn execute(&self, query: &str, conn: &mut Client) -> Result<(), QueryError> {
        conn.execute(query, &[]).await?;
        Ok(())
    }

    async fn terminate_connections(
        &self,
        query: &str,
        conn: &mut Client,
    ) -> Result<u64, QueryError> {
        let rows = conn.query(query, &[]).await?;
        Ok(rows.iter().filter(|row| row.get::<_, bool>(0)).count() as u64)
    }

    async fn role_exists(&self, query: &str, conn: &mut Client) -> Result<bool, QueryError> {
        conn.query_one(query, &[])
            .await
            .map(|row| row.get(0))
            .map_err(Into::into)
    }

    async fn get_role_settings(
        &self,
        query: &str,
        conn: &mut Client,
    ) -> Result<Vec<String>, QueryError> {
        conn.query(query, &[])
            .await
            .map(|rows| rows.iter().map(|row| row.get(0)).collect())
            .map_err(Into::into)
    }

    async fn get_database_privileges(
        &self,
        query: &str,
        conn: &mut Client,
    ) -> Result<DatabasePrivileges, QueryError> {
        let row = conn.query_one(query, &[]).await?;
        Ok(DatabasePrivileges {
            create: row.get("can_create"),
            connect: row.get("can_connect"),
            temporary: row.get("can_temporary"),
        })
    }

    async fn get_privileged_connection<'pool>(
        &'pool self,
    ) -> Result<P::PooledConnection<'pool>, P::PoolError> {
        P::get_connection(&self.privileged_pool).await
    }

    async fn establish_role_connection(&self) -> Result<Client, ConnectionError> {
        let mut config = self.privileged_config.clone();
        config
            .user(self.bootstrap_config.get_role())
            .password(self.bootstrap_config.get_password())
            .dbname(self.bootstrap_config.get_database());
        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                warn!(error = %err, "role connection closed with an error");
            }
        });
        Ok(client)
    }

    fn get_maintenance_database(&self) -> &str {
        // the server falls back to the user name
        self.privileged_config
            .get_dbname()
            .or_else(|| self.privileged_config.get_user())
            .unwrap_or_default()
    }

    fn get_bootstrap_config(&self) -> &BootstrapConfig {
        &self.bootstrap_config
    }
}

type BError<P> = BackendError<
    <P as TokioPostgresPoolAssociation>::PoolError,
    ConnectionError,
    QueryError,
>;

#[async_trait]
impl<P> Backend for TokioPostgresBackend<P>
where
    P: TokioPostgresPoolAssociation,
{
    type PoolError = P::PoolError;
    type ConnectionError = ConnectionError;
    type QueryError = QueryError;

    async fn bootstrap(&self) -> Result<Report, BError<P>> {
        PostgresBackendWrapper::new(self).bootstrap().await
    }

    async fn verify(&self) -> Result<Verification, BError<P>> {
        PostgresBackendWrapper::new(self).verify().await
    }

    async fn teardown(&self) -> Result<Report, BError<P>> {
        PostgresBackendWrapper::new(self).teardown().await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::{
        common::config::{BootstrapConfig, ExistingRole, IsolationLevel, SessionDefaults},
        r#async::backend::common::pool::tokio_postgres::r#trait::TokioPostgresPoolAssociation,
        tests::{create_maintenance_target, get_privileged_postgres_config},
    };

    use super::{
        super::r#trait::tests::{
            test_backend_creates_empty_database, test_backend_creates_role_with_session_defaults,
            test_backend_fails_on_existing_role, test_backend_rejects_maintenance_database,
            test_backend_rejects_wrong_defaults, test_backend_tears_down,
            test_backend_terminates_connections,
        },
        TokioPostgresBackend,
    };

    async fn create_backend<P>(
        target: BootstrapConfig,
        create_privileged_pool: impl Fn() -> P::Builder,
    ) -> TokioPostgresBackend<P>
    where
        P: TokioPostgresPoolAssociation,
    {
        let config = get_privileged_postgres_config().clone();
        TokioPostgresBackend::new(config.into(), target, create_privileged_pool)
            .await
            .unwrap()
    }

    #[cfg(feature = "tokio-postgres-bb8")]
    mod with_bb8 {
        #![allow(clippy::unwrap_used)]

        use bb8::{Builder, Pool};
        use bb8_postgres::PostgresConnectionManager;
        use tokio_postgres::NoTls;

        use uuid::Uuid;

        use crate::{
            r#async::backend::{
                common::pool::tokio_postgres::bb8::TokioPostgresBb8, error::Error,
                r#trait::Backend,
            },
            tests::create_bootstrap_config,
        };

        use super::{
            create_backend, create_maintenance_target, get_privileged_postgres_config,
            test_backend_creates_empty_database, test_backend_creates_role_with_session_defaults,
            test_backend_fails_on_existing_role, test_backend_rejects_maintenance_database,
            test_backend_rejects_wrong_defaults, test_backend_tears_down,
            test_backend_terminates_connections, BootstrapConfig, ExistingRole, IsolationLevel,
            SessionDefaults, TokioPostgresBackend,
        };

        fn builder() -> Builder<PostgresConnectionManager<NoTls>> {
            Pool::builder().max_size(1).retry_connection(false)
        }

        async fn backend(target: BootstrapConfig) -> TokioPostgresBackend<TokioPostgresBb8> {
            create_backend::<TokioPostgresBb8>(target, builder).await
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_creates_empty_database() {
            let target = create_bootstrap_config();
            test_backend_creates_empty_database(backend(target.clone()).await, &target).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_creates_role_with_session_defaults() {
            let target = create_bootstrap_config();
            test_backend_creates_role_with_session_defaults(backend(target.clone()).await, &target)
                .await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_terminates_connections() {
            let target = create_bootstrap_config().existing_role(ExistingRole::Update);
            test_backend_terminates_connections(backend(target.clone()).await, &target).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_fails_on_existing_role() {
            test_backend_fails_on_existing_role(backend(create_bootstrap_config()).await).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_rejects_wrong_defaults() {
            let target = create_bootstrap_config();
            let wrong = target.clone().session_defaults(
                SessionDefaults::new().isolation_level(IsolationLevel::RepeatableRead),
            );
            test_backend_rejects_wrong_defaults(backend(target).await, backend(wrong).await).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_tears_down() {
            let target = create_bootstrap_config();
            test_backend_tears_down(backend(target.clone()).await, &target).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_rejects_maintenance_database() {
            let target = create_maintenance_target(get_privileged_postgres_config());
            test_backend_rejects_maintenance_database(backend(target.clone()).await, &target)
                .await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_reports_failed_privileged_login() {
            let username = format!("bootstrap_{}_missing", Uuid::new_v4().simple());
            let config = get_privileged_postgres_config()
                .clone()
                .username(username.clone());
            let backend = TokioPostgresBackend::<TokioPostgresBb8>::new(
                config.into(),
                create_bootstrap_config(),
                builder,
            )
            .await
            .unwrap();

            // the server's rejection must come back instead of a pool timeout
            match backend.bootstrap().await {
                Err(error @ Error::Pool(_)) => assert!(error.to_string().contains(&username)),
                _ => panic!("expected the privileged login to fail"),
            }
        }
    }

    #[cfg(feature = "tokio-postgres-deadpool")]
    mod with_deadpool {
        #![allow(clippy::unwrap_used)]

        use deadpool::managed::PoolConfig;

        use crate::{
            r#async::backend::common::pool::tokio_postgres::deadpool::TokioPostgresDeadpool,
            tests::create_bootstrap_config,
        };

        use super::{
            create_backend, create_maintenance_target, get_privileged_postgres_config,
            test_backend_creates_empty_database, test_backend_creates_role_with_session_defaults,
            test_backend_fails_on_existing_role, test_backend_rejects_maintenance_database,
            test_backend_rejects_wrong_defaults, test_backend_tears_down,
            test_backend_terminates_connections, BootstrapConfig, ExistingRole, IsolationLevel,
            SessionDefaults, TokioPostgresBackend,
        };

        async fn backend(target: BootstrapConfig) -> TokioPostgresBackend<TokioPostgresDeadpool> {
            create_backend::<TokioPostgresDeadpool>(target, || PoolConfig::new(1)).await
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_creates_empty_database() {
            let target = create_bootstrap_config();
            test_backend_creates_empty_database(backend(target.clone()).await, &target).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_creates_role_with_session_defaults() {
            let target = create_bootstrap_config();
            test_backend_creates_role_with_session_defaults(backend(target.clone()).await, &target)
                .await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_terminates_connections() {
            let target = create_bootstrap_config().existing_role(ExistingRole::Update);
            test_backend_terminates_connections(backend(target.clone()).await, &target).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_fails_on_existing_role() {
            test_backend_fails_on_existing_role(backend(create_bootstrap_config()).await).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_tears_down() {
            let target = create_bootstrap_config();
            test_backend_tears_down(backend(target.clone()).await, &target).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_rejects_wrong_defaults() {
            let target = create_bootstrap_config();
            let wrong = target.clone().session_defaults(
                SessionDefaults::new().isolation_level(IsolationLevel::Serializable),
            );
            test_backend_rejects_wrong_defaults(backend(target).await, backend(wrong).await).await;
        }

        #[tokio::test(flavor = "multi_thread")]
        #[ignore = "requires a running PostgreSQL server"]
        async fn backend_rejects_maintenance_database() {
            let target = create_maintenance_target(get_privileged_postgres_config());
            test_backend_rejects_maintenance_database(backend(target.clone()).await, &target)
                .await;
        }
    }
}
