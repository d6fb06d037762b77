use std::{fmt::Debug, ops::DerefMut};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::common::{
    config::{BootstrapConfig, ExistingRole},
    plan::{Plan, Report, StepKind},
    statement::postgres,
    verification::{DatabasePrivileges, Verification},
};

use super::super::error::Error as BackendError;

type BError<B> = BackendError<
    <B as PostgresBackend>::PoolError,
    <B as PostgresBackend>::ConnectionError,
    <B as PostgresBackend>::QueryError,
>;

#[async_trait]
pub(super) trait PostgresBackend: Send + Sync + 'static {
    type Connection: Send;
    type PooledConnection<'pool>: DerefMut<Target = Self::Connection> + Send
    where
        Self: 'pool;

    type PoolError: Into<BackendError<Self::PoolError, Self::ConnectionError, Self::QueryError>>
        + Debug
        + Send;
    type ConnectionError: Into<BackendError<Self::PoolError, Self::ConnectionError, Self::QueryError>>
        + Debug
        + Send;
    type QueryError: Into<BackendError<Self::PoolError, Self::ConnectionError, Self::QueryError>>
        + Debug
        + Send;

    async fn execute(&self, query: &str, conn: &mut Self::Connection)
        -> Result<(), Self::QueryError>;
    async fn terminate_connections(
        &self,
        query: &str,
        conn: &mut Self::Connection,
    ) -> Result<u64, Self::QueryError>;
    async fn role_exists(
        &self,
        query: &str,
        conn: &mut Self::Connection,
    ) -> Result<bool, Self::QueryError>;
    async fn get_role_settings(
        &self,
        query: &str,
        conn: &mut Self::Connection,
    ) -> Result<Vec<String>, Self::QueryError>;
    async fn get_database_privileges(
        &self,
        query: &str,
        conn: &mut Self::Connection,
    ) -> Result<DatabasePrivileges, Self::QueryError>;

    async fn get_privileged_connection<'pool>(
        &'pool self,
    ) -> Result<Self::PooledConnection<'pool>, Self::PoolError>;
    async fn establish_role_connection(&self) -> Result<Self::Connection, Self::ConnectionError>;

    fn get_maintenance_database(&self) -> &str;
    fn get_bootstrap_config(&self) -> &BootstrapConfig;
}

pub(super) struct PostgresBackendWrapper<'backend, B>
where
    B: PostgresBackend,
{
    inner: &'backend B,
}

impl<'backend, B> PostgresBackendWrapper<'backend, B>
where
    B: PostgresBackend,
{
    pub(super) fn new(backend: &'backend B) -> Self {
        Self { inner: backend }
    }

    pub(super) async fn bootstrap(&self) -> Result<Report, BError<B>> {
        let config = self.check_target()?;

        // Get connection to maintenance database as privileged user
        let mut conn = self
            .inner
            .get_privileged_connection()
            .await
            .map_err(Into::<BError<B>>::into)?;
        let conn = &mut *conn;

        let role_exists = match config.get_existing_role() {
            ExistingRole::Fail => false,
            ExistingRole::Update => self
                .inner
                .role_exists(postgres::role_exists(config.get_role()).as_str(), conn)
                .await
                .map_err(Into::<BError<B>>::into)?,
        };

        self.run(&Plan::bootstrap(config, role_exists), conn).await
    }

    pub(super) async fn verify(&self) -> Result<Verification, BError<B>> {
        let config = self.inner.get_bootstrap_config();

        // Read role defaults as privileged user
        let role_settings = {
            let mut conn = self
                .inner
                .get_privileged_connection()
                .await
                .map_err(Into::<BError<B>>::into)?;
            self.inner
                .get_role_settings(
                    postgres::get_role_settings(config.get_role()).as_str(),
                    &mut conn,
                )
                .await
                .map_err(Into::<BError<B>>::into)?
        };

        // Log in as the role and read its privileges
        let mut conn = self
            .inner
            .establish_role_connection()
            .await
            .map_err(Into::<BError<B>>::into)?;
        let privileges = self
            .inner
            .get_database_privileges(
                postgres::get_database_privileges(config.get_database()).as_str(),
                &mut conn,
            )
            .await
            .map_err(Into::<BError<B>>::into)?;

        let verification = Verification::new(role_settings.as_slice(), privileges);
        verification.check(config.get_session_defaults())?;
        info!(
            database = config.get_database(),
            role = config.get_role(),
            "verified role"
        );
        Ok(verification)
    }

    pub(super) async fn teardown(&self) -> Result<Report, BError<B>> {
        let config = self.check_target()?;
        let mut conn = self
            .inner
            .get_privileged_connection()
            .await
            .map_err(Into::<BError<B>>::into)?;
        self.run(&Plan::teardown(config), &mut conn).await
    }

    // Target must differ from the database the privileged connection opens
    fn check_target(&self) -> Result<&BootstrapConfig, BError<B>> {
        let config = self.inner.get_bootstrap_config();
        if config.get_database() == self.inner.get_maintenance_database() {
            return Err(BackendError::MaintenanceDatabase(
                config.get_database().to_owned(),
            ));
        }
        Ok(config)
    }

    async fn run(&self, plan: &Plan, conn: &mut B::Connection) -> Result<Report, BError<B>> {
        let config = self.inner.get_bootstrap_config();
        let mut report = Report::default();

        for step in plan.steps() {
            debug!(statement = step.redacted(), "executing");

            if step.kind() == StepKind::TerminateConnections {
                let terminated = self
                    .inner
                    .terminate_connections(step.sql(), conn)
                    .await
                    .map_err(Into::<BError<B>>::into)?;
                report.terminated_sessions += terminated;
            } else {
                self.inner
                    .execute(step.sql(), conn)
                    .await
                    .map_err(Into::<BError<B>>::into)?;
            }

            info!(
                database = config.get_database(),
                role = config.get_role(),
                step = %step.kind(),
                "completed"
            );
            report.steps.push(step.kind());
        }

        Ok(report)
    }
}

#[cfg(test)]
pub(super) mod tests {
    #![allow(clippy::unwrap_used)]

    use tokio_postgres::{Client, Config, NoTls};

    use crate::{
        common::{
            config::BootstrapConfig, plan::StepKind, statement::postgres::tests::GET_TABLE_COUNT,
        },
        r#async::backend::{error::Error, r#trait::Backend},
        tests::get_privileged_postgres_config,
    };

    async fn connect(config: Config) -> Result<Client, tokio_postgres::Error> {
        let (client, connection) = config.connect(NoTls).await?;
        tokio::spawn(connection);
        Ok(client)
    }

    async fn connect_privileged(db_name: Option<&str>) -> Client {
        let config = get_privileged_postgres_config();
        let db_name = db_name.unwrap_or(config.database.as_str());
        let config = config
            .connection_string(
                config.username.as_str(),
                config.password.as_deref(),
                db_name,
            )
            .parse::<Config>()
            .unwrap();
        connect(config).await.unwrap()
    }

    async fn connect_as_role(target: &BootstrapConfig) -> Result<Client, tokio_postgres::Error> {
        let config = get_privileged_postgres_config()
            .connection_string(
                target.get_role(),
                Some(target.get_password()),
                target.get_database(),
            )
            .parse::<Config>()?;
        connect(config).await
    }

    async fn database_exists(db_name: &str, conn: &Client) -> bool {
        conn.query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_database WHERE datname = $1)",
            &[&db_name],
        )
        .await
        .unwrap()
        .get(0)
    }

    async fn role_exists(role_name: &str, conn: &Client) -> bool {
        conn.query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = $1)",
            &[&role_name],
        )
        .await
        .unwrap()
        .get(0)
    }

    pub async fn test_backend_creates_empty_database(
        backend: impl Backend,
        target: &BootstrapConfig,
    ) {
        let default_conn = connect_privileged(None).await;

        // database must not exist
        assert!(!database_exists(target.get_database(), &default_conn).await);

        // database must exist after bootstrapping through backend
        let report = backend.bootstrap().await.unwrap();
        assert_eq!(report.steps().last(), Some(&StepKind::GrantPrivileges));
        assert!(database_exists(target.get_database(), &default_conn).await);

        // database must have no user tables
        let db_conn = connect_privileged(Some(target.get_database())).await;
        let count: i64 = db_conn
            .query_one(GET_TABLE_COUNT, &[])
            .await
            .unwrap()
            .get(0);
        assert_eq!(count, 0);

        backend.teardown().await.unwrap();
    }

    pub async fn test_backend_creates_role_with_session_defaults(
        backend: impl Backend,
        target: &BootstrapConfig,
    ) {
        backend.bootstrap().await.unwrap();

        // role must log in with its password and see its defaults
        let conn = connect_as_role(target).await.unwrap();
        for (setting, expected) in [
            ("default_transaction_isolation", "read committed"),
            ("TimeZone", "UTC"),
        ] {
            let row = conn
                .query_one("SELECT current_setting($1)", &[&setting])
                .await
                .unwrap();
            assert_eq!(row.get::<_, String>(0), expected);
        }

        // role must be able to create schemas and tables
        conn.batch_execute(
            "CREATE SCHEMA app; CREATE TABLE app.book(id SERIAL PRIMARY KEY, title TEXT NOT NULL)",
        )
        .await
        .unwrap();

        let verification = backend.verify().await.unwrap();
        assert!(verification
            .role_setting("client_encoding")
            .is_some_and(|value| value.eq_ignore_ascii_case("utf8")));
        assert!(verification.privileges().create);

        drop(conn);
        backend.teardown().await.unwrap();
    }

    /// Requires [`ExistingRole::Update`](crate::ExistingRole::Update)
    pub async fn test_backend_terminates_connections(
        backend: impl Backend,
        target: &BootstrapConfig,
    ) {
        backend.bootstrap().await.unwrap();

        // sessions connected to the database must not block a second run
        let sessions = [
            connect_privileged(Some(target.get_database())).await,
            connect_privileged(Some(target.get_database())).await,
        ];
        let report = backend.bootstrap().await.unwrap();
        assert_eq!(report.terminated_sessions(), 2);
        for session in &sessions {
            assert!(session.simple_query("SELECT 1").await.is_err());
        }

        backend.teardown().await.unwrap();
    }

    pub async fn test_backend_fails_on_existing_role(backend: impl Backend) {
        backend.bootstrap().await.unwrap();

        // role must not be created twice and the server's message must come through
        match backend.bootstrap().await {
            Err(error @ Error::Query(_)) => assert!(error.to_string().contains("already exists")),
            _ => panic!("expected the second run to fail"),
        }

        backend.teardown().await.unwrap();
    }

    pub async fn test_backend_rejects_wrong_defaults(backend: impl Backend, wrong: impl Backend) {
        backend.bootstrap().await.unwrap();

        assert!(matches!(wrong.verify().await, Err(Error::Verification(_))));

        backend.teardown().await.unwrap();
    }

    pub async fn test_backend_tears_down(backend: impl Backend, target: &BootstrapConfig) {
        let default_conn = connect_privileged(None).await;

        backend.bootstrap().await.unwrap();
        assert!(database_exists(target.get_database(), &default_conn).await);
        assert!(role_exists(target.get_role(), &default_conn).await);

        let report = backend.teardown().await.unwrap();
        assert_eq!(
            report.steps(),
            [
                StepKind::TerminateConnections,
                StepKind::DropDatabase,
                StepKind::DropRole
            ]
        );
        assert!(!database_exists(target.get_database(), &default_conn).await);
        assert!(!role_exists(target.get_role(), &default_conn).await);

        // tearing down twice is harmless
        backend.teardown().await.unwrap();
    }

    /// `target` must name the maintenance database
    pub async fn test_backend_rejects_maintenance_database(
        backend: impl Backend,
        target: &BootstrapConfig,
    ) {
        let bystander = connect_privileged(None).await;

        // nothing must run against the maintenance database
        assert!(matches!(
            backend.bootstrap().await,
            Err(Error::MaintenanceDatabase(db_name)) if db_name == target.get_database()
        ));
        assert!(matches!(
            backend.teardown().await,
            Err(Error::MaintenanceDatabase(_))
        ));

        // sessions on the maintenance database must survive
        assert!(bystander.simple_query("SELECT 1").await.is_ok());
    }
}
