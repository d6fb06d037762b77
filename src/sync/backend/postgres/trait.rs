use r2d2::{ManageConnection, PooledConnection};
use tracing::{debug, info};

use crate::common::{
    config::{BootstrapConfig, ExistingRole},
    plan::{Plan, Report, StepKind},
    statement::postgres,
    verification::{DatabasePrivileges, Verification},
};

use super::super::error::Error as BackendError;

type Connection<B> =
    <<B as PostgresBackend>::ConnectionManager as ManageConnection>::Connection;
type BError<B> =
    BackendError<<B as PostgresBackend>::ConnectionError, <B as PostgresBackend>::QueryError>;

pub(super) trait PostgresBackend {
    type ConnectionManager: ManageConnection;
    type ConnectionError: Into<BackendError<Self::ConnectionError, Self::QueryError>>
        + std::fmt::Debug;
    type QueryError: Into<BackendError<Self::ConnectionError, Self::QueryError>> + std::fmt::Debug;

    fn execute(
        &self,
        query: &str,
        conn: &mut <Self::ConnectionManager as ManageConnection>::Connection,
    ) -> Result<(), Self::QueryError>;
    fn terminate_connections(
        &self,
        query: &str,
        conn: &mut <Self::ConnectionManager as ManageConnection>::Connection,
    ) -> Result<u64, Self::QueryError>;
    fn role_exists(
        &self,
        query: &str,
        conn: &mut <Self::ConnectionManager as ManageConnection>::Connection,
    ) -> Result<bool, Self::QueryError>;
    fn get_role_settings(
        &self,
        query: &str,
        conn: &mut <Self::ConnectionManager as ManageConnection>::Connection,
    ) -> Result<Vec<String>, Self::QueryError>;
    fn get_database_privileges(
        &self,
        query: &str,
        conn: &mut <Self::ConnectionManager as ManageConnection>::Connection,
    ) -> Result<DatabasePrivileges, Self::QueryError>;

    fn get_privileged_connection(
        &self,
    ) -> Result<PooledConnection<Self::ConnectionManager>, r2d2::Error>;
    fn establish_role_connection(
        &self,
    ) -> Result<<Self::ConnectionManager as ManageConnection>::Connection, Self::ConnectionError>;

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

    pub(super) fn bootstrap(&self) -> Result<Report, BError<B>> {
        let config = self.check_target()?;

        // Get connection to maintenance database as privileged user
        let mut conn = self.inner.get_privileged_connection()?;
        let conn = &mut *conn;

        let role_exists = match config.get_existing_role() {
            ExistingRole::Fail => false,
            ExistingRole::Update => self
                .inner
                .role_exists(postgres::role_exists(config.get_role()).as_str(), conn)
                .map_err(Into::<BError<B>>::into)?,
        };

        self.run(&Plan::bootstrap(config, role_exists), conn)
    }

    pub(super) fn verify(&self) -> Result<Verification, BError<B>> {
        let config = self.inner.get_bootstrap_config();

        // Read role defaults as privileged user
        let role_settings = {
            let mut conn = self.inner.get_privileged_connection()?;
            self.inner
                .get_role_settings(
                    postgres::get_role_settings(config.get_role()).as_str(),
                    &mut conn,
                )
                .map_err(Into::<BError<B>>::into)?
        };

        // Log in as the role and read its privileges
        let mut conn = self
            .inner
            .establish_role_connection()
            .map_err(Into::<BError<B>>::into)?;
        let privileges = self
            .inner
            .get_database_privileges(
                postgres::get_database_privileges(config.get_database()).as_str(),
                &mut conn,
            )
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

    pub(super) fn teardown(&self) -> Result<Report, BError<B>> {
        let config = self.check_target()?;
        let mut conn = self.inner.get_privileged_connection()?;
        self.run(&Plan::teardown(config), &mut conn)
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

    fn run(&self, plan: &Plan, conn: &mut Connection<B>) -> Result<Report, BError<B>> {
        let config = self.inner.get_bootstrap_config();
        let mut report = Report::default();

        for step in plan.steps() {
            debug!(statement = step.redacted(), "executing");

            if step.kind() == StepKind::TerminateConnections {
                let terminated = self
                    .inner
                    .terminate_connections(step.sql(), conn)
                    .map_err(Into::<BError<B>>::into)?;
                report.terminated_sessions += terminated;
            } else {
                self.inner.execute(step.sql(), conn).map_err(Into::<BError<B>>::into)?;
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
