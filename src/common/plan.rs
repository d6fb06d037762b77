//! Ordered statements of a bootstrap or teardown run

use std::fmt;

use super::{
    config::{BootstrapConfig, ExistingRole},
    statement::postgres,
};

/// Kind of a plan step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// Terminate other sessions connected to the database
    TerminateConnections,
    /// Drop the database if it exists
    DropDatabase,
    /// Create the database
    CreateDatabase,
    /// Create the role with its password
    CreateRole,
    /// Reset the password of an existing role
    UpdateRole,
    /// Set the role's default client encoding
    SetClientEncoding,
    /// Set the role's default transaction isolation level
    SetIsolationLevel,
    /// Set the role's default timezone
    SetTimezone,
    /// Grant all privileges on the database to the role
    GrantPrivileges,
    /// Drop the role if it exists
    DropRole,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TerminateConnections => "terminate connections",
            Self::DropDatabase => "drop database",
            Self::CreateDatabase => "create database",
            Self::CreateRole => "create role",
            Self::UpdateRole => "update role",
            Self::SetClientEncoding => "set client encoding",
            Self::SetIsolationLevel => "set isolation level",
            Self::SetTimezone => "set timezone",
            Self::GrantPrivileges => "grant privileges",
            Self::DropRole => "drop role",
        })
    }
}

/// Single statement of a plan
#[derive(Clone)]
pub struct Step {
    kind: StepKind,
    sql: String,
    redacted: Option<String>,
}

impl Step {
    fn new(kind: StepKind, sql: String) -> Self {
        Self {
            kind,
            sql,
            redacted: None,
        }
    }

    fn with_secret(kind: StepKind, sql: String, redacted: String) -> Self {
        Self {
            kind,
            sql,
            redacted: Some(redacted),
        }
    }

    /// Step kind
    #[must_use]
    pub fn kind(&self) -> StepKind {
        self.kind
    }

    /// Statement to execute
    #[must_use]
    pub fn sql(&self) -> &str {
        self.sql.as_str()
    }

    /// Statement with the password replaced, safe to log
    #[must_use]
    pub fn redacted(&self) -> &str {
        self.redacted.as_deref().unwrap_or(self.sql.as_str())
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("kind", &self.kind)
            .field("sql", &self.redacted())
            .finish()
    }
}

/// Ordered statements run on the privileged connection
#[derive(Clone, Debug)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// Statements that recreate the database and set up the role
    ///
    /// With [`ExistingRole::Update`] and `role_exists`, the role is altered
    /// instead of created. Otherwise `CREATE ROLE` always runs.
    #[must_use]
    pub fn bootstrap(config: &BootstrapConfig, role_exists: bool) -> Self {
        let database = config.get_database();
        let role = config.get_role();
        let password = config.get_password();

        let role_step = if role_exists && config.get_existing_role() == ExistingRole::Update {
            Step::with_secret(
                StepKind::UpdateRole,
                postgres::update_role(role, password),
                postgres::update_role_redacted(role),
            )
        } else {
            Step::with_secret(
                StepKind::CreateRole,
                postgres::create_role(role, password),
                postgres::create_role_redacted(role),
            )
        };

        let mut steps = vec![
            Step::new(
                StepKind::TerminateConnections,
                postgres::terminate_database_connections(database),
            ),
            Step::new(
                StepKind::DropDatabase,
                postgres::drop_database(database, config.get_force_drop()),
            ),
            Step::new(StepKind::CreateDatabase, postgres::create_database(database)),
            role_step,
        ];

        let kinds = [
            StepKind::SetClientEncoding,
            StepKind::SetIsolationLevel,
            StepKind::SetTimezone,
        ];
        steps.extend(
            kinds
                .into_iter()
                .zip(config.get_session_defaults().settings())
                .map(|(kind, (setting, value))| {
                    Step::new(kind, postgres::set_role_default(role, setting, value))
                }),
        );

        steps.push(Step::new(
            StepKind::GrantPrivileges,
            postgres::grant_all_database_privileges(database, role),
        ));

        Self { steps }
    }

    /// Statements that remove the database and the role
    #[must_use]
    pub fn teardown(config: &BootstrapConfig) -> Self {
        let database = config.get_database();

        Self {
            steps: vec![
                Step::new(
                    StepKind::TerminateConnections,
                    postgres::terminate_database_connections(database),
                ),
                Step::new(
                    StepKind::DropDatabase,
                    postgres::drop_database(database, config.get_force_drop()),
                ),
                Step::new(StepKind::DropRole, postgres::drop_role(config.get_role())),
            ],
        }
    }

    /// Steps in execution order
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        self.steps.as_slice()
    }

    /// SQL script of the plan, with or without the password
    #[must_use]
    pub fn script(&self, show_secrets: bool) -> String {
        self.steps
            .iter()
            .map(|step| {
                let sql = if show_secrets {
                    step.sql()
                } else {
                    step.redacted()
                };
                format!("{sql};\n")
            })
            .collect()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script(false).as_str())
    }
}

/// Outcome of an executed plan
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub(crate) steps: Vec<StepKind>,
    pub(crate) terminated_sessions: u64,
}

impl Report {
    /// Steps that completed, in order
    #[must_use]
    pub fn steps(&self) -> &[StepKind] {
        self.steps.as_slice()
    }

    /// Number of sessions terminated before dropping the database
    #[must_use]
    pub fn terminated_sessions(&self) -> u64 {
        self.terminated_sessions
    }
}
