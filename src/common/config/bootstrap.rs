use std::fmt;

use super::session::{Error as SessionError, SessionDefaults};

/// What to do when the application role already exists
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExistingRole {
    /// Run `CREATE ROLE` regardless and surface the server's error
    #[default]
    Fail,
    /// Reset the password and `LOGIN` attribute of the existing role
    Update,
}

/// Bootstrap target
///
/// Names the database to recreate and the application role to own access to it.
#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    pub(crate) database: String,
    pub(crate) role: String,
    pub(crate) password: Password,
    pub(crate) session_defaults: SessionDefaults,
    pub(crate) existing_role: ExistingRole,
    pub(crate) force_drop: bool,
}

impl BootstrapConfig {
    /// Creates a new bootstrap target with default session settings
    /// # Example
    /// ```
    /// # use db_bootstrap::BootstrapConfig;
    /// #
    /// let config = BootstrapConfig::new(
    ///     "pactf".to_owned(),
    ///     "pactf_user".to_owned(),
    ///     "pactf_user_password".to_owned(),
    /// )
    /// .unwrap();
    /// ```
    pub fn new(database: String, role: String, password: String) -> Result<Self, Error> {
        validate_identifier(NameKind::Database, database.as_str())?;
        validate_identifier(NameKind::Role, role.as_str())?;
        if password.is_empty() {
            return Err(Error::EmptyPassword);
        }
        if password.contains('\0') {
            return Err(Error::NulInPassword);
        }

        Ok(Self {
            database,
            role,
            password: Password(password),
            session_defaults: SessionDefaults::new(),
            existing_role: ExistingRole::default(),
            force_drop: false,
        })
    }

    /// Creates a new bootstrap target from environment variables
    /// # Environment variables
    /// - `BOOTSTRAP_DATABASE` (required)
    /// - `BOOTSTRAP_ROLE` (required)
    /// - `BOOTSTRAP_PASSWORD` (required)
    /// - `BOOTSTRAP_CLIENT_ENCODING`
    /// - `BOOTSTRAP_ISOLATION_LEVEL`
    /// - `BOOTSTRAP_TIMEZONE`
    /// # Defaults
    /// - Client encoding: utf8
    /// - Isolation level: read committed
    /// - Timezone: UTC
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let required = |key: &'static str| lookup(key).ok_or(Error::MissingVar(key));

        let config = Self::new(
            required("BOOTSTRAP_DATABASE")?,
            required("BOOTSTRAP_ROLE")?,
            required("BOOTSTRAP_PASSWORD")?,
        )?;

        let mut session_defaults = SessionDefaults::new();
        if let Some(value) = lookup("BOOTSTRAP_CLIENT_ENCODING") {
            session_defaults = session_defaults.client_encoding(value)?;
        }
        if let Some(value) = lookup("BOOTSTRAP_ISOLATION_LEVEL") {
            session_defaults = session_defaults.isolation_level(value.parse()?);
        }
        if let Some(value) = lookup("BOOTSTRAP_TIMEZONE") {
            session_defaults = session_defaults.timezone(value)?;
        }

        Ok(config.session_defaults(session_defaults))
    }

    /// Sets new session defaults
    #[must_use]
    pub fn session_defaults(self, value: SessionDefaults) -> Self {
        Self {
            session_defaults: value,
            ..self
        }
    }

    /// Sets the existing role policy
    /// # Example
    /// ```
    /// # use db_bootstrap::{BootstrapConfig, ExistingRole};
    /// #
    /// let config = BootstrapConfig::new(
    ///     "pactf".to_owned(),
    ///     "pactf_user".to_owned(),
    ///     "pactf_user_password".to_owned(),
    /// )
    /// .unwrap()
    /// .existing_role(ExistingRole::Update);
    /// ```
    #[must_use]
    pub fn existing_role(self, value: ExistingRole) -> Self {
        Self {
            existing_role: value,
            ..self
        }
    }

    /// Drops the database `WITH (FORCE)` (``Postgres`` 13+)
    #[must_use]
    pub fn force_drop(self, value: bool) -> Self {
        Self {
            force_drop: value,
            ..self
        }
    }

    /// Database name
    #[must_use]
    pub fn get_database(&self) -> &str {
        self.database.as_str()
    }

    /// Role name
    #[must_use]
    pub fn get_role(&self) -> &str {
        self.role.as_str()
    }

    /// Role password
    #[must_use]
    pub fn get_password(&self) -> &str {
        self.password.0.as_str()
    }

    /// Session defaults
    #[must_use]
    pub fn get_session_defaults(&self) -> &SessionDefaults {
        &self.session_defaults
    }

    /// Existing role policy
    #[must_use]
    pub fn get_existing_role(&self) -> ExistingRole {
        self.existing_role
    }

    /// Whether the database is dropped `WITH (FORCE)`
    #[must_use]
    pub fn get_force_drop(&self) -> bool {
        self.force_drop
    }
}

#[derive(Clone)]
pub(crate) struct Password(String);

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"********\"")
    }
}

/// Longest identifier ``Postgres`` keeps without truncation (`NAMEDATALEN - 1`)
const MAX_IDENTIFIER_LEN: usize = 63;

/// Kind of name carried by a configuration error
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameKind {
    /// Database name
    Database,
    /// Role name
    Role,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Database => "database",
            Self::Role => "role",
        })
    }
}

fn validate_identifier(kind: NameKind, name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::EmptyName(kind));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::NameTooLong(kind, name.to_owned()));
    }
    if name.contains('\0') {
        return Err(Error::NulInName(kind));
    }
    Ok(())
}

/// Bootstrap configuration error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Required environment variable is not set
    #[error("environment variable `{0}` is not set")]
    MissingVar(&'static str),
    /// Name is empty
    #[error("{0} name must not be empty")]
    EmptyName(NameKind),
    /// Name would be truncated by the server
    #[error("{0} name `{1}` is longer than 63 bytes")]
    NameTooLong(NameKind, String),
    /// Name contains a NUL byte
    #[error("{0} name must not contain a NUL byte")]
    NulInName(NameKind),
    /// Password is empty
    #[error("role password must not be empty")]
    EmptyPassword,
    /// Password contains a NUL byte
    #[error("role password must not contain a NUL byte")]
    NulInPassword,
    /// Invalid session default
    #[error(transparent)]
    Session(#[from] SessionError),
}
