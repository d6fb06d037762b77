use crate::util::quote_conninfo_value;

/// Privileged ``Postgres`` configuration
///
/// Describes the administrative connection used to terminate sessions, drop and
/// create the target database, and create the application role.
#[derive(Clone, Debug)]
pub struct PrivilegedPostgresConfig {
    pub(crate) username: String,
    pub(crate) password: Option<String>,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) database: String,
}

impl PrivilegedPostgresConfig {
    const DEFAULT_USERNAME: &'static str = "postgres";
    const DEFAULT_PASSWORD: Option<String> = None;
    const DEFAULT_HOST: &'static str = "localhost";
    const DEFAULT_PORT: u16 = 5432;
    const DEFAULT_DATABASE: &'static str = "postgres";

    /// Creates a new privileged ``Postgres`` configuration with defaults
    /// # Example
    /// ```
    /// # use db_bootstrap::PrivilegedPostgresConfig;
    /// #
    /// let config = PrivilegedPostgresConfig::new();
    /// ```
    /// # Defaults
    /// - Username: postgres
    /// - Password: {blank}
    /// - Host: localhost
    /// - Port: 5432
    /// - Maintenance database: postgres
    #[must_use]
    pub fn new() -> Self {
        Self {
            username: Self::DEFAULT_USERNAME.to_owned(),
            password: Self::DEFAULT_PASSWORD,
            host: Self::DEFAULT_HOST.to_owned(),
            port: Self::DEFAULT_PORT,
            database: Self::DEFAULT_DATABASE.to_owned(),
        }
    }

    /// Creates a new privileged ``Postgres`` configuration from environment variables
    /// # Environment variables
    /// - `POSTGRES_USERNAME`
    /// - `POSTGRES_PASSWORD`
    /// - `POSTGRES_HOST`
    /// - `POSTGRES_PORT`
    /// - `POSTGRES_DATABASE`
    /// # Defaults
    /// - Username: postgres
    /// - Password: {blank}
    /// - Host: localhost
    /// - Port: 5432
    /// - Maintenance database: postgres
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let username =
            lookup("POSTGRES_USERNAME").unwrap_or_else(|| Self::DEFAULT_USERNAME.to_owned());
        let password = lookup("POSTGRES_PASSWORD");
        let host = lookup("POSTGRES_HOST").unwrap_or_else(|| Self::DEFAULT_HOST.to_owned());
        let port = lookup("POSTGRES_PORT")
            .map_or(Ok(Self::DEFAULT_PORT), |port| port.parse())
            .map_err(Error::InvalidPort)?;
        let database =
            lookup("POSTGRES_DATABASE").unwrap_or_else(|| Self::DEFAULT_DATABASE.to_owned());

        Ok(Self {
            username,
            password,
            host,
            port,
            database,
        })
    }

    /// Sets a new username
    /// # Example
    /// ```
    /// # use db_bootstrap::PrivilegedPostgresConfig;
    /// #
    /// let config = PrivilegedPostgresConfig::new().username("admin".to_owned());
    /// ```
    #[must_use]
    pub fn username(self, value: String) -> Self {
        Self {
            username: value,
            ..self
        }
    }

    /// Sets a new password
    /// # Example
    /// ```
    /// # use db_bootstrap::PrivilegedPostgresConfig;
    /// #
    /// let config =
    ///     PrivilegedPostgresConfig::new().password(Some("postgres".to_owned()));
    /// ```
    #[must_use]
    pub fn password(self, value: Option<String>) -> Self {
        Self {
            password: value,
            ..self
        }
    }

    /// Sets a new host
    /// # Example
    /// ```
    /// # use db_bootstrap::PrivilegedPostgresConfig;
    /// #
    /// let config = PrivilegedPostgresConfig::new().host("localhost".to_owned());
    /// ```
    #[must_use]
    pub fn host(self, value: String) -> Self {
        Self {
            host: value,
            ..self
        }
    }

    /// Sets a new port
    /// # Example
    /// ```
    /// # use db_bootstrap::PrivilegedPostgresConfig;
    /// #
    /// let config = PrivilegedPostgresConfig::new().port(5432);
    /// ```
    #[must_use]
    pub fn port(self, value: u16) -> Self {
        Self {
            port: value,
            ..self
        }
    }

    /// Sets the maintenance database the privileged connection opens
    ///
    /// It must differ from the database being bootstrapped, since a database
    /// cannot be dropped while the dropping session is connected to it.
    /// # Example
    /// ```
    /// # use db_bootstrap::PrivilegedPostgresConfig;
    /// #
    /// let config = PrivilegedPostgresConfig::new().database("template1".to_owned());
    /// ```
    #[must_use]
    pub fn database(self, value: String) -> Self {
        Self {
            database: value,
            ..self
        }
    }

    /// libpq connection string for the privileged connection
    #[must_use]
    pub fn privileged_connection_string(&self) -> String {
        let Self {
            username,
            password,
            database,
            ..
        } = self;
        self.connection_string(username, password.as_deref(), database)
    }

    /// libpq connection string for a connection as `username` to `database`
    /// on the same server
    #[must_use]
    pub fn connection_string(
        &self,
        username: &str,
        password: Option<&str>,
        database: &str,
    ) -> String {
        let Self { host, port, .. } = self;
        let mut conninfo = format!(
            "host={} port={port} user={} dbname={}",
            quote_conninfo_value(host),
            quote_conninfo_value(username),
            quote_conninfo_value(database)
        );
        if let Some(password) = password {
            conninfo.push_str(" password=");
            conninfo.push_str(quote_conninfo_value(password).as_str());
        }
        conninfo
    }
}

/// Privileged ``Postgres`` configuration error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `POSTGRES_PORT` is not a valid port number
    #[error("invalid POSTGRES_PORT: {0}")]
    InvalidPort(std::num::ParseIntError),
}

impl Default for PrivilegedPostgresConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "postgres")]
impl From<PrivilegedPostgresConfig> for r2d2_postgres::postgres::Config {
    fn from(value: PrivilegedPostgresConfig) -> Self {
        let PrivilegedPostgresConfig {
            username,
            password,
            host,
            port,
            database,
        } = value;

        let mut config = Self::new();

        config
            .user(username.as_str())
            .host(host.as_str())
            .port(port)
            .dbname(database.as_str());

        if let Some(password) = password {
            config.password(password.as_str());
        }

        config
    }
}

#[cfg(feature = "sqlx-postgres")]
impl From<PrivilegedPostgresConfig> for sqlx::postgres::PgConnectOptions {
    fn from(value: PrivilegedPostgresConfig) -> Self {
        let PrivilegedPostgresConfig {
            username,
            password,
            host,
            port,
            database,
        } = value;

        let opts = Self::new()
            .username(username.as_str())
            .host(host.as_str())
            .port(port)
            .database(database.as_str());

        if let Some(password) = password {
            opts.password(password.as_str())
        } else {
            opts
        }
    }
}

#[cfg(feature = "tokio-postgres")]
impl From<PrivilegedPostgresConfig> for tokio_postgres::Config {
    fn from(value: PrivilegedPostgresConfig) -> Self {
        let PrivilegedPostgresConfig {
            username,
            password,
            host,
            port,
            database,
        } = value;

        let mut config = Self::new();

        config
            .user(username.as_str())
            .host(host.as_str())
            .port(port)
            .dbname(database.as_str());

        if let Some(password) = password {
            config.password(password.as_str());
        }

        config
    }
}
