use std::{fmt, str::FromStr};

/// Transaction isolation level applied as a role default
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IsolationLevel {
    /// `read uncommitted`
    ReadUncommitted,
    /// `read committed`
    #[default]
    ReadCommitted,
    /// `repeatable read`
    RepeatableRead,
    /// `serializable`
    Serializable,
}

impl IsolationLevel {
    /// Value as accepted by `default_transaction_isolation`
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "read uncommitted",
            Self::ReadCommitted => "read committed",
            Self::RepeatableRead => "repeatable read",
            Self::Serializable => "serializable",
        }
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_ascii_lowercase()
            .replace(['-', '_'], " ");
        match normalized.as_str() {
            "read uncommitted" => Ok(Self::ReadUncommitted),
            "read committed" => Ok(Self::ReadCommitted),
            "repeatable read" => Ok(Self::RepeatableRead),
            "serializable" => Ok(Self::Serializable),
            _ => Err(Error::InvalidIsolationLevel(s.to_owned())),
        }
    }
}

/// Session defaults stored on the application role
///
/// Every new session opened as the role starts with these values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionDefaults {
    pub(crate) client_encoding: String,
    pub(crate) isolation_level: IsolationLevel,
    pub(crate) timezone: String,
}

impl SessionDefaults {
    const DEFAULT_CLIENT_ENCODING: &'static str = "utf8";
    const DEFAULT_TIMEZONE: &'static str = "UTC";

    /// Creates session defaults
    /// # Defaults
    /// - Client encoding: utf8
    /// - Isolation level: read committed
    /// - Timezone: UTC
    #[must_use]
    pub fn new() -> Self {
        Self {
            client_encoding: Self::DEFAULT_CLIENT_ENCODING.to_owned(),
            isolation_level: IsolationLevel::default(),
            timezone: Self::DEFAULT_TIMEZONE.to_owned(),
        }
    }

    /// Sets a new client encoding
    pub fn client_encoding(self, value: String) -> Result<Self, Error> {
        validate_setting("client_encoding", value.as_str())?;
        Ok(Self {
            client_encoding: value,
            ..self
        })
    }

    /// Sets a new isolation level
    #[must_use]
    pub fn isolation_level(self, value: IsolationLevel) -> Self {
        Self {
            isolation_level: value,
            ..self
        }
    }

    /// Sets a new timezone
    pub fn timezone(self, value: String) -> Result<Self, Error> {
        validate_setting("timezone", value.as_str())?;
        Ok(Self {
            timezone: value,
            ..self
        })
    }

    /// `(setting, value)` pairs in the order they are applied
    #[must_use]
    pub fn settings(&self) -> [(&'static str, &str); 3] {
        [
            ("client_encoding", self.client_encoding.as_str()),
            (
                "default_transaction_isolation",
                self.isolation_level.as_str(),
            ),
            ("timezone", self.timezone.as_str()),
        ]
    }
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_setting(name: &'static str, value: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::EmptySetting(name));
    }
    if value.contains('\0') {
        return Err(Error::NulInSetting(name));
    }
    Ok(())
}

/// Session defaults error
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    /// Unknown isolation level
    #[error(
        "invalid isolation level `{0}`, expected one of: read uncommitted, read committed, repeatable read, serializable"
    )]
    InvalidIsolationLevel(String),
    /// Setting value is blank
    #[error("`{0}` must not be empty")]
    EmptySetting(&'static str),
    /// Setting value contains a NUL byte
    #[error("`{0}` must not contain a NUL byte")]
    NulInSetting(&'static str),
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::{Error, IsolationLevel, SessionDefaults};

    #[test]
    fn parses_isolation_level_spellings() {
        for s in ["read committed", "READ_COMMITTED", "read-committed", " Read Committed "] {
            assert_eq!(
                s.parse::<IsolationLevel>().unwrap(),
                IsolationLevel::ReadCommitted
            );
        }
        assert_eq!(
            "serializable".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::Serializable
        );
        assert_eq!(
            "repeatable_read".parse::<IsolationLevel>().unwrap(),
            IsolationLevel::RepeatableRead
        );
    }

    #[test]
    fn rejects_unknown_isolation_level() {
        assert_eq!(
            "snapshot".parse::<IsolationLevel>(),
            Err(Error::InvalidIsolationLevel("snapshot".to_owned()))
        );
    }

    #[test]
    fn defaults_match_application_expectations() {
        assert_eq!(
            SessionDefaults::new().settings(),
            [
                ("client_encoding", "utf8"),
                ("default_transaction_isolation", "read committed"),
                ("timezone", "UTC"),
            ]
        );
    }

    #[test]
    fn rejects_blank_values() {
        assert_eq!(
            SessionDefaults::new().timezone("  ".to_owned()),
            Err(Error::EmptySetting("timezone"))
        );
        assert_eq!(
            SessionDefaults::new().client_encoding("utf\08".to_owned()),
            Err(Error::NulInSetting("client_encoding"))
        );
    }
}
