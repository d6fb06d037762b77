use super::config::SessionDefaults;

/// Privileges the current role holds on the bootstrapped database
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DatabasePrivileges {
    /// `CREATE`
    pub create: bool,
    /// `CONNECT`
    pub connect: bool,
    /// `TEMPORARY`
    pub temporary: bool,
}

impl DatabasePrivileges {
    fn missing(self) -> Option<&'static str> {
        [
            ("CREATE", self.create),
            ("CONNECT", self.connect),
            ("TEMPORARY", self.temporary),
        ]
        .into_iter()
        .find_map(|(name, held)| (!held).then_some(name))
    }
}

/// What a bootstrapped role actually looks like
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    role_settings: Vec<(String, String)>,
    privileges: DatabasePrivileges,
}

impl Verification {
    /// `role_settings` are raw `name=value` entries from `pg_db_role_setting`
    pub(crate) fn new(role_settings: &[String], privileges: DatabasePrivileges) -> Self {
        let role_settings = role_settings
            .iter()
            .filter_map(|entry| entry.split_once('='))
            .map(|(name, value)| (name.trim().to_ascii_lowercase(), value.trim().to_owned()))
            .collect();
        Self {
            role_settings,
            privileges,
        }
    }

    /// Stored default for `name`, compared case-insensitively
    #[must_use]
    pub fn role_setting(&self, name: &str) -> Option<&str> {
        self.role_settings
            .iter()
            .find(|(setting, _)| setting.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Privileges held on the database
    #[must_use]
    pub fn privileges(&self) -> DatabasePrivileges {
        self.privileges
    }

    /// Checks the role against the expected session defaults and full privileges
    pub fn check(&self, expected: &SessionDefaults) -> Result<(), Mismatch> {
        for (name, expected) in expected.settings() {
            let actual = self
                .role_setting(name)
                .ok_or(Mismatch::MissingSetting(name))?;
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(Mismatch::Setting {
                    name,
                    expected: expected.to_owned(),
                    actual: actual.to_owned(),
                });
            }
        }

        if let Some(privilege) = self.privileges.missing() {
            return Err(Mismatch::Privilege(privilege));
        }

        Ok(())
    }
}

/// Difference between the bootstrapped role and its configuration
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Mismatch {
    /// Role has no stored default for a setting
    #[error("role has no default for `{0}`")]
    MissingSetting(&'static str),
    /// Role default differs from the configured value
    #[error("role default `{name}` is `{actual}`, expected `{expected}`")]
    Setting {
        /// Setting name
        name: &'static str,
        /// Configured value
        expected: String,
        /// Stored value
        actual: String,
    },
    /// Role lacks a database privilege
    #[error("role lacks the {0} privilege on the database")]
    Privilege(&'static str),
}
