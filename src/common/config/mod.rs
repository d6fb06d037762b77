pub(crate) mod bootstrap;
pub(crate) mod postgres;
pub(crate) mod session;

pub use bootstrap::{
    BootstrapConfig, Error as BootstrapConfigError, ExistingRole, NameKind,
};
pub use postgres::{Error as PrivilegedPostgresConfigError, PrivilegedPostgresConfig};
pub use session::{Error as SessionDefaultsError, IsolationLevel, SessionDefaults};
