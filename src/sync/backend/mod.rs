mod error;
mod postgres;
pub(crate) mod r#trait;

pub use error::Error;
#[cfg(feature = "diesel-postgres")]
pub use postgres::DieselPostgresBackend;
#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;
pub use r#trait::Backend;
