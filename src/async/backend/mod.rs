mod common;
mod error;
mod postgres;
pub(crate) mod r#trait;

pub use error::Error;

#[cfg(feature = "tokio-postgres-bb8")]
pub use common::pool::tokio_postgres::bb8::TokioPostgresBb8;
#[cfg(feature = "tokio-postgres-deadpool")]
pub use common::pool::tokio_postgres::deadpool::TokioPostgresDeadpool;
#[cfg(feature = "tokio-postgres")]
pub use common::pool::tokio_postgres::r#trait::TokioPostgresPoolAssociation;
#[cfg(feature = "sqlx-postgres")]
pub use postgres::SqlxPostgresBackend;
#[cfg(feature = "tokio-postgres")]
pub use postgres::TokioPostgresBackend;
pub use r#trait::Backend;
