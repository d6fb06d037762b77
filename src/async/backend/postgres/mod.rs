#[cfg(feature = "sqlx-postgres")]
pub mod sqlx;
#[cfg(feature = "tokio-postgres")]
pub mod tokio_postgres;
mod r#trait;

#[cfg(feature = "sqlx-postgres")]
pub use sqlx::SqlxPostgresBackend;
#[cfg(feature = "tokio-postgres")]
pub use tokio_postgres::TokioPostgresBackend;
