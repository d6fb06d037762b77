#[cfg(feature = "sqlx-postgres")]
pub(in crate::r#async::backend) mod sqlx;
#[cfg(feature = "tokio-postgres")]
pub(in crate::r#async::backend) mod tokio_postgres;
