#[cfg(feature = "tokio-postgres-bb8")]
pub(in crate::r#async::backend) mod bb8;
#[cfg(feature = "tokio-postgres-deadpool")]
pub(in crate::r#async::backend) mod deadpool;
pub(in crate::r#async::backend) mod r#trait;
