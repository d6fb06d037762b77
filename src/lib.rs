//! [![unsafe forbidden](https://img.shields.io/badge/unsafe-forbidden-success.svg)](https://github.com/rust-secure-code/safety-dance/)
//!
//! Recreates a ``Postgres`` database for an application in one idempotent-intent run:
//! - Terminates other sessions connected to the database
//! - Drops the database if it exists and creates it again
//! - Creates the application role with its password
//! - Stores session defaults (encoding, isolation level, timezone) on the role
//! - Grants the role all privileges on the database
//!
//! Failures are not retried or rolled back: the first statement the server rejects
//! aborts the run and its error is returned unchanged.
//!
//! ### Backends
//!
//! #### Sync
//!
//! | Backend                                               | Pool                                      | Feature           |
//! | ----------------------------------------------------- | ----------------------------------------- | ----------------- |
//! | [diesel/postgres](struct@sync::DieselPostgresBackend) | [r2d2](https://docs.rs/r2d2/0.8.10/r2d2/) | `diesel-postgres` |
//! | [postgres](struct@sync::PostgresBackend)              | [r2d2](https://docs.rs/r2d2/0.8.10/r2d2/) | `postgres`        |
//!
//! #### Async
//!
//! | Backend                                              | Pool                                                                        | Features                                       |
//! | ---------------------------------------------------- | --------------------------------------------------------------------------- | ---------------------------------------------- |
//! | [sqlx/postgres](struct@async::SqlxPostgresBackend)   | [sqlx](https://docs.rs/sqlx/0.8.6/sqlx/struct.Pool.html)                    | `sqlx-postgres`                                |
//! | [tokio-postgres](struct@async::TokioPostgresBackend) | [bb8](https://docs.rs/bb8-postgres/0.8.1/bb8_postgres/)                     | `tokio-postgres`, `tokio-postgres-bb8`         |
//! | [tokio-postgres](struct@async::TokioPostgresBackend) | [deadpool](https://docs.rs/deadpool-postgres/0.14.1/deadpool_postgres/)     | `tokio-postgres`, `tokio-postgres-deadpool`    |
//!
//! The `cli` feature (enabled by default) builds the `db-bootstrap` binary on top of
//! the `tokio-postgres` backend.

#![forbid(unsafe_code)]
#![deny(
    missing_docs,
    clippy::cargo,
    clippy::complexity,
    clippy::correctness,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious,
    clippy::unwrap_used
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::module_inception,
    clippy::missing_errors_doc
)]

mod common;

/// Async backends
#[cfg(feature = "_async")]
pub mod r#async;
/// Sync backends
#[cfg(feature = "_sync")]
pub mod sync;
mod util;

pub use common::{
    config::*,
    plan::{Plan, Report, Step, StepKind},
    verification::{DatabasePrivileges, Mismatch, Verification},
};
