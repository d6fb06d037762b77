pub(crate) mod config;
pub(crate) mod plan;
pub(crate) mod statement;
pub(crate) mod verification;
