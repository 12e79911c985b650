//! CLI subcommand implementations.

pub mod auth;
pub mod call;
pub mod serve;
