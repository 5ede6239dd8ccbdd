//! # mongocoba - small CRUD exercises against a MongoDB server
//!
//! ## Environment Variables
//!
//! - `MONGO_USER`, `MONGO_PASS`, `MONGO_AUTH_SOURCE`: account used to authenticate
//! - `MONGO_HOST`, `MONGO_PORT`, `MONGO_DB`: where the records live
//! - `MONGO_TIMEOUT_SECS`: optional server selection timeout
//! - `RUST_LOG`: log filter, defaults to `mongocoba=info`

pub mod cli;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod ops;
pub mod scenarios;
