//! Core types and trait definitions for the Health Guardian pipeline.
//!
//! This crate is deliberately free of database and network dependencies.
//! The SQLite backend and the pipeline layer both depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod conversation;
pub mod error;
pub mod patient;
pub mod record;
pub mod session;
pub mod store;

pub use error::{Error, Result};
