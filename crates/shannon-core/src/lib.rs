//! Core data model and shared infrastructure for the Shannon orchestrator.
//!
//! This crate provides the foundational types every other component
//! operates on:
//! - The task/session/event data model
//! - The typed error hierarchy components convert into
//! - A hot-reloadable config snapshot primitive (`ConfigHandle`)
//! - Durable task-record persistence on SQLite

pub mod config;
pub mod error;
pub mod model;
pub mod store;

pub use error::{ShannonError, ShannonResult};
