//! SmartShop: shopping lists with per-list spending totals
//!
//! Embedded stack: sled document storage with live queries, bcrypt password
//! hashes and a persisted JWT session (LocalBackend), exact decimal prices
//! (rust_decimal), and tokio watch channels for snapshots.
//!
//! Components talk to storage only through the [`backend::Backend`] trait;
//! [`app::App`] wires session changes to the view router and the stores.

pub mod error;
pub mod config;
pub mod models;
pub mod storage;
// Filters and ordering evaluated against stored JSON documents
pub mod query;
pub mod auth;
pub mod live;
pub mod backend;
pub mod local;

pub mod session;
pub mod router;
pub mod lists;
pub mod products;
pub mod aggregation;
pub mod app;

#[cfg(test)]
mod test_support;
