//! App Configuration client library
//!
//! An async client for the Azure App Configuration key-value REST API
//! (and its local emulator), plus a configuration provider that loads a
//! snapshot of settings and binds it onto typed records.

pub mod api;
pub mod auth;
pub mod error;
pub mod model;
pub mod provider;
pub mod retry;

mod client;
mod connection;

pub use client::*;
pub use connection::ConnectionString;
