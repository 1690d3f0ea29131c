//! Admin Console client
//!
//! Client-side companion for a bot-platform admin server: keeps the
//! operator's session alive and exports conversation history to files.
//!
//! # Architecture
//!
//! - **Auth**: the session token slot and its expiry metadata
//! - **Keepalive**: a background timer that renews the token before it expires
//! - **History**: message exchanges and their JSON export
//! - **Client**: REST access to the admin API
//!
//! # Modules
//!
//! - [`auth`]: stored tokens and token stores
//! - [`client`]: admin API HTTP client
//! - [`config`]: CLI and configuration layering
//! - [`console`]: profile and licensing state for the shell
//! - [`history`]: message history model and export
//! - [`keepalive`]: token refresh state machine and timer
//! - [`telemetry`]: logging setup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::missing_fields_in_debug)]

pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod error;
pub mod history;
pub mod keepalive;
pub mod telemetry;

pub use error::{Error, Result};
