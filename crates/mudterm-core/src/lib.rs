//! Core mudterm library (relay, session, game server client, accounts, config).

pub mod accounts;
pub mod api;
pub mod bus;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;

pub use error::{ClientError, ClientErrorKind, ClientResult};
