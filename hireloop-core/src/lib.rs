#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod entities;
pub mod events;
pub mod framework;
pub mod gateway;
pub mod ledger;
pub mod lifecycle;
pub mod processors;
pub mod store;
pub mod utils;
