//! HTTP control surface for a bitcoind controller.
//!
//! Endpoints:
//! - `POST /bitcoind/start`
//! - `POST /bitcoind/stop` (`?force=true` for immediate termination)
//! - `GET /bitcoind/status`
//! - `GET /health`

pub mod handler;
pub mod server;

pub use server::{router, start_server, AppState};
