//! # Pi Market Gateway server
//!
//! This crate hosts the HTTP surface of the gateway. It is responsible for:
//! * listening for incoming payment webhook notifications from the Pi network and verifying
//!   their HMAC signatures,
//! * the authenticated payment/order/payout/store routes,
//! * executing payouts against the network (the engine only does the bookkeeping), and
//! * the payout worker that drains the durable task queue.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.

pub mod auth;
pub mod cli;
pub mod config;
pub mod errors;

pub mod data_objects;
pub mod helpers;
pub mod middleware;
pub mod payout;
pub mod payout_worker;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
