//! announce-watch library — market announcements acquisition pipeline.
//!
//! Polls the ASX announcements feed, enriches newly discovered items with
//! per-symbol market data, and persists deduplicated results. The library
//! crate exposes the core modules for integration testing.

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod feed;
pub mod market;
pub mod notify;
pub mod render;
pub mod service;
pub mod store;
