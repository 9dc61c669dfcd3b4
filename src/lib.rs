//! LunarDB - In-Memory Key-Value Service
//!
//! This crate implements a small in-memory key-value store served over HTTP.
//! Every request passes two independent admission layers: authentication
//! (API key or bearer JWT) and per-client token-bucket rate limiting, with a
//! background sweep evicting the state of idle clients.

pub mod admission;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
