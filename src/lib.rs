//! Gateway Observatory Library
//!
//! This library exports the status-resolution and metrics pipeline for
//! a decentralized gateway network, plus the HTTP surface serving it.

pub mod app_state;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod routes;
pub mod services;
pub mod status;
