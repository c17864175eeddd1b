//! Infrastructure layer for magnet.
//!
//! Contains implementations of the store and collaborator traits defined in
//! `magnet-core`: SQLite persistence, filesystem blob and artifact storage,
//! and HTTP adapters for the AI provider, webhooks and the remote browser.

pub mod config;
pub mod handoff;
pub mod http;
pub mod notify;
pub mod pricing;
pub mod sqlite;
pub mod storage;
