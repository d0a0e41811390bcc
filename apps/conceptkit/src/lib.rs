//! # conceptkit
//!
//! The ConceptKit binary crate - THE BINARY.
//!
//! Wraps `conceptkit-core` with:
//! - `api` - axum HTTP server (`/health`, `/status`, `/invoke`)
//! - `cli` - clap command tree (`server`, `run`, `config`)
//! - `config` - TOML + environment configuration
//! - `dispatch` - action-name routing onto the concept handlers

pub mod api;
pub mod cli;
pub mod config;
pub mod dispatch;
