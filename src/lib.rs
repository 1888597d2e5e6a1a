//! mailsched-rs Library
//!
//! Polls a PostgreSQL job table for due mail and delivers it concurrently
//! over SMTP, recording each job's `PENDING → SENT | FAILED` transition.

use shadow_rs::shadow;
shadow!(build);

pub mod cli;
pub mod config;
pub mod daemon;
pub mod db;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod logger;
pub mod repositories;
pub mod schema;
pub mod services;

pub use lifecycle::LifecycleController;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}

pub fn clap_long_version() -> &'static str {
    build::CLAP_LONG_VERSION
}
