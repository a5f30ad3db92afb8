// Environment-driven configuration

pub mod app;
pub mod database;

pub use app::AppConfig;
pub use database::{run_migrations, DatabaseConfig};

use std::env;
use std::str::FromStr;

/// Parsed value of `key`, or `default` when unset or unparsable.
pub(crate) fn parsed_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

pub(crate) fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
