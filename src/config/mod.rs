//! Configuration module for Rewind
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every table is optional; missing values fall back to [`Config::default`].
//!
//! # Example
//!
//! ```no_run
//! use rewind::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rewind.toml")).unwrap();
//! println!("Default page budget: {}", config.crawler.page_budget);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{validate, validate_job_limits, MAX_PAGE_BUDGET, MAX_WORKERS};
