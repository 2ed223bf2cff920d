// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for the Tessera server.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`TESSERA_SERVER_*`)
//!
//! # Usage
//!
//! ```ignore
//! use tessera_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("abilities cache holds {} subjects", config.authorisation.cache_max_subjects);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::ServerConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub authorisation: AuthorisationConfig,
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`TESSERA_SERVER_*`)
/// 2. Config file (`/etc/tessera/server.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration from environment only (for testing or simple deployments).
pub fn load_config_from_env() -> Result<ServerConfig, ConfigError> {
	let mut merged = ServerConfigLayer::default();
	merged.merge(EnvSource.load()?);
	finalize(merged)
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Merge `sources` in precedence order and finalize the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let authorisation = layer.authorisation.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&authorisation, &database)?;

	info!(
		database = %database.url,
		abilities_cache_enabled = authorisation.cache_enabled,
		abilities_cache_max_subjects = authorisation.cache_max_subjects,
		default_locale = %authorisation.default_locale,
		log_level = %logging.level,
		"Server configuration loaded"
	);

	Ok(ServerConfig {
		authorisation,
		database,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(
	authorisation: &AuthorisationConfig,
	database: &DatabaseConfig,
) -> Result<(), ConfigError> {
	if authorisation.cache_enabled && authorisation.cache_max_subjects == 0 {
		return Err(ConfigError::Validation(
			"TESSERA_SERVER_AUTHORISATION_CACHE_MAX_SUBJECTS must be greater than zero \
			 while the abilities cache is enabled"
				.to_string(),
		));
	}

	if database.max_connections == 0 {
		return Err(ConfigError::Validation(
			"TESSERA_SERVER_DATABASE_MAX_CONNECTIONS must be greater than zero".to_string(),
		));
	}

	Ok(())
}
