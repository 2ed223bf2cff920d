// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing subscriber setup.

use tessera_server_config::LoggingConfig;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
	EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Installs the global subscriber; fails if one is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TryInitError> {
	let registry = tracing_subscriber::registry().with(env_filter(config));
	if config.json {
		registry.with(fmt::layer().json()).try_init()
	} else {
		registry.with(fmt::layer()).try_init()
	}
}
